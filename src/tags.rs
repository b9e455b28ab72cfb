//! Tag derivation for keystore entries.
//!
//! Every connection owns two keystore slots: its own RSA keypair, stored
//! under the bare connection identifier, and the provider's cached public
//! key, stored under a suffixed variant of the same identifier. Tags are
//! persistence keys, so derivation must be stable across process restarts.

/// Suffix that turns a connection identifier into its provider-key tag.
const PROVIDER_SUFFIX: &str = "_provider_public_key";

/// Which of a connection's two keystore slots a tag addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyRole {
    /// The device's own keypair for this connection.
    Own,
    /// The cached provider (counterparty) public key.
    ProviderPublic,
}

/// Derive the keystore tag for `connection_id` in the given role.
///
/// Pure and total: the same inputs always produce the same tag, and the
/// two roles never collide for the same identifier.
pub fn derive_tag(connection_id: &str, role: KeyRole) -> String {
    match role {
        KeyRole::Own => connection_id.to_string(),
        KeyRole::ProviderPublic => format!("{connection_id}{PROVIDER_SUFFIX}"),
    }
}
