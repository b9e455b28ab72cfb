//! The slice of a persisted connection record this core consumes.
//!
//! Connections themselves belong to the host app's persistence layer;
//! the core reads them by reference and never writes back. Callers
//! persist any provider key or access token they obtain.

use crate::tags::{derive_tag, KeyRole};
use serde::{Deserialize, Serialize};

/// Which request/crypto generation a connection speaks.
///
/// Fixed by the server response that created the connection. Dispatch is
/// always an exhaustive `match`, so adding a generation fails to compile
/// until every signer and codec handles it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtocolVersion {
    V1,
    V2,
}

/// Whether the provider still accepts signed traffic for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionStatus {
    Active,
    Inactive,
}

/// One linked provider relationship.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    /// Stable unique identifier; every keystore tag derives from it.
    pub id: String,
    /// Request/crypto generation.
    pub protocol_version: ProtocolVersion,
    /// Provider RSA public key material (PEM or DER). Required before any
    /// v2 signed or verified exchange.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_public_key: Option<Vec<u8>>,
    /// Whether signed operations are currently permitted.
    pub status: ConnectionStatus,
    /// Bearer value granted by the connection handshake, echoed into the
    /// access-token header on every signed request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

impl Connection {
    /// A new active connection with nothing provisioned yet.
    pub fn new(id: impl Into<String>, protocol_version: ProtocolVersion) -> Self {
        Self {
            id: id.into(),
            protocol_version,
            provider_public_key: None,
            status: ConnectionStatus::Active,
            access_token: None,
        }
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn with_status(mut self, status: ConnectionStatus) -> Self {
        self.status = status;
        self
    }

    /// Tag of this connection's own keypair.
    pub fn own_tag(&self) -> String {
        derive_tag(&self.id, KeyRole::Own)
    }

    /// Tag of the cached provider public key.
    pub fn provider_tag(&self) -> String {
        derive_tag(&self.id, KeyRole::ProviderPublic)
    }

    pub fn is_active(&self) -> bool {
        matches!(self.status, ConnectionStatus::Active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_derive_from_id() {
        let connection = Connection::new("12345", ProtocolVersion::V1);
        assert_eq!(connection.own_tag(), "12345");
        assert_eq!(connection.provider_tag(), "12345_provider_public_key");
    }

    #[test]
    fn test_status_gates_activity() {
        let connection = Connection::new("1", ProtocolVersion::V2);
        assert!(connection.is_active());
        assert!(!connection
            .with_status(ConnectionStatus::Inactive)
            .is_active());
    }

    #[test]
    fn test_optional_fields_are_omitted_from_json() {
        let connection = Connection::new("1", ProtocolVersion::V1);
        let json = serde_json::to_string(&connection).unwrap();
        assert!(!json.contains("provider_public_key"));
        assert!(!json.contains("access_token"));

        let json = serde_json::to_string(&connection.with_access_token("t")).unwrap();
        assert!(json.contains("\"access_token\":\"t\""));
    }
}
