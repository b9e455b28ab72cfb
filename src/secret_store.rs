//! Storage seam for key material.
//!
//! The keystore talks to platform secure storage through this trait so the
//! crypto core stays testable off-device. Implementations hold opaque key
//! material under string tags; they never interpret it.

use crate::errors::AuthError;
use std::collections::HashMap;
use std::sync::RwLock;
use zeroize::Zeroizing;

/// Backing store for tagged key material.
///
/// `get` distinguishes "absent" from "failed": `Ok(None)` means no entry
/// exists under the tag, which the keystore turns into `KeyNotFound` with
/// context. Returned bytes are wrapped in [`Zeroizing`] so copies are wiped
/// when dropped.
pub trait SecretStore: Send + Sync {
    /// Store `material` under `tag`, replacing any existing entry.
    fn put(&self, tag: &str, material: &[u8]) -> Result<(), AuthError>;

    /// Fetch the material stored under `tag`, if any.
    fn get(&self, tag: &str) -> Result<Option<Zeroizing<Vec<u8>>>, AuthError>;

    /// Remove the entry under `tag`. Removing an absent tag is a no-op.
    fn delete(&self, tag: &str) -> Result<(), AuthError>;
}

/// In-memory secret store for demos and testing.
///
/// # ⚠️ WARNING: NOT FOR PRODUCTION USE
///
/// **`MemorySecretStore` is for testing only.** Production deployments MUST
/// bind [`SecretStore`] to platform secure key storage.
///
/// This implementation:
/// - Holds key material in plaintext process memory
/// - Does not use hardware-backed security
/// - Loses everything when the process exits
///
/// For production, implement `SecretStore` over your platform's facility:
/// - **iOS**: Keychain with `kSecAttrAccessibleWhenPasscodeSetThisDeviceOnly`
/// - **Android**: Keystore with hardware backing (StrongBox if available)
#[derive(Default)]
pub struct MemorySecretStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SecretStore for MemorySecretStore {
    fn put(&self, tag: &str, material: &[u8]) -> Result<(), AuthError> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(tag.to_string(), material.to_vec());
        Ok(())
    }

    fn get(&self, tag: &str) -> Result<Option<Zeroizing<Vec<u8>>>, AuthError> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(tag).map(|m| Zeroizing::new(m.clone())))
    }

    fn delete(&self, tag: &str) -> Result<(), AuthError> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.remove(tag);
        Ok(())
    }
}
