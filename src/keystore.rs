//! Per-connection RSA keypair management.
//!
//! Keypairs are addressed by tag (see [`crate::tags`]) and live behind a
//! [`SecretStore`]. Own keys are stored as PKCS#8 DER; imported provider
//! keys are normalized to SPKI DER. Private key material never crosses the
//! public API: callers get an opaque [`PrivateKeyHandle`] whose operations
//! are consumed by the signing and envelope codecs.

use crate::errors::AuthError;
use crate::secret_store::SecretStore;
use rand::{CryptoRng, RngCore};
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::{
    DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding,
};
use rsa::{Pkcs1v15Encrypt, Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use zeroize::Zeroizing;

/// Minimum modulus size for generated keypairs.
pub const RSA_KEY_BITS: usize = 2048;

/// Opaque signing/decryption handle for one stored private key.
///
/// The handle exposes the operations the codecs need and nothing else;
/// raw key bytes stay inside. A handle resolved before a regeneration
/// keeps working mechanically, but its signatures no longer verify
/// against the replacement public key.
pub struct PrivateKeyHandle {
    tag: String,
    key: RsaPrivateKey,
}

impl PrivateKeyHandle {
    /// Tag this handle was resolved from.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Public half of the keypair.
    pub fn public_key(&self) -> RsaPublicKey {
        self.key.to_public_key()
    }

    /// RSA-PKCS#1 v1.5 signature over a SHA-256 digest.
    pub(crate) fn sign_sha256_digest(&self, digest: &[u8]) -> Result<Vec<u8>, AuthError> {
        self.key
            .sign(Pkcs1v15Sign::new::<Sha256>(), digest)
            .map_err(|e| AuthError::Other(format!("rsa sign under tag {}: {e}", self.tag)))
    }

    /// Unwrap an RSA-PKCS#1 v1.5 encrypted symmetric key.
    pub(crate) fn unwrap_key(&self, wrapped: &[u8]) -> Result<Zeroizing<Vec<u8>>, AuthError> {
        self.key
            .decrypt(Pkcs1v15Encrypt, wrapped)
            .map(Zeroizing::new)
            .map_err(|_| {
                AuthError::Decryption(format!("rsa key unwrap failed under tag {}", self.tag))
            })
    }
}

impl fmt::Debug for PrivateKeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Key material is deliberately absent.
        f.debug_struct("PrivateKeyHandle")
            .field("tag", &self.tag)
            .finish_non_exhaustive()
    }
}

/// Keypair storage addressed by tag.
///
/// Mutation is serialized per tag, so a concurrent `generate_keypair` and
/// `private_key_handle` on the same tag never observe a half-replaced
/// entry. Reads across distinct tags proceed concurrently.
pub struct KeyStore<S: SecretStore> {
    store: S,
    tag_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<S: SecretStore> KeyStore<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            tag_locks: Mutex::new(HashMap::new()),
        }
    }

    fn tag_lock(&self, tag: &str) -> Arc<Mutex<()>> {
        let mut locks = self.tag_locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(tag.to_string()).or_default().clone()
    }

    /// Generate a fresh RSA keypair under `tag`, replacing any existing
    /// pair atomically.
    ///
    /// Returns the public half. Fails with `KeyGeneration` if generation
    /// or the store write is rejected; the operation is not retried.
    pub fn generate_keypair<R: CryptoRng + RngCore>(
        &self,
        tag: &str,
        rng: &mut R,
    ) -> Result<RsaPublicKey, AuthError> {
        let lock = self.tag_lock(tag);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        let private_key = RsaPrivateKey::new(rng, RSA_KEY_BITS)
            .map_err(|e| AuthError::KeyGeneration(format!("rsa keygen under tag {tag}: {e}")))?;
        let public_key = private_key.to_public_key();

        let der = private_key
            .to_pkcs8_der()
            .map_err(|e| AuthError::KeyGeneration(format!("pkcs8 encode under tag {tag}: {e}")))?;
        self.store
            .put(tag, der.as_bytes())
            .map_err(|e| AuthError::KeyGeneration(format!("store rejected tag {tag}: {e}")))?;

        #[cfg(feature = "trace")]
        tracing::debug!(
            "generated {}-bit keypair under tag {}, fingerprint {}",
            RSA_KEY_BITS,
            tag,
            fingerprint(&public_key).unwrap_or_default()
        );

        Ok(public_key)
    }

    /// Public key stored under `tag`.
    ///
    /// Resolves both own tags (public half of the stored pair) and
    /// provider tags (the imported key itself). Fails with `KeyNotFound`
    /// when nothing is stored under `tag`.
    pub fn public_key(&self, tag: &str) -> Result<RsaPublicKey, AuthError> {
        let material = self
            .store
            .get(tag)?
            .ok_or_else(|| AuthError::KeyNotFound(format!("no key material under tag {tag}")))?;
        if let Ok(pk) = RsaPublicKey::from_public_key_der(&material) {
            return Ok(pk);
        }
        RsaPrivateKey::from_pkcs8_der(&material)
            .map(|sk| sk.to_public_key())
            .map_err(|_| AuthError::InvalidKey(format!("unreadable key material under tag {tag}")))
    }

    /// Opaque handle to the private key stored under `tag`.
    pub fn private_key_handle(&self, tag: &str) -> Result<PrivateKeyHandle, AuthError> {
        let material = self
            .store
            .get(tag)?
            .ok_or_else(|| AuthError::KeyNotFound(format!("no private key under tag {tag}")))?;
        let key = RsaPrivateKey::from_pkcs8_der(&material)
            .map_err(|_| AuthError::InvalidKey(format!("tag {tag} does not hold a private key")))?;
        Ok(PrivateKeyHandle {
            tag: tag.to_string(),
            key,
        })
    }

    /// Import a provider public key under `tag`, normalizing to SPKI DER.
    pub fn import_public_key(&self, tag: &str, material: &[u8]) -> Result<(), AuthError> {
        let lock = self.tag_lock(tag);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        let key = parse_public_key(material)?;
        let der = key
            .to_public_key_der()
            .map_err(|e| AuthError::InvalidKey(format!("spki encode: {e}")))?;
        self.store.put(tag, der.as_bytes())?;

        #[cfg(feature = "trace")]
        tracing::debug!(
            "imported public key under tag {}, fingerprint {}",
            tag,
            fingerprint(&key).unwrap_or_default()
        );

        Ok(())
    }

    /// Whether any material is stored under `tag`.
    pub fn contains(&self, tag: &str) -> Result<bool, AuthError> {
        Ok(self.store.get(tag)?.is_some())
    }

    /// Remove whatever is stored under `tag`. Idempotent.
    pub fn delete(&self, tag: &str) -> Result<(), AuthError> {
        let lock = self.tag_lock(tag);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());
        self.store.delete(tag)
    }
}

/// Parse provider-supplied public key material.
///
/// Provider feeds differ in framing: SPKI PEM is tried first, then legacy
/// PKCS#1 PEM, then raw SPKI DER.
pub fn parse_public_key(material: &[u8]) -> Result<RsaPublicKey, AuthError> {
    if let Ok(text) = std::str::from_utf8(material) {
        let trimmed = text.trim();
        if trimmed.starts_with("-----BEGIN") {
            if let Ok(pk) = RsaPublicKey::from_public_key_pem(trimmed) {
                return Ok(pk);
            }
            return RsaPublicKey::from_pkcs1_pem(trimmed)
                .map_err(|_| AuthError::InvalidKey("unparseable public key pem".into()));
        }
    }
    RsaPublicKey::from_public_key_der(material)
        .map_err(|_| AuthError::InvalidKey("unparseable public key der".into()))
}

/// SPKI PEM encoding of a public key, as sent to the provider during
/// connection enrollment.
pub fn public_key_pem(key: &RsaPublicKey) -> Result<String, AuthError> {
    key.to_public_key_pem(LineEnding::LF)
        .map_err(|e| AuthError::Other(format!("spki pem encode: {e}")))
}

/// Short hex fingerprint of a public key for logs and diagnostics.
///
/// First 16 bytes of SHA-256 over the SPKI encoding.
pub fn fingerprint(key: &RsaPublicKey) -> Result<String, AuthError> {
    let der = key
        .to_public_key_der()
        .map_err(|e| AuthError::Other(format!("spki encode: {e}")))?;
    let hash = Sha256::digest(der.as_bytes());
    Ok(hex::encode(&hash[..16]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secret_store::MemorySecretStore;

    #[test]
    fn test_missing_tag_is_key_not_found() {
        let keystore = KeyStore::new(MemorySecretStore::new());
        assert!(matches!(
            keystore.public_key("absent"),
            Err(AuthError::KeyNotFound(_))
        ));
        assert!(matches!(
            keystore.private_key_handle("absent"),
            Err(AuthError::KeyNotFound(_))
        ));
        assert!(!keystore.contains("absent").unwrap());
    }

    #[test]
    fn test_garbage_material_is_invalid_key() {
        let keystore = KeyStore::new(MemorySecretStore::new());
        keystore.import_public_key("tag", b"not a key").unwrap_err();

        // Bytes smuggled in behind the keystore's back.
        let store = MemorySecretStore::new();
        store.put("tag", b"garbage").unwrap();
        let keystore = KeyStore::new(store);
        assert!(matches!(
            keystore.public_key("tag"),
            Err(AuthError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_delete_is_idempotent() {
        let keystore = KeyStore::new(MemorySecretStore::new());
        keystore.delete("absent").unwrap();
        keystore.delete("absent").unwrap();
    }

    #[test]
    fn test_handle_debug_reveals_no_key_material() {
        let keystore = KeyStore::new(MemorySecretStore::new());
        let mut rng = rand::rngs::OsRng;
        keystore.generate_keypair("conn-1", &mut rng).unwrap();
        let handle = keystore.private_key_handle("conn-1").unwrap();
        let rendered = format!("{handle:?}");
        assert!(rendered.contains("conn-1"));
        // Nothing numeric or base64-shaped beyond the tag.
        assert!(rendered.len() < 64);
    }

    #[test]
    fn test_fingerprint_is_short_hex() {
        let keystore = KeyStore::new(MemorySecretStore::new());
        let mut rng = rand::rngs::OsRng;
        let pk = keystore.generate_keypair("conn-2", &mut rng).unwrap();
        let fp = fingerprint(&pk).unwrap();
        assert_eq!(fp.len(), 32);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
