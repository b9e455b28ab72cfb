//! Hybrid encryption envelope for protocol v1 payloads.
//!
//! Each seal draws a fresh AES-256 key and 96-bit IV, bulk-encrypts the
//! payload with AES-256-GCM, and RSA-wraps the symmetric key to the
//! recipient. The wire form is a JSON object with base64 `data`, `key`
//! and `iv` fields; `data` carries ciphertext with the authentication tag
//! appended.

use crate::errors::AuthError;
use crate::keystore::PrivateKeyHandle;
use crate::random::fill_random;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::{CryptoRng, RngCore};
use rsa::{Pkcs1v15Encrypt, RsaPublicKey};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// AES-256 key length the wrapped `key` field must decrypt to.
const SYMMETRIC_KEY_LEN: usize = 32;

/// GCM nonce length carried in `iv`.
const IV_LEN: usize = 12;

/// Wire form of a v1 envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Ciphertext with appended authentication tag, base64.
    pub data: String,
    /// RSA-wrapped AES key, base64.
    pub key: String,
    /// GCM nonce, base64.
    pub iv: String,
}

impl Envelope {
    /// Parse an envelope from its JSON wire form.
    pub fn from_json(bytes: &[u8]) -> Result<Self, AuthError> {
        serde_json::from_slice(bytes)
            .map_err(|_| AuthError::Decryption("malformed envelope json".into()))
    }

    /// JSON wire form.
    pub fn to_json(&self) -> Result<String, AuthError> {
        Ok(serde_json::to_string(self)?)
    }
}

fn base64_encode(data: &[u8]) -> String {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    STANDARD.encode(data)
}

fn base64_decode(s: &str) -> Result<Vec<u8>, AuthError> {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    STANDARD
        .decode(s)
        .map_err(|_| AuthError::Decryption("invalid base64 in envelope".into()))
}

/// Seal `plaintext` to `recipient` under a fresh symmetric key.
///
/// Key and IV are drawn from `rng` on every call and never cached;
/// reusing an IV under one key would break GCM.
pub fn seal<R: CryptoRng + RngCore>(
    plaintext: &[u8],
    recipient: &RsaPublicKey,
    rng: &mut R,
) -> Result<Envelope, AuthError> {
    let mut key = Zeroizing::new([0u8; SYMMETRIC_KEY_LEN]);
    fill_random(rng, key.as_mut());
    let mut iv = [0u8; IV_LEN];
    fill_random(rng, &mut iv);

    let key_ref: &[u8; SYMMETRIC_KEY_LEN] = &key;
    let cipher = Aes256Gcm::new(key_ref.into());
    let data = cipher
        .encrypt(Nonce::from_slice(&iv), plaintext)
        .map_err(|_| AuthError::Other("aes-gcm encrypt rejected input".into()))?;

    let wrapped_key = recipient
        .encrypt(rng, Pkcs1v15Encrypt, key_ref)
        .map_err(|e| AuthError::Other(format!("rsa key wrap: {e}")))?;

    Ok(Envelope {
        data: base64_encode(&data),
        key: base64_encode(&wrapped_key),
        iv: base64_encode(&iv),
    })
}

/// Open an envelope with the owning connection's private key.
///
/// Every failure mode (bad base64, wrong key, wrong unwrapped-key length,
/// ciphertext or tag corruption) reports as `Decryption`; plaintext comes
/// back whole or not at all.
pub fn open(envelope: &Envelope, handle: &PrivateKeyHandle) -> Result<Vec<u8>, AuthError> {
    let data = base64_decode(&envelope.data)?;
    let wrapped_key = base64_decode(&envelope.key)?;
    let iv = base64_decode(&envelope.iv)?;

    if iv.len() != IV_LEN {
        return Err(AuthError::Decryption(format!(
            "envelope iv is {} bytes, expected {IV_LEN}",
            iv.len()
        )));
    }

    let key = handle.unwrap_key(&wrapped_key)?;
    if key.len() != SYMMETRIC_KEY_LEN {
        return Err(AuthError::Decryption(format!(
            "unwrapped key is {} bytes, expected {SYMMETRIC_KEY_LEN}",
            key.len()
        )));
    }

    let cipher = Aes256Gcm::new_from_slice(&key)
        .map_err(|_| AuthError::Decryption("unwrapped key rejected by cipher".into()))?;
    cipher
        .decrypt(Nonce::from_slice(&iv), data.as_slice())
        .map_err(|_| AuthError::Decryption("envelope ciphertext rejected".into()))
}
