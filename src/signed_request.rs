//! Canonical request signing for protocol v1.
//!
//! The device proves possession of a connection's private key by signing
//! `"{METHOD}|{url}|{expires_at}|{body}"` with RSA-PKCS#1 v1.5 over
//! SHA-256. The provider rebuilds the identical string server-side, so
//! the construction here must be byte-exact: the uppercase verb, the
//! absolute URL, whole seconds for the expiry, and the exact body bytes
//! that go on the wire (an absent body contributes an empty segment).

use crate::clock::{Clock, EXPIRES_IN_SECS};
use crate::errors::AuthError;
use crate::keystore::PrivateKeyHandle;
use crate::request::HttpMethod;
use rsa::{Pkcs1v15Sign, RsaPublicKey};
use sha2::{Digest, Sha256};

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
        .map_err(|_| AuthError::Verification("invalid base64 signature".into()))
}

/// Expiry for a request signed now: `now + 300s`, whole seconds.
pub fn request_expiry(clock: &dyn Clock) -> u64 {
    clock.now_unix() + EXPIRES_IN_SECS
}

/// Build the canonical signing string.
///
/// `body` must be the exact text that will be sent as the HTTP body.
pub fn canonical_string(
    method: HttpMethod,
    url: &str,
    expires_at: u64,
    body: Option<&str>,
) -> String {
    format!(
        "{}|{}|{}|{}",
        method.as_str(),
        url,
        expires_at,
        body.unwrap_or("")
    )
}

/// Sign the canonical string for one request.
///
/// Returns the base64 signature carried in the signature header. The
/// caller resolves `handle` first, so a connection without a keypair
/// fails with `KeyNotFound` before any request exists; an unsigned
/// request is never produced.
pub fn sign_request(
    handle: &PrivateKeyHandle,
    method: HttpMethod,
    url: &str,
    expires_at: u64,
    body: Option<&str>,
) -> Result<String, AuthError> {
    let canonical = canonical_string(method, url, expires_at, body);
    let digest = Sha256::digest(canonical.as_bytes());
    let signature = handle.sign_sha256_digest(&digest)?;
    Ok(base64_encode(&signature))
}

/// Verify a v1 request signature against the signer's public key.
///
/// This is the provider-side check, mirrored here so regeneration and
/// tamper behavior stay testable end to end.
pub fn verify_request_signature(
    public_key: &RsaPublicKey,
    method: HttpMethod,
    url: &str,
    expires_at: u64,
    body: Option<&str>,
    signature_b64: &str,
) -> Result<(), AuthError> {
    let signature = base64_decode(signature_b64)?;
    let canonical = canonical_string(method, url, expires_at, body);
    let digest = Sha256::digest(canonical.as_bytes());
    public_key
        .verify(Pkcs1v15Sign::new::<Sha256>(), &digest, &signature)
        .map_err(|_| AuthError::Verification("request signature rejected".into()))
}
