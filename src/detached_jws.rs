//! Detached compact-token signing for protocol v2.
//!
//! v2 requests are RS256 compact JWS tokens. Signing yields the detached
//! form `header..signature` with an empty payload segment; the payload is
//! re-attached (`header.payload.signature`) for transmission. The
//! signature is computed with the payload segment present, so the
//! receiver must supply the exact payload bytes or verification fails.
//!
//! Sensitive sub-fields of a v2 payload are wrapped through the v1
//! [`Envelope`](crate::envelope::Envelope) codec before signing; the
//! signature then covers the envelope's opaque fields, layering
//! confidentiality under integrity.

use crate::envelope::{self, Envelope};
use crate::errors::AuthError;
use crate::keystore::PrivateKeyHandle;
use rand::{CryptoRng, RngCore};
use rsa::{Pkcs1v15Sign, RsaPublicKey};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Protected header of every token this module emits.
const PROTECTED_HEADER: &str = r#"{"alg":"RS256","typ":"JWT"}"#;

fn base64url_encode(data: &[u8]) -> String {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    URL_SAFE_NO_PAD.encode(data)
}

fn base64url_decode(s: &str) -> Result<Vec<u8>, AuthError> {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    URL_SAFE_NO_PAD
        .decode(s)
        .map_err(|_| AuthError::Verification("invalid base64url segment".into()))
}

/// Sign `params` and return the detached token `header..signature`.
///
/// Serializes `params` to JSON internally; use [`sign_detached_bytes`]
/// when the caller already owns the exact payload bytes.
pub fn sign_detached<P: Serialize>(
    handle: &PrivateKeyHandle,
    params: &P,
) -> Result<String, AuthError> {
    let payload = serde_json::to_vec(params)?;
    sign_detached_bytes(handle, &payload)
}

/// Detached-sign pre-serialized payload bytes.
pub fn sign_detached_bytes(
    handle: &PrivateKeyHandle,
    payload: &[u8],
) -> Result<String, AuthError> {
    let header_seg = base64url_encode(PROTECTED_HEADER.as_bytes());
    let signing_input = format!("{header_seg}.{}", base64url_encode(payload));
    let digest = Sha256::digest(signing_input.as_bytes());
    let signature = handle.sign_sha256_digest(&digest)?;
    Ok(format!("{header_seg}..{}", base64url_encode(&signature)))
}

/// Re-attach payload bytes to a detached token, producing the full
/// three-segment form sent as the request body.
pub fn attach_payload(detached: &str, payload: &[u8]) -> Result<String, AuthError> {
    let (header_seg, sig_seg) = split_detached(detached)?;
    Ok(format!("{header_seg}.{}.{sig_seg}", base64url_encode(payload)))
}

fn split_detached(detached: &str) -> Result<(&str, &str), AuthError> {
    let mut parts = detached.split('.');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(h), Some(""), Some(s), None) if !h.is_empty() && !s.is_empty() => Ok((h, s)),
        _ => Err(AuthError::Verification("malformed detached token".into())),
    }
}

/// Pull the payload bytes out of a full three-segment token.
pub fn token_payload(token: &str) -> Result<Vec<u8>, AuthError> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 || parts[1].is_empty() {
        return Err(AuthError::Verification("token has no payload segment".into()));
    }
    base64url_decode(parts[1])
}

/// Verify a token's signature over the supplied payload bytes.
///
/// `token` may be detached (empty payload segment) or full, in which case
/// its embedded payload segment must match `payload` byte for byte. Any
/// structural problem, algorithm mismatch or signature failure is
/// `Verification`; there is no partial trust.
pub fn verify_bytes(
    token: &str,
    payload: &[u8],
    signer: &RsaPublicKey,
) -> Result<(), AuthError> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 || parts[0].is_empty() || parts[2].is_empty() {
        return Err(AuthError::Verification("token is not in compact form".into()));
    }
    let payload_seg = base64url_encode(payload);
    if !parts[1].is_empty() && parts[1] != payload_seg {
        return Err(AuthError::Verification(
            "token payload segment does not match supplied payload".into(),
        ));
    }
    check_header(parts[0])?;

    let signing_input = format!("{}.{payload_seg}", parts[0]);
    let signature = base64url_decode(parts[2])?;
    let digest = Sha256::digest(signing_input.as_bytes());
    signer
        .verify(Pkcs1v15Sign::new::<Sha256>(), &digest, &signature)
        .map_err(|_| AuthError::Verification("token signature rejected".into()))
}

/// Verify a token and decode its payload into `P`.
pub fn verify<P: DeserializeOwned>(
    token: &str,
    payload: &[u8],
    signer: &RsaPublicKey,
) -> Result<P, AuthError> {
    verify_bytes(token, payload, signer)?;
    serde_json::from_slice(payload)
        .map_err(|_| AuthError::Verification("token payload does not decode".into()))
}

/// The signed algorithm is pinned; a token claiming anything else is
/// rejected before any signature math runs.
fn check_header(header_seg: &str) -> Result<(), AuthError> {
    let bytes = base64url_decode(header_seg)?;
    let header: serde_json::Value = serde_json::from_slice(&bytes)
        .map_err(|_| AuthError::Verification("token header does not decode".into()))?;
    match header.get("alg").and_then(|v| v.as_str()) {
        Some("RS256") => Ok(()),
        Some(other) => Err(AuthError::Verification(format!(
            "unsupported token alg {other}"
        ))),
        None => Err(AuthError::Verification("token header missing alg".into())),
    }
}

/// Wrap sensitive params in a v1 envelope for embedding inside a signed
/// v2 payload.
pub fn encrypted_field<T: Serialize, R: CryptoRng + RngCore>(
    params: &T,
    recipient: &RsaPublicKey,
    rng: &mut R,
) -> Result<Envelope, AuthError> {
    let plaintext = serde_json::to_vec(params)?;
    envelope::seal(&plaintext, recipient, rng)
}
