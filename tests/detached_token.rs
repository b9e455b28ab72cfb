//! Detached Token Tests
//!
//! These tests exercise the RS256 detached-signature tokens used by v2
//! requests: sign/attach/verify roundtrips, payload binding, algorithm
//! pinning, and the envelope wrapping for sensitive fields.

use authenticator_core::detached_jws::{
    attach_payload, encrypted_field, sign_detached, sign_detached_bytes, token_payload, verify,
    verify_bytes,
};
use authenticator_core::envelope;
use authenticator_core::keystore::KeyStore;
use authenticator_core::{AuthError, MemorySecretStore};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
struct ActionParams {
    authorization_code: String,
    confirm: bool,
    exp: u64,
}

fn sample_params() -> ActionParams {
    ActionParams {
        authorization_code: "11".to_string(),
        confirm: true,
        exp: 1_700_000_300,
    }
}

fn keystore() -> &'static KeyStore<MemorySecretStore> {
    static STORE: OnceLock<KeyStore<MemorySecretStore>> = OnceLock::new();
    STORE.get_or_init(|| {
        let ks = KeyStore::new(MemorySecretStore::new());
        ks.generate_keypair("conn", &mut OsRng).unwrap();
        ks
    })
}

/// Test the full typed roundtrip: sign, attach, verify, decode
#[test]
fn test_sign_attach_verify_roundtrip() {
    let handle = keystore().private_key_handle("conn").unwrap();
    let public_key = keystore().public_key("conn").unwrap();
    let params = sample_params();

    let detached = sign_detached(&handle, &params).unwrap();
    let payload = serde_json::to_vec(&params).unwrap();
    let token = attach_payload(&detached, &payload).unwrap();

    let decoded: ActionParams = verify(&token, &payload, &public_key).unwrap();
    assert_eq!(decoded, params);
}

/// Test that the detached form has an empty middle segment and the full
/// form carries the payload
#[test]
fn test_detached_shape() {
    let handle = keystore().private_key_handle("conn").unwrap();
    let payload = br#"{"exp":1700000300}"#;

    let detached = sign_detached_bytes(&handle, payload).unwrap();
    let parts: Vec<&str> = detached.split('.').collect();
    assert_eq!(parts.len(), 3);
    assert!(!parts[0].is_empty());
    assert!(parts[1].is_empty(), "detached form must omit the payload");
    assert!(!parts[2].is_empty());

    let token = attach_payload(&detached, payload).unwrap();
    assert_eq!(token_payload(&token).unwrap(), payload);

    // Attaching restores exactly the detached segments around the payload.
    let full_parts: Vec<&str> = token.split('.').collect();
    assert_eq!(full_parts[0], parts[0]);
    assert_eq!(full_parts[2], parts[2]);
}

/// Test that a single changed payload byte fails verification
#[test]
fn test_payload_tamper_fails() {
    let handle = keystore().private_key_handle("conn").unwrap();
    let public_key = keystore().public_key("conn").unwrap();

    let payload = br#"{"authorization_code":"11","confirm":true}"#.to_vec();
    let detached = sign_detached_bytes(&handle, &payload).unwrap();

    let mut tampered = payload.clone();
    let idx = tampered.iter().position(|&b| b == b't').unwrap();
    tampered[idx] = b'f';
    let token = attach_payload(&detached, &tampered).unwrap();

    let result = verify_bytes(&token, &tampered, &public_key);
    assert!(
        matches!(result, Err(AuthError::Verification(_))),
        "verification should fail for a tampered payload"
    );
}

/// Test that the payload argument must match the token's own segment
#[test]
fn test_mismatched_payload_segment_fails() {
    let handle = keystore().private_key_handle("conn").unwrap();
    let public_key = keystore().public_key("conn").unwrap();

    let payload = br#"{"confirm":true}"#;
    let detached = sign_detached_bytes(&handle, payload).unwrap();
    let token = attach_payload(&detached, payload).unwrap();

    let result = verify_bytes(&token, br#"{"confirm":false}"#, &public_key);
    assert!(matches!(result, Err(AuthError::Verification(_))));
}

/// Test that a token signed by one key fails against another
#[test]
fn test_wrong_key_fails() {
    let handle = keystore().private_key_handle("conn").unwrap();

    let other = KeyStore::new(MemorySecretStore::new());
    other.generate_keypair("other", &mut OsRng).unwrap();
    let other_pk = other.public_key("other").unwrap();

    let payload = br#"{"exp":1700000300}"#;
    let detached = sign_detached_bytes(&handle, payload).unwrap();
    let token = attach_payload(&detached, payload).unwrap();

    let result = verify_bytes(&token, payload, &other_pk);
    assert!(matches!(result, Err(AuthError::Verification(_))));
}

/// Test that tokens with a downgraded or missing algorithm are rejected
/// even when the signature math would pass
#[test]
fn test_algorithm_pinning() {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;

    let public_key = keystore().public_key("conn").unwrap();
    let payload = br#"{"exp":1700000300}"#;
    let payload_seg = URL_SAFE_NO_PAD.encode(payload);

    for header in [r#"{"alg":"none"}"#, r#"{"alg":"HS256","typ":"JWT"}"#, r#"{"typ":"JWT"}"#] {
        let header_seg = URL_SAFE_NO_PAD.encode(header.as_bytes());
        let token = format!("{header_seg}.{payload_seg}.AAAA");
        let result = verify_bytes(&token, payload, &public_key);
        assert!(
            matches!(result, Err(AuthError::Verification(_))),
            "header {header} should be rejected"
        );
    }
}

/// Test that malformed token shapes are rejected
#[test]
fn test_malformed_tokens_rejected() {
    let public_key = keystore().public_key("conn").unwrap();
    let payload = br#"{"exp":1}"#;

    for token in ["", "a.b", "a.b.c.d", "..sig", "head..", "head..sig.extra"] {
        assert!(
            verify_bytes(token, payload, &public_key).is_err(),
            "token {token:?} should be rejected"
        );
    }

    assert!(token_payload("head..sig").is_err(), "detached form has no payload");
    assert!(attach_payload("head.payload.sig", payload).is_err());
    assert!(attach_payload("onesegment", payload).is_err());
}

/// Test that an envelope-wrapped field decrypts back to the original value
#[test]
fn test_encrypted_field_roundtrip() {
    let handle = keystore().private_key_handle("conn").unwrap();
    let recipient = keystore().public_key("conn").unwrap();

    let env = encrypted_field(&"11", &recipient, &mut OsRng).unwrap();
    let plaintext = envelope::open(&env, &handle).unwrap();
    let code: String = serde_json::from_slice(&plaintext).unwrap();
    assert_eq!(code, "11");
}
