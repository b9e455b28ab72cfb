//! Property-based tests for cryptographic operations.

use authenticator_core::clock::{FixedClock, EXPIRES_IN_SECS};
use authenticator_core::keystore::{fingerprint, KeyStore};
use authenticator_core::random::generate_random_bytes;
use authenticator_core::signed_request::{canonical_string, request_expiry};
use authenticator_core::tags::{derive_tag, KeyRole};
use authenticator_core::{envelope, HttpMethod, MemorySecretStore};
use rand::rngs::OsRng;
use std::sync::OnceLock;

fn keystore() -> &'static KeyStore<MemorySecretStore> {
    static STORE: OnceLock<KeyStore<MemorySecretStore>> = OnceLock::new();
    STORE.get_or_init(|| {
        let ks = KeyStore::new(MemorySecretStore::new());
        ks.generate_keypair("conn", &mut OsRng).unwrap();
        ks
    })
}

/// Property: tag derivation is stable and roles never collide
#[test]
fn property_tag_derivation() {
    let ids = ["12345", "c", "connection-with-long-id-0001", "00000"];

    for id in ids {
        let own = derive_tag(id, KeyRole::Own);
        let provider = derive_tag(id, KeyRole::ProviderPublic);

        assert_eq!(own, derive_tag(id, KeyRole::Own), "derivation must be stable");
        assert_eq!(provider, derive_tag(id, KeyRole::ProviderPublic));
        assert_ne!(own, provider, "roles must never collide for id {id}");
        assert!(provider.starts_with(id));
    }

    // Tags for different connections never collide either.
    for a in ids {
        for b in ids {
            if a != b {
                assert_ne!(derive_tag(a, KeyRole::Own), derive_tag(b, KeyRole::Own));
            }
        }
    }
}

/// Property: the canonical string is an exact pipe-joined layout
#[test]
fn property_canonical_string_layout() {
    let cases = [
        (
            HttpMethod::Put,
            "https://x.example/a",
            10u64,
            Some("{}"),
            "PUT|https://x.example/a|10|{}",
        ),
        (
            HttpMethod::Get,
            "https://x.example/b",
            0,
            None,
            "GET|https://x.example/b|0|",
        ),
        (
            HttpMethod::Delete,
            "https://x.example/c",
            u64::MAX,
            Some(""),
            "DELETE|https://x.example/c|18446744073709551615|",
        ),
    ];

    for (method, url, expires_at, body, expected) in cases {
        assert_eq!(canonical_string(method, url, expires_at, body), expected);
    }
}

/// Property: envelopes roundtrip arbitrary plaintexts, and two seals of
/// the same plaintext never share key or IV
#[test]
fn property_envelope_roundtrip() {
    let recipient = keystore().public_key("conn").unwrap();
    let handle = keystore().private_key_handle("conn").unwrap();

    let plaintexts: [&[u8]; 5] = [
        b"",
        b"x",
        br#"{"id":"00000","connection_id":"12345"}"#,
        &[0u8; 256],
        &[0xFFu8; 4096],
    ];

    for plaintext in plaintexts {
        let sealed = envelope::seal(plaintext, &recipient, &mut OsRng).unwrap();
        let opened = envelope::open(&sealed, &handle).unwrap();
        assert_eq!(opened, plaintext, "roundtrip must preserve {} bytes", plaintext.len());
    }

    let first = envelope::seal(b"same plaintext", &recipient, &mut OsRng).unwrap();
    let second = envelope::seal(b"same plaintext", &recipient, &mut OsRng).unwrap();
    assert_ne!(first.key, second.key, "fresh key every seal");
    assert_ne!(first.iv, second.iv, "fresh IV every seal");
    assert_ne!(first.data, second.data);
}

/// Property: the request expiry is exactly five minutes past the clock
#[test]
fn property_expiry_window() {
    for now in [0u64, 1, 1_558_344_640, 1_700_000_000] {
        let clock = FixedClock::at_unix(now as i64);
        assert_eq!(request_expiry(&clock), now + EXPIRES_IN_SECS);
    }
    assert_eq!(EXPIRES_IN_SECS, 300);
}

/// Property: random draws honor the requested length and do not repeat
#[test]
fn property_random_draws() {
    for len in [0usize, 1, 12, 32, 256] {
        assert_eq!(generate_random_bytes(&mut OsRng, len).len(), len);
    }

    let draws: Vec<Vec<u8>> = (0..32)
        .map(|_| generate_random_bytes(&mut OsRng, 16))
        .collect();
    for i in 0..draws.len() {
        for j in (i + 1)..draws.len() {
            assert_ne!(draws[i], draws[j], "16-byte draws must not collide");
        }
    }
}

/// Property: a key's fingerprint is stable and key-specific
#[test]
fn property_fingerprint() {
    let public_key = keystore().public_key("conn").unwrap();

    let fp = fingerprint(&public_key).unwrap();
    assert_eq!(fp, fingerprint(&public_key).unwrap());
    assert_eq!(fp.len(), 32, "16 bytes of digest as hex");
    assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));

    let other = KeyStore::new(MemorySecretStore::new());
    let other_pk = other.generate_keypair("other", &mut OsRng).unwrap();
    assert_ne!(fp, fingerprint(&other_pk).unwrap());
}
