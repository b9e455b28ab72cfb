//! Shared CSPRNG helpers.
//!
//! Symmetric keys and IVs are drawn from a caller-supplied RNG so tests can
//! run seeded while production callers pass [`OsRng`](rand::rngs::OsRng).
//! There is no per-call reseeding; one thread-safe system source backs
//! everything.

use rand::{CryptoRng, RngCore};

/// Fill `buf` with fresh random bytes from `rng`.
pub fn fill_random<R: CryptoRng + RngCore>(rng: &mut R, buf: &mut [u8]) {
    rng.fill_bytes(buf);
}

/// Draw `len` fresh random bytes from `rng`.
pub fn generate_random_bytes<R: CryptoRng + RngCore>(rng: &mut R, len: usize) -> Vec<u8> {
    let mut out = vec![0u8; len];
    rng.fill_bytes(&mut out);
    out
}
