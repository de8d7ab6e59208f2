//! Hashing capability
//!
//! Two stateless digest algorithms over byte slices: SHA-256 for
//! cryptographic use and XXH3-128 for fast fixed-width checksums. No shared
//! state; safe for concurrent use without coordination.

use sha2::{Digest, Sha256};
use std::sync::Arc;
use xxhash_rust::xxh3::xxh3_128;

pub trait HashService: Send + Sync {
    fn algorithm(&self) -> &'static str;

    /// Digest width in bytes; `digest` always returns exactly this many.
    fn digest_len(&self) -> usize;

    fn digest(&self, data: &[u8]) -> Vec<u8>;
}

pub struct Sha256Service;

impl HashService for Sha256Service {
    fn algorithm(&self) -> &'static str {
        "sha256"
    }

    fn digest_len(&self) -> usize {
        32
    }

    fn digest(&self, data: &[u8]) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(data);
        hasher.finalize().to_vec()
    }
}

pub struct Xxh3Service;

impl HashService for Xxh3Service {
    fn algorithm(&self) -> &'static str {
        "xxh3-128"
    }

    fn digest_len(&self) -> usize {
        16
    }

    fn digest(&self, data: &[u8]) -> Vec<u8> {
        xxh3_128(data).to_be_bytes().to_vec()
    }
}

pub fn sha256_service() -> Arc<dyn HashService> {
    Arc::new(Sha256Service)
}

pub fn xxh3_service() -> Arc<dyn HashService> {
    Arc::new(Xxh3Service)
}
