// crates/urkel-crypto/src/lib.rs

//! Concrete [`HashAdapter`] implementations.
//!
//! `Blake3Adapter` is the default (fast, 32-byte digests, matches the
//! hash already used elsewhere in this workspace's lineage); `Sha256Adapter`
//! exists because the spec's concrete end-to-end test scenarios are pinned
//! to SHA-256.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(
    missing_docs,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::unwrap_used,
    clippy::expect_used
)]

use sha2::Digest as _;
use urkel_core::hasher::{Digest, HashAdapter, HashContext};

/// BLAKE3-backed hash adapter. 32-byte digests.
#[derive(Clone, Copy, Debug, Default)]
pub struct Blake3Adapter;

struct Blake3Ctx(blake3::Hasher);

impl HashContext for Blake3Ctx {
    fn update(&mut self, bytes: &[u8]) {
        self.0.update(bytes);
    }

    fn finish(self: Box<Self>) -> Digest {
        self.0.finalize().as_bytes().to_vec()
    }
}

impl HashAdapter for Blake3Adapter {
    fn size(&self) -> usize {
        32
    }

    fn digest(&self, bytes: &[u8]) -> Digest {
        blake3::hash(bytes).as_bytes().to_vec()
    }

    fn init(&self) -> Box<dyn HashContext> {
        Box::new(Blake3Ctx(blake3::Hasher::new()))
    }
}

/// SHA-256-backed hash adapter. 32-byte digests.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sha256Adapter;

struct Sha256Ctx(sha2::Sha256);

impl HashContext for Sha256Ctx {
    fn update(&mut self, bytes: &[u8]) {
        sha2::Digest::update(&mut self.0, bytes);
    }

    fn finish(self: Box<Self>) -> Digest {
        self.0.finalize().to_vec()
    }
}

impl HashAdapter for Sha256Adapter {
    fn size(&self) -> usize {
        32
    }

    fn digest(&self, bytes: &[u8]) -> Digest {
        sha2::Sha256::digest(bytes).to_vec()
    }

    fn init(&self) -> Box<dyn HashContext> {
        Box::new(Sha256Ctx(sha2::Sha256::new()))
    }
}

/// Wraps any [`HashAdapter`] and overrides its key width, decoupling
/// `key_bits()` from `size()` (`spec.md` §8's test scenarios: a SHA-256
/// tree hash over 160-bit, SHA-1-derived keys — a width no adapter here
/// produces natively).
#[derive(Clone, Copy, Debug)]
pub struct WithKeyBits<A> {
    inner: A,
    key_bits: usize,
}

impl<A> WithKeyBits<A> {
    /// Wrap `inner`, overriding its key width to `key_bits` (must be a
    /// positive multiple of 8; not checked here — `Store::open` validates
    /// it, per `spec.md` §3's "`BITS` a multiple of 8").
    #[must_use]
    pub fn new(inner: A, key_bits: usize) -> Self {
        Self { inner, key_bits }
    }
}

impl<A: HashAdapter> HashAdapter for WithKeyBits<A> {
    fn size(&self) -> usize {
        self.inner.size()
    }

    fn key_bits(&self) -> usize {
        self.key_bits
    }

    fn digest(&self, bytes: &[u8]) -> Digest {
        self.inner.digest(bytes)
    }

    fn init(&self) -> Box<dyn HashContext> {
        self.inner.init()
    }
}
