// crates/urkel-core/src/hasher.rs

//! Hash adapter contract.
//!
//! Concrete hash functions live outside this crate (see `urkel-crypto`); the
//! tree engine and store only ever see `&dyn HashAdapter`. The `0x00`/`0x01`
//! domain-separation prefixes below must match between whatever wrote a
//! record and whatever verifies it — that's the whole of the adapter's job.

/// A fixed-size digest, boxed so adapters aren't forced into a single
/// `HASH_SIZE` at the type level.
pub type Digest = Vec<u8>;

/// Streaming hash context, for adapters that want to avoid buffering.
pub trait HashContext {
    /// Feed more bytes into the running digest.
    fn update(&mut self, bytes: &[u8]);
    /// Consume the context and produce the final digest.
    fn finish(self: Box<Self>) -> Digest;
}

/// Wraps a cryptographic hash function with the domain-separated
/// conveniences the tree and store need.
///
/// Implementations must be deterministic and must not panic on any input.
pub trait HashAdapter: Send + Sync {
    /// Digest size in bytes (32 for both adapters shipped in this workspace).
    fn size(&self) -> usize;

    /// Width, in bits, of the tree keys this adapter backs (`spec.md` §3's
    /// `BITS`). Independent of `size()`: a 32-byte-digest adapter can still
    /// back a tree over, say, 160-bit keys (`spec.md` §8's SHA-1-derived
    /// test keys under a SHA-256 tree hash) — see
    /// `urkel_crypto::WithKeyBits` for an adapter that overrides this.
    /// Defaults to `size() * 8` (key width equals digest width), the
    /// common case for both adapters shipped in this workspace.
    fn key_bits(&self) -> usize {
        self.size() * 8
    }

    /// `key_bits() / 8` — the fixed byte width every tree key under this
    /// adapter must have.
    fn key_size(&self) -> usize {
        self.key_bits() / 8
    }

    /// The all-zero digest representing an empty subtree.
    fn zero(&self) -> Digest {
        vec![0u8; self.size()]
    }

    /// One-shot digest of arbitrary bytes.
    fn digest(&self, bytes: &[u8]) -> Digest;

    /// Begin a streaming digest.
    fn init(&self) -> Box<dyn HashContext>;

    /// `H(0x01 ‖ left ‖ right)` — an internal node's hash.
    fn hash_internal(&self, left: &[u8], right: &[u8]) -> Digest {
        let mut ctx = self.init();
        ctx.update(&[0x01]);
        ctx.update(left);
        ctx.update(right);
        ctx.finish()
    }

    /// `H(0x00 ‖ key ‖ value_hash)` — a leaf's hash.
    fn hash_leaf(&self, key: &[u8], value_hash: &[u8]) -> Digest {
        let mut ctx = self.init();
        ctx.update(&[0x00]);
        ctx.update(key);
        ctx.update(value_hash);
        ctx.finish()
    }

    /// `hash_leaf(key, digest(value))` — convenience for writers that have
    /// the raw value instead of its hash.
    fn hash_value(&self, key: &[u8], value: &[u8]) -> Digest {
        let vhash = self.digest(value);
        self.hash_leaf(key, &vhash)
    }

    /// Truncated-hash MAC used for meta-record checksums: the leading 20
    /// bytes of `H(data ‖ key)`.
    fn checksum(&self, data: &[u8], key: &[u8]) -> [u8; 20] {
        let mut ctx = self.init();
        ctx.update(data);
        ctx.update(key);
        let digest = ctx.finish();
        let mut out = [0u8; 20];
        let n = out.len().min(digest.len());
        out[..n].copy_from_slice(&digest[..n]);
        out
    }
}
