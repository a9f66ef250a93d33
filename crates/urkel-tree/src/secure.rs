// crates/urkel-tree/src/secure.rs

//! A thin pre-hashing wrapper over [`crate::Tree`] for application keys
//! that aren't already fixed-width tree keys (`spec.md` §9, Open Question
//! (b)): every key is hashed before it ever reaches the tree engine, so
//! application keys of any length can be used.

use std::sync::Arc;

use urkel_core::error::Result;
use urkel_core::hasher::{Digest, HashAdapter};
use urkel_proof::Proof;

use crate::{Batch, Snapshot, Tree};

/// Hash an application key down to the tree's fixed key width.
///
/// `hasher.digest()` always produces a `hasher.size()`-byte digest, but the
/// tree keys it feeds must be exactly `hasher.key_size()` bytes — the two
/// diverge whenever `hasher.key_bits()` overrides the default (`spec.md`
/// §8's SHA-256-over-160-bit-keys scenario). Truncating the digest is safe
/// here precisely because this is a *pre-hashing* step, not the tree's own
/// domain-separated hashing: the leading bytes of a cryptographic digest
/// are as uniform as the whole thing.
#[must_use]
pub fn hash_key(hasher: &dyn HashAdapter, key: &[u8]) -> Digest {
    let digest = hasher.digest(key);
    let key_size = hasher.key_size();
    debug_assert!(key_size <= digest.len(), "key_bits must not exceed the adapter's own digest width");
    digest[..key_size.min(digest.len())].to_vec()
}

/// [`Tree`], but `get`/`insert`/`remove`/`prove` take application keys of
/// arbitrary length rather than fixed-width tree keys.
#[derive(Clone)]
pub struct SecureTree {
    inner: Tree,
}

impl SecureTree {
    /// Wrap an already-open tree.
    #[must_use]
    pub fn new(inner: Tree) -> Self {
        Self { inner }
    }

    /// The underlying tree, keyed by hashed application keys.
    #[must_use]
    pub fn inner(&self) -> &Tree {
        &self.inner
    }

    /// The currently committed root's Merkle hash.
    #[must_use]
    pub fn root_hash(&self) -> Digest {
        self.inner.root_hash()
    }

    /// Look up an application key.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.inner.get(&hash_key(self.inner.hasher().as_ref(), key))
    }

    /// A read-only view at `root_hash`, or the current root if `None`.
    pub fn snapshot(&self, root_hash: Option<Digest>) -> Result<SecureSnapshot> {
        Ok(SecureSnapshot { inner: self.inner.snapshot(root_hash)?, hasher: self.inner.hasher() })
    }

    /// Stage a new set of edits, keyed by application keys.
    #[must_use]
    pub fn batch(&self) -> SecureBatch {
        SecureBatch { inner: self.inner.batch(), hasher: self.inner.hasher() }
    }

    /// Rewrite the live tree into a fresh file generation (`spec.md` §4.8).
    pub fn compact(&self) -> Result<Self> {
        Ok(Self { inner: self.inner.compact()? })
    }

}

/// A [`Batch`] keyed by application keys instead of hashed tree keys.
pub struct SecureBatch {
    inner: Batch,
    hasher: Arc<dyn HashAdapter>,
}

impl SecureBatch {
    /// Stage an insertion under an application key.
    pub fn insert(&mut self, key: &[u8], value: impl Into<Vec<u8>>) -> Result<()> {
        self.inner.insert(hash_key(self.hasher.as_ref(), key), value)
    }

    /// Stage a removal under an application key.
    pub fn remove(&mut self, key: &[u8]) -> Result<()> {
        self.inner.remove(&hash_key(self.hasher.as_ref(), key))
    }

    /// Read through the batch's staged root by application key.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.inner.get(&hash_key(self.hasher.as_ref(), key))
    }

    /// Persist every staged edit and return the new root hash.
    pub fn commit(self) -> Result<Digest> {
        self.inner.commit()
    }

    /// Drop every staged edit without touching the store.
    pub fn discard(self) {
        self.inner.discard();
    }
}

/// A [`Snapshot`] keyed by application keys instead of hashed tree keys.
pub struct SecureSnapshot {
    inner: Snapshot,
    hasher: Arc<dyn HashAdapter>,
}

impl SecureSnapshot {
    /// Look up an application key as of this snapshot's root.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.inner.get(&hash_key(self.hasher.as_ref(), key))
    }

    /// Produce a canonical proof for an application key.
    pub fn prove(&self, key: &[u8]) -> Result<Proof> {
        self.inner.prove(&hash_key(self.hasher.as_ref(), key))
    }

    /// Every `(hashed_key, value)` pair reachable from this root. Note the
    /// keys returned are tree keys (hashes), not original application
    /// keys, since the tree itself never stores the latter.
    pub fn iter(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        self.inner.iter()
    }
}
