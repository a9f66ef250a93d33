// crates/urkel-store/src/meta.rs

//! The fixed-size trailer appended on every commit (`spec.md` §4.4, §6).
//!
//! Unlike an internal node record (which embeds its immediate children's
//! hashes so a reader never has to chase pointers just to learn a hash),
//! the root has no parent to embed *its* hash for it. This crate resolves
//! that by carrying `root_hash` directly in the meta record rather than
//! recomputing it on open — a deliberate sizing choice over `spec.md`'s
//! rough `META_SIZE` estimate; see `DESIGN.md`.

use urkel_core::error::{Error, Result};
use urkel_core::hasher::{Digest, HashAdapter};
use urkel_core::node::NodeRef;
use urkel_core::pointer::Pointer;
use urkel_core::META_MAGIC;

/// One meta record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Meta {
    /// Pointer to the previous meta record (this file or an earlier one).
    pub meta_ptr_prev: Pointer,
    /// Reference to the current root's node record (or `NodeRef::NULL`).
    pub root_ref: NodeRef,
    /// The current root's Merkle hash (`hasher.zero()` for an empty tree).
    pub root_hash: Digest,
}

impl Meta {
    /// Encoded size for a hash adapter producing `hash_size`-byte digests.
    #[must_use]
    pub fn encoded_size(hash_size: usize) -> usize {
        4 + Pointer::ENCODED_SIZE + NodeRef::ENCODED_SIZE + hash_size + 20
    }

    /// Encode, including the trailing MAC computed with `mac_key`.
    #[must_use]
    pub fn encode(&self, hasher: &dyn HashAdapter, mac_key: &[u8]) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::encoded_size(hasher.size()));
        buf.extend_from_slice(&META_MAGIC.to_le_bytes());
        buf.extend_from_slice(&self.meta_ptr_prev.to_bytes());
        buf.extend_from_slice(&self.root_ref.to_bytes());
        buf.extend_from_slice(&self.root_hash);
        let mac = hasher.checksum(&buf, mac_key);
        buf.extend_from_slice(&mac);
        buf
    }

    /// Decode and verify a meta record; `None` if the magic or MAC doesn't
    /// match (a torn or unrelated write, not necessarily corruption).
    #[must_use]
    pub fn try_decode(bytes: &[u8], hasher: &dyn HashAdapter, mac_key: &[u8]) -> Option<Self> {
        let size = Self::encoded_size(hasher.size());
        if bytes.len() < size {
            return None;
        }
        let magic = u32::from_le_bytes(bytes[0..4].try_into().ok()?);
        if magic != META_MAGIC {
            return None;
        }
        let body_end = 4 + Pointer::ENCODED_SIZE + NodeRef::ENCODED_SIZE + hasher.size();
        let expected_mac = hasher.checksum(&bytes[..body_end], mac_key);
        let actual_mac = &bytes[body_end..body_end + 20];
        if expected_mac.as_slice() != actual_mac {
            return None;
        }
        let mut ptr_bytes = [0u8; Pointer::ENCODED_SIZE];
        ptr_bytes.copy_from_slice(&bytes[4..4 + Pointer::ENCODED_SIZE]);
        let meta_ptr_prev = Pointer::from_bytes(ptr_bytes);
        let ref_start = 4 + Pointer::ENCODED_SIZE;
        let mut ref_bytes = [0u8; NodeRef::ENCODED_SIZE];
        ref_bytes.copy_from_slice(&bytes[ref_start..ref_start + NodeRef::ENCODED_SIZE]);
        let root_ref = NodeRef::from_bytes(ref_bytes);
        let hash_start = ref_start + NodeRef::ENCODED_SIZE;
        let root_hash = bytes[hash_start..hash_start + hasher.size()].to_vec();
        Some(Self { meta_ptr_prev, root_ref, root_hash })
    }

    /// Decode, returning an [`Error::Encoding`] instead of `None` — used
    /// once the caller already trusts the bytes came from a specific
    /// pointer (e.g. a meta-chain walk), where a mismatch means corruption
    /// rather than "not a meta record".
    pub fn decode(bytes: &[u8], hasher: &dyn HashAdapter, mac_key: &[u8], offset: usize) -> Result<Self> {
        Self::try_decode(bytes, hasher, mac_key)
            .ok_or_else(|| Error::encoding(offset, "invalid meta record (bad magic or MAC)"))
    }
}
