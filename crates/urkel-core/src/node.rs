// crates/urkel-core/src/node.rs

//! The tagged node union and its fixed-width on-disk encoding.
//!
//! A resolved [`Node::Internal`] or [`Node::Leaf`] that has been written is
//! immutable; nothing in this module ever mutates bytes once they're
//! produced. [`Node::Hash`] is the lazy, unresolved form — a reference kept
//! only as its Merkle hash and physical location, exactly as `spec.md`
//! §3 requires: "resolving must not change the hash".
//!
//! **Encoding note.** `spec.md` §4.2 describes child/root references and
//! plain value references with slightly different bit-packing, and the
//! leaf record carries no `value_hash` field at all (only the value's
//! location). This crate resolves the self-description problem the same
//! way: every reference to a *node* (an internal's children, and the meta
//! record's root pointer) is a [`NodeRef`] — file index plus `(offset << 1)
//! | is_leaf` — so a caller always knows a node's shape *before* reading
//! its bytes, and a leaf's Merkle hash is carried by whichever `NodeRef`/
//! meta pointer led to it rather than recomputed from an absent on-disk
//! field. See `DESIGN.md`.

use crate::error::{Error, Result};
use crate::hasher::{Digest, HashAdapter};
use crate::pointer::{Pointer, SizedPointer};

/// A reference to a node record: where it lives, and whether it's a leaf.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NodeRef {
    /// File the referenced record lives in (0 = unwritten / null).
    pub file_index: u16,
    /// Byte offset within that file.
    pub offset: u32,
    /// Whether the referenced record is a leaf record (vs. internal).
    pub is_leaf: bool,
}

impl NodeRef {
    /// The null reference (points at nothing, i.e. an empty subtree).
    pub const NULL: Self = Self { file_index: 0, offset: 0, is_leaf: false };

    /// Encoded size in bytes.
    pub const ENCODED_SIZE: usize = 6;

    /// Encode as the 6-byte on-disk representation.
    #[must_use]
    pub fn to_bytes(self) -> [u8; 6] {
        let packed = (u64::from(self.offset) << 1) | u64::from(self.is_leaf);
        let mut buf = [0u8; 6];
        buf[0..2].copy_from_slice(&self.file_index.to_le_bytes());
        buf[2..6].copy_from_slice(&(packed as u32).to_le_bytes());
        buf
    }

    /// Decode from a 6-byte on-disk representation.
    #[must_use]
    pub fn from_bytes(bytes: [u8; 6]) -> Self {
        let file_index = u16::from_le_bytes([bytes[0], bytes[1]]);
        let packed = u32::from_le_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]);
        Self { file_index, offset: packed >> 1, is_leaf: packed & 1 == 1 }
    }
}

/// A tagged union over the four kinds of node the tree engine ever touches.
#[derive(Debug, Clone)]
pub enum Node {
    /// Canonical empty subtree.
    Null,
    /// Two children, each possibly still a [`Node::Hash`].
    Internal {
        /// Left child (bit = 0).
        left: Box<Node>,
        /// Right child (bit = 1).
        right: Box<Node>,
        /// Where this internal record lives once written.
        written_at: Pointer,
    },
    /// A key with an associated value, fetched lazily via `value_ptr`.
    Leaf {
        /// Full key (always `BITS/8` bytes).
        key: Vec<u8>,
        /// This leaf's Merkle hash, `H(0x00 ‖ key ‖ H(value))`. Always
        /// known up front (computed on construction, or carried in from
        /// whichever reference resolved to this leaf) — never recomputed
        /// from an on-disk field, since the leaf record stores none.
        hash: Digest,
        /// Where the value bytes live; `ptr.is_written() == false` if staged.
        value_ptr: SizedPointer,
        /// The value bytes themselves, if already loaded/staged in memory.
        value: Option<Vec<u8>>,
        /// Where this leaf record lives once written.
        written_at: Pointer,
    },
    /// An unresolved reference: the Merkle hash and physical location of a
    /// node we haven't decoded yet.
    Hash {
        /// Merkle hash the referenced node would produce when resolved.
        hash: Digest,
        /// Physical location of the referenced record.
        at: NodeRef,
    },
}

impl Node {
    /// Construct a new in-memory leaf with a value already in hand.
    #[must_use]
    pub fn new_leaf(hasher: &dyn HashAdapter, key: Vec<u8>, value: Vec<u8>) -> Self {
        let hash = hasher.hash_value(&key, &value);
        Self::Leaf {
            key,
            hash,
            value_ptr: SizedPointer::default(),
            value: Some(value),
            written_at: Pointer::NULL,
        }
    }

    /// Construct a new in-memory internal node from two children.
    #[must_use]
    pub fn new_internal(left: Node, right: Node) -> Self {
        Self::Internal { left: Box::new(left), right: Box::new(right), written_at: Pointer::NULL }
    }

    /// Whether this node is the canonical empty subtree.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Whether this node is an unresolved reference.
    #[must_use]
    pub const fn is_hash_ptr(&self) -> bool {
        matches!(self, Self::Hash { .. })
    }

    /// The reference a parent should store to point at this node, usable
    /// once the node (if not already a [`Node::Hash`]) has been written.
    ///
    /// # Errors
    /// Returns [`Error::Assertion`] if called on a resolved node that has
    /// not yet been written (`written_at` is still [`Pointer::NULL`]).
    pub fn as_node_ref(&self) -> Result<NodeRef> {
        match self {
            Self::Null => Ok(NodeRef::NULL),
            Self::Hash { at, .. } => Ok(*at),
            Self::Internal { written_at, .. } => {
                if !written_at.is_written() {
                    return Err(Error::assertion("internal node referenced before being written"));
                }
                Ok(NodeRef { file_index: written_at.file_index, offset: written_at.offset, is_leaf: false })
            }
            Self::Leaf { written_at, .. } => {
                if !written_at.is_written() {
                    return Err(Error::assertion("leaf node referenced before being written"));
                }
                Ok(NodeRef { file_index: written_at.file_index, offset: written_at.offset, is_leaf: true })
            }
        }
    }

    /// The Merkle hash of this node.
    ///
    /// Cheap in every case: `Null`/`Hash`/`Leaf` just return a stored
    /// digest, and `Internal` recurses into children that are themselves
    /// cheap (their hashes are likewise always already known).
    #[must_use]
    pub fn hash(&self, hasher: &dyn HashAdapter) -> Digest {
        match self {
            Self::Null => hasher.zero(),
            Self::Hash { hash, .. } | Self::Leaf { hash, .. } => hash.clone(),
            Self::Internal { left, right, .. } => {
                hasher.hash_internal(&left.hash(hasher), &right.hash(hasher))
            }
        }
    }

    /// Encode this node's own record (not its children's) to bytes.
    ///
    /// For [`Node::Internal`], children must already be resolved to
    /// references (i.e. written, or themselves [`Node::Hash`]) — call this
    /// only during post-order commit, after children are persisted.
    ///
    /// # Errors
    /// [`Error::Assertion`] if called on [`Node::Null`]/[`Node::Hash`], or
    /// if an internal's child hasn't been written yet.
    pub fn encode(&self, hasher: &dyn HashAdapter) -> Result<Vec<u8>> {
        match self {
            Self::Null | Self::Hash { .. } => {
                Err(Error::assertion("cannot encode a Null or already-hashed node"))
            }
            Self::Internal { left, right, .. } => {
                let mut buf = Vec::with_capacity(2 * (NodeRef::ENCODED_SIZE + hasher.size()));
                for child in [left.as_ref(), right.as_ref()] {
                    let at = child.as_node_ref()?;
                    buf.extend_from_slice(&at.to_bytes());
                    buf.extend_from_slice(&child.hash(hasher));
                }
                Ok(buf)
            }
            Self::Leaf { key, value_ptr, .. } => {
                let mut buf = Vec::with_capacity(2 + 4 + 2 + key.len());
                buf.extend_from_slice(&value_ptr.ptr.file_index.to_le_bytes());
                buf.extend_from_slice(&value_ptr.ptr.offset.to_le_bytes());
                buf.extend_from_slice(&value_ptr.size.to_le_bytes());
                buf.extend_from_slice(key);
                Ok(buf)
            }
        }
    }

    /// Decode a node record read from disk at `(file_index, offset)`.
    ///
    /// `is_leaf` and `known_hash` come from the [`NodeRef`] (or meta root
    /// pointer) that pointed here — the record itself never needs to
    /// self-describe its type or carry its own hash.
    ///
    /// # Errors
    /// [`Error::Encoding`] if `bytes` is shorter than the expected record
    /// size for `hasher`'s digest length and `key_len`.
    pub fn decode(
        hasher: &dyn HashAdapter,
        bytes: &[u8],
        is_leaf: bool,
        known_hash: Digest,
        key_len: usize,
        file_index: u16,
        offset: u32,
    ) -> Result<Self> {
        if is_leaf {
            let expected = 2 + 4 + 2 + key_len;
            if bytes.len() < expected {
                return Err(Error::encoding(0, format!(
                    "leaf record too short: got {} want {}", bytes.len(), expected
                )));
            }
            let value_file_index = u16::from_le_bytes([bytes[0], bytes[1]]);
            let value_offset = u32::from_le_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]);
            let value_size = u16::from_le_bytes([bytes[6], bytes[7]]);
            let key = bytes[8..8 + key_len].to_vec();
            Ok(Self::Leaf {
                key,
                hash: known_hash,
                value_ptr: SizedPointer::new(Pointer::new(value_file_index, value_offset), value_size),
                value: None,
                written_at: Pointer::new(file_index, offset),
            })
        } else {
            let per_child = NodeRef::ENCODED_SIZE + hasher.size();
            let expected = 2 * per_child;
            if bytes.len() < expected {
                return Err(Error::encoding(0, format!(
                    "internal record too short: got {} want {}", bytes.len(), expected
                )));
            }
            let mut refs = [NodeRef::NULL; 2];
            let mut hashes: [Digest; 2] = [Vec::new(), Vec::new()];
            for (i, slot) in refs.iter_mut().enumerate() {
                let base = i * per_child;
                let mut raw = [0u8; 6];
                raw.copy_from_slice(&bytes[base..base + 6]);
                *slot = NodeRef::from_bytes(raw);
                hashes[i] = bytes[base + 6..base + 6 + hasher.size()].to_vec();
            }
            let [left_hash, right_hash] = hashes;
            let left = Box::new(if refs[0] == NodeRef::NULL {
                Self::Null
            } else {
                Self::Hash { hash: left_hash, at: refs[0] }
            });
            let right = Box::new(if refs[1] == NodeRef::NULL {
                Self::Null
            } else {
                Self::Hash { hash: right_hash, at: refs[1] }
            });
            let _ = known_hash; // internal's hash is always recomputed from children
            Ok(Self::Internal { left, right, written_at: Pointer::new(file_index, offset) })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hasher::HashContext;

    struct Dummy;
    impl HashAdapter for Dummy {
        fn size(&self) -> usize { 4 }
        fn digest(&self, b: &[u8]) -> Digest {
            let mut h = 0u32;
            for &byte in b { h = h.wrapping_mul(31).wrapping_add(u32::from(byte)); }
            h.to_le_bytes().to_vec()
        }
        fn init(&self) -> Box<dyn HashContext> {
            struct C(Vec<u8>);
            impl HashContext for C {
                fn update(&mut self, b: &[u8]) { self.0.extend_from_slice(b); }
                fn finish(self: Box<Self>) -> Digest {
                    let mut h = 0u32;
                    for &byte in &self.0 { h = h.wrapping_mul(31).wrapping_add(u32::from(byte)); }
                    h.to_le_bytes().to_vec()
                }
            }
            Box::new(C(Vec::new()))
        }
    }

    #[test]
    fn node_ref_roundtrip() {
        let r = NodeRef { file_index: 9, offset: 12345, is_leaf: true };
        assert_eq!(NodeRef::from_bytes(r.to_bytes()), r);
        let r2 = NodeRef { file_index: 1, offset: 0, is_leaf: false };
        assert_eq!(NodeRef::from_bytes(r2.to_bytes()), r2);
    }

    #[test]
    fn null_hash_is_zero() {
        let h = Dummy;
        assert_eq!(Node::Null.hash(&h), h.zero());
    }

    #[test]
    fn leaf_encode_decode_roundtrip() {
        let h = Dummy;
        let mut leaf = Node::new_leaf(&h, vec![1, 2, 3, 4], b"hello".to_vec());
        if let Node::Leaf { value_ptr, written_at, .. } = &mut leaf {
            *value_ptr = SizedPointer::new(Pointer::new(3, 100), 5);
            *written_at = Pointer::new(2, 50);
        }
        let bytes = leaf.encode(&h).unwrap();
        let known_hash = leaf.hash(&h);
        let decoded = Node::decode(&h, &bytes, true, known_hash.clone(), 4, 2, 50).unwrap();
        assert_eq!(decoded.hash(&h), known_hash);
        match decoded {
            Node::Leaf { key, value_ptr, .. } => {
                assert_eq!(key, vec![1, 2, 3, 4]);
                assert_eq!(value_ptr.size, 5);
                assert_eq!(value_ptr.ptr, Pointer::new(3, 100));
            }
            _ => panic!("expected leaf"),
        }
    }

    #[test]
    fn internal_encode_decode_roundtrip() {
        let h = Dummy;
        let mut a = Node::new_leaf(&h, vec![0, 0, 0, 1], b"a".to_vec());
        let mut b = Node::new_leaf(&h, vec![0, 0, 0, 2], b"b".to_vec());
        if let Node::Leaf { written_at, .. } = &mut a { *written_at = Pointer::new(1, 10); }
        if let Node::Leaf { written_at, .. } = &mut b { *written_at = Pointer::new(1, 20); }
        let hash_a = a.hash(&h);
        let hash_b = b.hash(&h);
        let mut internal = Node::new_internal(a, b);
        let bytes = internal.encode(&h).unwrap();
        if let Node::Internal { written_at, .. } = &mut internal { *written_at = Pointer::new(1, 40); }
        let expected_hash = internal.hash(&h);

        let decoded = Node::decode(&h, &bytes, false, Vec::new(), 4, 1, 40).unwrap();
        assert_eq!(decoded.hash(&h), expected_hash);
        match decoded {
            Node::Internal { left, right, .. } => {
                assert_eq!(left.hash(&h), hash_a);
                assert_eq!(right.hash(&h), hash_b);
                assert!(left.is_hash_ptr());
                assert!(right.is_hash_ptr());
            }
            _ => panic!("expected internal"),
        }
    }
}
