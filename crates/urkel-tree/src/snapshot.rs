// crates/urkel-tree/src/snapshot.rs

//! Read-only views at a (possibly historical) root (`spec.md` §4.6).

use std::sync::Arc;

use urkel_core::error::{Error, Result};
use urkel_core::hasher::{Digest, HashAdapter};
use urkel_core::node::Node;
use urkel_proof::Proof;
use urkel_store::Store;

use crate::path::bit;
use crate::walk::{get_from, resolve};

/// A read-only root plus a shared store handle. Cheap to create; does not
/// itself hold any tree-wide lock.
pub struct Snapshot {
    pub(crate) store: Arc<Store>,
    pub(crate) root: Node,
}

impl Snapshot {
    /// The Merkle hash this snapshot is pinned to.
    #[must_use]
    pub fn root_hash(&self) -> Digest {
        self.root.hash(self.store.hasher().as_ref())
    }

    /// Look up `key` as of this snapshot's root.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        get_from(&self.store, self.root.clone(), key)
    }

    /// Produce a canonical proof of inclusion or exclusion for `key`
    /// (`spec.md` §4.7).
    pub fn prove(&self, key: &[u8]) -> Result<Proof> {
        let hasher = self.store.hasher().clone();
        prove_from(&self.store, hasher.as_ref(), self.root.clone(), key)
    }

    /// Every `(key, value)` pair reachable from this root, in depth-first
    /// physical-layout order (`spec.md` §4.6): left subtree before right,
    /// values fetched as each leaf is visited.
    pub fn iter(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut out = Vec::new();
        collect(&self.store, self.root.clone(), &mut out)?;
        Ok(out)
    }
}

fn collect(store: &Store, node: Node, out: &mut Vec<(Vec<u8>, Vec<u8>)>) -> Result<()> {
    match resolve(store, node)? {
        Node::Null => Ok(()),
        Node::Leaf { key, value_ptr, value, .. } => {
            let value = match value {
                Some(v) => v,
                None => store.get_value(value_ptr)?,
            };
            out.push((key, value));
            Ok(())
        }
        Node::Internal { left, right, .. } => {
            collect(store, *left, out)?;
            collect(store, *right, out)
        }
        Node::Hash { .. } => unreachable!("resolved just above"),
    }
}

/// Shared by [`Snapshot::prove`] and (for the currently-committed root)
/// the top-level `Tree`.
pub(crate) fn prove_from(store: &Store, hasher: &dyn HashAdapter, root: Node, key: &[u8]) -> Result<Proof> {
    let bits = hasher.key_bits();
    let mut current = root;
    let mut depth = 0usize;
    let mut siblings = Vec::new();
    loop {
        current = resolve(store, current)?;
        match current {
            Node::Null => return Ok(Proof::dead_end(siblings)),
            Node::Leaf { key: leaf_key, value_ptr, value, .. } => {
                if leaf_key == key {
                    let value = match value {
                        Some(v) => v,
                        None => store.get_value(value_ptr)?,
                    };
                    return Ok(Proof::exists(siblings, value));
                }
                let value_bytes = match value {
                    Some(v) => v,
                    None => store.get_value(value_ptr)?,
                };
                let value_hash = hasher.digest(&value_bytes);
                return Ok(Proof::collision(siblings, leaf_key, value_hash));
            }
            Node::Internal { left, right, .. } => {
                if depth >= bits {
                    return Err(Error::missing_node(&store.root_hash(), None, Some(key), depth));
                }
                let (chosen, sibling) = if bit(key, depth) { (*right, *left) } else { (*left, *right) };
                siblings.push(sibling.hash(hasher));
                current = chosen;
                depth += 1;
            }
            Node::Hash { .. } => unreachable!("resolved just above"),
        }
    }
}
