// crates/urkel-tree/src/history.rs

//! Resolving a historical root hash back to a node (`spec.md` §4.5 History
//! lookup): check the in-memory root cache first, then fall back to
//! walking the meta chain.

use urkel_core::error::{Error, Result};
use urkel_core::node::Node;
use urkel_store::Store;

/// Resolve `root_hash` to a lazy root node, `Err(MissingNode)` if it
/// matches neither the live root, the root cache, nor any meta in the
/// chain still reachable from the current head.
pub(crate) fn resolve_root(store: &Store, root_hash: &[u8]) -> Result<Node> {
    let zero = store.hasher().zero();
    if root_hash == zero.as_slice() {
        return Ok(Node::Null);
    }
    if root_hash == store.root_hash().as_slice() {
        return Ok(Node::Hash { hash: store.root_hash(), at: store.root_ref() });
    }
    if let Some(at) = store.cached_root(root_hash) {
        return Ok(Node::Hash { hash: root_hash.to_vec(), at });
    }
    for meta in store.history()? {
        if meta.root_hash == root_hash {
            return Ok(Node::Hash { hash: meta.root_hash, at: meta.root_ref });
        }
    }
    Err(Error::missing_node(&store.root_hash(), Some(root_hash), None, 0))
}
