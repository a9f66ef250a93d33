// crates/urkel-tree/src/commit.rs

//! Post-order persistence of a staged tree and the generational cache
//! policy (`spec.md` §4.4 Commit sequence, §4.5 Generational caching).

use urkel_core::error::Result;
use urkel_core::hasher::HashAdapter;
use urkel_core::node::Node;
use urkel_store::Store;

/// Walk `node` post-order, writing every node that hasn't already been
/// written (`written_at` still unset), and demoting anything at or below
/// `cache_depth` to a lazy [`Node::Hash`] once it's on disk. Already
/// committed nodes (whether still resolved, from the top of the cache, or
/// already a `Hash`) pass through untouched — a commit only ever writes
/// the path actually walked by this batch's edits.
pub(crate) fn commit_node(store: &Store, hasher: &dyn HashAdapter, node: Node, depth: usize, cache_depth: usize) -> Result<Node> {
    match node {
        Node::Null | Node::Hash { .. } => Ok(node),
        Node::Leaf { written_at, .. } if written_at.is_written() => Ok(node),
        Node::Internal { written_at, .. } if written_at.is_written() => Ok(node),
        Node::Leaf { key, hash, value_ptr, value, .. } => {
            let value_ptr = if value_ptr.ptr.is_written() {
                value_ptr
            } else {
                let bytes = value.as_deref().unwrap_or_default();
                store.stage_value(bytes)?
            };
            let staged = Node::Leaf { key, hash, value_ptr, value, written_at: urkel_core::pointer::Pointer::NULL };
            let record = staged.encode(hasher)?;
            let ptr = store.stage_node_bytes(&record)?;
            let written = match staged {
                Node::Leaf { key, hash, value_ptr, value, .. } => Node::Leaf { key, hash, value_ptr, value, written_at: ptr },
                _ => unreachable!(),
            };
            demote_if_deep(hasher, written, depth, cache_depth)
        }
        Node::Internal { left, right, .. } => {
            let left = commit_node(store, hasher, *left, depth + 1, cache_depth)?;
            let right = commit_node(store, hasher, *right, depth + 1, cache_depth)?;
            let staged = Node::new_internal(left, right);
            let record = staged.encode(hasher)?;
            let ptr = store.stage_node_bytes(&record)?;
            let written = match staged {
                Node::Internal { left, right, .. } => Node::Internal { left, right, written_at: ptr },
                _ => unreachable!(),
            };
            demote_if_deep(hasher, written, depth, cache_depth)
        }
    }
}

pub(crate) fn demote_if_deep(hasher: &dyn HashAdapter, written: Node, depth: usize, cache_depth: usize) -> Result<Node> {
    if depth < cache_depth {
        Ok(written)
    } else {
        let hash = written.hash(hasher);
        let at = written.as_node_ref()?;
        Ok(Node::Hash { hash, at })
    }
}
