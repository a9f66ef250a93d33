// crates/urkel-tree/src/walk.rs

//! The tree-shape edits themselves (`spec.md` §4.5): lookup, insertion with
//! dead-end growth, and removal with dead-end shrink. Expressed
//! recursively rather than with an explicit sibling stack — each
//! recursive call returns the rebuilt subtree, so the bottom-up rebuild
//! the spec describes falls out of the call stack unwinding rather than an
//! explicit loop over remembered siblings.

use urkel_core::error::{Error, Result};
use urkel_core::hasher::HashAdapter;
use urkel_core::node::Node;
use urkel_store::Store;

use crate::path::bit;

/// Resolve a lazy [`Node::Hash`] into its decoded form; anything else
/// passes through unchanged.
pub(crate) fn resolve(store: &Store, node: Node) -> Result<Node> {
    match node {
        Node::Hash { hash, at } => store.get_node(at, hash),
        other => Ok(other),
    }
}

/// `get(key)` (`spec.md` §4.5 Lookup).
pub(crate) fn get(store: &Store, key: &[u8]) -> Result<Option<Vec<u8>>> {
    get_from(store, Node::Hash { hash: store.root_hash(), at: store.root_ref() }, key)
}

pub(crate) fn get_from(store: &Store, root: Node, key: &[u8]) -> Result<Option<Vec<u8>>> {
    let bits = store.hasher().key_bits();
    let mut current = root;
    let mut depth = 0usize;
    loop {
        current = resolve(store, current)?;
        match current {
            Node::Null => return Ok(None),
            Node::Leaf { key: leaf_key, value_ptr, value, .. } => {
                if leaf_key != key {
                    return Ok(None);
                }
                return match value {
                    Some(v) => Ok(Some(v)),
                    None => Ok(Some(store.get_value(value_ptr)?)),
                };
            }
            Node::Internal { left, right, .. } => {
                if depth >= bits {
                    return Err(Error::missing_node(&store.root_hash(), None, Some(key), depth));
                }
                current = if bit(key, depth) { *right } else { *left };
                depth += 1;
            }
            Node::Hash { .. } => unreachable!("resolved just above"),
        }
    }
}

/// `insert(key, value)` (`spec.md` §4.5 Insertion), returning the rebuilt
/// subtree rooted where `node` was.
pub(crate) fn insert(store: &Store, hasher: &dyn HashAdapter, node: Node, key: &[u8], value: &[u8], depth: usize) -> Result<Node> {
    let bits = hasher.key_bits();
    let node = resolve(store, node)?;
    match node {
        Node::Null => Ok(Node::new_leaf(hasher, key.to_vec(), value.to_vec())),
        Node::Leaf { key: existing_key, hash: existing_hash, value_ptr, value: existing_value, written_at } => {
            if existing_key == key {
                let new_hash = hasher.hash_value(key, value);
                if new_hash == existing_hash {
                    // Identical (key, value): nothing changes, preserve
                    // `written_at` so commit skips rewriting this leaf.
                    return Ok(Node::Leaf { key: existing_key, hash: existing_hash, value_ptr, value: existing_value, written_at });
                }
                return Ok(Node::new_leaf(hasher, key.to_vec(), value.to_vec()));
            }
            let existing = Node::Leaf { key: existing_key, hash: existing_hash, value_ptr, value: existing_value, written_at };
            let incoming = Node::new_leaf(hasher, key.to_vec(), value.to_vec());
            grow_branch(existing, incoming, depth)
        }
        Node::Internal { left, right, .. } => {
            if depth >= bits {
                return Err(Error::missing_node(&store.root_hash(), None, Some(key), depth));
            }
            if bit(key, depth) {
                let new_right = insert(store, hasher, *right, key, value, depth + 1)?;
                Ok(Node::new_internal(*left, new_right))
            } else {
                let new_left = insert(store, hasher, *left, key, value, depth + 1)?;
                Ok(Node::new_internal(new_left, *right))
            }
        }
        Node::Hash { .. } => unreachable!("resolved just above"),
    }
}

/// Grow a dead-end branch: insert `Null` sidenodes for every bit position
/// beyond `depth` where the two leaves' keys agree, then an internal
/// splitting on the first differing bit.
fn grow_branch(existing: Node, incoming: Node, depth: usize) -> Result<Node> {
    let (existing_key, incoming_key) = match (&existing, &incoming) {
        (Node::Leaf { key: a, .. }, Node::Leaf { key: b, .. }) => (a.clone(), b.clone()),
        _ => return Err(Error::assertion("grow_branch called on non-leaf nodes")),
    };
    let bits = existing_key.len() * 8;
    let mut split = depth;
    while split < bits && bit(&existing_key, split) == bit(&incoming_key, split) {
        split += 1;
    }
    if split >= bits {
        return Err(Error::assertion("grow_branch: keys identical beyond tree width"));
    }

    let mut node = if bit(&incoming_key, split) {
        Node::new_internal(existing, incoming)
    } else {
        Node::new_internal(incoming, existing)
    };
    let mut d = split;
    while d > depth {
        d -= 1;
        node = if bit(&incoming_key, d) {
            Node::new_internal(Node::Null, node)
        } else {
            Node::new_internal(node, Node::Null)
        };
    }
    Ok(node)
}

/// `remove(key)` (`spec.md` §4.5 Removal), returning the rebuilt subtree.
pub(crate) fn remove(store: &Store, hasher: &dyn HashAdapter, node: Node, key: &[u8], depth: usize) -> Result<Node> {
    let bits = hasher.key_bits();
    let node = resolve(store, node)?;
    match node {
        Node::Null => Ok(Node::Null),
        Node::Leaf { key: existing_key, hash, value_ptr, value, written_at } => {
            if existing_key == key {
                Ok(Node::Null)
            } else {
                Ok(Node::Leaf { key: existing_key, hash, value_ptr, value, written_at })
            }
        }
        Node::Internal { left, right, .. } => {
            if depth >= bits {
                return Err(Error::missing_node(&store.root_hash(), None, Some(key), depth));
            }
            if bit(key, depth) {
                let new_right = remove(store, hasher, *right, key, depth + 1)?;
                merge(store, *left, new_right, false)
            } else {
                let new_left = remove(store, hasher, *left, key, depth + 1)?;
                merge(store, new_left, *right, true)
            }
        }
        Node::Hash { .. } => unreachable!("resolved just above"),
    }
}

/// Recombine a modified child with its untouched sibling after a removal,
/// implementing dead-end shrink: a lone leaf bubbles up through any chain
/// of ancestors whose other sibling is `Null` (`spec.md` §4.5 Removal).
///
/// `modified_is_left` says which side `modified` occupies; `untouched` is
/// the side that was not recursed into this call and may still be an
/// unresolved [`Node::Hash`].
fn merge(store: &Store, left: Node, right: Node, modified_is_left: bool) -> Result<Node> {
    let (modified, untouched) = if modified_is_left { (left, right) } else { (right, left) };

    match &modified {
        Node::Null => {
            let untouched = resolve(store, untouched)?;
            match untouched {
                Node::Null => Ok(Node::Null),
                leaf @ Node::Leaf { .. } => Ok(leaf),
                internal @ Node::Internal { .. } => Ok(rebuild(modified, internal, modified_is_left)),
                Node::Hash { .. } => unreachable!("resolved just above"),
            }
        }
        Node::Leaf { .. } => {
            let resolved_untouched = resolve(store, untouched)?;
            if let Node::Null = resolved_untouched {
                // Keep bubbling: this level's own sibling was also a
                // dead-end, so the caller above gets a chance to collapse
                // too.
                Ok(modified)
            } else {
                Ok(rebuild(modified, resolved_untouched, modified_is_left))
            }
        }
        _ => Ok(rebuild(modified, untouched, modified_is_left)),
    }
}

fn rebuild(modified: Node, untouched: Node, modified_is_left: bool) -> Node {
    if modified_is_left {
        Node::new_internal(modified, untouched)
    } else {
        Node::new_internal(untouched, modified)
    }
}
