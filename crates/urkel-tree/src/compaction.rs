// crates/urkel-tree/src/compaction.rs

//! Rewriting every reachable node and value into a fresh generation of
//! files, then swapping it in for the live store (`spec.md` §4.8).
//!
//! The rewrite preserves every hash exactly; only physical offsets change.
//! Unlike a live commit, this walks the *entire* tree rather than just a
//! dirty path, so every node gets re-encoded even if its bytes end up
//! identical to before.

use rand::RngCore;
use tracing::{info, warn};
use urkel_core::error::{Error, Result};
use urkel_core::node::Node;
use urkel_store::{Store, StoreOptions};

use crate::commit::demote_if_deep;
use crate::walk::resolve;

/// An 8-byte random hex suffix, used to name sibling directories
/// (`spec.md` §4.8: "a fresh store directory (random sibling path)").
fn random_suffix() -> String {
    let mut bytes = [0u8; 8];
    rand::rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn dir_stem(path: &std::path::Path) -> String {
    path.file_name().and_then(|n| n.to_str()).unwrap_or("store").to_string()
}

/// Rewrite `store`'s live tree into a fresh, randomly-named sibling
/// directory, then atomically swap it in for `store`'s own directory and
/// return a freshly reopened `Store`. `cache_depth` controls the
/// rewritten store's generational cache the same way it does for ordinary
/// commits.
pub fn compact(store: &Store, cache_depth: usize) -> Result<Store> {
    let fs = store.fs().clone();
    let old_dir = store.dir().to_path_buf();
    let stem = dir_stem(&old_dir);
    let tmp_dir = old_dir.with_file_name(format!("{stem}.{}~", random_suffix()));
    let backup_dir = old_dir.with_file_name(format!("{stem}.{}~", random_suffix()));

    let options = || StoreOptions {
        hasher: store.hasher().clone(),
        max_file_size: store.max_file_size(),
        handle_cache_capacity: 32,
    };

    let new_store = Store::open(&tmp_dir, fs.clone(), options())?;
    let root = Node::Hash { hash: store.root_hash(), at: store.root_ref() };
    let rewritten = recopy(store, &new_store, root, 0, cache_depth)?;
    let hash = rewritten.hash(store.hasher().as_ref());
    let root_ref = rewritten.as_node_ref()?;
    new_store.commit(root_ref, hash)?;
    drop(new_store);

    fs.rename(&old_dir, &backup_dir).map_err(|e| Error::io("rename", 0, 0, 0, e))?;
    let final_dir = match fs.rename(&tmp_dir, &old_dir) {
        Ok(()) => {
            for name in fs.read_dir(&backup_dir).unwrap_or_default() {
                let _ = fs.unlink(&backup_dir.join(name));
            }
            let _ = fs.rmdir(&backup_dir);
            old_dir
        }
        Err(e) => {
            // `old_dir` is busy (`spec.md` §4.8's rename fallback): put the
            // live store back where it was, and land the freshly compacted
            // data at a random sibling path instead of losing it.
            warn!(dir = %old_dir.display(), error = %e, "compaction: rename onto live prefix failed, falling back to a random sibling path");
            fs.rename(&backup_dir, &old_dir).map_err(|e2| Error::io("rename", 0, 0, 0, e2))?;
            let fallback_dir = old_dir.with_file_name(format!("{stem}.{}~", random_suffix()));
            fs.rename(&tmp_dir, &fallback_dir).map_err(|e2| Error::io("rename", 0, 0, 0, e2))?;
            fallback_dir
        }
    };

    info!(dir = %final_dir.display(), "compaction complete");
    Store::open(&final_dir, fs, options())
}

fn recopy(old: &Store, new: &Store, node: Node, depth: usize, cache_depth: usize) -> Result<Node> {
    let hasher = old.hasher().as_ref();
    match resolve(old, node)? {
        Node::Null => Ok(Node::Null),
        Node::Leaf { key, hash, value_ptr, value, .. } => {
            let value_bytes = match value {
                Some(v) => v,
                None => old.get_value(value_ptr)?,
            };
            let new_value_ptr = new.stage_value(&value_bytes)?;
            let staged = Node::Leaf {
                key,
                hash,
                value_ptr: new_value_ptr,
                value: None,
                written_at: urkel_core::pointer::Pointer::NULL,
            };
            let record = staged.encode(hasher)?;
            let ptr = new.stage_node_bytes(&record)?;
            let written = match staged {
                Node::Leaf { key, hash, value_ptr, value, .. } => Node::Leaf { key, hash, value_ptr, value, written_at: ptr },
                _ => unreachable!(),
            };
            demote_if_deep(hasher, written, depth, cache_depth)
        }
        Node::Internal { left, right, .. } => {
            let left = recopy(old, new, *left, depth + 1, cache_depth)?;
            let right = recopy(old, new, *right, depth + 1, cache_depth)?;
            let staged = Node::new_internal(left, right);
            let record = staged.encode(hasher)?;
            let ptr = new.stage_node_bytes(&record)?;
            let written = match staged {
                Node::Internal { left, right, .. } => Node::Internal { left, right, written_at: ptr },
                _ => unreachable!(),
            };
            demote_if_deep(hasher, written, depth, cache_depth)
        }
        Node::Hash { .. } => unreachable!("resolved just above"),
    }
}
