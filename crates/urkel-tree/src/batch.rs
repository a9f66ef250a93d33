// crates/urkel-tree/src/batch.rs

//! Staged mutations with rollback on discard (`spec.md` §4.6 Batch).
//!
//! A `Batch` owns a staged root exclusively; `&mut self` on `insert`/
//! `remove` enforces the single-writer invariant within a process the same
//! way `Store::commit` does for the store beneath it.

use std::sync::Arc;

use urkel_core::error::Result;
use urkel_core::hasher::Digest;
use urkel_core::node::Node;

use crate::commit::commit_node;
use crate::walk::{get_from, insert, remove};
use crate::TreeInner;

/// A staged set of edits against the tree's current root.
pub struct Batch {
    pub(crate) inner: Arc<TreeInner>,
    pub(crate) root: Node,
}

impl Batch {
    /// Stage an insertion (`spec.md` §4.5 Insertion).
    pub fn insert(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Result<()> {
        let key = key.into();
        let value = value.into();
        let hasher = self.inner.store.hasher().clone();
        self.root = insert(&self.inner.store, hasher.as_ref(), std::mem::replace(&mut self.root, Node::Null), &key, &value, 0)?;
        Ok(())
    }

    /// Stage a removal (`spec.md` §4.5 Removal); a no-op if `key` is absent.
    pub fn remove(&mut self, key: &[u8]) -> Result<()> {
        let hasher = self.inner.store.hasher().clone();
        self.root = remove(&self.inner.store, hasher.as_ref(), std::mem::replace(&mut self.root, Node::Null), key, 0)?;
        Ok(())
    }

    /// Read through the batch's staged (possibly uncommitted) root.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        get_from(&self.inner.store, self.root.clone(), key)
    }

    /// Persist every staged edit, publish the new root, and return its hash
    /// (`spec.md` §4.4 Commit sequence).
    pub fn commit(mut self) -> Result<Digest> {
        let hasher = self.inner.store.hasher().clone();
        let staged = std::mem::replace(&mut self.root, Node::Null);
        let committed = commit_node(&self.inner.store, hasher.as_ref(), staged, 0, self.inner.cache_depth)?;
        let hash = committed.hash(hasher.as_ref());
        let root_ref = committed.as_node_ref()?;
        self.inner.store.commit(root_ref, hash.clone())?;
        *self.inner.root.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = committed;
        Ok(hash)
    }

    /// Drop every staged edit without touching the store.
    pub fn discard(self) {}
}

impl Drop for Batch {
    fn drop(&mut self) {
        self.inner.writing.store(false, std::sync::atomic::Ordering::Release);
    }
}
