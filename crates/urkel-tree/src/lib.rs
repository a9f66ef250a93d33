// crates/urkel-tree/src/lib.rs

//! The urkel tree engine: lookup/insert/remove over lazily-resolved,
//! disk-backed nodes, a generational in-memory cache, read-only snapshots
//! at any historical root, staged batches, and background compaction
//! (`spec.md` §4.5-§4.8).
//!
//! This crate is the library surface described in `spec.md` §6: `Tree`,
//! `Snapshot`, `Batch`, wired on top of `urkel-store`'s durability layer
//! and `urkel-proof`'s witness format.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]

mod batch;
mod commit;
mod compaction;
mod history;
mod path;
mod secure;
mod snapshot;
mod walk;

use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use urkel_core::error::Result;
use urkel_core::hasher::{Digest, HashAdapter};
use urkel_core::node::Node;
use urkel_store::{Fs, Store, StoreOptions};

pub use batch::Batch;
pub use secure::{hash_key, SecureBatch, SecureSnapshot, SecureTree};
pub use snapshot::Snapshot;
pub use urkel_proof::{Proof, VerifyCode};

/// Tunables for opening or creating a tree.
#[derive(Clone)]
pub struct TreeOptions {
    /// Passed straight through to [`urkel_store::Store::open`].
    pub store: StoreOptions,
    /// Depth below which committed nodes are demoted to lazy pointers
    /// (`spec.md` §4.5 Generational caching).
    pub cache_depth: usize,
}

impl TreeOptions {
    /// Defaults: [`urkel_core::DEFAULT_CACHE_DEPTH`] and
    /// [`StoreOptions::new`]'s defaults.
    #[must_use]
    pub fn new(hasher: Arc<dyn HashAdapter>) -> Self {
        Self { store: StoreOptions::new(hasher), cache_depth: urkel_core::DEFAULT_CACHE_DEPTH }
    }
}

/// Counters returned by [`Tree::stats`].
#[derive(Clone, Debug)]
pub struct TreeStats {
    /// The currently committed root's Merkle hash.
    pub root_hash: Digest,
    /// Number of meta records reachable by walking back from the current
    /// head, including the head itself.
    pub history_depth: usize,
    /// The data file index new writes currently land in.
    pub current_file_index: u16,
}

pub(crate) struct TreeInner {
    store: Arc<Store>,
    cache_depth: usize,
    root: Mutex<Node>,
    /// Enforces `spec.md` §5's single-writer invariant: only one `Batch`
    /// may be outstanding against a tree at a time.
    writing: AtomicBool,
}

/// An open urkel tree: the durable store plus the top-of-tree resolved
/// nodes the generational cache keeps warm across commits.
#[derive(Clone)]
pub struct Tree(Arc<TreeInner>);

impl Tree {
    /// Open (or create) a tree rooted at `dir` (`spec.md` §6 `open`).
    pub fn open(dir: impl AsRef<Path>, fs: Arc<dyn Fs>, options: TreeOptions) -> Result<Self> {
        let store = Store::open(dir, fs, options.store)?;
        let root = Node::Hash { hash: store.root_hash(), at: store.root_ref() };
        Ok(Self(Arc::new(TreeInner {
            store: Arc::new(store),
            cache_depth: options.cache_depth,
            root: Mutex::new(root),
            writing: AtomicBool::new(false),
        })))
    }

    /// The hash adapter this tree is keyed on.
    #[must_use]
    pub fn hasher(&self) -> Arc<dyn HashAdapter> {
        self.0.store.hasher().clone()
    }

    /// The currently committed root's Merkle hash.
    #[must_use]
    pub fn root_hash(&self) -> Digest {
        self.0.store.root_hash()
    }

    /// Look up `key` as of the currently committed root.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let root = self.0.root.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone();
        walk::get_from(&self.0.store, root, key)
    }

    /// A read-only view at `root_hash`, or the current root if `None`
    /// (`spec.md` §6 `tree.snapshot`).
    pub fn snapshot(&self, root_hash: Option<Digest>) -> Result<Snapshot> {
        let root = match root_hash {
            Some(hash) => history::resolve_root(&self.0.store, &hash)?,
            None => self.0.root.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone(),
        };
        Ok(Snapshot { store: self.0.store.clone(), root })
    }

    /// Stage a new set of edits against the current root (`spec.md` §6
    /// `tree.batch`).
    ///
    /// # Panics
    /// If another `Batch` against this tree is already outstanding — the
    /// single-writer invariant (`spec.md` §5) is a programming error to
    /// violate, not a recoverable condition.
    #[must_use]
    pub fn batch(&self) -> Batch {
        let already_writing = self.0.writing.swap(true, std::sync::atomic::Ordering::AcqRel);
        assert!(!already_writing, "urkel: concurrent batch on the same tree");
        let root = self.0.root.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone();
        Batch { inner: self.0.clone(), root }
    }

    /// Rewrite the live tree into a fresh file generation and reopen
    /// (`spec.md` §4.8, §6 `tree.compact`). All older root history is
    /// lost; the returned tree's root hash is unchanged.
    pub fn compact(&self) -> Result<Self> {
        let new_store = compaction::compact(&self.0.store, self.0.cache_depth)?;
        let root = Node::Hash { hash: new_store.root_hash(), at: new_store.root_ref() };
        Ok(Self(Arc::new(TreeInner {
            store: Arc::new(new_store),
            cache_depth: self.0.cache_depth,
            root: Mutex::new(root),
            writing: AtomicBool::new(false),
        })))
    }

    /// A handful of counters useful for diagnostics (`urkel-cli stats`).
    pub fn stats(&self) -> Result<TreeStats> {
        Ok(TreeStats {
            root_hash: self.root_hash(),
            history_depth: self.0.store.history()?.len(),
            current_file_index: self.0.store.current_file_index(),
        })
    }

    /// Close the tree, dropping all open file handles.
    pub fn close(self) {
        drop(self);
    }

    /// Close the tree and remove its directory entirely.
    pub fn destroy(self) -> Result<()> {
        let fs = self.0.store.fs().clone();
        let dir = self.0.store.dir().to_path_buf();
        drop(self);
        for name in fs.read_dir(&dir).map_err(|e| urkel_core::error::Error::io("read_dir", 0, 0, 0, e))? {
            fs.unlink(&dir.join(name)).map_err(|e| urkel_core::error::Error::io("unlink", 0, 0, 0, e))?;
        }
        fs.rmdir(&dir).map_err(|e| urkel_core::error::Error::io("rmdir", 0, 0, 0, e))
    }
}
