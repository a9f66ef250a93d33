// crates/urkel-store/src/store.rs

//! The append-only, multi-file log store (`spec.md` §4.3-§4.4, §6).
//!
//! `Store` owns the on-disk layout and the meta chain; it knows nothing
//! about tree shape or keys beyond what it needs to decode a node record.
//! Tree-walking (`urkel-tree`) builds on top of it. [`Store::commit`] takes
//! `&self` — internal mutable state lives behind a `Mutex<WriterState>` —
//! so this crate itself does not enforce the single-writer rule `spec.md`
//! §5 assumes; that's `urkel-tree`'s job (`Tree::batch`'s `AtomicBool`
//! guard). The mutex here only protects `WriterState`'s invariants against
//! being torn by calling `commit`/`stage_*` from multiple threads at once,
//! it is not the single-writer mechanism itself. Readers (`get_node`/
//! `get_value`) may run concurrently with each other and with a writer's
//! reads of already committed data.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rand::RngCore;
use tracing::{debug, info, warn};

use urkel_core::error::{Error, Result};
use urkel_core::hasher::{Digest, HashAdapter};
use urkel_core::node::{Node, NodeRef};
use urkel_core::pointer::{Pointer, SizedPointer};
use urkel_core::{MAX_FILE_SIZE, UNWRITTEN_FILE_INDEX};

use crate::buffer::WriteBuffer;
use crate::fs::Fs;
use crate::handle_cache::HandleCache;
use crate::layout::{data_file_name, parse_data_file_name, MAC_KEY_FILE_NAME};
use crate::meta::Meta;

/// Size of the trailing window scanned backward for a valid meta record
/// during recovery (`spec.md` §6): bounded so recovery cost doesn't scale
/// with an arbitrarily large file, only with how much of the tail a crash
/// could plausibly have torn.
const RECOVERY_SLAB: u64 = 1 << 20;

/// Tunables for opening or creating a store.
#[derive(Clone)]
pub struct StoreOptions {
    /// Hash function the whole store is keyed on; fixed for the store's
    /// lifetime once created.
    pub hasher: Arc<dyn HashAdapter>,
    /// Maximum size, in bytes, of a single data file before rolling over.
    pub max_file_size: u64,
    /// Maximum number of file handles kept open at once.
    pub handle_cache_capacity: usize,
}

impl StoreOptions {
    /// Defaults for `hasher`, matching `spec.md`'s `MAX_FILE_SIZE` and a
    /// modest handle cache.
    #[must_use]
    pub fn new(hasher: Arc<dyn HashAdapter>) -> Self {
        Self { hasher, max_file_size: MAX_FILE_SIZE, handle_cache_capacity: 32 }
    }
}

struct WriterState {
    /// The last committed meta record.
    meta: Meta,
    /// Where the next meta record (and any writes before it) will land.
    write_buffer: WriteBuffer,
    /// In-memory map from a historically-seen root hash to where its root
    /// node lives, so re-opening an old root (`spec.md` §4.7) doesn't
    /// require re-walking the meta chain from scratch.
    root_cache: std::collections::HashMap<Digest, NodeRef>,
}

/// An open urkel store.
pub struct Store {
    fs: Arc<dyn Fs>,
    dir: PathBuf,
    hasher: Arc<dyn HashAdapter>,
    mac_key: Vec<u8>,
    handle_cache: HandleCache,
    max_file_size: u64,
    state: Mutex<WriterState>,
}

impl Store {
    /// Open an existing store directory, or create one if absent, running
    /// crash recovery (`spec.md` §6) when a prior writer left a torn tail.
    pub fn open(dir: impl AsRef<Path>, fs: Arc<dyn Fs>, options: StoreOptions) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs.mkdir_p(&dir).map_err(|e| Error::io("mkdir", 0, 0, 0, e))?;

        let mac_key = load_or_create_mac_key(fs.as_ref(), &dir)?;
        let hasher = options.hasher;
        if hasher.key_bits() == 0 || hasher.key_bits() % 8 != 0 {
            return Err(Error::assertion(format!(
                "key_bits must be a positive multiple of 8, got {}",
                hasher.key_bits()
            )));
        }

        let entries = fs.read_dir(&dir).map_err(|e| Error::io("read_dir", 0, 0, 0, e))?;
        let max_index = entries.iter().filter_map(|name| parse_data_file_name(name)).max().unwrap_or(0);

        let (meta, file_index, file_offset) = if max_index == 0 {
            info!(dir = %dir.display(), "initializing empty store");
            (Meta { meta_ptr_prev: Pointer::NULL, root_ref: NodeRef::NULL, root_hash: hasher.zero() }, 1, 0)
        } else {
            match find_last_valid_meta(fs.as_ref(), &dir, hasher.as_ref(), &mac_key, max_index)? {
                Some((file_index, truncate_to, meta)) => {
                    let path = dir.join(data_file_name(file_index));
                    let handle = fs.open(&path).map_err(|e| Error::io("open", file_index, 0, 0, e))?;
                    let size = handle.size().map_err(|e| Error::io("stat", file_index, 0, 0, e))?;
                    if size > truncate_to {
                        warn!(
                            file_index,
                            torn_bytes = size - truncate_to,
                            "recovery: truncating torn tail after last valid meta record"
                        );
                        handle.truncate(truncate_to).map_err(|e| Error::io("truncate", file_index, truncate_to, 0, e))?;
                    }
                    (meta, file_index, truncate_to)
                }
                None => {
                    warn!("recovery: no valid meta record found in any data file, starting empty");
                    (Meta { meta_ptr_prev: Pointer::NULL, root_ref: NodeRef::NULL, root_hash: hasher.zero() }, 1, 0)
                }
            }
        };

        let handle_cache = HandleCache::new(fs.clone(), dir.clone(), options.handle_cache_capacity);
        let write_buffer = WriteBuffer::new(file_index, file_offset, options.max_file_size);

        Ok(Self {
            fs,
            dir,
            hasher,
            mac_key,
            handle_cache,
            max_file_size: options.max_file_size,
            state: Mutex::new(WriterState { meta, write_buffer, root_cache: std::collections::HashMap::new() }),
        })
    }

    /// The hash adapter this store is keyed on.
    #[must_use]
    pub fn hasher(&self) -> &Arc<dyn HashAdapter> {
        &self.hasher
    }

    /// The currently committed root's reference.
    #[must_use]
    pub fn root_ref(&self) -> NodeRef {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner).meta.root_ref
    }

    /// The currently committed root's Merkle hash.
    #[must_use]
    pub fn root_hash(&self) -> Digest {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner).meta.root_hash.clone()
    }

    /// Resolve a [`NodeRef`] into a decoded [`Node::Internal`]/[`Node::Leaf`].
    ///
    /// `known_hash` must be the hash carried by whatever reference produced
    /// `at` (a parent's child slot, or the committed root hash) — the
    /// record on disk never stores its own hash.
    pub fn get_node(&self, at: NodeRef, known_hash: Digest) -> Result<Node> {
        if at == NodeRef::NULL {
            return Ok(Node::Null);
        }
        let size = if at.is_leaf {
            leaf_record_size(self.hasher.key_size())
        } else {
            internal_record_size(self.hasher.size())
        };
        let bytes = self.read_at(at.file_index, u64::from(at.offset), size)?;
        Node::decode(self.hasher.as_ref(), &bytes, at.is_leaf, known_hash, self.hasher.key_size(), at.file_index, at.offset)
    }

    /// Fetch a value previously staged at `ptr`.
    pub fn get_value(&self, ptr: SizedPointer) -> Result<Vec<u8>> {
        self.read_at(ptr.ptr.file_index, u64::from(ptr.ptr.offset), ptr.size as usize)
    }

    fn read_at(&self, file_index: u16, offset: u64, len: usize) -> Result<Vec<u8>> {
        let current = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner).write_buffer.current_file_index();
        let handle = self
            .handle_cache
            .get(file_index, current)
            .map_err(|e| Error::io("open", file_index, offset, len as u64, e))?;
        handle.read(offset, len).map_err(|e| Error::io("read", file_index, offset, len as u64, e))
    }

    /// Append raw value bytes, returning where they landed. Part of a
    /// commit in progress; not yet durable until [`Store::commit`] fsyncs.
    pub fn stage_value(&self, bytes: &[u8]) -> Result<SizedPointer> {
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let ptr = state.write_buffer.append(bytes);
        Ok(SizedPointer::new(ptr, bytes.len() as u16))
    }

    /// Append an already-encoded node record, returning where it landed.
    pub fn stage_node_bytes(&self, bytes: &[u8]) -> Result<Pointer> {
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(state.write_buffer.append(bytes))
    }

    /// The file index new writes currently land in.
    #[must_use]
    pub fn current_file_index(&self) -> u16 {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner).write_buffer.current_file_index()
    }

    /// The file-size cap this store rolls over at.
    #[must_use]
    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// Flush staged writes, append the new meta record, fsync, and publish
    /// the new root — the only durability boundary in the store
    /// (`spec.md` §4.4). `root_ref`/`root_hash` must describe a tree whose
    /// every node has already been staged via [`Store::stage_node_bytes`].
    pub fn commit(&self, root_ref: NodeRef, root_hash: Digest) -> Result<()> {
        let mut state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);

        let meta = Meta { meta_ptr_prev: state.meta.meta_ptr_prev, root_ref, root_hash: root_hash.clone() };
        let meta_bytes = meta.encode(self.hasher.as_ref(), &self.mac_key);
        let meta_ptr = state.write_buffer.append(&meta_bytes);

        let chunks = std::mem::replace(
            &mut state.write_buffer,
            WriteBuffer::new(meta_ptr.file_index, 0, self.max_file_size),
        )
        .into_chunks();

        for (file_index, bytes) in &chunks {
            if bytes.is_empty() {
                continue;
            }
            let handle = self
                .handle_cache
                .get(*file_index, meta_ptr.file_index)
                .map_err(|e| Error::io("open", *file_index, 0, bytes.len() as u64, e))?;
            handle.write(bytes).map_err(|e| Error::io("write", *file_index, 0, bytes.len() as u64, e))?;
        }
        let final_handle = self
            .handle_cache
            .get(meta_ptr.file_index, meta_ptr.file_index)
            .map_err(|e| Error::io("open", meta_ptr.file_index, 0, 0, e))?;
        final_handle.sync().map_err(|e| Error::io("sync", meta_ptr.file_index, 0, 0, e))?;

        let new_size = final_handle.size().map_err(|e| Error::io("stat", meta_ptr.file_index, 0, 0, e))?;
        state.write_buffer = WriteBuffer::new(meta_ptr.file_index, new_size, self.max_file_size);
        state.root_cache.insert(root_hash.clone(), root_ref);

        debug!(
            file_index = meta_ptr.file_index,
            offset = meta_ptr.offset,
            root_hash = %hex::encode(&root_hash),
            "committed"
        );

        state.meta = Meta { meta_ptr_prev: meta_ptr, root_ref, root_hash };
        Ok(())
    }

    /// Walk the meta chain backward from the current head, yielding each
    /// historical [`Meta`] in most-recent-first order (`spec.md` §4.7).
    pub fn history(&self) -> Result<Vec<Meta>> {
        let state = self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut out = Vec::new();
        let mut cursor = state.meta.meta_ptr_prev;
        out.push(state.meta.clone());
        while cursor.is_written() {
            let size = Meta::encoded_size(self.hasher.size());
            let bytes = self.read_at(cursor.file_index, u64::from(cursor.offset), size)?;
            let meta = Meta::decode(&bytes, self.hasher.as_ref(), &self.mac_key, cursor.offset as usize)?;
            cursor = meta.meta_ptr_prev;
            out.push(meta);
        }
        Ok(out)
    }

    /// Look up a previously-seen root's location by its hash, without
    /// walking the whole meta chain, if it's already in the in-memory
    /// cache populated by [`Store::commit`].
    #[must_use]
    pub fn cached_root(&self, root_hash: &[u8]) -> Option<NodeRef> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .root_cache
            .get(root_hash)
            .copied()
    }

    /// The directory this store lives in.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The underlying filesystem abstraction (used by compaction to write
    /// a sibling directory before the atomic swap).
    #[must_use]
    pub fn fs(&self) -> &Arc<dyn Fs> {
        &self.fs
    }
}

/// Fixed size of an internal node record for a `hash_size`-byte hash.
#[must_use]
pub fn internal_record_size(hash_size: usize) -> usize {
    2 * (NodeRef::ENCODED_SIZE + hash_size)
}

/// Fixed size of a leaf node record: keys are always exactly `key_size`
/// bytes (the adapter's `key_bits() / 8`, independent of its digest width),
/// so this never varies per-key.
#[must_use]
pub fn leaf_record_size(key_size: usize) -> usize {
    2 + 4 + 2 + key_size
}

fn load_or_create_mac_key(fs: &dyn Fs, dir: &Path) -> Result<Vec<u8>> {
    let path = dir.join(MAC_KEY_FILE_NAME);
    if fs.exists(&path) {
        let handle = fs.open(&path).map_err(|e| Error::io("open", UNWRITTEN_FILE_INDEX, 0, 0, e))?;
        let size = handle.size().map_err(|e| Error::io("stat", UNWRITTEN_FILE_INDEX, 0, 0, e))?;
        handle.read(0, size as usize).map_err(|e| Error::io("read", UNWRITTEN_FILE_INDEX, 0, size, e))
    } else {
        let mut key = vec![0u8; 32];
        rand::rng().fill_bytes(&mut key);
        let handle = fs.open(&path).map_err(|e| Error::io("open", UNWRITTEN_FILE_INDEX, 0, 0, e))?;
        handle.write(&key).map_err(|e| Error::io("write", UNWRITTEN_FILE_INDEX, 0, 32, e))?;
        handle.sync().map_err(|e| Error::io("sync", UNWRITTEN_FILE_INDEX, 0, 0, e))?;
        Ok(key)
    }
}

/// Scan backward from `max_file_index` for the most recent valid meta
/// record, returning `(file_index, offset_just_past_record, meta)` so the
/// caller can truncate away anything written after it.
fn find_last_valid_meta(
    fs: &dyn Fs,
    dir: &Path,
    hasher: &dyn HashAdapter,
    mac_key: &[u8],
    max_file_index: u16,
) -> Result<Option<(u16, u64, Meta)>> {
    let meta_size = Meta::encoded_size(hasher.size()) as u64;
    let mut file_index = max_file_index;
    loop {
        let path = dir.join(data_file_name(file_index));
        if fs.exists(&path) {
            let handle = fs.open(&path).map_err(|e| Error::io("open", file_index, 0, 0, e))?;
            let size = handle.size().map_err(|e| Error::io("stat", file_index, 0, 0, e))?;
            if size >= meta_size {
                let window_start = size.saturating_sub(RECOVERY_SLAB);
                let slab = handle
                    .read(window_start, (size - window_start) as usize)
                    .map_err(|e| Error::io("read", file_index, window_start, size - window_start, e))?;
                let max_off = slab.len() as u64 - meta_size;
                let mut off = max_off as i64;
                while off >= 0 {
                    let o = off as usize;
                    if let Some(meta) = Meta::try_decode(&slab[o..o + meta_size as usize], hasher, mac_key) {
                        let abs_offset = window_start + off as u64;
                        return Ok(Some((file_index, abs_offset + meta_size, meta)));
                    }
                    off -= 1;
                }
            }
            // No meta record anywhere in this file (`spec.md` §4.4: "if no
            // meta is found in the file, delete it and try the previous
            // file"). A crash can leave a data file with no meta at all —
            // e.g. every write in it was torn, or it was only ever opened
            // and never committed to — and such a file would otherwise be
            // an undeletable orphan forever.
            warn!(file_index, "recovery: no meta record in file, deleting orphan");
            fs.unlink(&path).map_err(|e| Error::io("unlink", file_index, 0, 0, e))?;
        }
        if file_index <= 1 {
            return Ok(None);
        }
        file_index -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemFs;
    use urkel_crypto::Blake3Adapter;

    fn opts() -> StoreOptions {
        let mut o = StoreOptions::new(Arc::new(Blake3Adapter));
        o.max_file_size = 4096;
        o
    }

    #[test]
    fn fresh_store_is_empty() {
        let fs: Arc<dyn Fs> = Arc::new(MemFs::new());
        let store = Store::open("/db", fs, opts()).unwrap();
        assert_eq!(store.root_ref(), NodeRef::NULL);
        assert_eq!(store.root_hash(), store.hasher().zero());
    }

    #[test]
    fn commit_then_get_node_roundtrip() {
        let fs: Arc<dyn Fs> = Arc::new(MemFs::new());
        let store = Store::open("/db", fs, opts()).unwrap();
        let hasher = store.hasher().clone();

        let key = hasher.digest(b"k");
        let value_ptr = store.stage_value(b"hello").unwrap();
        let leaf_hash = hasher.hash_value(&key, b"hello");
        let leaf_bytes = {
            let mut buf = Vec::new();
            buf.extend_from_slice(&value_ptr.ptr.file_index.to_le_bytes());
            buf.extend_from_slice(&value_ptr.ptr.offset.to_le_bytes());
            buf.extend_from_slice(&value_ptr.size.to_le_bytes());
            buf.extend_from_slice(&key);
            buf
        };
        let leaf_ptr = store.stage_node_bytes(&leaf_bytes).unwrap();
        let leaf_ref = NodeRef { file_index: leaf_ptr.file_index, offset: leaf_ptr.offset, is_leaf: true };
        store.commit(leaf_ref, leaf_hash.clone()).unwrap();

        assert_eq!(store.root_hash(), leaf_hash);
        let node = store.get_node(leaf_ref, leaf_hash).unwrap();
        match node {
            Node::Leaf { key: got_key, value_ptr: got_ptr, .. } => {
                assert_eq!(got_key, key);
                assert_eq!(store.get_value(got_ptr).unwrap(), b"hello");
            }
            _ => panic!("expected leaf"),
        }
    }

    #[test]
    fn reopen_recovers_committed_root() {
        let fs: Arc<dyn Fs> = Arc::new(MemFs::new());
        let root_hash;
        let root_ref;
        {
            let store = Store::open("/db", fs.clone(), opts()).unwrap();
            let hasher = store.hasher().clone();
            let key = hasher.digest(b"k");
            let value_ptr = store.stage_value(b"v").unwrap();
            let leaf_hash = hasher.hash_value(&key, b"v");
            let mut buf = Vec::new();
            buf.extend_from_slice(&value_ptr.ptr.file_index.to_le_bytes());
            buf.extend_from_slice(&value_ptr.ptr.offset.to_le_bytes());
            buf.extend_from_slice(&value_ptr.size.to_le_bytes());
            buf.extend_from_slice(&key);
            let leaf_ptr = store.stage_node_bytes(&buf).unwrap();
            let leaf_ref = NodeRef { file_index: leaf_ptr.file_index, offset: leaf_ptr.offset, is_leaf: true };
            store.commit(leaf_ref, leaf_hash.clone()).unwrap();
            root_hash = leaf_hash;
            root_ref = leaf_ref;
        }
        let reopened = Store::open("/db", fs, opts()).unwrap();
        assert_eq!(reopened.root_hash(), root_hash);
        assert_eq!(reopened.root_ref(), root_ref);
    }

    #[test]
    fn recovery_truncates_torn_tail() {
        let fs: Arc<dyn Fs> = Arc::new(MemFs::new());
        {
            let store = Store::open("/db", fs.clone(), opts()).unwrap();
            store.commit(NodeRef::NULL, store.hasher().zero()).unwrap();
        }
        // Simulate a crash mid-write: append garbage after the last valid meta.
        let path = Path::new("/db/0000000001");
        let handle = fs.open(path).unwrap();
        handle.write(b"torn-garbage-not-a-meta-record").unwrap();
        let size_before = handle.size().unwrap();

        let reopened = Store::open("/db", fs.clone(), opts()).unwrap();
        assert_eq!(reopened.root_ref(), NodeRef::NULL);
        let handle_after = fs.open(path).unwrap();
        assert!(handle_after.size().unwrap() < size_before);
    }

    #[test]
    fn recovery_deletes_a_data_file_with_no_meta_at_all() {
        let fs: Arc<dyn Fs> = Arc::new(MemFs::new());
        {
            let store = Store::open("/db", fs.clone(), opts()).unwrap();
            store.commit(NodeRef::NULL, store.hasher().zero()).unwrap();
        }
        // A later file exists (e.g. a rollover started) but never got a
        // meta record committed into it before the crash.
        let orphan = Path::new("/db/0000000002");
        let handle = fs.open(orphan).unwrap();
        handle.write(b"some node bytes but never a meta record").unwrap();

        let reopened = Store::open("/db", fs.clone(), opts()).unwrap();
        assert_eq!(reopened.current_file_index(), 1, "recovery must fall back to the last file that actually has a meta");
        assert!(!fs.exists(orphan), "a data file with no meta record must be deleted during recovery");
    }

    #[test]
    fn key_bits_must_be_a_positive_multiple_of_eight() {
        let fs: Arc<dyn Fs> = Arc::new(MemFs::new());
        struct BadAdapter;
        impl HashAdapter for BadAdapter {
            fn size(&self) -> usize {
                32
            }
            fn key_bits(&self) -> usize {
                13
            }
            fn digest(&self, bytes: &[u8]) -> Vec<u8> {
                Blake3Adapter.digest(bytes)
            }
            fn init(&self) -> Box<dyn urkel_core::hasher::HashContext> {
                Blake3Adapter.init()
            }
        }
        let err = Store::open("/db", fs, StoreOptions::new(Arc::new(BadAdapter))).unwrap_err();
        assert!(matches!(err, Error::Assertion { .. }));
    }
}
