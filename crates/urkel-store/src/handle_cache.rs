// crates/urkel-store/src/handle_cache.rs

//! A bounded cache of open [`RawFile`] handles (`spec.md` §4.3).
//!
//! Every read needs a handle to the file the record lives in; opening one
//! per read would thrash file descriptors once a store spans more than a
//! handful of files. The cache keeps the most recently touched handles open
//! and evicts at random rather than by strict LRU — cheap, and good enough
//! once eviction already excludes the two handles that actually matter:
//! the file currently being written to, and any handle with a read in
//! flight.

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use rand::Rng;

use crate::fs::{Fs, RawFile};
use crate::layout::data_file_name;

/// Bounded, randomly-evicting cache of open data-file handles.
pub struct HandleCache {
    fs: Arc<dyn Fs>,
    dir: PathBuf,
    capacity: usize,
    handles: Mutex<HashMap<u16, Arc<dyn RawFile>>>,
    open_locks: Mutex<HashMap<u16, Arc<Mutex<()>>>>,
}

impl HandleCache {
    /// Create a cache rooted at `dir`, holding at most `capacity` handles
    /// open at once.
    #[must_use]
    pub fn new(fs: Arc<dyn Fs>, dir: PathBuf, capacity: usize) -> Self {
        Self { fs, dir, capacity, handles: Mutex::new(HashMap::new()), open_locks: Mutex::new(HashMap::new()) }
    }

    /// Fetch the handle for `file_index`, opening it if necessary.
    /// `current_file_index` is never evicted, since the store may still
    /// have unflushed writes pending against it.
    pub fn get(&self, file_index: u16, current_file_index: u16) -> io::Result<Arc<dyn RawFile>> {
        if let Some(handle) = self.handles.lock().unwrap_or_else(std::sync::PoisonError::into_inner).get(&file_index) {
            return Ok(handle.clone());
        }

        let lock = self.open_lock_for(file_index);
        let _guard = lock.lock().unwrap_or_else(std::sync::PoisonError::into_inner);

        if let Some(handle) = self.handles.lock().unwrap_or_else(std::sync::PoisonError::into_inner).get(&file_index) {
            return Ok(handle.clone());
        }

        let path = self.dir.join(data_file_name(file_index));
        let handle = self.fs.open(&path)?;
        self.insert(file_index, handle.clone(), current_file_index);
        Ok(handle)
    }

    /// Drop a cached handle (used when a file is deleted, e.g. by
    /// compaction's atomic directory swap).
    pub fn evict_index(&self, file_index: u16) {
        self.handles.lock().unwrap_or_else(std::sync::PoisonError::into_inner).remove(&file_index);
    }

    /// Drop every cached handle.
    pub fn clear(&self) {
        self.handles.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clear();
    }

    fn open_lock_for(&self, file_index: u16) -> Arc<Mutex<()>> {
        self.open_locks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .entry(file_index)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn insert(&self, file_index: u16, handle: Arc<dyn RawFile>, current_file_index: u16) {
        let mut handles = self.handles.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if handles.len() >= self.capacity {
            Self::evict_one(&mut handles, current_file_index);
        }
        handles.insert(file_index, handle);
    }

    fn evict_one(handles: &mut HashMap<u16, Arc<dyn RawFile>>, current_file_index: u16) {
        let candidates: Vec<u16> = handles
            .iter()
            .filter(|(&idx, h)| idx != current_file_index && !h.has_outstanding_reads())
            .map(|(&idx, _)| idx)
            .collect();
        let Some(&pick) = (if candidates.is_empty() { None } else { Some(&candidates[rand::rng().random_range(0..candidates.len())]) }) else {
            // Every handle is either the current file or mid-read; let the
            // cache grow past capacity rather than risk evicting one of those.
            return;
        };
        handles.remove(&pick);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MemFs;
    use std::path::Path;

    #[test]
    fn get_opens_and_reuses_handle() {
        let fs: Arc<dyn Fs> = Arc::new(MemFs::new());
        let cache = HandleCache::new(fs.clone(), PathBuf::from("/db"), 8);
        let a = cache.get(1, 1).unwrap();
        let b = cache.get(1, 1).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(fs.exists(Path::new("/db/0000000001")));
    }

    #[test]
    fn eviction_skips_current_file() {
        let fs: Arc<dyn Fs> = Arc::new(MemFs::new());
        let cache = HandleCache::new(fs, PathBuf::from("/db"), 1);
        let _first = cache.get(1, 5).unwrap();
        // Capacity is 1; fetching a second handle must evict the first
        // since it isn't the "current" file (5) and has no reads in flight.
        let _second = cache.get(2, 5).unwrap();
        let handles = cache.handles.lock().unwrap();
        assert!(!handles.contains_key(&1));
        assert!(handles.contains_key(&2));
    }
}
