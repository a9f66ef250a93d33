// crates/urkel-store/src/fs.rs

//! The minimal filesystem surface the store needs, and two implementations:
//! a real one (`StdFs`) and an in-memory one (`MemFs`) used by tests —
//! including crash-recovery tests, which truncate "files" mid-meta without
//! ever touching a real disk.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// The exact syscall surface the store relies on (`spec.md` §4.3).
pub trait Fs: Send + Sync {
    /// Open (creating if necessary) a file for append + random-access read.
    fn open(&self, path: &Path) -> io::Result<Arc<dyn RawFile>>;
    /// List entries of a directory (bare names, not full paths).
    fn read_dir(&self, path: &Path) -> io::Result<Vec<String>>;
    /// `lstat`-equivalent existence/metadata check.
    fn exists(&self, path: &Path) -> bool;
    /// Create a directory and all missing parents.
    fn mkdir_p(&self, path: &Path) -> io::Result<()>;
    /// Rename/move a path, atomically where the OS supports it.
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;
    /// Remove a single file.
    fn unlink(&self, path: &Path) -> io::Result<()>;
    /// Remove an (empty) directory.
    fn rmdir(&self, path: &Path) -> io::Result<()>;
}

/// One open file: append-only writes, random-access reads, explicit sync.
///
/// Implementations track an outstanding-read counter so the store's handle
/// cache can avoid evicting a file while a read is in flight.
pub trait RawFile: Send + Sync {
    /// Current size in bytes.
    fn size(&self) -> io::Result<u64>;
    /// Read `len` bytes starting at `offset`.
    fn read(&self, offset: u64, len: usize) -> io::Result<Vec<u8>>;
    /// Append `bytes`, returning the offset the write started at (the
    /// pre-write size).
    fn write(&self, bytes: &[u8]) -> io::Result<u64>;
    /// Truncate to `size` bytes (used only during recovery).
    fn truncate(&self, size: u64) -> io::Result<()>;
    /// Flush to stable storage.
    fn sync(&self) -> io::Result<()>;
    /// Whether a read is currently in flight against this handle.
    fn has_outstanding_reads(&self) -> bool;
}

/// RAII guard incrementing/decrementing a handle's outstanding-read counter.
pub struct ReadGuard<'a> {
    counter: &'a std::sync::atomic::AtomicUsize,
}

impl<'a> ReadGuard<'a> {
    #[must_use]
    pub fn enter(counter: &'a std::sync::atomic::AtomicUsize) -> Self {
        counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Self { counter }
    }
}

impl Drop for ReadGuard<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, std::sync::atomic::Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------
// StdFs: the real filesystem.
// ---------------------------------------------------------------------

/// Disk-backed [`Fs`] using `std::fs`.
#[derive(Clone, Copy, Debug, Default)]
pub struct StdFs;

struct StdRawFile {
    file: Mutex<std::fs::File>,
    reads: std::sync::atomic::AtomicUsize,
}

impl RawFile for StdRawFile {
    fn size(&self) -> io::Result<u64> {
        let f = self.file.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(f.metadata()?.len())
    }

    fn read(&self, offset: u64, len: usize) -> io::Result<Vec<u8>> {
        use std::io::{Read, Seek, SeekFrom};
        let _guard = ReadGuard::enter(&self.reads);
        let mut f = self.file.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        f.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; len];
        f.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn write(&self, bytes: &[u8]) -> io::Result<u64> {
        use std::io::{Seek, SeekFrom, Write};
        let mut f = self.file.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let offset = f.seek(SeekFrom::End(0))?;
        f.write_all(bytes)?;
        Ok(offset)
    }

    fn truncate(&self, size: u64) -> io::Result<()> {
        let f = self.file.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        f.set_len(size)
    }

    fn sync(&self) -> io::Result<()> {
        let f = self.file.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        f.sync_all()
    }

    fn has_outstanding_reads(&self) -> bool {
        self.reads.load(std::sync::atomic::Ordering::SeqCst) > 0
    }
}

impl Fs for StdFs {
    fn open(&self, path: &Path) -> io::Result<Arc<dyn RawFile>> {
        let file = std::fs::OpenOptions::new().create(true).read(true).write(true).open(path)?;
        Ok(Arc::new(StdRawFile { file: Mutex::new(file), reads: std::sync::atomic::AtomicUsize::new(0) }))
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<String>> {
        let mut out = Vec::new();
        for entry in std::fs::read_dir(path)? {
            out.push(entry?.file_name().to_string_lossy().into_owned());
        }
        Ok(out)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn mkdir_p(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        std::fs::rename(from, to)
    }

    fn unlink(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_file(path)
    }

    fn rmdir(&self, path: &Path) -> io::Result<()> {
        std::fs::remove_dir(path)
    }
}

// ---------------------------------------------------------------------
// MemFs: in-memory filesystem for tests.
// ---------------------------------------------------------------------

#[derive(Default)]
struct MemFile {
    data: Vec<u8>,
}

struct MemRawFile {
    inner: Mutex<MemFile>,
    reads: std::sync::atomic::AtomicUsize,
}

impl RawFile for MemRawFile {
    fn size(&self) -> io::Result<u64> {
        Ok(self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner).data.len() as u64)
    }

    fn read(&self, offset: u64, len: usize) -> io::Result<Vec<u8>> {
        let _guard = ReadGuard::enter(&self.reads);
        let f = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let start = offset as usize;
        let end = start.checked_add(len).ok_or_else(|| io::Error::from(io::ErrorKind::UnexpectedEof))?;
        if end > f.data.len() {
            return Err(io::Error::from(io::ErrorKind::UnexpectedEof));
        }
        Ok(f.data[start..end].to_vec())
    }

    fn write(&self, bytes: &[u8]) -> io::Result<u64> {
        let mut f = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let offset = f.data.len() as u64;
        f.data.extend_from_slice(bytes);
        Ok(offset)
    }

    fn truncate(&self, size: u64) -> io::Result<()> {
        let mut f = self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        f.data.truncate(size as usize);
        Ok(())
    }

    fn sync(&self) -> io::Result<()> {
        Ok(())
    }

    fn has_outstanding_reads(&self) -> bool {
        self.reads.load(std::sync::atomic::Ordering::SeqCst) > 0
    }
}

/// In-memory [`Fs`], keyed by normalized path string. Directory operations
/// are tracked loosely (a set of known directory prefixes) since tests only
/// need `read_dir`/`exists`/`mkdir_p`/`rename` to behave consistently with
/// each other, not to model full POSIX semantics.
#[derive(Clone, Default)]
pub struct MemFs {
    files: Arc<Mutex<HashMap<PathBuf, Arc<MemRawFile>>>>,
    dirs: Arc<Mutex<std::collections::HashSet<PathBuf>>>,
}

impl MemFs {
    /// Construct a fresh, empty in-memory filesystem.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Fs for MemFs {
    fn open(&self, path: &Path) -> io::Result<Arc<dyn RawFile>> {
        let mut files = self.files.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let handle = files
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(MemRawFile { inner: Mutex::new(MemFile::default()), reads: std::sync::atomic::AtomicUsize::new(0) }))
            .clone();
        if let Some(parent) = path.parent() {
            self.dirs.lock().unwrap_or_else(std::sync::PoisonError::into_inner).insert(parent.to_path_buf());
        }
        Ok(handle)
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<String>> {
        let files = self.files.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut names: Vec<String> = files
            .keys()
            .filter_map(|p| {
                if p.parent() == Some(path) {
                    p.file_name().map(|n| n.to_string_lossy().into_owned())
                } else {
                    None
                }
            })
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    fn exists(&self, path: &Path) -> bool {
        let files = self.files.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if files.contains_key(path) {
            return true;
        }
        self.dirs.lock().unwrap_or_else(std::sync::PoisonError::into_inner).contains(path)
    }

    fn mkdir_p(&self, path: &Path) -> io::Result<()> {
        self.dirs.lock().unwrap_or_else(std::sync::PoisonError::into_inner).insert(path.to_path_buf());
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        let mut files = self.files.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let moved: Vec<(PathBuf, Arc<MemRawFile>)> = files
            .iter()
            .filter(|(p, _)| p.starts_with(from))
            .map(|(p, h)| (p.clone(), h.clone()))
            .collect();
        if moved.is_empty() && !files.contains_key(from) {
            return Err(io::Error::from(io::ErrorKind::NotFound));
        }
        for (p, h) in moved {
            let rel = p.strip_prefix(from).unwrap_or(&p);
            let new_path = to.join(rel);
            files.remove(&p);
            files.insert(new_path, h);
        }
        let mut dirs = self.dirs.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        dirs.insert(to.to_path_buf());
        dirs.remove(from);
        Ok(())
    }

    fn unlink(&self, path: &Path) -> io::Result<()> {
        let mut files = self.files.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        files.remove(path).map(|_| ()).ok_or_else(|| io::Error::from(io::ErrorKind::NotFound))
    }

    fn rmdir(&self, path: &Path) -> io::Result<()> {
        self.dirs.lock().unwrap_or_else(std::sync::PoisonError::into_inner).remove(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mem_fs_write_read_roundtrip() {
        let fs = MemFs::new();
        let f = fs.open(Path::new("/x/0000000001")).unwrap();
        let off = f.write(b"hello").unwrap();
        assert_eq!(off, 0);
        assert_eq!(f.read(0, 5).unwrap(), b"hello");
        let off2 = f.write(b"!").unwrap();
        assert_eq!(off2, 5);
        assert_eq!(f.size().unwrap(), 6);
    }

    #[test]
    fn mem_fs_truncate() {
        let fs = MemFs::new();
        let f = fs.open(Path::new("/a")).unwrap();
        f.write(b"0123456789").unwrap();
        f.truncate(4).unwrap();
        assert_eq!(f.size().unwrap(), 4);
        assert_eq!(f.read(0, 4).unwrap(), b"0123");
    }

    #[test]
    fn mem_fs_rename_moves_prefix() {
        let fs = MemFs::new();
        fs.open(Path::new("/old/0000000001")).unwrap().write(b"a").unwrap();
        fs.rename(Path::new("/old"), Path::new("/new")).unwrap();
        assert!(fs.exists(Path::new("/new/0000000001")));
        assert!(!fs.exists(Path::new("/old/0000000001")));
    }
}
