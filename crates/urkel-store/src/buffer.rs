// crates/urkel-store/src/buffer.rs

//! The write buffer a commit stages records into before they hit disk.
//!
//! `spec.md` §4.4 describes manual capacity doubling; `Vec<u8>::extend`
//! already amortizes that, so this keeps only the behavior that actually
//! matters: splitting the buffer into per-file chunks so a single commit
//! can straddle a file-size rollover, and returning a usable [`Pointer`]
//! for every append immediately (not after `flush`), since later records
//! in the same commit reference earlier ones by pointer.

use urkel_core::pointer::Pointer;

struct Chunk {
    file_index: u16,
    file_offset_at_start: u64,
    bytes: Vec<u8>,
}

/// Staged bytes for one commit, possibly spanning a file-size rollover.
pub struct WriteBuffer {
    max_file_size: u64,
    chunks: Vec<Chunk>,
}

impl WriteBuffer {
    /// Start a fresh buffer anchored at the current end of the store:
    /// `file_index` is the file new writes should land in, `file_offset`
    /// is that file's current size.
    #[must_use]
    pub fn new(file_index: u16, file_offset: u64, max_file_size: u64) -> Self {
        Self {
            max_file_size,
            chunks: vec![Chunk { file_index, file_offset_at_start: file_offset, bytes: Vec::new() }],
        }
    }

    /// Append `bytes`, returning where they landed. Seals the current chunk
    /// and starts a new file if appending would cross `max_file_size`.
    pub fn append(&mut self, bytes: &[u8]) -> Pointer {
        self.expand(bytes.len());
        let chunk = self.chunks.last_mut().expect("buffer always has at least one chunk");
        let offset = chunk.file_offset_at_start + chunk.bytes.len() as u64;
        let file_index = chunk.file_index;
        chunk.bytes.extend_from_slice(bytes);
        Pointer::new(file_index, offset as u32)
    }

    fn expand(&mut self, n: usize) {
        let chunk = self.chunks.last().expect("buffer always has at least one chunk");
        let would_be = chunk.file_offset_at_start + chunk.bytes.len() as u64 + n as u64;
        if would_be > self.max_file_size && !chunk.bytes.is_empty() {
            let next_file_index = chunk.file_index + 1;
            self.chunks.push(Chunk { file_index: next_file_index, file_offset_at_start: 0, bytes: Vec::new() });
        }
    }

    /// Current file index new writes land in (after any rollovers so far).
    #[must_use]
    pub fn current_file_index(&self) -> u16 {
        self.chunks.last().expect("buffer always has at least one chunk").file_index
    }

    /// Current size, in bytes, of [`Self::current_file_index`] including
    /// everything staged in this buffer.
    #[must_use]
    pub fn current_file_size(&self) -> u64 {
        let chunk = self.chunks.last().expect("buffer always has at least one chunk");
        chunk.file_offset_at_start + chunk.bytes.len() as u64
    }

    /// Total buffered bytes across all chunks (used to decide when a
    /// long-running walk, e.g. compaction, should flush early).
    #[must_use]
    pub fn buffered_len(&self) -> usize {
        self.chunks.iter().map(|c| c.bytes.len()).sum()
    }

    /// Consume the buffer, handing back `(file_index, bytes)` per chunk in
    /// order, ready to be written out by the caller.
    #[must_use]
    pub fn into_chunks(self) -> Vec<(u16, Vec<u8>)> {
        self.chunks.into_iter().map(|c| (c.file_index, c.bytes)).collect()
    }
}
