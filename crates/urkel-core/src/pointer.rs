// crates/urkel-core/src/pointer.rs

//! Physical location of a record inside the append-only file set.

use serde::{Deserialize, Serialize};

/// `file_index == 0` is reserved for "not yet persisted".
pub const UNWRITTEN_FILE_INDEX: u16 = 0;

/// `(file_index, offset)` pair locating a record in the store.
///
/// Encoded on disk as `u16` file index (LE) followed by `u32` offset (LE).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pointer {
    /// Which data file the record lives in. `0` means unwritten.
    pub file_index: u16,
    /// Byte offset of the record within that file.
    pub offset: u32,
}

impl Pointer {
    /// The null pointer: unwritten, offset 0.
    pub const NULL: Self = Self { file_index: UNWRITTEN_FILE_INDEX, offset: 0 };

    /// Construct a pointer to a written record.
    #[must_use]
    pub const fn new(file_index: u16, offset: u32) -> Self {
        Self { file_index, offset }
    }

    /// Whether this pointer has ever been written.
    #[must_use]
    pub const fn is_written(&self) -> bool {
        self.file_index != UNWRITTEN_FILE_INDEX
    }

    /// Encode as the 6-byte on-disk representation (`u16` LE ‖ `u32` LE).
    #[must_use]
    pub fn to_bytes(self) -> [u8; 6] {
        let mut buf = [0u8; 6];
        buf[0..2].copy_from_slice(&self.file_index.to_le_bytes());
        buf[2..6].copy_from_slice(&self.offset.to_le_bytes());
        buf
    }

    /// Decode from a 6-byte on-disk representation.
    #[must_use]
    pub fn from_bytes(bytes: [u8; 6]) -> Self {
        let file_index = u16::from_le_bytes([bytes[0], bytes[1]]);
        let offset = u32::from_le_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]);
        Self { file_index, offset }
    }

    /// Size in bytes of the encoded representation.
    pub const ENCODED_SIZE: usize = 6;
}

/// A pointer plus an explicit length, used for leaf values (whose size
/// isn't implied by a fixed record layout).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizedPointer {
    /// Physical location.
    pub ptr: Pointer,
    /// Length in bytes of the referenced record.
    pub size: u16,
}

impl SizedPointer {
    /// Construct a new sized pointer.
    #[must_use]
    pub const fn new(ptr: Pointer, size: u16) -> Self {
        Self { ptr, size }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pointer_roundtrip() {
        let p = Pointer::new(7, 123_456);
        assert_eq!(Pointer::from_bytes(p.to_bytes()), p);
    }

    #[test]
    fn null_pointer_is_unwritten() {
        assert!(!Pointer::NULL.is_written());
        assert!(Pointer::new(1, 0).is_written());
    }
}
