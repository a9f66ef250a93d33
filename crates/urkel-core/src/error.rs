// crates/urkel-core/src/error.rs

//! Typed error taxonomy for the store and tree engine.
//!
//! `NotFound` is deliberately absent: a missing key is a normal `None`
//! result, never an error (see `spec.md` §7).

use thiserror::Error;

/// Everything that can go wrong below the library boundary.
#[derive(Debug, Error)]
pub enum Error {
    /// The tree engine could not resolve a node referenced by the walk.
    ///
    /// Surfaces either genuine corruption or a request for history the
    /// store no longer has (a root hash not reachable via the meta chain).
    #[error(
        "missing node: root={root_hash:02x?} node={node_hash:02x?} key={key:02x?} depth={depth}"
    )]
    MissingNode {
        /// Root hash the walk started from.
        root_hash: Vec<u8>,
        /// Hash of the unresolved node, if known.
        node_hash: Option<Vec<u8>>,
        /// Key being looked up, if the operation was key-scoped.
        key: Option<Vec<u8>>,
        /// Depth at which resolution failed.
        depth: usize,
    },

    /// A short read or write, or a failed `open`/`fsync`/`rename`.
    #[error("io error during {op} (file {file_index}, offset {offset}, size {size}): {source}")]
    Io {
        /// Operation being performed (`"read"`, `"write"`, `"open"`, ...).
        op: &'static str,
        /// Index of the file involved, 0 if not file-scoped.
        file_index: u16,
        /// Byte offset involved, 0 if not applicable.
        offset: u64,
        /// Size involved (requested read/write length), 0 if not applicable.
        size: u64,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Malformed bytes in a node record, meta record, or encoded proof.
    #[error("encoding error at offset {offset}: {msg}")]
    Encoding {
        /// Byte offset (within the record or buffer) where decoding failed.
        offset: usize,
        /// Human-readable description.
        msg: String,
    },

    /// An internal invariant was violated. Fatal: the caller should not
    /// continue to use the tree handle that produced this error.
    #[error("internal invariant violated: {msg}")]
    Assertion {
        /// Description of the violated invariant.
        msg: String,
    },
}

impl Error {
    /// Build an [`Error::Io`] from a `std::io::Error`, tagging it with the
    /// operation name and the file/offset/size context available at the
    /// call site.
    #[must_use]
    pub fn io(op: &'static str, file_index: u16, offset: u64, size: u64, source: std::io::Error) -> Self {
        Self::Io { op, file_index, offset, size, source }
    }

    /// Build an [`Error::Encoding`].
    #[must_use]
    pub fn encoding(offset: usize, msg: impl Into<String>) -> Self {
        Self::Encoding { offset, msg: msg.into() }
    }

    /// Build an [`Error::Assertion`].
    #[must_use]
    pub fn assertion(msg: impl Into<String>) -> Self {
        Self::Assertion { msg: msg.into() }
    }

    /// Build an [`Error::MissingNode`].
    #[must_use]
    pub fn missing_node(
        root_hash: &[u8],
        node_hash: Option<&[u8]>,
        key: Option<&[u8]>,
        depth: usize,
    ) -> Self {
        Self::MissingNode {
            root_hash: root_hash.to_vec(),
            node_hash: node_hash.map(<[u8]>::to_vec),
            key: key.map(<[u8]>::to_vec),
            depth,
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;
