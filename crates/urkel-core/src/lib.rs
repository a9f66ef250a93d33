// crates/urkel-core/src/lib.rs

//! Core types for an authenticated key-value store over a Merkelized radix
//! tree ("urkel tree"): the hash adapter contract, the tagged node union and
//! its on-disk encoding, physical pointers, and the library's error
//! taxonomy.
//!
//! This crate has no opinion about storage or tree-walking — see
//! `urkel-store` and `urkel-tree` — and no opinion about which hash
//! function to use — see `urkel-crypto`.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]

pub mod error;
pub mod hasher;
pub mod node;
pub mod pointer;

pub use error::{Error, Result};
pub use hasher::{Digest, HashAdapter, HashContext};
pub use node::{Node, NodeRef};
pub use pointer::{Pointer, SizedPointer, UNWRITTEN_FILE_INDEX};

/// Default depth below which resolved nodes are demoted to [`Node::Hash`]
/// after a commit (`spec.md` §4.5).
pub const DEFAULT_CACHE_DEPTH: usize = 4;

/// Cap on a single data file's size before the store rolls to a new one
/// (`spec.md` §4.4): `0x7FFF_F000`, just under 2 GiB.
pub const MAX_FILE_SIZE: u64 = 0x7FFF_F000;

/// Little-endian magic stamped at the start of every meta record.
pub const META_MAGIC: u32 = 0x_754B_6C72; // "rKUt" in ASCII, little-endian on disk
