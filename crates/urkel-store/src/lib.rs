// crates/urkel-store/src/lib.rs

//! The append-only, multi-file log store underlying an urkel tree.
//!
//! This crate owns everything about durability and physical layout: the
//! pluggable filesystem (`fs`), the per-commit write buffer (`buffer`), the
//! bounded open-handle cache (`handle_cache`), the meta record format
//! (`meta`), filename conventions (`layout`), and the `Store` type that
//! ties them together, including crash recovery on open. It has no opinion
//! about tree shape, keys, or bit paths — that's `urkel-tree`.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]

pub mod buffer;
pub mod fs;
pub mod handle_cache;
pub mod layout;
pub mod meta;
pub mod store;

pub use buffer::WriteBuffer;
pub use fs::{Fs, MemFs, RawFile, StdFs};
pub use handle_cache::HandleCache;
pub use meta::Meta;
pub use store::{internal_record_size, leaf_record_size, Store, StoreOptions};
