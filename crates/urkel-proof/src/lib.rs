// crates/urkel-proof/src/lib.rs

//! Canonical inclusion/exclusion proofs for an urkel tree: the three
//! witness shapes, their bit-packed on-the-wire encoding, and a verifier
//! that returns a status code rather than a `Result` (`spec.md` §4.7, §7).
//!
//! This crate has no storage or tree dependency — it operates purely on
//! hashes, so a client holding only a root hash and a hash adapter can
//! verify a proof it received from anywhere.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]

mod codec;
mod types;
mod verify;

pub use types::{Proof, ProofKind};
pub use verify::{verify, VerifyCode};
