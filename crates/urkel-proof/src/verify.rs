// crates/urkel-proof/src/verify.rs

//! Proof verification (`spec.md` §4.7, §7): a status code rather than a
//! `Result`, so callers can distinguish "valid proof of absence" from
//! "invalid proof" without treating the latter as an I/O-style error.

use urkel_core::hasher::HashAdapter;

use crate::types::{Proof, ProofKind};

/// Outcome of [`verify`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VerifyCode {
    /// The proof is structurally valid and folds to the claimed root.
    Ok,
    /// The proof folds to a hash different from the claimed root.
    HashMismatch,
    /// A `Collision` proof named the queried key as the colliding key.
    SameKey,
    /// The proof is structurally invalid (bad type tag, oversized walk).
    UnknownError,
}

/// Verify `proof` against `root` for `key`.
///
/// Returns `(Ok, Some(value))` for a verified `Exists` proof, `(Ok, None)`
/// for a verified `DeadEnd`/`Collision` proof, and a non-`Ok` code with
/// `None` otherwise.
#[must_use]
pub fn verify(proof: &Proof, root: &[u8], key: &[u8], hasher: &dyn HashAdapter) -> (VerifyCode, Option<Vec<u8>>) {
    let bits = hasher.key_bits();
    if proof.nodes.len() > bits {
        return (VerifyCode::UnknownError, None);
    }

    let (mut folded, returned_value) = match proof.kind {
        ProofKind::Exists => {
            let Some(value) = &proof.value else { return (VerifyCode::UnknownError, None) };
            (hasher.hash_value(key, value), Some(value.clone()))
        }
        ProofKind::DeadEnd => (hasher.zero(), None),
        ProofKind::Collision => {
            let (Some(other_key), Some(other_value_hash)) = (&proof.collision_key, &proof.collision_value_hash) else {
                return (VerifyCode::UnknownError, None);
            };
            if other_key.as_slice() == key {
                return (VerifyCode::SameKey, None);
            }
            (hasher.hash_leaf(other_key, other_value_hash), None)
        }
        ProofKind::Unknown => return (VerifyCode::UnknownError, None),
    };

    for (i, sibling) in proof.nodes.iter().enumerate().rev() {
        let depth = i;
        folded = if bit(key, depth) {
            hasher.hash_internal(sibling, &folded)
        } else {
            hasher.hash_internal(&folded, sibling)
        };
    }

    if folded == root {
        (VerifyCode::Ok, returned_value)
    } else {
        (VerifyCode::HashMismatch, None)
    }
}

fn bit(key: &[u8], depth: usize) -> bool {
    let byte = key[depth / 8];
    (byte >> (7 - (depth % 8))) & 1 == 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use urkel_crypto::Blake3Adapter;

    #[test]
    fn dead_end_against_empty_root_verifies() {
        let h = Blake3Adapter;
        let root = h.zero();
        let proof = Proof::dead_end(vec![]);
        let (code, value) = verify(&proof, &root, b"whatever-key-not-used-for-depth", &h);
        assert_eq!(code, VerifyCode::Ok);
        assert_eq!(value, None);
    }

    #[test]
    fn tampered_sibling_causes_hash_mismatch() {
        let h = Blake3Adapter;
        let key = h.digest(b"k");
        let value = b"v".to_vec();
        let leaf_hash = h.hash_value(&key, &value);
        let sibling = h.digest(b"sibling");
        let root = if (key[0] >> 7) & 1 == 1 {
            h.hash_internal(&sibling, &leaf_hash)
        } else {
            h.hash_internal(&leaf_hash, &sibling)
        };
        let mut bad_sibling = sibling.clone();
        bad_sibling[0] ^= 0xFF;
        let proof = Proof::exists(vec![bad_sibling], value);
        let (code, _) = verify(&proof, &root, &key, &h);
        assert_eq!(code, VerifyCode::HashMismatch);
    }

    #[test]
    fn collision_naming_queried_key_is_rejected() {
        let h = Blake3Adapter;
        let key = h.digest(b"k");
        let vh = h.digest(b"v");
        let proof = Proof::collision(vec![], key.clone(), vh);
        let (code, _) = verify(&proof, &h.zero(), &key, &h);
        assert_eq!(code, VerifyCode::SameKey);
    }
}
