//! Property-based invariants that must hold for any sequence of inserts
//! and removes: determinism, history-independence, and proof round-trips.

use std::sync::Arc;

use proptest::prelude::*;
use urkel_core::hasher::HashAdapter;
use urkel_crypto::Sha256Adapter;
use urkel_store::{Fs, MemFs};
use urkel_tree::{Tree, TreeOptions};

fn tree_with(dir: &str, pairs: &[(Vec<u8>, Vec<u8>)]) -> Tree {
    let fs: Arc<dyn Fs> = Arc::new(MemFs::new());
    let tree = Tree::open(dir, fs, TreeOptions::new(Arc::new(Sha256Adapter))).unwrap();
    let mut batch = tree.batch();
    for (k, v) in pairs {
        batch.insert(k.clone(), v.clone()).unwrap();
    }
    batch.commit().unwrap();
    tree
}

fn distinct_kv_pairs(max_len: usize) -> impl Strategy<Value = Vec<(Vec<u8>, Vec<u8>)>> {
    proptest::collection::vec((0u32..10_000, proptest::collection::vec(any::<u8>(), 0..16)), 0..max_len).prop_map(|items| {
        let hasher = Sha256Adapter;
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for (label, value) in items {
            let key = hasher.digest(&label.to_le_bytes());
            if seen.insert(key.clone()) {
                out.push((key, value));
            }
        }
        out
    })
}

proptest! {
    /// Inserting the same set of (key, value) pairs in any order produces
    /// the same root hash (`spec.md` §8: tree shape is a pure function of
    /// key bits, independent of insertion order).
    #[test]
    fn root_hash_is_order_independent(pairs in distinct_kv_pairs(40), seed in any::<u64>()) {
        let forward = tree_with("/forward", &pairs);

        let mut shuffled = pairs.clone();
        shuffle(&mut shuffled, seed);
        let backward = tree_with("/backward", &shuffled);

        prop_assert_eq!(forward.root_hash(), backward.root_hash());
    }

    /// Removing every key just inserted in one batch returns the tree to
    /// its pre-insertion (empty) root (`spec.md` §8: insert-then-remove is
    /// an identity on the root hash).
    #[test]
    fn insert_then_remove_everything_returns_to_empty_root(pairs in distinct_kv_pairs(40)) {
        let tree = tree_with("/db", &pairs);
        let empty_hash = {
            let fs: Arc<dyn Fs> = Arc::new(MemFs::new());
            Tree::open("/empty", fs, TreeOptions::new(Arc::new(Sha256Adapter))).unwrap().root_hash()
        };

        let mut batch = tree.batch();
        for (k, _) in &pairs {
            batch.remove(k).unwrap();
        }
        batch.commit().unwrap();

        prop_assert_eq!(tree.root_hash(), empty_hash);
    }

    /// Every key present after a batch of inserts, proves as `Exists` and
    /// verifies to its inserted value; every absent key proves as
    /// `DeadEnd`/`Collision` and verifies to `None` (`spec.md` §8).
    #[test]
    fn every_present_key_proves_and_verifies(pairs in distinct_kv_pairs(30)) {
        prop_assume!(!pairs.is_empty());
        let tree = tree_with("/db", &pairs);
        let snap = tree.snapshot(None).unwrap();
        let root = snap.root_hash();
        let hasher = Sha256Adapter;

        for (key, value) in &pairs {
            let proof = snap.prove(key).unwrap();
            let (code, returned) = urkel_proof::verify(&proof, &root, key, &hasher);
            prop_assert_eq!(code, urkel_proof::VerifyCode::Ok);
            prop_assert_eq!(returned, Some(value.clone()));
        }
    }

    /// A canonical proof encodes and decodes back to an equal proof
    /// (`spec.md` §4.7 canonical encoding).
    #[test]
    fn proof_encoding_round_trips(pairs in distinct_kv_pairs(30)) {
        prop_assume!(!pairs.is_empty());
        let tree = tree_with("/db", &pairs);
        let snap = tree.snapshot(None).unwrap();
        let hasher = Sha256Adapter;
        let bits = hasher.key_bits();

        for (key, _) in &pairs {
            let proof = snap.prove(key).unwrap();
            let encoded = proof.encode(&hasher);
            let decoded = urkel_proof::Proof::decode(&encoded, &hasher, bits).unwrap();
            prop_assert_eq!(proof, decoded);
        }
    }
}

/// Deterministic Fisher-Yates shuffle driven by a splitmix64 stream, so a
/// proptest-shrunk `seed` reproduces the same permutation across runs.
fn shuffle<T>(items: &mut [T], seed: u64) {
    let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
    let mut next_u64 = move || {
        state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    };
    for i in (1..items.len()).rev() {
        let j = (next_u64() as usize) % (i + 1);
        items.swap(i, j);
    }
}
