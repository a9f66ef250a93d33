//! End-to-end scenarios against a fresh `Tree`: basic round-trip, proofs
//! of existence and absence, dead-end growth, reopening after many
//! inserts, recovery from a torn commit, and compaction.
//!
//! The tree here is keyed on SHA-256 over 160-bit keys (`spec.md` §8's
//! literal S1-S6 setup): digest width and key width are independent, so
//! `WithKeyBits` wraps `Sha256Adapter` down to the 160-bit keys a real
//! SHA-1 digest produces, and `key()` below derives each test key the way
//! the spec's scenarios do — by hashing a label with SHA-1, not SHA-256.

use std::sync::Arc;

use rand::RngCore;
use sha1::{Digest as Sha1Digest, Sha1};
use urkel_core::hasher::HashAdapter;
use urkel_crypto::{Sha256Adapter, WithKeyBits};
use urkel_proof::{ProofKind, VerifyCode};
use urkel_store::{Fs, Meta, MemFs};
use urkel_tree::{Tree, TreeOptions};

fn hasher() -> WithKeyBits<Sha256Adapter> {
    WithKeyBits::new(Sha256Adapter, 160)
}

fn open(dir: &str) -> Tree {
    let fs: Arc<dyn Fs> = Arc::new(MemFs::new());
    let options = TreeOptions::new(Arc::new(hasher()));
    Tree::open(dir, fs, options).unwrap()
}

fn key(label: &str) -> Vec<u8> {
    let mut sha1 = Sha1::new();
    sha1.update(label.as_bytes());
    sha1.finalize().to_vec()
}

#[test]
fn basic_round_trip() {
    let tree = open("/db");

    let mut batch = tree.batch();
    batch.insert(key("foo1"), "bar1").unwrap();
    batch.insert(key("foo2"), "bar2").unwrap();
    batch.insert(key("foo3"), "bar3").unwrap();
    let r1 = batch.commit().unwrap();

    assert_eq!(tree.get(&key("foo2")).unwrap(), Some(b"bar2".to_vec()));

    let mut batch = tree.batch();
    batch.insert(key("foo4"), "bar4").unwrap();
    let r2 = batch.commit().unwrap();
    assert_ne!(r1, r2);

    let mut batch = tree.batch();
    batch.remove(&key("foo4")).unwrap();
    let r3 = batch.commit().unwrap();
    assert_eq!(r3, r1, "removing the only change since r1 must return to r1 exactly");
}

#[test]
fn proofs_of_existence_and_absence() {
    let tree = open("/db");
    let mut batch = tree.batch();
    batch.insert(key("foo1"), "bar1").unwrap();
    batch.insert(key("foo2"), "bar2").unwrap();
    batch.insert(key("foo3"), "bar3").unwrap();
    batch.commit().unwrap();

    let snap = tree.snapshot(None).unwrap();
    let root = snap.root_hash();
    let h = hasher();

    let present = snap.prove(&key("foo2")).unwrap();
    assert_eq!(present.kind, ProofKind::Exists);
    let (code, value) = urkel_proof::verify(&present, &root, &key("foo2"), &h);
    assert_eq!(code, VerifyCode::Ok);
    assert_eq!(value, Some(b"bar2".to_vec()));

    let absent = snap.prove(&key("foo5")).unwrap();
    assert!(matches!(absent.kind, ProofKind::DeadEnd | ProofKind::Collision));
    let (code, value) = urkel_proof::verify(&absent, &root, &key("foo5"), &h);
    assert_eq!(code, VerifyCode::Ok);
    assert_eq!(value, None);
}

#[test]
fn dead_end_growth_is_insertion_order_independent() {
    let h = hasher();
    let pairs: Vec<(Vec<u8>, &str)> = (0..64).map(|i| (key(&format!("key-{i}")), "v")).collect();

    let forward = open("/a");
    {
        let mut b = forward.batch();
        for (k, v) in &pairs {
            b.insert(k.clone(), *v).unwrap();
        }
        b.commit().unwrap();
    }

    let backward = open("/b");
    {
        let mut b = backward.batch();
        for (k, v) in pairs.iter().rev() {
            b.insert(k.clone(), *v).unwrap();
        }
        b.commit().unwrap();
    }

    assert_eq!(forward.root_hash(), backward.root_hash(), "root hash must not depend on insertion order");

    let snap = forward.snapshot(None).unwrap();
    let bits = h.key_bits();
    for (k, _) in &pairs {
        let proof = snap.prove(k).unwrap();
        assert!(proof.nodes.len() <= bits, "a proof can never carry more siblings than the tree is wide");
    }
}

#[test]
fn reopen_after_many_random_pairs_preserves_state() {
    let fs: Arc<dyn Fs> = Arc::new(MemFs::new());
    let options = TreeOptions::new(Arc::new(hasher()));

    let pairs: Vec<(Vec<u8>, Vec<u8>)> =
        (0..2000u32).map(|i| (key(&format!("key-{i}")), format!("value-{i}").into_bytes())).collect();

    let root_hash = {
        let tree = Tree::open("/db", fs.clone(), options.clone()).unwrap();
        let mut batch = tree.batch();
        for (k, v) in &pairs {
            batch.insert(k.clone(), v.clone()).unwrap();
        }
        batch.commit().unwrap()
    };

    let reopened = Tree::open("/db", fs, options).unwrap();
    assert_eq!(reopened.root_hash(), root_hash);
    for (k, v) in &pairs {
        assert_eq!(reopened.get(k).unwrap().as_ref(), Some(v));
    }
}

#[test]
fn recovers_from_a_torn_commit() {
    // S5: after a clean commit at root R, append `META_SIZE - 1` random
    // bytes to the current data file (simulating a torn meta) and
    // reopen. The tree must come back at root R, with the file
    // truncated past the torn write.
    let fs: Arc<dyn Fs> = Arc::new(MemFs::new());
    let options = TreeOptions::new(Arc::new(hasher()));

    let root_hash = {
        let tree = Tree::open("/db", fs.clone(), options.clone()).unwrap();
        let mut batch = tree.batch();
        batch.insert(key("foo1"), "bar1").unwrap();
        batch.insert(key("foo2"), "bar2").unwrap();
        batch.commit().unwrap()
    };

    let current_file_index = {
        let tree = Tree::open("/db", fs.clone(), options.clone()).unwrap();
        tree.stats().unwrap().current_file_index
    };
    let path = format!("/db/{}", urkel_store::layout::data_file_name(current_file_index));
    let path = std::path::Path::new(&path);
    let handle = fs.open(path).unwrap();
    let size_before = handle.size().unwrap();

    let meta_size = Meta::encoded_size(hasher().size());
    let mut garbage = vec![0u8; meta_size - 1];
    rand::rng().fill_bytes(&mut garbage);
    handle.write(&garbage).unwrap();
    assert!(handle.size().unwrap() > size_before);

    let reopened = Tree::open("/db", fs, options).unwrap();
    assert_eq!(reopened.root_hash(), root_hash, "recovery must land back on the last valid meta's root");
    assert_eq!(reopened.get(&key("foo1")).unwrap(), Some(b"bar1".to_vec()));
    assert_eq!(reopened.get(&key("foo2")).unwrap(), Some(b"bar2".to_vec()));
}

#[test]
fn compaction_shrinks_storage_and_preserves_the_root() {
    let tree = open("/db");

    let pairs: Vec<(Vec<u8>, Vec<u8>)> =
        (0..500u32).map(|i| (key(&format!("key-{i}")), format!("value-{i}").into_bytes())).collect();

    {
        let mut batch = tree.batch();
        for (k, v) in &pairs {
            batch.insert(k.clone(), v.clone()).unwrap();
        }
        batch.commit().unwrap();
    }
    {
        let mut batch = tree.batch();
        for (k, _) in pairs.iter().take(250) {
            batch.remove(k).unwrap();
        }
        batch.commit().unwrap();
    }

    let before = tree.root_hash();
    let compacted = tree.compact().unwrap();
    assert_eq!(compacted.root_hash(), before, "compaction rewrites physical layout, never the logical root");

    for (k, v) in pairs.iter().skip(250) {
        assert_eq!(compacted.get(k).unwrap().as_ref(), Some(v));
    }
    for (k, _) in pairs.iter().take(250) {
        assert_eq!(compacted.get(k).unwrap(), None);
    }
}

#[test]
fn secure_tree_accepts_variable_length_application_keys() {
    let fs: Arc<dyn Fs> = Arc::new(MemFs::new());
    let options = TreeOptions::new(Arc::new(hasher()));
    let tree = urkel_tree::SecureTree::new(Tree::open("/db", fs, options).unwrap());

    let mut batch = tree.batch();
    batch.insert(b"a very ordinary application key", "value").unwrap();
    let root = batch.commit().unwrap();

    assert_eq!(tree.root_hash(), root);
    assert_eq!(tree.get(b"a very ordinary application key").unwrap(), Some(b"value".to_vec()));
    assert_eq!(tree.get(b"no such key").unwrap(), None);
}

#[test]
fn real_filesystem_round_trip() {
    let dir = tempfile::tempdir().unwrap();

    let root_hash = {
        let fs: Arc<dyn urkel_store::Fs> = Arc::new(urkel_store::StdFs);
        let tree = Tree::open(dir.path(), fs, TreeOptions::new(Arc::new(hasher()))).unwrap();
        let mut batch = tree.batch();
        batch.insert(key("on-disk-key"), "on-disk-value").unwrap();
        batch.commit().unwrap()
    };

    let fs: Arc<dyn urkel_store::Fs> = Arc::new(urkel_store::StdFs);
    let reopened = Tree::open(dir.path(), fs, TreeOptions::new(Arc::new(hasher()))).unwrap();
    assert_eq!(reopened.root_hash(), root_hash);
    assert_eq!(reopened.get(&key("on-disk-key")).unwrap(), Some(b"on-disk-value".to_vec()));
}
