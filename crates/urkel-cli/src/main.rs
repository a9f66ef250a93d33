// crates/urkel-cli/src/main.rs

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms, clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::todo)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use urkel_core::hasher::HashAdapter;
use urkel_crypto::{Blake3Adapter, Sha256Adapter};
use urkel_store::StdFs;
use urkel_tree::{hash_key, SecureTree, Tree, TreeOptions};

#[derive(Parser, Debug)]
#[command(
    name = "urkel-cli",
    about = "Exercise and debug an urkel tree store",
    long_about = "Open a directory-backed authenticated key-value store, insert/remove/look up keys, and produce or verify inclusion/exclusion proofs.\n\nKeys and values are given as plain strings; keys are hashed before they reach the tree (see SecureTree), so they may be any length.",
    version = env!("CARGO_PKG_VERSION"),
    disable_help_subcommand = true
)]
struct Cli {
    /// Hash function the store is keyed on. Must match the hasher the
    /// directory was first created with.
    #[arg(value_enum, long, global = true, default_value_t = HasherOpt::Blake3)]
    hasher: HasherOpt,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, ValueEnum)]
enum HasherOpt {
    Blake3,
    Sha256,
}

impl HasherOpt {
    fn adapter(self) -> Arc<dyn HashAdapter> {
        match self {
            Self::Blake3 => Arc::new(Blake3Adapter),
            Self::Sha256 => Arc::new(Sha256Adapter),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Open (creating if absent) a store directory and print its root hash.
    Open {
        /// Store directory.
        #[arg(long)]
        dir: PathBuf,
    },

    /// Look up a key as of the current root.
    Get {
        #[arg(long)]
        dir: PathBuf,
        /// Application key.
        #[arg(long)]
        key: String,
    },

    /// Insert a single (key, value) pair and commit.
    Insert {
        #[arg(long)]
        dir: PathBuf,
        #[arg(long)]
        key: String,
        #[arg(long)]
        value: String,
    },

    /// Remove a key and commit (a no-op, still committed, if absent).
    Remove {
        #[arg(long)]
        dir: PathBuf,
        #[arg(long)]
        key: String,
    },

    /// Produce a canonical proof of inclusion or exclusion for a key,
    /// writing the encoded bytes to `--out`.
    Prove {
        #[arg(long)]
        dir: PathBuf,
        #[arg(long)]
        key: String,
        /// Root to prove against; defaults to the current root.
        #[arg(long)]
        root: Option<String>,
        #[arg(long)]
        out: PathBuf,
    },

    /// Verify a previously produced proof against a root hash, without
    /// opening a store.
    Verify {
        #[arg(long)]
        root: String,
        #[arg(long)]
        key: String,
        #[arg(long)]
        proof: PathBuf,
    },

    /// Rewrite the store into a fresh generation of files, reclaiming
    /// space used by overwritten/removed nodes.
    Compact {
        #[arg(long)]
        dir: PathBuf,
    },

    /// Print root hash, history depth, and current file index.
    Stats {
        #[arg(long)]
        dir: PathBuf,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let hasher = cli.hasher.adapter();

    match cli.cmd {
        Cmd::Open { dir } => open(dir, hasher),
        Cmd::Get { dir, key } => get(dir, hasher, &key),
        Cmd::Insert { dir, key, value } => insert(dir, hasher, &key, &value),
        Cmd::Remove { dir, key } => remove(dir, hasher, &key),
        Cmd::Prove { dir, key, root, out } => prove(dir, hasher, &key, root.as_deref(), out),
        Cmd::Verify { root, key, proof } => verify(hasher, &root, &key, proof),
        Cmd::Compact { dir } => compact(dir, hasher),
        Cmd::Stats { dir } => stats(dir, hasher),
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = fmt::layer().with_target(false).with_level(true).compact();
    let _ = tracing_subscriber::registry().with(filter).with(fmt_layer).try_init();
}

fn open_tree(dir: PathBuf, hasher: Arc<dyn HashAdapter>) -> Result<SecureTree> {
    let tree = Tree::open(&dir, Arc::new(StdFs), TreeOptions::new(hasher))
        .with_context(|| format!("opening store at {}", dir.display()))?;
    Ok(SecureTree::new(tree))
}

fn open(dir: PathBuf, hasher: Arc<dyn HashAdapter>) -> Result<()> {
    info!(dir = %dir.display(), "opening store");
    let tree = open_tree(dir, hasher)?;
    println!("root: {}", hex::encode(tree.root_hash()));
    Ok(())
}

fn get(dir: PathBuf, hasher: Arc<dyn HashAdapter>, key: &str) -> Result<()> {
    let tree = open_tree(dir, hasher)?;
    match tree.get(key.as_bytes()).context("looking up key")? {
        Some(value) => println!("{}", String::from_utf8_lossy(&value)),
        None => {
            println!("not found");
            std::process::exit(1);
        }
    }
    Ok(())
}

fn insert(dir: PathBuf, hasher: Arc<dyn HashAdapter>, key: &str, value: &str) -> Result<()> {
    let tree = open_tree(dir, hasher)?;
    let mut batch = tree.batch();
    batch.insert(key.as_bytes(), value.as_bytes().to_vec()).context("staging insert")?;
    let root = batch.commit().context("committing insert")?;
    println!("root: {}", hex::encode(root));
    Ok(())
}

fn remove(dir: PathBuf, hasher: Arc<dyn HashAdapter>, key: &str) -> Result<()> {
    let tree = open_tree(dir, hasher)?;
    let mut batch = tree.batch();
    batch.remove(key.as_bytes()).context("staging removal")?;
    let root = batch.commit().context("committing removal")?;
    println!("root: {}", hex::encode(root));
    Ok(())
}

fn prove(dir: PathBuf, hasher: Arc<dyn HashAdapter>, key: &str, root: Option<&str>, out: PathBuf) -> Result<()> {
    let tree = open_tree(dir, hasher.clone())?;
    let root_hash = root.map(hex::decode).transpose().context("decoding --root as hex")?;
    let snap = tree.snapshot(root_hash).context("opening snapshot")?;
    let proof = snap.prove(key.as_bytes()).context("building proof")?;
    let encoded = proof.encode(hasher.as_ref());
    std::fs::write(&out, &encoded).with_context(|| format!("writing proof to {}", out.display()))?;
    println!("kind: {:?}, {} bytes -> {}", proof.kind, encoded.len(), out.display());
    Ok(())
}

fn verify(hasher: Arc<dyn HashAdapter>, root: &str, key: &str, proof_path: PathBuf) -> Result<()> {
    let root = hex::decode(root).context("decoding --root as hex")?;
    let bytes = std::fs::read(&proof_path).with_context(|| format!("reading {}", proof_path.display()))?;
    let bits = hasher.key_bits();
    let proof = urkel_proof::Proof::decode(&bytes, hasher.as_ref(), bits).context("decoding proof bytes")?;
    let hashed_key = hash_key(hasher.as_ref(), key.as_bytes());
    let (code, value) = urkel_proof::verify(&proof, &root, &hashed_key, hasher.as_ref());
    match code {
        urkel_proof::VerifyCode::Ok => match value {
            Some(v) => println!("OK: {}", String::from_utf8_lossy(&v)),
            None => println!("OK: key absent"),
        },
        other => bail!("verification failed: {other:?}"),
    }
    Ok(())
}

fn compact(dir: PathBuf, hasher: Arc<dyn HashAdapter>) -> Result<()> {
    let tree = open_tree(dir, hasher)?;
    let before = tree.root_hash();
    let compacted = tree.inner().compact().context("compacting store")?;
    let after = compacted.root_hash();
    if before != after {
        bail!("compaction changed the root hash, this is a bug: {} -> {}", hex::encode(before), hex::encode(after));
    }
    println!("compacted, root unchanged: {}", hex::encode(after));
    Ok(())
}

fn stats(dir: PathBuf, hasher: Arc<dyn HashAdapter>) -> Result<()> {
    let tree = open_tree(dir, hasher)?;
    let stats = tree.inner().stats().context("gathering stats")?;
    println!("root: {}", hex::encode(stats.root_hash));
    println!("history depth: {}", stats.history_depth);
    println!("current file index: {}", stats.current_file_index);
    Ok(())
}
