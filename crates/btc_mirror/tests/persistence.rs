mod common;

use std::io;

use btc_crypto::BlockHash;
use btc_mirror::config::Network;
use btc_mirror::mirror::{BtcMirror, MirrorError};
use btc_mirror::state::StateDelta;
use btc_mirror::store::Store;
use btc_mirror::store::file::FileStore;
use btc_mirror::store::memory::MemoryStore;
use common::*;

#[test]
fn file_store_restores_tip_and_orphans() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mirror.jsonl");
    let cfg = config(Network::Mainnet, BOUNDARY - 3, BITS_4);

    let (old, replacement) = {
        let mirror = BtcMirror::open(cfg, FileStore::new(&path).unwrap()).unwrap();
        let old = mine_segment(mirror.get_block_hash(BOUNDARY - 3), &[BITS_4; 4], 1);
        mirror.submit(BOUNDARY - 2, &old.bytes).unwrap();
        let replacement = mine_segment(old.hashes[0], &[BITS_4, BITS_16], 2);
        mirror.submit(BOUNDARY - 1, &replacement.bytes).unwrap();
        (old, replacement)
    };

    let mirror = BtcMirror::open(cfg, FileStore::new(&path).unwrap()).unwrap();
    assert_eq!(mirror.get_latest_block_height(), BOUNDARY);
    assert_eq!(mirror.get_latest_block_time(), GENESIS_TIME + 1200);
    assert_eq!(mirror.get_block_hash(BOUNDARY - 2), old.hashes[0]);
    assert_eq!(mirror.get_block_hash(BOUNDARY - 1), replacement.hashes[0]);
    assert_eq!(mirror.get_block_hash(BOUNDARY), replacement.tip());
    assert_eq!(mirror.get_block_hash(BOUNDARY + 1), BlockHash::ZERO);
    assert_eq!(
        mirror.expected_target(),
        btc_crypto::decode_target(BITS_16).unwrap()
    );

    // The restored mirror keeps validating against the restored targets.
    let next = mine_segment(replacement.tip(), &[BITS_16], 3);
    mirror.submit(BOUNDARY + 1, &next.bytes).unwrap();
    assert_eq!(mirror.get_latest_block_height(), BOUNDARY + 1);
}

#[test]
fn rejected_submissions_are_not_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mirror.jsonl");
    let cfg = config(Network::Mainnet, 719_000, EASY_BITS);

    let mirror = BtcMirror::open(cfg, FileStore::new(&path).unwrap()).unwrap();
    let bad = mine(BlockHash([0x11; 32]), EASY_BITS, GENESIS_TIME + 600, 1);
    assert!(mirror.submit(719_001, &bad).is_err());
    drop(mirror);

    let store = FileStore::new(&path).unwrap();
    assert_eq!(store.load().unwrap().len(), 1);
}

#[test]
fn reopening_with_another_anchor_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mirror.jsonl");

    BtcMirror::open(
        config(Network::Mainnet, 719_000, EASY_BITS),
        FileStore::new(&path).unwrap(),
    )
    .unwrap();

    let err = BtcMirror::open(
        config(Network::Mainnet, 719_500, EASY_BITS),
        FileStore::new(&path).unwrap(),
    )
    .err()
    .unwrap();
    assert!(matches!(
        err,
        MirrorError::GenesisMismatch {
            stored_height: 719_000,
            height: 719_500,
            ..
        }
    ));
}

#[test]
fn bootstrap_writes_genesis_commit() {
    let store = MemoryStore::new();
    let cfg = config(Network::Mainnet, 719_000, EASY_BITS);
    let mirror = BtcMirror::open(cfg, store).unwrap();
    assert_eq!(mirror.get_latest_block_height(), 719_000);
    assert_eq!(mirror.get_block_hash(719_000), cfg.genesis.hash);
    assert_eq!(mirror.genesis(), cfg.genesis);
}

/// Accepts the genesis commit, then fails every write.
#[derive(Default)]
struct FullDisk {
    inner: MemoryStore,
}

impl Store for FullDisk {
    fn append(&self, delta: &StateDelta) -> io::Result<()> {
        if self.inner.is_empty() {
            return self.inner.append(delta);
        }
        Err(io::Error::other("disk full"))
    }

    fn load(&self) -> io::Result<Vec<StateDelta>> {
        self.inner.load()
    }
}

#[test]
fn failed_write_leaves_state_unchanged() {
    let mirror = BtcMirror::open(
        config(Network::Mainnet, 719_000, EASY_BITS),
        FullDisk::default(),
    )
    .unwrap();
    let seg = mine_segment(mirror.get_block_hash(719_000), &[EASY_BITS], 1);

    let err = mirror.submit(719_001, &seg.bytes).unwrap_err();
    assert!(matches!(err, MirrorError::Store(_)));
    assert_eq!(mirror.get_latest_block_height(), 719_000);
    assert_eq!(mirror.get_block_hash(719_001), BlockHash::ZERO);
}
