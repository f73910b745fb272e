#![allow(dead_code)]

use btc_crypto::{BlockHash, BlockHeader, DiffError, HEADER_LEN, verify_pow};
use btc_mirror::config::{GenesisAnchor, MirrorConfig, Network};

/// Roughly one nonce in two succeeds; two units of work per block.
pub const EASY_BITS: u32 = 0x207fffff;
/// Four units of work per block.
pub const BITS_4: u32 = 0x203fffff;
/// Sixteen units of work per block.
pub const BITS_16: u32 = 0x200fffff;

/// First height of retarget period 357.
pub const BOUNDARY: u32 = 2016 * 357;

pub const GENESIS_TIME: u32 = 1_643_000_000;

pub fn anchor(height: u32, bits: u32) -> GenesisAnchor {
    GenesisAnchor {
        height,
        hash: BlockHash([0x5a; 32]),
        time: GENESIS_TIME,
        bits,
    }
}

pub fn config(network: Network, height: u32, bits: u32) -> MirrorConfig {
    MirrorConfig {
        network,
        genesis: anchor(height, bits),
    }
}

fn template(prev: BlockHash, bits: u32, time: u32, tag: u8) -> BlockHeader {
    BlockHeader {
        version: 0x2000_0000,
        prev_block_hash: prev.to_internal(),
        merkle_root: [tag; 32],
        time,
        bits,
        nonce: 0,
    }
}

/// Grinds nonces until the header meets its own target.
///
/// `tag` goes into the merkle root so competing forks get distinct hashes.
pub fn mine(prev: BlockHash, bits: u32, time: u32, tag: u8) -> [u8; HEADER_LEN] {
    let mut header = template(prev, bits, time, tag);
    loop {
        if verify_pow(&header.hash(), bits).is_ok() {
            return header.to_bytes();
        }
        header.nonce += 1;
    }
}

/// Grinds nonces until the header misses its own target.
pub fn mine_invalid(prev: BlockHash, bits: u32, time: u32) -> [u8; HEADER_LEN] {
    let mut header = template(prev, bits, time, 0xee);
    loop {
        if verify_pow(&header.hash(), bits) == Err(DiffError::HashAboveTarget) {
            return header.to_bytes();
        }
        header.nonce += 1;
    }
}

/// A run of mined headers, concatenated for submission.
pub struct Segment {
    pub bytes: Vec<u8>,
    pub hashes: Vec<BlockHash>,
}

impl Segment {
    pub fn tip(&self) -> BlockHash {
        self.hashes.last().copied().unwrap_or(BlockHash::ZERO)
    }
}

/// Mines one header per entry of `bits` on top of `prev`.
pub fn mine_segment(prev: BlockHash, bits: &[u32], tag: u8) -> Segment {
    let mut bytes = Vec::with_capacity(bits.len() * HEADER_LEN);
    let mut hashes = Vec::with_capacity(bits.len());
    let mut parent = prev;
    for (i, b) in bits.iter().enumerate() {
        let raw = mine(parent, *b, GENESIS_TIME + 600 * (i as u32 + 1), tag);
        parent = btc_crypto::hash_block(&raw);
        bytes.extend_from_slice(&raw);
        hashes.push(parent);
    }
    Segment { bytes, hashes }
}
