//! Mirrored chain state: tip, sparse height→hash table and per-period targets.
//!
//! `ChainState` is only ever changed by applying a [`StateDelta`] produced by a
//! successful submission, so the same deltas double as the persisted commit log.
use std::collections::BTreeMap;

use btc_crypto::difficulty::work::period;
use btc_crypto::{BlockHash, Target, TargetError, U256, decode_target, work_in_period};
use thiserror::Error;

use crate::config::GenesisAnchor;

/// Read access to mirrored headers.
pub trait ChainStore {
    /// Hash stored at `height`, or [`BlockHash::ZERO`] if unknown.
    fn block_hash(&self, height: u32) -> BlockHash;
    fn tip_height(&self) -> u32;
    fn tip_time(&self) -> u32;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AnchorError {
    #[error("genesis anchor hash is zero")]
    ZeroHash,
    #[error("genesis anchor bits are invalid: {0}")]
    InvalidBits(#[from] TargetError),
    #[error("genesis anchor target is zero")]
    ZeroTarget,
}

/// A set of staged changes.
///
/// A zero hash in `hashes` marks an orphaned height.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateDelta {
    pub tip_height: u32,
    pub tip_time: u32,
    pub hashes: BTreeMap<u32, BlockHash>,
    pub period_targets: BTreeMap<u32, Target>,
}

impl StateDelta {
    /// The commit that bootstraps a chain from its anchor.
    pub fn genesis(anchor: &GenesisAnchor) -> Result<Self, AnchorError> {
        if anchor.hash.is_zero() {
            return Err(AnchorError::ZeroHash);
        }
        let target = decode_target(anchor.bits)?;
        if target == Target::ZERO {
            return Err(AnchorError::ZeroTarget);
        }

        Ok(StateDelta {
            tip_height: anchor.height,
            tip_time: anchor.time,
            hashes: BTreeMap::from([(anchor.height, anchor.hash)]),
            period_targets: BTreeMap::from([(period(anchor.height), target)]),
        })
    }
}

#[derive(Debug, Clone)]
pub struct ChainState {
    genesis: GenesisAnchor,
    tip_height: u32,
    tip_time: u32,
    hashes: BTreeMap<u32, BlockHash>,
    period_targets: BTreeMap<u32, Target>,
}

impl ChainState {
    pub fn new(genesis: GenesisAnchor) -> Result<Self, AnchorError> {
        let delta = StateDelta::genesis(&genesis)?;
        let mut state = ChainState {
            genesis,
            tip_height: 0,
            tip_time: 0,
            hashes: BTreeMap::new(),
            period_targets: BTreeMap::new(),
        };
        state.apply(delta);
        Ok(state)
    }

    pub fn genesis(&self) -> &GenesisAnchor {
        &self.genesis
    }

    /// Commits a staged delta.
    pub fn apply(&mut self, delta: StateDelta) {
        for (height, hash) in delta.hashes {
            if hash.is_zero() {
                self.hashes.remove(&height);
            } else {
                self.hashes.insert(height, hash);
            }
        }
        self.period_targets.extend(delta.period_targets);
        self.tip_height = delta.tip_height;
        self.tip_time = delta.tip_time;
    }

    /// Target set for `period` by its boundary header (or by the anchor).
    pub fn period_target(&self, period: u32) -> Option<Target> {
        self.period_targets.get(&period).copied()
    }

    /// Target every non-boundary header in the tip's period must carry.
    pub fn expected_target(&self) -> Target {
        self.period_target(period(self.tip_height))
            .unwrap_or(Target::ZERO)
    }

    /// Approximate work on the tip's chain since the last retarget, derived on demand.
    pub fn cumulative_work_since_retarget(&self) -> Option<U256> {
        work_in_period(
            &self.expected_target(),
            period(self.tip_height),
            self.tip_height,
        )
    }
}

impl ChainStore for ChainState {
    fn block_hash(&self, height: u32) -> BlockHash {
        self.hashes.get(&height).copied().unwrap_or(BlockHash::ZERO)
    }

    fn tip_height(&self) -> u32 {
        self.tip_height
    }

    fn tip_time(&self) -> u32 {
        self.tip_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anchor() -> GenesisAnchor {
        GenesisAnchor {
            height: 719_000,
            hash: BlockHash([0x11; 32]),
            time: 1_643_000_000,
            bits: 0x207fffff,
        }
    }

    #[test]
    fn genesis_seeds_tip_and_target() {
        let state = ChainState::new(anchor()).unwrap();
        assert_eq!(state.tip_height(), 719_000);
        assert_eq!(state.tip_time(), 1_643_000_000);
        assert_eq!(state.block_hash(719_000), BlockHash([0x11; 32]));
        assert_eq!(state.block_hash(718_999), BlockHash::ZERO);
        assert_eq!(state.block_hash(719_001), BlockHash::ZERO);
        assert_eq!(state.expected_target(), decode_target(0x207fffff).unwrap());
    }

    #[test]
    fn bad_anchors_are_rejected() {
        let mut zero_hash = anchor();
        zero_hash.hash = BlockHash::ZERO;
        assert_eq!(ChainState::new(zero_hash).unwrap_err(), AnchorError::ZeroHash);

        let mut zero_target = anchor();
        zero_target.bits = 0x1d00_0000;
        assert_eq!(
            ChainState::new(zero_target).unwrap_err(),
            AnchorError::ZeroTarget
        );

        let mut bad_bits = anchor();
        bad_bits.bits = 0x0200_ffff;
        assert!(matches!(
            ChainState::new(bad_bits),
            Err(AnchorError::InvalidBits(_))
        ));
    }

    #[test]
    fn applying_zero_hash_orphans_height() {
        let mut state = ChainState::new(anchor()).unwrap();
        state.apply(StateDelta {
            tip_height: 719_002,
            tip_time: 1,
            hashes: BTreeMap::from([
                (719_001, BlockHash([1; 32])),
                (719_002, BlockHash([2; 32])),
            ]),
            period_targets: BTreeMap::new(),
        });
        state.apply(StateDelta {
            tip_height: 719_001,
            tip_time: 2,
            hashes: BTreeMap::from([(719_002, BlockHash::ZERO)]),
            period_targets: BTreeMap::new(),
        });
        assert_eq!(state.tip_height(), 719_001);
        assert_eq!(state.block_hash(719_001), BlockHash([1; 32]));
        assert_eq!(state.block_hash(719_002), BlockHash::ZERO);
    }

    #[test]
    fn cumulative_work_counts_from_period_start() {
        let state = ChainState::new(anchor()).unwrap();
        // 719_000 is 1304 blocks into period 356; 2 units of work per block.
        assert_eq!(
            state.cumulative_work_since_retarget(),
            Some(U256::from_u32(1305 * 2))
        );
    }
}
