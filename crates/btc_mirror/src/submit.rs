//! Header-chain acceptance.
//!
//! [`submit`] validates a contiguous run of raw headers against a
//! [`ChainState`] and, on success, returns the staged [`StateDelta`] and the
//! events it produces. The state itself is never touched here; the caller
//! commits the delta.
//!
//! Within one retarget period every block carries the same work, so the
//! longer chain wins. A segment that contains a retarget boundary is instead
//! compared by work accumulated since that boundary: a shorter segment with
//! a harder boundary target may replace a longer one, and a longer segment
//! whose boundary eased difficulty may still lose.
use btc_crypto::difficulty::work::{period, retarget_within_floor};
use btc_crypto::{
    BlockHash, BlockHeader, DiffError, HEADER_LEN, Target, TargetError, U256,
    is_retarget_boundary, verify_pow, work_in_period,
};
use thiserror::Error;
use tracing::debug;

use crate::config::Network;
use crate::state::{ChainState, ChainStore, StateDelta};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmissionError {
    #[error("header batch of {len} bytes is not a positive multiple of 80")]
    MalformedBatch { len: usize },
    #[error("segment ending at {new_height} does not extend tip {tip_height}")]
    ChainTooShort { new_height: u32, tip_height: u32 },
    #[error(
        "segment {start_height}..={new_height} spans more than one retarget period \
         (tip {tip_height})"
    )]
    RetargetSpanTooLarge {
        start_height: u32,
        new_height: u32,
        tip_height: u32,
    },
    #[error("header {height} builds on {found}, stored parent is {expected}")]
    BadParent {
        height: u32,
        expected: BlockHash,
        found: BlockHash,
    },
    #[error("header {height} hash {hash} is not below its target")]
    InsufficientProofOfWork { height: u32, hash: BlockHash },
    #[error("header {height} has undecodable bits: {source}")]
    MalformedTarget {
        height: u32,
        #[source]
        source: TargetError,
    },
    #[error("header {height} bits {bits:#010x} do not match the period's target")]
    WrongDifficultyBits { height: u32, bits: u32 },
    #[error("retarget header {height} bits {bits:#010x} ease difficulty by 4x or more")]
    RetargetBelowFloor { height: u32, bits: u32 },
    #[error("segment ending at {new_height} does not add more work since the retarget")]
    InsufficientCumulativeWork {
        new_height: u32,
        old_work: U256,
        new_work: U256,
    },
    #[error("cumulative work at height {height} overflows 256 bits")]
    WorkOverflow { height: u32 },
}

/// Notifications produced by an accepted submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorEvent {
    NewTip {
        height: u32,
        time: u32,
        hash: BlockHash,
    },
    /// Only emitted when the segment crossed a retarget boundary.
    NewCumulativeDifficulty { height: u32, work: U256, period: u32 },
}

/// A validated submission, ready to be committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accepted {
    pub delta: StateDelta,
    pub events: Vec<MirrorEvent>,
}

/// Read-through view of a [`ChainState`] with staged changes on top.
struct Staged<'a> {
    base: &'a ChainState,
    delta: StateDelta,
}

impl<'a> Staged<'a> {
    fn new(base: &'a ChainState) -> Self {
        Staged {
            base,
            delta: StateDelta {
                tip_height: base.tip_height(),
                tip_time: base.tip_time(),
                ..StateDelta::default()
            },
        }
    }

    fn period_target(&self, period: u32) -> Option<Target> {
        self.delta
            .period_targets
            .get(&period)
            .copied()
            .or_else(|| self.base.period_target(period))
    }

    /// Validates one header at `height` and stages its hash.
    fn accept_header(
        &mut self,
        network: Network,
        height: u32,
        raw: &[u8],
    ) -> Result<BlockHeader, SubmissionError> {
        let header = BlockHeader::parse(raw)
            .map_err(|_| SubmissionError::MalformedBatch { len: raw.len() })?;

        let expected = self.block_hash(height - 1);
        let found = header.parent_hash();
        if expected.is_zero() || expected != found {
            return Err(SubmissionError::BadParent {
                height,
                expected,
                found,
            });
        }

        let hash = header.hash();
        let target = verify_pow(&hash, header.bits).map_err(|e| match e {
            DiffError::InvalidTarget(source) => SubmissionError::MalformedTarget { height, source },
            DiffError::HashAboveTarget => SubmissionError::InsufficientProofOfWork { height, hash },
        })?;

        let period = period(height);
        if is_retarget_boundary(height) {
            if network.enforces_difficulty() {
                let within_floor = self
                    .period_target(period - 1)
                    .is_some_and(|previous| retarget_within_floor(&target, &previous));
                if !within_floor {
                    return Err(SubmissionError::RetargetBelowFloor {
                        height,
                        bits: header.bits,
                    });
                }
            }
            self.delta.period_targets.insert(period, target);
        } else if network.enforces_difficulty() && self.period_target(period) != Some(target) {
            return Err(SubmissionError::WrongDifficultyBits {
                height,
                bits: header.bits,
            });
        }

        self.delta.hashes.insert(height, hash);
        debug!(height, %hash, "header staged");
        Ok(header)
    }
}

impl ChainStore for Staged<'_> {
    fn block_hash(&self, height: u32) -> BlockHash {
        match self.delta.hashes.get(&height) {
            Some(hash) => *hash,
            None => self.base.block_hash(height),
        }
    }

    fn tip_height(&self) -> u32 {
        self.delta.tip_height
    }

    fn tip_time(&self) -> u32 {
        self.delta.tip_time
    }
}

/// Validates `headers` (concatenated 80-byte headers, the first at
/// `start_height`) against `state`.
///
/// All-or-nothing: on error nothing has been staged anywhere the caller can see.
pub fn submit(
    state: &ChainState,
    network: Network,
    start_height: u32,
    headers: &[u8],
) -> Result<Accepted, SubmissionError> {
    let len = headers.len();
    if len == 0 || len % HEADER_LEN != 0 {
        return Err(SubmissionError::MalformedBatch { len });
    }
    let count =
        u32::try_from(len / HEADER_LEN).map_err(|_| SubmissionError::MalformedBatch { len })?;
    let new_height = start_height
        .checked_add(count - 1)
        .ok_or(SubmissionError::MalformedBatch { len })?;

    // The anchor is trusted as-is and cannot be replaced.
    if start_height <= state.genesis().height {
        let first = BlockHeader::parse(&headers[..HEADER_LEN])
            .map_err(|_| SubmissionError::MalformedBatch { len })?;
        return Err(SubmissionError::BadParent {
            height: start_height,
            expected: BlockHash::ZERO,
            found: first.parent_hash(),
        });
    }

    let tip_height = state.tip_height();
    let old_period = period(tip_height);
    let parent_period = period(start_height - 1);
    let new_period = period(new_height);

    if new_period < old_period || new_period > parent_period + 1 {
        return Err(SubmissionError::RetargetSpanTooLarge {
            start_height,
            new_height,
            tip_height,
        });
    }

    // Work the current tip holds since the boundary the segment crosses, if any.
    let old_work = if new_period == parent_period {
        if new_height <= tip_height {
            return Err(SubmissionError::ChainTooShort {
                new_height,
                tip_height,
            });
        }
        None
    } else if new_period == old_period {
        let work = work_in_period(&state.expected_target(), old_period, tip_height)
            .ok_or(SubmissionError::WorkOverflow { height: tip_height })?;
        Some(work)
    } else {
        // The current tip has not reached the boundary yet.
        Some(U256::ZERO)
    };

    let mut staged = Staged::new(state);
    let mut last = None;
    for (offset, raw) in (0u32..).zip(headers.chunks_exact(HEADER_LEN)) {
        last = Some(staged.accept_header(network, start_height + offset, raw)?);
    }
    let last = last.ok_or(SubmissionError::MalformedBatch { len })?;

    let mut events = Vec::with_capacity(2);
    if let Some(old_work) = old_work {
        let target = staged.period_target(new_period).unwrap_or(Target::ZERO);
        let new_work = work_in_period(&target, new_period, new_height)
            .ok_or(SubmissionError::WorkOverflow { height: new_height })?;
        if new_work <= old_work {
            return Err(SubmissionError::InsufficientCumulativeWork {
                new_height,
                old_work,
                new_work,
            });
        }

        // A heavier but shorter chain orphans everything above it.
        for orphan in new_height.saturating_add(1)..=tip_height {
            staged.delta.hashes.insert(orphan, BlockHash::ZERO);
        }

        events.push(MirrorEvent::NewCumulativeDifficulty {
            height: new_height,
            work: new_work,
            period: new_period,
        });
    }

    staged.delta.tip_height = new_height;
    staged.delta.tip_time = last.time;
    events.push(MirrorEvent::NewTip {
        height: new_height,
        time: last.time,
        hash: staged.block_hash(new_height),
    });

    Ok(Accepted {
        delta: staged.delta,
        events,
    })
}
