use std::io;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use btc_crypto::{BlockHash, Target, U256};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{GenesisAnchor, MirrorConfig, Network};
use crate::state::{AnchorError, ChainState, ChainStore, StateDelta};
use crate::store::Store;
use crate::submit::{self, MirrorEvent, SubmissionError};

#[derive(Debug, Error)]
pub enum MirrorError {
    #[error(transparent)]
    Submission(#[from] SubmissionError),
    #[error("invalid genesis anchor: {0}")]
    Anchor(#[from] AnchorError),
    #[error("store error: {0}")]
    Store(#[from] io::Error),
    #[error("stored chain is anchored at {stored_height}/{stored}, config expects {height}/{hash}")]
    GenesisMismatch {
        stored_height: u32,
        stored: BlockHash,
        height: u32,
        hash: BlockHash,
    },
}

/// Header-chain mirror: the chain state behind a single-writer lock, with
/// every accepted submission persisted to `S` before it becomes visible.
pub struct BtcMirror<S: Store> {
    network: Network,
    state: RwLock<ChainState>,
    store: S,
}

impl<S: Store> BtcMirror<S> {
    /// Rebuilds the mirror from `store`, or bootstraps it from the configured anchor.
    pub fn open(config: MirrorConfig, store: S) -> Result<Self, MirrorError> {
        let mut state = ChainState::new(config.genesis)?;
        let commits = store.load()?;

        match commits.split_first() {
            None => {
                store.append(&StateDelta::genesis(&config.genesis)?)?;
                info!(
                    height = config.genesis.height,
                    hash = %config.genesis.hash,
                    "bootstrapped mirror from genesis anchor"
                );
            }
            Some((first, rest)) => {
                check_genesis(&config.genesis, first)?;
                for delta in rest {
                    state.apply(delta.clone());
                }
                info!(
                    tip = state.tip_height(),
                    commits = commits.len(),
                    "restored mirror from store"
                );
            }
        }

        Ok(BtcMirror {
            network: config.network,
            state: RwLock::new(state),
            store,
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, ChainState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ChainState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn genesis(&self) -> GenesisAnchor {
        *self.read().genesis()
    }

    /// Validates and commits a run of headers, the first at `start_height`.
    ///
    /// The write lock is held from validation through persistence, so a
    /// concurrent submitter building on the same parent sees the new tip and
    /// fails instead of corrupting the chain. On any error the mirror is unchanged.
    pub fn submit(
        &self,
        start_height: u32,
        headers: &[u8],
    ) -> Result<Vec<MirrorEvent>, MirrorError> {
        let mut state = self.write();
        let accepted = submit::submit(&state, self.network, start_height, headers)?;

        self.store.append(&accepted.delta)?;
        state.apply(accepted.delta);

        for event in &accepted.events {
            match event {
                MirrorEvent::NewTip { height, time, hash } => {
                    info!(height, time, %hash, "new tip");
                }
                MirrorEvent::NewCumulativeDifficulty {
                    height,
                    work,
                    period,
                } => {
                    info!(height, period, work = ?work, "new cumulative difficulty since retarget");
                }
            }
        }
        debug!(
            start_height,
            count = headers.len() / btc_crypto::HEADER_LEN,
            "submission committed"
        );

        Ok(accepted.events)
    }

    /// Runs `f` against one consistent view of the chain.
    ///
    /// The individual getters each take their own read lock; anything that
    /// combines several reads must go through here.
    pub fn snapshot<R>(&self, f: impl FnOnce(&ChainState) -> R) -> R {
        f(&self.read())
    }

    pub fn get_block_hash(&self, height: u32) -> BlockHash {
        self.read().block_hash(height)
    }

    pub fn get_latest_block_height(&self) -> u32 {
        self.read().tip_height()
    }

    pub fn get_latest_block_time(&self) -> u32 {
        self.read().tip_time()
    }

    pub fn expected_target(&self) -> Target {
        self.read().expected_target()
    }

    pub fn cumulative_work_since_retarget(&self) -> Option<U256> {
        self.read().cumulative_work_since_retarget()
    }
}

fn check_genesis(anchor: &GenesisAnchor, first: &StateDelta) -> Result<(), MirrorError> {
    let expected = StateDelta::genesis(anchor)?;
    if *first == expected {
        return Ok(());
    }
    let (stored_height, stored) = first
        .hashes
        .iter()
        .next()
        .map(|(h, hash)| (*h, *hash))
        .unwrap_or((first.tip_height, BlockHash::ZERO));
    Err(MirrorError::GenesisMismatch {
        stored_height,
        stored,
        height: anchor.height,
        hash: anchor.hash,
    })
}
