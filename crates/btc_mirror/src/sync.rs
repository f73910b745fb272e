//! Header relay: follows a `bitcoind` node and feeds its best chain into the mirror.
//!
//! The mirror itself never retries; rejected submissions are logged here and
//! the next round starts again from the fork point.
use std::time::Duration;

use btc_crypto::BLOCKS_PER_PERIOD;
use btc_crypto::difficulty::work::period;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::mirror::{BtcMirror, MirrorError};
use crate::net::rpc::{RpcClient, RpcError};
use crate::store::Store;
use crate::submit::MirrorEvent;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("RPC error: {0}")]
    Rpc(#[from] RpcError),
    #[error(transparent)]
    Mirror(#[from] MirrorError),
    #[error("node chain does not contain the genesis anchor at height {height}")]
    NoCommonAncestor { height: u32 },
}

/// Heights `(start, end)` of the next batch to relay, or `None` when caught up.
///
/// The batch builds on `fork_height`, holds at most `max_batch` headers and
/// stops before a second retarget boundary, which the mirror would reject.
pub fn plan_batch(fork_height: u32, node_tip: u32, max_batch: u32) -> Option<(u32, u32)> {
    let start = fork_height.checked_add(1)?;
    if start > node_tip || max_batch == 0 {
        return None;
    }

    let last_allowed = period(fork_height)
        .checked_add(2)
        .and_then(|p| p.checked_mul(BLOCKS_PER_PERIOD))
        .map_or(u32::MAX, |next| next - 1);
    let end = node_tip
        .min(start.saturating_add(max_batch - 1))
        .min(last_allowed);
    Some((start, end))
}

/// Highest height at or below `from` where the mirror and the node agree.
async fn find_fork_point<S: Store>(
    rpc: &RpcClient,
    mirror: &BtcMirror<S>,
    from: u32,
) -> Result<u32, SyncError> {
    let genesis = mirror.genesis().height;
    let mut height = from.max(genesis);
    loop {
        let node_hash = rpc.get_block_hash(height).await?;
        if node_hash == mirror.get_block_hash(height) {
            return Ok(height);
        }
        if height <= genesis {
            return Err(SyncError::NoCommonAncestor { height: genesis });
        }
        debug!(height, %node_hash, "mirror diverges from node");
        height -= 1;
    }
}

/// Relays one batch. Returns the mirror's events, empty when already caught up.
pub async fn sync_once<S: Store>(
    rpc: &RpcClient,
    mirror: &BtcMirror<S>,
    max_batch: u32,
) -> Result<Vec<MirrorEvent>, SyncError> {
    let node_tip = rpc.get_block_count().await?;
    let mirror_tip = mirror.get_latest_block_height();
    let fork = find_fork_point(rpc, mirror, mirror_tip.min(node_tip)).await?;

    // A same-period reorg has to outgrow the mirrored tip in one submission.
    let batch = max_batch.max(mirror_tip.saturating_sub(fork).saturating_add(1));
    let Some((start, end)) = plan_batch(fork, node_tip, batch) else {
        return Ok(Vec::new());
    };
    if end <= mirror_tip && period(end) == period(fork) {
        // Same-period segment that is not longer than what we hold.
        return Ok(Vec::new());
    }

    info!(start, end, node_tip, mirror_tip, "relaying headers");
    let mut headers = Vec::with_capacity((end - start + 1) as usize * btc_crypto::HEADER_LEN);
    for height in start..=end {
        headers.extend_from_slice(&rpc.get_block_header_by_height(height).await?);
    }

    Ok(mirror.submit(start, &headers)?)
}

/// Continuously relays headers, sleeping `poll_interval` once caught up.
pub async fn sync_chain<S: Store>(
    rpc: &RpcClient,
    mirror: &BtcMirror<S>,
    max_batch: u32,
    poll_interval: Duration,
) -> Result<(), SyncError> {
    loop {
        match sync_once(rpc, mirror, max_batch).await {
            Ok(events) if events.is_empty() => {
                debug!(tip = mirror.get_latest_block_height(), "caught up");
                tokio::time::sleep(poll_interval).await;
            }
            Ok(events) => {
                for event in events {
                    if let MirrorEvent::NewTip { height, hash, .. } = event {
                        info!("✓ Mirrored up to block {height} ({hash})");
                    }
                }
            }
            Err(SyncError::Mirror(MirrorError::Submission(e))) => {
                warn!("submission rejected: {e}");
                tokio::time::sleep(poll_interval).await;
            }
            Err(e) => return Err(e),
        }
    }
}
