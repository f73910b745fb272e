use thiserror::Error;

use crate::difficulty::target::{Target, TargetError, decode_target};
use crate::header::BlockHash;

/// Errors that can occur during proof-of-work verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DiffError {
    /// `nBits` could not be decoded into a target.
    #[error("invalid nBits: {0}")]
    InvalidTarget(#[from] TargetError),
    /// The block hash is not strictly below the target.
    #[error("block hash is not below target")]
    HashAboveTarget,
}

/// Verifies the difficulty filter `hash < ToTarget(nBits)` and returns the target.
///
/// `hash` is in display order, so its bytes read directly as a big-endian
/// 256-bit integer.
pub fn verify_pow(hash: &BlockHash, n_bits: u32) -> Result<Target, DiffError> {
    let target = decode_target(n_bits)?;
    if hash.to_u256() >= target {
        return Err(DiffError::HashAboveTarget);
    }
    Ok(target)
}
