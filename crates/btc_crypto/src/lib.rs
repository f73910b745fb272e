//! Minimal Bitcoin header verification primitives.
//!
//! This crate exposes:
//! - Compact targets: `decode_target`, `encode_target`
//! - Header codec: `BlockHeader::parse`, `hash_block`, `BlockHash`
//! - Difficulty filter: `verify_pow`
//! - Retarget arithmetic: `difficulty::work::{period, work_in_period, retarget_within_floor}`
//! - Combined helper: `verify_header_pow`
pub mod difficulty;
pub mod header;

use core::fmt;

pub use crypto_bigint::{Encoding, U256};
pub use difficulty::filter::{DiffError, verify_pow};
pub use difficulty::target::{
    Target, TargetError, decode_target, decode_target_bytes, encode_target,
};
pub use difficulty::work::{BLOCKS_PER_PERIOD, is_retarget_boundary, period, work_in_period};
pub use header::{BlockHash, BlockHeader, HEADER_LEN, HeaderError, hash_block};

/// Combined header decoding + proof-of-work error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PowError {
    Header(HeaderError),
    Difficulty(DiffError),
}

impl fmt::Display for PowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowError::Header(e) => write!(f, "Header error: {e}"),
            PowError::Difficulty(e) => write!(f, "Difficulty filter error: {e}"),
        }
    }
}

impl std::error::Error for PowError {}

/// A header that passed the context-free proof-of-work check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckedHeader {
    pub header: BlockHeader,
    pub hash: BlockHash,
    pub target: Target,
}

/// Parses raw header bytes and verifies the hash is below the header's own target.
///
/// Contextual rules (parent linkage, expected difficulty) are left to the caller.
pub fn verify_header_pow(raw: &[u8]) -> Result<CheckedHeader, PowError> {
    let header = BlockHeader::parse(raw).map_err(PowError::Header)?;
    let hash = header.hash();
    let target = verify_pow(&hash, header.bits).map_err(PowError::Difficulty)?;
    Ok(CheckedHeader {
        header,
        hash,
        target,
    })
}
