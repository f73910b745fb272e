use crypto_bigint::U256;

use crate::difficulty::target::Target;

/// Number of blocks sharing one difficulty target.
pub const BLOCKS_PER_PERIOD: u32 = 2016;

/// A boundary header may ease difficulty by at most `2^RETARGET_FLOOR_SHIFT`.
pub const RETARGET_FLOOR_SHIFT: usize = 2;

/// Retarget period containing `height`.
pub const fn period(height: u32) -> u32 {
    height / BLOCKS_PER_PERIOD
}

/// First height of `period`.
pub const fn period_start(period: u32) -> u32 {
    period * BLOCKS_PER_PERIOD
}

/// Whether the header at `height` carries a new difficulty target.
pub const fn is_retarget_boundary(height: u32) -> bool {
    height % BLOCKS_PER_PERIOD == 0
}

/// Whether a boundary target stays within the protocol's 4x easing limit
/// relative to the previous period's target.
pub fn retarget_within_floor(new_target: &Target, previous_target: &Target) -> bool {
    (*new_target >> RETARGET_FLOOR_SHIFT) < *previous_target
}

/// Approximate work of one block at `target`: `(2^256 - 1) / target`.
///
/// Returns `None` for a zero target.
pub fn work_per_block(target: &Target) -> Option<U256> {
    if *target == Target::ZERO {
        return None;
    }
    Some(U256::MAX.wrapping_div(target))
}

/// Work accumulated in `period` up to and including `height`, all blocks at `target`.
///
/// Counts the boundary block itself, so a chain whose tip is the boundary
/// header carries one block of work. Returns `None` if `height` lies before
/// the period, the target is zero or the product overflows.
pub fn work_in_period(target: &Target, period: u32, height: u32) -> Option<U256> {
    let blocks = height.checked_sub(period_start(period))?.checked_add(1)?;
    let per_block = work_per_block(target)?;

    let blocks = U256::from_u32(blocks);
    if per_block > U256::MAX.wrapping_div(&blocks) {
        return None;
    }
    Some(per_block.wrapping_mul(&blocks))
}
