use crypto_bigint::{Encoding, U256};
use thiserror::Error;

/// 256-bit proof-of-work target.
pub type Target = U256;

/// Errors produced while decoding a compact `nBits` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TargetError {
    /// Exponent below 3 would need a right shift; such encodings are rejected.
    #[error("compact target {bits:#010x} has exponent below 3")]
    ExponentTooSmall { bits: u32 },
    /// The mantissa shifted by the exponent does not fit in 256 bits.
    #[error("compact target {bits:#010x} overflows 256 bits")]
    Overflow { bits: u32 },
}

/// Convert compact `nBits` to a 256-bit target.
///
/// `bits` is the header field read as a little-endian `u32`, so byte 3 is the
/// exponent and bytes 0..3 form the 24-bit mantissa. The mantissa is taken as
/// an unsigned value; `target = mantissa << 8 * (exponent - 3)`.
pub fn decode_target(bits: u32) -> Result<Target, TargetError> {
    let exp = bits >> 24;
    let mant = bits & 0x00ff_ffff;

    if exp < 3 {
        return Err(TargetError::ExponentTooSmall { bits });
    }
    if mant == 0 {
        return Ok(Target::ZERO);
    }

    let shift = 8 * (exp as usize - 3);
    let mant_bits = (u32::BITS - mant.leading_zeros()) as usize;
    if mant_bits + shift > Target::BITS {
        return Err(TargetError::Overflow { bits });
    }

    Ok(Target::from_u32(mant) << shift)
}

/// Same as [`decode_target`], from the four raw header bytes.
pub fn decode_target_bytes(bits: [u8; 4]) -> Result<Target, TargetError> {
    decode_target(u32::from_le_bytes(bits))
}

/// Convert a target to its canonical compact `nBits` form.
pub fn encode_target(target: &Target) -> u32 {
    let bytes_be = target.to_be_bytes();

    let Some(first) = bytes_be.iter().position(|b| *b != 0) else {
        return 0;
    };
    let mut size = (32 - first) as u32;

    let low_u32 = |t: &Target| {
        let b = t.to_be_bytes();
        u32::from_be_bytes([b[28], b[29], b[30], b[31]])
    };

    let mut mant = if size <= 3 {
        low_u32(target) << (8 * (3 - size))
    } else {
        low_u32(&(*target >> (8 * (size as usize - 3)))) & 0x00ff_ffff
    };

    // Keep the mantissa's top bit clear, as Bitcoin Core does.
    if mant & 0x0080_0000 != 0 {
        mant >>= 8;
        size += 1;
    }

    (size << 24) | mant
}
