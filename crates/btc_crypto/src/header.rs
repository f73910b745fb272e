//! Fixed 80-byte Bitcoin block header layout and block hashing.
//!
//! All multi-byte integers are little-endian on the wire. Hashes are kept in
//! two orders: the header stores its parent in internal order, while
//! [`BlockHash`] is the display order (double SHA-256, byte-reversed), which
//! is also the order in which a hash compares numerically against a target.
use core::fmt;
use core::ops::Range;
use core::str::FromStr;

use crypto_bigint::{Encoding, U256};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Serialized header size.
pub const HEADER_LEN: usize = 80;

/// Byte ranges of each header field.
pub mod offsets {
    use core::ops::Range;

    pub const VERSION: Range<usize> = 0..4;
    pub const PREV_BLOCK_HASH: Range<usize> = 4..36;
    pub const MERKLE_ROOT: Range<usize> = 36..68;
    pub const TIME: Range<usize> = 68..72;
    pub const BITS: Range<usize> = 72..76;
    pub const NONCE: Range<usize> = 76..80;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeaderError {
    #[error("block header must be 80 bytes, got {len}")]
    Malformed { len: usize },
    #[error("block hash must be 32 bytes of hex: {0}")]
    InvalidHash(String),
}

/// Block hash in display order (big-endian numeric value).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct BlockHash(pub [u8; 32]);

impl BlockHash {
    pub const ZERO: BlockHash = BlockHash([0u8; 32]);

    /// Builds a display-order hash from internal (little-endian) bytes.
    pub fn from_internal(mut bytes: [u8; 32]) -> Self {
        bytes.reverse();
        BlockHash(bytes)
    }

    /// Internal (little-endian) bytes, as stored in a child's header.
    pub fn to_internal(&self) -> [u8; 32] {
        let mut bytes = self.0;
        bytes.reverse();
        bytes
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    pub fn to_u256(&self) -> U256 {
        U256::from_be_bytes(self.0)
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockHash({self})")
    }
}

impl FromStr for BlockHash {
    type Err = HeaderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| HeaderError::InvalidHash(e.to_string()))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| HeaderError::InvalidHash(format!("{} bytes", b.len())))?;
        Ok(BlockHash(bytes))
    }
}

/// Decoded block header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub version: i32,
    /// Parent hash in internal order.
    pub prev_block_hash: [u8; 32],
    pub merkle_root: [u8; 32],
    pub time: u32,
    pub bits: u32,
    pub nonce: u32,
}

fn field<const N: usize>(raw: &[u8; HEADER_LEN], range: Range<usize>) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&raw[range]);
    out
}

impl BlockHeader {
    /// Parses a header; anything other than exactly 80 bytes is rejected.
    pub fn parse(bytes: &[u8]) -> Result<Self, HeaderError> {
        let raw: &[u8; HEADER_LEN] = bytes
            .try_into()
            .map_err(|_| HeaderError::Malformed { len: bytes.len() })?;
        Ok(Self::from_raw(raw))
    }

    pub fn from_raw(raw: &[u8; HEADER_LEN]) -> Self {
        BlockHeader {
            version: i32::from_le_bytes(field(raw, offsets::VERSION)),
            prev_block_hash: field(raw, offsets::PREV_BLOCK_HASH),
            merkle_root: field(raw, offsets::MERKLE_ROOT),
            time: u32::from_le_bytes(field(raw, offsets::TIME)),
            bits: u32::from_le_bytes(field(raw, offsets::BITS)),
            nonce: u32::from_le_bytes(field(raw, offsets::NONCE)),
        }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut raw = [0u8; HEADER_LEN];
        raw[offsets::VERSION].copy_from_slice(&self.version.to_le_bytes());
        raw[offsets::PREV_BLOCK_HASH].copy_from_slice(&self.prev_block_hash);
        raw[offsets::MERKLE_ROOT].copy_from_slice(&self.merkle_root);
        raw[offsets::TIME].copy_from_slice(&self.time.to_le_bytes());
        raw[offsets::BITS].copy_from_slice(&self.bits.to_le_bytes());
        raw[offsets::NONCE].copy_from_slice(&self.nonce.to_le_bytes());
        raw
    }

    /// Parent hash in display order, comparable with [`BlockHash`] values.
    pub fn parent_hash(&self) -> BlockHash {
        BlockHash::from_internal(self.prev_block_hash)
    }

    pub fn hash(&self) -> BlockHash {
        hash_block(&self.to_bytes())
    }
}

/// SHA256d of the serialized header, byte-reversed into display order.
pub fn hash_block(raw: &[u8; HEADER_LEN]) -> BlockHash {
    let first = Sha256::digest(raw);
    let second: [u8; 32] = Sha256::digest(first).into();
    BlockHash::from_internal(second)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_lengths() {
        for len in [0, 79, 81, 160] {
            let bytes = vec![0u8; len];
            assert_eq!(
                BlockHeader::parse(&bytes),
                Err(HeaderError::Malformed { len })
            );
        }
    }

    #[test]
    fn fields_land_at_their_offsets() {
        let mut raw = [0u8; HEADER_LEN];
        raw[offsets::VERSION].copy_from_slice(&2i32.to_le_bytes());
        raw[4] = 0xaa;
        raw[35] = 0xbb;
        raw[offsets::TIME].copy_from_slice(&1_650_000_000u32.to_le_bytes());
        raw[offsets::BITS].copy_from_slice(&[0xff, 0xff, 0x00, 0x1d]);
        raw[offsets::NONCE].copy_from_slice(&7u32.to_le_bytes());

        let header = BlockHeader::parse(&raw).unwrap();
        assert_eq!(header.version, 2);
        assert_eq!(header.time, 1_650_000_000);
        assert_eq!(header.bits, 0x1d00ffff);
        assert_eq!(header.nonce, 7);
        assert_eq!(header.parent_hash().0[0], 0xbb);
        assert_eq!(header.parent_hash().0[31], 0xaa);
        assert_eq!(header.to_bytes(), raw);
    }

    #[test]
    fn hash_parses_from_hex() {
        let hash: BlockHash = "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f"
            .parse()
            .unwrap();
        assert_eq!(hash.0[0], 0);
        assert_eq!(hash.0[31], 0x6f);
        assert_eq!(
            hash.to_string(),
            "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f"
        );
        assert!("abcd".parse::<BlockHash>().is_err());
        assert!("zz".parse::<BlockHash>().is_err());
    }
}
