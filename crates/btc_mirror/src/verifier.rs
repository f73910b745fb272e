//! Payment verification against the mirrored chain.
//!
//! Checking the transaction itself (Merkle path, output script and amount) is
//! delegated to a [`PaymentProofValidator`]; this module only decides which
//! block hash the proof must commit to and whether that block is buried deep
//! enough.
use btc_crypto::BlockHash;
use thiserror::Error;

use crate::mirror::BtcMirror;
use crate::state::ChainStore;
use crate::store::Store;

/// Validates an inclusion proof for a payment in the block `block_hash`.
pub trait PaymentProofValidator {
    type Proof;

    fn validate_payment(
        &self,
        block_hash: &BlockHash,
        proof: &Self::Proof,
        tx_out_index: u32,
        dest_script_hash: &[u8; 20],
        amount_sats: u64,
    ) -> bool;
}

#[derive(Debug, Clone)]
pub struct PaymentClaim<P> {
    pub min_confirmations: u32,
    pub block_num: u32,
    pub inclusion_proof: P,
    pub tx_out_index: u32,
    pub dest_script_hash: [u8; 20],
    pub amount_sats: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum VerificationError {
    #[error("block {block_num} is above the mirrored tip {tip_height}")]
    BlockNotYetMirrored { block_num: u32, tip_height: u32 },
    #[error("block has {confirmations} confirmations, {required} required")]
    InsufficientConfirmations { confirmations: u64, required: u32 },
    #[error("block {block_num} is below the mirrored range")]
    UnknownBlock { block_num: u32 },
    #[error("invalid transaction proof for block {block_num}")]
    InvalidProof { block_num: u32 },
}

pub struct PaymentVerifier<V> {
    validator: V,
}

impl<V: PaymentProofValidator> PaymentVerifier<V> {
    pub fn new(validator: V) -> Self {
        PaymentVerifier { validator }
    }

    /// Checks `claim` against `chain`. Read-only.
    ///
    /// `chain` is borrowed for the whole call, so it cannot change underneath.
    /// A live [`BtcMirror`] is checked through [`Self::verify_on_mirror`].
    pub fn verify_payment<C: ChainStore + ?Sized>(
        &self,
        chain: &C,
        claim: &PaymentClaim<V::Proof>,
    ) -> Result<bool, VerificationError> {
        let tip_height = chain.tip_height();
        if tip_height < claim.block_num {
            return Err(VerificationError::BlockNotYetMirrored {
                block_num: claim.block_num,
                tip_height,
            });
        }

        let confirmations = u64::from(tip_height - claim.block_num) + 1;
        if confirmations < u64::from(claim.min_confirmations) {
            return Err(VerificationError::InsufficientConfirmations {
                confirmations,
                required: claim.min_confirmations,
            });
        }

        let block_hash = chain.block_hash(claim.block_num);
        if block_hash.is_zero() {
            return Err(VerificationError::UnknownBlock {
                block_num: claim.block_num,
            });
        }
        if !self.validator.validate_payment(
            &block_hash,
            &claim.inclusion_proof,
            claim.tx_out_index,
            &claim.dest_script_hash,
            claim.amount_sats,
        ) {
            return Err(VerificationError::InvalidProof {
                block_num: claim.block_num,
            });
        }

        Ok(true)
    }

    /// Same as [`Self::verify_payment`], under one read lock of the mirror.
    pub fn verify_on_mirror<S: Store>(
        &self,
        mirror: &BtcMirror<S>,
        claim: &PaymentClaim<V::Proof>,
    ) -> Result<bool, VerificationError> {
        mirror.snapshot(|state| self.verify_payment(state, claim))
    }
}
