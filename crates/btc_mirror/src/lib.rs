//! Bitcoin header-chain mirror.
//!
//! Keeps the best proof-of-work chain above a trusted anchor, answers
//! confirmation queries for payment proofs and relays headers from a
//! `bitcoind` node.
pub mod config;
pub mod mirror;
pub mod net;
pub mod state;
pub mod store;
pub mod submit;
pub mod sync;
pub mod verifier;

pub use config::{GenesisAnchor, MirrorConfig, Network};
pub use mirror::{BtcMirror, MirrorError};
pub use state::{ChainState, ChainStore};
pub use submit::{MirrorEvent, SubmissionError};
pub use verifier::{PaymentClaim, PaymentProofValidator, PaymentVerifier, VerificationError};
