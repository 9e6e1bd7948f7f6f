//! Error definitions for the shielded pool

use thiserror::Error;

use crate::instructions::SwapSide;
use crate::state::CircuitKind;
use crate::utils::TransferError;
use crate::Hash32;

/// Pool errors.
///
/// Every variant aborts the transition it was raised in; nothing is retried.
/// Numeric codes start at 6000 and are stable across releases.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum PoolError {
    // Input validation (6000-6009)
    #[error("Invalid asset (zero identifier)")]
    InvalidAsset,

    #[error("Amount must be greater than zero")]
    InvalidAmount,

    #[error("Invalid receiver (zero address)")]
    InvalidReceiver,

    #[error("Swap requires exactly 2 nullifiers, got {0}")]
    InvalidSwapNullifierCount(usize),

    #[error("Invalid public inputs: {0}")]
    InvalidPublicInputs(&'static str),

    #[error("Invalid instruction data")]
    InvalidInstructionData,

    #[error("Invalid proof length")]
    InvalidProofLength,

    #[error("Memo too large")]
    MemoTooLarge,

    // Replay violations (6010-6019)
    #[error("Identifier already used: {}", hex::encode(.0))]
    AlreadyUsed(Hash32),

    #[error("Swap order {side} already executed (key image {})", hex::encode(.key_image))]
    OrderAlreadyExecuted { side: SwapSide, key_image: Hash32 },

    // Capacity (6020-6029)
    #[error("Commitment tree is full")]
    CapacityExhausted,

    // Authorization (6030-6039)
    #[error("{0} proof rejected by verifier")]
    ProofRejected(CircuitKind),

    #[error(
        "Receiver mismatch: proof declares {}, call supplied {}",
        hex::encode(.declared),
        hex::encode(.supplied)
    )]
    ReceiverMismatch { declared: Hash32, supplied: Hash32 },

    // Collaborator failure (6040-6049)
    #[error("Asset transfer failed: {0}")]
    TransferFailed(#[from] TransferError),

    // Execution model (6050-6059)
    #[error("Reentrant call into deposit/withdraw")]
    Reentrancy,

    #[error("Ledger state is mid-transition")]
    StateBusy,

    // Internal (6060-6069)
    #[error("Node hash computation failed")]
    HashFailure,

    #[error("Invalid ledger snapshot: {0}")]
    InvalidSnapshot(&'static str),
}

impl PoolError {
    /// Stable numeric code for this error
    pub fn code(&self) -> u32 {
        match self {
            PoolError::InvalidAsset => 6000,
            PoolError::InvalidAmount => 6001,
            PoolError::InvalidReceiver => 6002,
            PoolError::InvalidSwapNullifierCount(_) => 6003,
            PoolError::InvalidPublicInputs(_) => 6004,
            PoolError::InvalidInstructionData => 6005,
            PoolError::InvalidProofLength => 6006,
            PoolError::MemoTooLarge => 6007,
            PoolError::AlreadyUsed(_) => 6010,
            PoolError::OrderAlreadyExecuted { side: SwapSide::OrderA, .. } => 6011,
            PoolError::OrderAlreadyExecuted { side: SwapSide::OrderB, .. } => 6012,
            PoolError::CapacityExhausted => 6020,
            PoolError::ProofRejected(_) => 6030,
            PoolError::ReceiverMismatch { .. } => 6031,
            PoolError::TransferFailed(_) => 6040,
            PoolError::Reentrancy => 6050,
            PoolError::StateBusy => 6051,
            PoolError::HashFailure => 6060,
            PoolError::InvalidSnapshot(_) => 6061,
        }
    }

    /// Replay violations carry the offending identifier
    pub fn offending_identifier(&self) -> Option<&Hash32> {
        match self {
            PoolError::AlreadyUsed(id) => Some(id),
            PoolError::OrderAlreadyExecuted { key_image, .. } => Some(key_image),
            _ => None,
        }
    }
}
