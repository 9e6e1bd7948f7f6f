//! Shielded Pool - ledger core of a shielded asset pool
//!
//! Notes exist only as commitments in an incremental Merkle tree. Spending a
//! note reveals its nullifier, never the note itself. Every spend is gated on
//! a zero-knowledge proof checked by an external verifier.
//!
//! ## Operations
//!
//! | Operation     | Proof? | Custody call | Root |
//! |---------------|--------|--------------|------|
//! | Deposit       | No     | pull         | computed on-core |
//! | Transact      | Yes    | none         | declared by proof |
//! | Withdraw      | Yes    | push         | declared by proof |
//! | Execute swap  | Yes    | none         | declared by proof |
//!
//! ## Core Flow
//!
//! ```text
//! Deposit → Commitment in Tree
//!               ↓
//!   Transact / Swap (private, ZK proof, nullifiers consumed)
//!               ↓
//!   Withdraw → ZK Proof → receiver bound → push from custody
//! ```
//!
//! The proof verifier and the asset custodian are collaborators supplied by
//! the host through [`ProofVerifier`] and [`AssetTransfer`].

pub mod constants;
pub mod error;
pub mod events;
pub mod gateway;
pub mod instructions;
pub mod pool;
pub mod state;
pub mod utils;

/// 32-byte hash value (commitment, nullifier, key image, root, tree node)
pub type Hash32 = [u8; 32];

/// 32-byte account or asset identifier
pub type Address = [u8; 32];

/// Instruction discriminators
pub mod instruction {
    pub const DEPOSIT: u8 = 0;
    pub const TRANSACT: u8 = 1;
    pub const WITHDRAW: u8 = 2;
    pub const EXECUTE_SWAP: u8 = 3;
}

pub use error::PoolError;
pub use events::PoolEvent;
pub use gateway::{ProofGateway, ProofVerifier, VerifiedInputs};
pub use instructions::{
    DepositData, ProofEnvelope, SwapPublicInputs, SwapSide, TransferPublicInputs,
    WithdrawPublicInputs,
};
pub use pool::{NonReentrant, ShieldedPool};
pub use state::{
    CircuitKind, CommitmentTree, IdentifierKind, LedgerSnapshot, LedgerState, NullifierRecord,
    OperationType, StateDelta, VkRegistry,
};
pub use utils::{AssetTransfer, TransferError};
