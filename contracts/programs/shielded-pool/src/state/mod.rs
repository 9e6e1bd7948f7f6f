//! Ledger state
//!
//! | Type | Purpose |
//! |------|---------|
//! | `CommitmentTree` | Incremental Merkle accumulator of note commitments |
//! | `NullifierRegistry` | Consumed nullifiers and key images |
//! | `VkRegistry` | Verification key per circuit |
//! | `LedgerState` | Tree + registry + event log, mutated via `Transition` |

pub mod commitment_tree;
pub mod ledger;
pub mod nullifier;
pub mod vk_registry;

// Re-exports
pub use commitment_tree::*;
pub use ledger::*;
pub use nullifier::*;
pub use vk_registry::*;
