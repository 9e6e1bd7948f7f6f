//! Storage Trait Definitions
//!
//! Defines the abstract interface for persisting ledger state.
//! Implementations can use SQLite (production) or in-memory (testing).

use async_trait::async_trait;
use shielded_pool::{Address, LedgerSnapshot, StateDelta};
use thiserror::Error;

use crate::types::StoredEvent;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Duplicate record: {0}")]
    Duplicate(String),

    #[error("Out-of-order delta: stored sequence {stored}, delta sequence {delta}")]
    OutOfOrder { stored: u64, delta: u64 },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Connection error: {0}")]
    Connection(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Custody balance of one account in one asset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Balance {
    pub asset: Address,
    pub account: Address,
    pub amount: u64,
}

/// Ledger persistence interface
///
/// Implementations:
/// - `SqliteLedgerStore` - Production storage with SQLite
/// - `MemoryLedgerStore` - In-memory storage for testing
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Persist one committed transition and the custody balances it moved,
    /// all or nothing
    ///
    /// Deltas must arrive in sequence order, each exactly once.
    async fn apply_delta(&self, delta: &StateDelta, balances: &[Balance]) -> StorageResult<()>;

    /// Overwrite custody balances changed outside a transition
    async fn save_balances(&self, balances: &[Balance]) -> StorageResult<()>;

    /// Ledger image to restore from, `None` for a store that never saw a delta
    async fn load_snapshot(&self) -> StorageResult<Option<LedgerSnapshot>>;

    /// Every persisted custody balance
    async fn load_balances(&self) -> StorageResult<Vec<Balance>>;

    /// Events of the transitions numbered `after_sequence + 1 ..= after_sequence + transitions`,
    /// oldest first
    ///
    /// Sequences are contiguous, so paging by sequence never splits a
    /// transition's events.
    async fn events(&self, after_sequence: u64, transitions: u64) -> StorageResult<Vec<StoredEvent>>;

    /// Sequence of the last applied delta (0 when empty)
    async fn sequence(&self) -> StorageResult<u64>;
}

/// Reject a delta that does not directly follow the stored sequence
pub(crate) fn check_sequence(stored: u64, delta: u64) -> StorageResult<()> {
    if stored.checked_add(1) == Some(delta) {
        Ok(())
    } else {
        Err(StorageError::OutOfOrder { stored, delta })
    }
}
