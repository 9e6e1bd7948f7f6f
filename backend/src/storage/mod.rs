//! Storage Layer Module
//!
//! Provides persistence for ledger state, custody balances and published
//! events.
//!
//! This module contains:
//! - Storage trait definitions for abstraction
//! - SQLite implementation for production
//! - In-memory implementation for testing

pub mod memory;
pub mod sqlite;
pub mod traits;

use std::sync::Arc;

use crate::common::StoreLocation;

// Re-exports for convenience
pub use memory::MemoryLedgerStore;
pub use sqlite::SqliteLedgerStore;
pub use traits::{Balance, LedgerStore, StorageError, StorageResult};

/// Open the store a node is configured with
pub fn open_store(location: &StoreLocation) -> StorageResult<Arc<dyn LedgerStore>> {
    match location {
        StoreLocation::Memory => Ok(Arc::new(MemoryLedgerStore::new())),
        StoreLocation::Sqlite(path) => Ok(Arc::new(SqliteLedgerStore::new(path)?)),
    }
}
