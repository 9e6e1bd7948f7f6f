//! Shielded Pool Node - hosts one pool behind a REST API
//!
//! The ledger core (`shielded_pool`) is host-agnostic. This crate supplies
//! everything around it:
//!
//! 1. **Proof verifier** - [`RemoteVerifier`] forwards proofs to an external
//!    verifier service over HTTP
//! 2. **Asset custody** - [`CustodyBook`] keeps per-asset balances and the
//!    pool's custody account
//! 3. **Persistence** - [`LedgerStore`] (SQLite or in-memory) receives every
//!    committed delta and restores the pool on startup
//! 4. **API** - axum routes for transitions and ledger reads

pub mod api;
pub mod common;
pub mod custody;
pub mod service;
pub mod storage;
pub mod types;
pub mod verifier_client;

// Re-exports: configuration and errors
pub use common::{NodeConfig, NodeError};

// Re-exports: collaborators
pub use custody::CustodyBook;
pub use verifier_client::RemoteVerifier;

// Re-exports: service and storage
pub use service::{LedgerSummary, NodeView, PoolService, Submission};
pub use storage::{open_store, LedgerStore, MemoryLedgerStore, SqliteLedgerStore, StorageError};
