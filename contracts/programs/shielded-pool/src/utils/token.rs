//! Asset transfer seam
//!
//! Custody mechanics live outside the pool. The pool only asks the custodian
//! to pull funds in on deposit and push funds out on withdrawal, and treats
//! any error as a failed transition.
//!
//! # Security
//! Both calls hand control to code the pool does not trust. Callers MUST hold
//! the pool's non-reentrant entry lock for the duration of the call.

use thiserror::Error;

use crate::Address;

/// Custodian failures
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum TransferError {
    #[error("insufficient balance: available {available}, requested {requested}")]
    InsufficientBalance { available: u64, requested: u64 },

    #[error("unknown asset")]
    UnknownAsset,

    #[error("transfer rejected: {0}")]
    Rejected(String),
}

/// Fungible asset custody used by deposit and withdrawal
#[cfg_attr(test, mockall::automock)]
pub trait AssetTransfer: Send + Sync {
    /// Move `amount` of `asset` from `depositor` into pool custody
    fn pull(&self, asset: &Address, depositor: &Address, amount: u64) -> Result<(), TransferError>;

    /// Move `amount` of `asset` from pool custody to `receiver`
    fn push(&self, asset: &Address, receiver: &Address, amount: u64) -> Result<(), TransferError>;
}

/// `true` when an address/asset identifier is the all-zero null value
#[inline(always)]
pub fn is_null(id: &Address) -> bool {
    id.iter().all(|b| *b == 0)
}
