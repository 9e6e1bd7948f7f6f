//! Replay registry
//!
//! Nullifiers and key images share a single namespace keyed by the raw 32
//! bytes. The record kind and consuming operation are kept for diagnostics
//! only and never take part in the membership check, so a key image equal to
//! a previously spent nullifier is rejected.

use std::collections::{HashMap, HashSet};

use crate::error::PoolError;
use crate::Hash32;

/// What the consumed identifier was declared as
#[repr(u8)]
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum IdentifierKind {
    /// Spent-note nullifier
    Nullifier = 0,
    /// Swap order key image
    KeyImage = 1,
}

impl IdentifierKind {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(IdentifierKind::Nullifier),
            1 => Some(IdentifierKind::KeyImage),
            _ => None,
        }
    }
}

/// Type of operation that consumed the identifier
#[repr(u8)]
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum OperationType {
    /// Private transfer (transact)
    PrivateTransfer = 0,
    /// Withdrawal to a public receiver
    Withdrawal = 1,
    /// Matched swap of two orders
    Swap = 2,
}

impl OperationType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(OperationType::PrivateTransfer),
            1 => Some(OperationType::Withdrawal),
            2 => Some(OperationType::Swap),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::PrivateTransfer => "private_transfer",
            OperationType::Withdrawal => "withdrawal",
            OperationType::Swap => "swap",
        }
    }
}

/// Diagnostic record stored per consumed identifier
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct NullifierRecord {
    pub kind: IdentifierKind,
    pub operation: OperationType,
    /// Transition sequence number that consumed the identifier
    pub sequence: u64,
}

/// Set of consumed one-time identifiers
#[derive(Clone, Debug, Default)]
pub struct NullifierRegistry {
    used: HashMap<Hash32, NullifierRecord>,
}

impl NullifierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted records
    pub fn restore(records: impl IntoIterator<Item = (Hash32, NullifierRecord)>) -> Self {
        Self {
            used: records.into_iter().collect(),
        }
    }

    pub fn is_used(&self, id: &Hash32) -> bool {
        self.used.contains_key(id)
    }

    pub fn record(&self, id: &Hash32) -> Option<&NullifierRecord> {
        self.used.get(id)
    }

    pub fn len(&self) -> usize {
        self.used.len()
    }

    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = (&Hash32, &NullifierRecord)> {
        self.used.iter()
    }

    /// Fail with `AlreadyUsed(id)` if present, otherwise mark it
    pub fn check_and_mark(&mut self, id: &Hash32, record: NullifierRecord) -> Result<(), PoolError> {
        if self.used.contains_key(id) {
            return Err(PoolError::AlreadyUsed(*id));
        }
        self.used.insert(*id, record);
        Ok(())
    }

    /// Check every id, against the registry and against each other, before
    /// marking any of them.
    pub fn check_and_mark_all(
        &mut self,
        ids: &[Hash32],
        record: NullifierRecord,
    ) -> Result<(), PoolError> {
        let mut seen = HashSet::with_capacity(ids.len());
        for id in ids {
            if self.used.contains_key(id) || !seen.insert(id) {
                return Err(PoolError::AlreadyUsed(*id));
            }
        }
        for id in ids {
            self.used.insert(*id, record);
        }
        Ok(())
    }

    /// Rollback only. Marks are otherwise permanent.
    pub(crate) fn unmark(&mut self, id: &Hash32) {
        self.used.remove(id);
    }
}
