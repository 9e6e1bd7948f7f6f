//! Published pool events
//!
//! Events are the only channel through which off-ledger observers (wallets,
//! indexers) learn about new commitments. They are published when a
//! transition commits and discarded when it rolls back.

use crate::{Address, Hash32};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PoolEvent {
    /// A commitment became part of the accumulator. `memo` is opaque
    /// (encrypted note data on deposit, empty for proof-gated outputs).
    AccountUpdated { commitment: Hash32, memo: Vec<u8> },

    TransactionExecuted {
        new_root: Hash32,
        nullifiers: Vec<Hash32>,
        new_commitments: Vec<Hash32>,
    },

    WithdrawExecuted {
        receiver: Address,
        asset: Address,
        amount: u64,
    },

    SwapExecuted {
        new_root: Hash32,
        order_a_key_image: Hash32,
        order_b_key_image: Hash32,
    },
}

impl PoolEvent {
    pub fn name(&self) -> &'static str {
        match self {
            PoolEvent::AccountUpdated { .. } => "account_updated",
            PoolEvent::TransactionExecuted { .. } => "transaction_executed",
            PoolEvent::WithdrawExecuted { .. } => "withdraw_executed",
            PoolEvent::SwapExecuted { .. } => "swap_executed",
        }
    }

    /// `AccountUpdated` with an empty memo for each output commitment
    pub(crate) fn outputs(commitments: &[Hash32]) -> impl Iterator<Item = PoolEvent> + '_ {
        commitments.iter().map(|commitment| PoolEvent::AccountUpdated {
            commitment: *commitment,
            memo: Vec::new(),
        })
    }
}
