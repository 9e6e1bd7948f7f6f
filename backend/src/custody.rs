//! Custody book
//!
//! Balances per `(asset, account)`. Deposits move funds from the depositor to
//! the pool's custody account; withdrawals move them from custody to the
//! receiver. A movement that would overdraw either side fails without
//! touching any balance.
//!
//! The book lives in memory. Every balance it changes is remembered until
//! [`CustodyBook::take_changes`] hands it to the store, which persists it
//! together with the transition that moved it.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};

use shielded_pool::{Address, AssetTransfer, TransferError};

use crate::storage::Balance;

#[derive(Debug, Default)]
struct Book {
    balances: HashMap<(Address, Address), u64>,
    /// Keys changed since the last `take_changes`
    changed: BTreeSet<(Address, Address)>,
}

impl Book {
    fn set(&mut self, asset: &Address, account: &Address, amount: u64) {
        self.balances.insert((*asset, *account), amount);
        self.changed.insert((*asset, *account));
    }

    fn get(&self, asset: &Address, account: &Address) -> u64 {
        self.balances.get(&(*asset, *account)).copied().unwrap_or(0)
    }
}

#[derive(Debug)]
pub struct CustodyBook {
    custody_account: Address,
    book: Mutex<Book>,
}

impl CustodyBook {
    pub fn new(custody_account: Address) -> Self {
        Self {
            custody_account,
            book: Mutex::new(Book::default()),
        }
    }

    /// Load persisted balances; they replace any in-memory value for the same key
    pub fn restore(&self, balances: &[Balance]) {
        let mut book = self.book();
        for balance in balances {
            book.balances
                .insert((balance.asset, balance.account), balance.amount);
            book.changed.remove(&(balance.asset, balance.account));
        }
    }

    /// Current value of every balance changed since the last call
    pub fn take_changes(&self) -> Vec<Balance> {
        let mut book = self.book();
        let changed = std::mem::take(&mut book.changed);
        changed
            .into_iter()
            .map(|(asset, account)| Balance {
                asset,
                account,
                amount: book.get(&asset, &account),
            })
            .collect()
    }

    pub fn custody_account(&self) -> &Address {
        &self.custody_account
    }

    /// Mint `amount` of `asset` to `account`, returning the new balance
    pub fn credit(&self, asset: &Address, account: &Address, amount: u64) -> Result<u64, TransferError> {
        let mut book = self.book();
        let balance = book
            .get(asset, account)
            .checked_add(amount)
            .ok_or_else(|| TransferError::Rejected("balance overflow".to_string()))?;
        book.set(asset, account, balance);
        Ok(balance)
    }

    pub fn balance(&self, asset: &Address, account: &Address) -> u64 {
        self.book().get(asset, account)
    }

    /// Assets currently held in pool custody
    pub fn pooled(&self, asset: &Address) -> u64 {
        self.balance(asset, &self.custody_account)
    }

    fn book(&self) -> MutexGuard<'_, Book> {
        // Every mutation below completes before the guard drops
        self.book.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn move_funds(
        &self,
        asset: &Address,
        from: &Address,
        to: &Address,
        amount: u64,
    ) -> Result<(), TransferError> {
        let mut book = self.book();

        let available = book.get(asset, from);
        if available < amount {
            return Err(TransferError::InsufficientBalance {
                available,
                requested: amount,
            });
        }
        if from == to {
            return Ok(());
        }
        let credited = book
            .get(asset, to)
            .checked_add(amount)
            .ok_or_else(|| TransferError::Rejected("balance overflow".to_string()))?;

        book.set(asset, from, available - amount);
        book.set(asset, to, credited);

        tracing::debug!(
            target: "shielded_pool_node::custody",
            asset = %hex::encode(asset),
            from = %hex::encode(from),
            to = %hex::encode(to),
            amount,
            "funds moved"
        );
        Ok(())
    }
}

impl AssetTransfer for CustodyBook {
    fn pull(&self, asset: &Address, depositor: &Address, amount: u64) -> Result<(), TransferError> {
        self.move_funds(asset, depositor, &self.custody_account, amount)
    }

    fn push(&self, asset: &Address, receiver: &Address, amount: u64) -> Result<(), TransferError> {
        self.move_funds(asset, &self.custody_account, receiver, amount)
    }
}
