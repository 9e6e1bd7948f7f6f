//! In-Memory Storage Implementation
//!
//! Provides in-memory ledger storage for testing and development.
//! Data is lost when the service restarts.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use shielded_pool::{Address, Hash32, LedgerSnapshot, NullifierRecord, StateDelta};
use tokio::sync::RwLock;

use super::traits::{check_sequence, Balance, LedgerStore, StorageError, StorageResult};
use crate::types::StoredEvent;

#[derive(Default)]
struct MemoryLedger {
    meta: Option<(Hash32, u64, u64)>,
    nodes: BTreeMap<u64, Hash32>,
    identifiers: BTreeMap<Hash32, NullifierRecord>,
    balances: BTreeMap<(Address, Address), u64>,
    events: Vec<StoredEvent>,
}

impl MemoryLedger {
    fn write_balances(&mut self, balances: &[Balance]) {
        for balance in balances {
            self.balances
                .insert((balance.asset, balance.account), balance.amount);
        }
    }
}

/// In-memory ledger store
///
/// Thread-safe; clones share the same ledger.
#[derive(Clone, Default)]
pub struct MemoryLedgerStore {
    inner: Arc<RwLock<MemoryLedger>>,
}

impl MemoryLedgerStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of persisted events
    pub async fn event_count(&self) -> usize {
        self.inner.read().await.events.len()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn apply_delta(&self, delta: &StateDelta, balances: &[Balance]) -> StorageResult<()> {
        let mut ledger = self.inner.write().await;

        let stored = ledger.meta.map(|(_, _, sequence)| sequence).unwrap_or(0);
        check_sequence(stored, delta.sequence)?;
        if let Some((id, _)) = delta
            .marked
            .iter()
            .find(|(id, _)| ledger.identifiers.contains_key(id))
        {
            return Err(StorageError::Duplicate(hex::encode(id)));
        }

        ledger.meta = Some((delta.root, delta.next_index, delta.sequence));
        ledger.nodes.extend(delta.nodes.iter().copied());
        ledger.identifiers.extend(delta.marked.iter().copied());
        ledger.events.extend(StoredEvent::from_delta(delta));
        ledger.write_balances(balances);
        Ok(())
    }

    async fn save_balances(&self, balances: &[Balance]) -> StorageResult<()> {
        self.inner.write().await.write_balances(balances);
        Ok(())
    }

    async fn load_snapshot(&self) -> StorageResult<Option<LedgerSnapshot>> {
        let ledger = self.inner.read().await;
        Ok(ledger.meta.map(|(root, next_index, sequence)| LedgerSnapshot {
            root,
            next_index,
            sequence,
            nodes: ledger.nodes.iter().map(|(k, v)| (*k, *v)).collect(),
            identifiers: ledger.identifiers.iter().map(|(k, v)| (*k, *v)).collect(),
        }))
    }

    async fn load_balances(&self) -> StorageResult<Vec<Balance>> {
        let ledger = self.inner.read().await;
        Ok(ledger
            .balances
            .iter()
            .map(|((asset, account), amount)| Balance {
                asset: *asset,
                account: *account,
                amount: *amount,
            })
            .collect())
    }

    async fn events(&self, after_sequence: u64, transitions: u64) -> StorageResult<Vec<StoredEvent>> {
        let last = after_sequence.saturating_add(transitions);
        let ledger = self.inner.read().await;
        Ok(ledger
            .events
            .iter()
            .filter(|e| e.sequence > after_sequence && e.sequence <= last)
            .cloned()
            .collect())
    }

    async fn sequence(&self) -> StorageResult<u64> {
        Ok(self
            .inner
            .read()
            .await
            .meta
            .map(|(_, _, sequence)| sequence)
            .unwrap_or(0))
    }
}
