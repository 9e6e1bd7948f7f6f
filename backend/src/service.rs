//! Pool service
//!
//! Owns one [`ShieldedPool`] and the store it is persisted to. Submissions are
//! serialized through a single async writer lock, executed on a blocking
//! thread (the proof verifier may block on network I/O), and the resulting
//! [`StateDelta`] is persisted, together with the custody balances it moved,
//! before the call returns.
//!
//! Reads do not take the writer lock. They go straight to the pool and only
//! wait out the short window in which a transition holds the ledger itself,
//! never a pending proof verification. A read may therefore observe a
//! committed transition a moment before its delta reaches the store.
//!
//! If persisting a committed delta fails, the in-memory ledger is ahead of
//! the store. The service then refuses further submissions until restarted,
//! at which point it reloads the last persisted state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use shielded_pool::{
    Address, CircuitKind, Hash32, LedgerState, NullifierRecord, PoolError, ProofVerifier,
    ShieldedPool, StateDelta, VkRegistry,
};
use tokio::sync::Mutex;

use crate::common::{log_published_events, log_transition_event, NodeError, Result};
use crate::custody::CustodyBook;
use crate::storage::LedgerStore;
use crate::types::StoredEvent;

/// Most transitions covered by one [`PoolService::events`] page
pub const MAX_EVENT_PAGE: u64 = 500;

/// Pause between attempts while a transition holds the ledger
const READ_RETRY_DELAY: Duration = Duration::from_millis(2);

/// Attempts before a read gives up with `StateBusy`
const READ_ATTEMPTS: u32 = 500;

/// A transition request, owned so it can cross to a blocking thread
#[derive(Debug, Clone)]
pub enum Submission {
    Deposit {
        depositor: Address,
        asset: Address,
        amount: u64,
        commitment: Hash32,
        memo: Vec<u8>,
    },
    Transact {
        public_inputs: Vec<u8>,
        proof: Vec<u8>,
    },
    Withdraw {
        public_inputs: Vec<u8>,
        proof: Vec<u8>,
        receiver: Address,
    },
    Swap {
        public_inputs: Vec<u8>,
        proof: Vec<u8>,
    },
    /// Discriminator-prefixed instruction bytes
    Instruction(Vec<u8>),
}

impl Submission {
    pub fn operation(&self) -> &'static str {
        match self {
            Submission::Deposit { .. } => "deposit",
            Submission::Transact { .. } => "transact",
            Submission::Withdraw { .. } => "withdraw",
            Submission::Swap { .. } => "execute_swap",
            Submission::Instruction(_) => "instruction",
        }
    }

    fn apply<V: ProofVerifier>(
        &self,
        pool: &ShieldedPool<V, CustodyBook>,
    ) -> std::result::Result<StateDelta, PoolError> {
        match self {
            Submission::Deposit {
                depositor,
                asset,
                amount,
                commitment,
                memo,
            } => pool.deposit(depositor, asset, *amount, commitment, memo),
            Submission::Transact {
                public_inputs,
                proof,
            } => pool.transact(public_inputs, proof),
            Submission::Withdraw {
                public_inputs,
                proof,
                receiver,
            } => pool.withdraw(public_inputs, proof, receiver),
            Submission::Swap {
                public_inputs,
                proof,
            } => pool.execute_swap(public_inputs, proof),
            Submission::Instruction(data) => pool.process_instruction(data),
        }
    }
}

/// Ledger summary served by `GET /api/state`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerSummary {
    pub root: Hash32,
    pub next_index: u64,
    pub sequence: u64,
    pub identifiers: usize,
}

/// Tree node lookup result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeView {
    /// Value written by an insertion, if any
    pub stored: Option<Hash32>,
    /// Stored value, or the empty-subtree hash for the level
    pub value: Hash32,
}

pub struct PoolService<V> {
    pool: Arc<ShieldedPool<V, CustodyBook>>,
    store: Arc<dyn LedgerStore>,
    writer: Mutex<()>,
    halted: AtomicBool,
}

impl<V: ProofVerifier + 'static> PoolService<V> {
    /// Open the pool from the store's last snapshot, or fresh if it has none
    pub async fn open(
        verifier: V,
        keys: VkRegistry,
        custody: CustodyBook,
        store: Arc<dyn LedgerStore>,
    ) -> Result<Self> {
        let balances = store.load_balances().await?;
        custody.restore(&balances);
        // Credits made before opening are not in the store yet
        let pending = custody.take_changes();
        if !pending.is_empty() {
            store.save_balances(&pending).await?;
        }
        tracing::info!(
            target: "shielded_pool_node::service",
            restored = balances.len(),
            credited = pending.len(),
            "custody balances loaded"
        );

        let pool = match store.load_snapshot().await? {
            Some(snapshot) => ShieldedPool::restore(snapshot, verifier, keys, custody)?,
            None => {
                tracing::info!(target: "shielded_pool_node::service", "starting with an empty ledger");
                ShieldedPool::new(verifier, keys, custody)?
            }
        };

        Ok(Self {
            pool: Arc::new(pool),
            store,
            writer: Mutex::new(()),
            halted: AtomicBool::new(false),
        })
    }

    /// Run one transition and persist its delta
    ///
    /// Runs on its own task, so a caller that goes away mid-call cannot leave
    /// a committed transition unpersisted.
    pub async fn submit(
        self: &Arc<Self>,
        submission: Submission,
        correlation_id: &str,
    ) -> Result<StateDelta> {
        let operation = submission.operation();
        let service = Arc::clone(self);
        let outcome = tokio::spawn(async move { service.submit_inner(submission).await })
            .await
            .unwrap_or_else(|e| Err(NodeError::internal(format!("submission task failed: {}", e))));
        log_transition_event(operation, correlation_id, &outcome);
        outcome
    }

    async fn submit_inner(&self, submission: Submission) -> Result<StateDelta> {
        let _writer = self.writer.lock().await;
        self.ensure_running()?;

        let pool = Arc::clone(&self.pool);
        let delta = tokio::task::spawn_blocking(move || submission.apply(&pool))
            .await
            .map_err(|e| NodeError::internal(format!("transition task failed: {}", e)))??;

        let balances = self.pool.assets().take_changes();
        if let Err(e) = self.store.apply_delta(&delta, &balances).await {
            self.halted.store(true, Ordering::Release);
            tracing::error!(
                target: "shielded_pool_node::service",
                sequence = delta.sequence,
                error = %e,
                "committed transition could not be persisted; refusing further submissions"
            );
            return Err(e.into());
        }
        log_published_events(&StoredEvent::from_delta(&delta));

        Ok(delta)
    }

    /// Credit a custody account and persist the new balance
    pub async fn credit(&self, asset: &Address, account: &Address, amount: u64) -> Result<u64> {
        let _writer = self.writer.lock().await;
        self.ensure_running()?;

        let custody = self.pool.assets();
        let balance = custody
            .credit(asset, account, amount)
            .map_err(|e| NodeError::validation(e.to_string()))?;

        if let Err(e) = self.store.save_balances(&custody.take_changes()).await {
            self.halted.store(true, Ordering::Release);
            tracing::error!(
                target: "shielded_pool_node::service",
                error = %e,
                "custody credit could not be persisted; refusing further submissions"
            );
            return Err(e.into());
        }
        Ok(balance)
    }

    fn ensure_running(&self) -> Result<()> {
        if self.halted.load(Ordering::Acquire) {
            return Err(NodeError::internal(
                "ledger is ahead of its store; restart the node to reload",
            ));
        }
        Ok(())
    }

    /// Run `f` against a consistent view of the ledger
    ///
    /// Retries while a transition holds the ledger; fails with `StateBusy` if
    /// it stays held.
    pub async fn read<R>(&self, f: impl Fn(&LedgerState) -> R) -> Result<R> {
        for _ in 1..READ_ATTEMPTS {
            match self.pool.read(&f) {
                Err(PoolError::StateBusy) => tokio::time::sleep(READ_RETRY_DELAY).await,
                outcome => return Ok(outcome?),
            }
        }
        Ok(self.pool.read(&f)?)
    }

    pub async fn summary(&self) -> Result<LedgerSummary> {
        self.read(|state| LedgerSummary {
            root: state.tree().root(),
            next_index: state.tree().next_index(),
            sequence: state.sequence(),
            identifiers: state.registry().len(),
        })
        .await
    }

    /// Registry entry for a nullifier or key image
    pub async fn identifier(&self, id: &Hash32) -> Result<Option<NullifierRecord>> {
        let id = *id;
        self.read(move |state| state.registry().record(&id).copied()).await
    }

    pub async fn node(&self, level: u32, position: u32) -> Result<NodeView> {
        let depth = shielded_pool::constants::TREE_DEPTH as u32;
        if level > depth || u64::from(position) >= (1u64 << (depth - level)) {
            return Err(NodeError::validation(format!(
                "no node at level {} position {}",
                level, position
            )));
        }

        self.read(move |state| {
            let tree = state.tree();
            let stored = tree.node(level, position);
            let value = if level == depth {
                tree.root()
            } else {
                stored
                    .or_else(|| tree.zero_hash(level as usize).copied())
                    .unwrap_or_default()
            };
            NodeView { stored, value }
        })
        .await
    }

    /// Persisted events of up to `transitions` transitions after `after_sequence`
    pub async fn events(&self, after_sequence: u64, transitions: u64) -> Result<Vec<StoredEvent>> {
        Ok(self
            .store
            .events(after_sequence, transitions.min(MAX_EVENT_PAGE))
            .await?)
    }

    pub fn verification_key(&self, circuit: CircuitKind) -> &[u8] {
        self.pool.verification_key(circuit)
    }

    pub fn custody(&self) -> &CustodyBook {
        self.pool.assets()
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::Acquire)
    }
}
