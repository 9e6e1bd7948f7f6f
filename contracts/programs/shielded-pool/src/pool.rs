//! Transition validator
//!
//! `ShieldedPool` owns the ledger state and drives every transition:
//! gateway verification, public-parameter decoding, registry and accumulator
//! updates, custody calls and event publication.
//!
//! ## Execution model
//!
//! - Single writer. The ledger sits behind a mutex that is only ever
//!   `try_lock`ed, so a nested call made while a transition is in flight
//!   fails with `StateBusy` instead of blocking or seeing partial state.
//! - Deposit and withdrawal additionally hold a non-reentrant entry guard for
//!   the whole call, since they hand control to the asset custodian. Nested
//!   entry into either fails with `Reentrancy`.
//! - Every transition is journaled and rolled back on any failure, including
//!   a failed custody transfer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, TryLockError};

use crate::error::PoolError;
use crate::gateway::{ProofGateway, ProofVerifier};
use crate::instruction;
use crate::instructions::{
    process_deposit, process_execute_swap, process_transact, process_withdraw, DepositData,
    ProofEnvelope, SwapPublicInputs, TransferPublicInputs, WithdrawPublicInputs,
};
use crate::state::{CircuitKind, LedgerSnapshot, LedgerState, StateDelta, VkRegistry};
use crate::utils::parsing::{ensure_consumed, read_bytes32};
use crate::utils::AssetTransfer;
use crate::{Address, Hash32};

/// Scoped mutual exclusion for calls that reach untrusted custody code
#[derive(Debug, Default)]
pub struct NonReentrant {
    entered: AtomicBool,
}

/// Releases the entry lock on every exit path
#[must_use]
pub struct EntryGuard<'a> {
    lock: &'a NonReentrant,
}

impl NonReentrant {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&self) -> Result<EntryGuard<'_>, PoolError> {
        self.entered
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .map_err(|_| PoolError::Reentrancy)?;
        Ok(EntryGuard { lock: self })
    }

    pub fn is_entered(&self) -> bool {
        self.entered.load(Ordering::Acquire)
    }
}

impl Drop for EntryGuard<'_> {
    fn drop(&mut self) {
        self.lock.entered.store(false, Ordering::Release);
    }
}

/// Shielded pool ledger core
pub struct ShieldedPool<V, A> {
    state: Mutex<LedgerState>,
    gateway: ProofGateway<V>,
    assets: A,
    entry: NonReentrant,
}

impl<V: ProofVerifier, A: AssetTransfer> ShieldedPool<V, A> {
    /// Fresh pool: empty tree, empty registry
    pub fn new(verifier: V, keys: VkRegistry, assets: A) -> Result<Self, PoolError> {
        Ok(Self::with_state(LedgerState::new()?, verifier, keys, assets))
    }

    /// Pool reloaded from a persisted snapshot
    pub fn restore(
        snapshot: LedgerSnapshot,
        verifier: V,
        keys: VkRegistry,
        assets: A,
    ) -> Result<Self, PoolError> {
        let state = LedgerState::restore(snapshot)?;
        tracing::info!(
            target: "shielded_pool::pool",
            root = %hex::encode(state.tree().root()),
            next_index = state.tree().next_index(),
            identifiers = state.registry().len(),
            sequence = state.sequence(),
            "ledger restored"
        );
        Ok(Self::with_state(state, verifier, keys, assets))
    }

    fn with_state(state: LedgerState, verifier: V, keys: VkRegistry, assets: A) -> Self {
        Self {
            state: Mutex::new(state),
            gateway: ProofGateway::new(verifier, keys),
            assets,
            entry: NonReentrant::new(),
        }
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, LedgerState>, PoolError> {
        match self.state.try_lock() {
            Ok(guard) => Ok(guard),
            Err(TryLockError::WouldBlock) => Err(PoolError::StateBusy),
            // Transitions roll back while unwinding, so a poisoned state is consistent
            Err(TryLockError::Poisoned(poisoned)) => Ok(poisoned.into_inner()),
        }
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Deposit `amount` of `asset` and append `commitment`
    pub fn deposit(
        &self,
        depositor: &Address,
        asset: &Address,
        amount: u64,
        commitment: &Hash32,
        memo: &[u8],
    ) -> Result<StateDelta, PoolError> {
        self.deposit_data(&DepositData {
            depositor: *depositor,
            asset: *asset,
            amount,
            commitment: *commitment,
            memo,
        })
    }

    fn deposit_data(&self, args: &DepositData<'_>) -> Result<StateDelta, PoolError> {
        let result = (|| -> Result<StateDelta, PoolError> {
            let _entry = self.entry.enter()?;
            let mut state = self.lock_state()?;
            let mut tx = state.begin();
            process_deposit(&mut tx, &self.assets, args)?;
            Ok(tx.commit())
        })();
        log_outcome("deposit", result)
    }

    /// Private transfer
    pub fn transact(&self, public_inputs: &[u8], proof: &[u8]) -> Result<StateDelta, PoolError> {
        let result = (|| -> Result<StateDelta, PoolError> {
            let verified = self.gateway.verify(CircuitKind::Transfer, public_inputs, proof)?;
            let params = TransferPublicInputs::decode(&verified)?;

            let mut state = self.lock_state()?;
            let mut tx = state.begin();
            process_transact(&mut tx, params)?;
            Ok(tx.commit())
        })();
        log_outcome("transact", result)
    }

    /// Withdraw to `receiver`, which must match the receiver the proof declares
    pub fn withdraw(
        &self,
        public_inputs: &[u8],
        proof: &[u8],
        receiver: &Address,
    ) -> Result<StateDelta, PoolError> {
        let result = (|| -> Result<StateDelta, PoolError> {
            let _entry = self.entry.enter()?;
            let verified = self.gateway.verify(CircuitKind::Withdraw, public_inputs, proof)?;
            let params = WithdrawPublicInputs::decode(&verified)?;

            let mut state = self.lock_state()?;
            let mut tx = state.begin();
            process_withdraw(&mut tx, &self.assets, params, receiver)?;
            Ok(tx.commit())
        })();
        log_outcome("withdraw", result)
    }

    /// Settle two matched orders
    pub fn execute_swap(&self, public_inputs: &[u8], proof: &[u8]) -> Result<StateDelta, PoolError> {
        let result = (|| -> Result<StateDelta, PoolError> {
            let verified = self.gateway.verify(CircuitKind::Swap, public_inputs, proof)?;
            let params = SwapPublicInputs::decode(&verified)?;

            let mut state = self.lock_state()?;
            let mut tx = state.begin();
            process_execute_swap(&mut tx, params)?;
            Ok(tx.commit())
        })();
        log_outcome("execute_swap", result)
    }

    /// Route a discriminator-prefixed instruction
    pub fn process_instruction(&self, instruction_data: &[u8]) -> Result<StateDelta, PoolError> {
        let (discriminator, data) = instruction_data
            .split_first()
            .ok_or(PoolError::InvalidInstructionData)?;

        match *discriminator {
            instruction::DEPOSIT => {
                let args = DepositData::from_bytes(data)?;
                self.deposit_data(&args)
            }
            instruction::TRANSACT => {
                let envelope = parse_envelope(data, false)?.0;
                self.transact(envelope.public_inputs, envelope.proof)
            }
            instruction::WITHDRAW => {
                let (envelope, receiver) = parse_envelope(data, true)?;
                let receiver = receiver.ok_or(PoolError::InvalidInstructionData)?;
                self.withdraw(envelope.public_inputs, envelope.proof, &receiver)
            }
            instruction::EXECUTE_SWAP => {
                let envelope = parse_envelope(data, false)?.0;
                self.execute_swap(envelope.public_inputs, envelope.proof)
            }
            _ => Err(PoolError::InvalidInstructionData),
        }
    }

    // =========================================================================
    // Readable state
    // =========================================================================

    /// Run `f` against a consistent view of the ledger
    pub fn read<R>(&self, f: impl FnOnce(&LedgerState) -> R) -> Result<R, PoolError> {
        let state = self.lock_state()?;
        Ok(f(&*state))
    }

    pub fn root(&self) -> Result<Hash32, PoolError> {
        self.read(|s| s.tree().root())
    }

    pub fn next_index(&self) -> Result<u64, PoolError> {
        self.read(|s| s.tree().next_index())
    }

    pub fn is_used(&self, id: &Hash32) -> Result<bool, PoolError> {
        self.read(|s| s.registry().is_used(id))
    }

    pub fn node(&self, level: u32, position: u32) -> Result<Option<Hash32>, PoolError> {
        self.read(|s| s.tree().node(level, position))
    }

    pub fn snapshot(&self) -> Result<LedgerSnapshot, PoolError> {
        self.read(LedgerState::snapshot)
    }

    pub fn verification_key(&self, circuit: CircuitKind) -> &[u8] {
        self.gateway.verification_key(circuit)
    }

    pub fn verifier(&self) -> &V {
        self.gateway.verifier()
    }

    pub fn assets(&self) -> &A {
        &self.assets
    }
}

fn parse_envelope(
    data: &[u8],
    with_receiver: bool,
) -> Result<(ProofEnvelope<'_>, Option<Address>), PoolError> {
    let mut offset = 0;
    let envelope = ProofEnvelope::parse(data, &mut offset)?;
    let receiver = if with_receiver {
        Some(read_bytes32(data, &mut offset)?)
    } else {
        None
    };
    ensure_consumed(data, offset)?;
    Ok((envelope, receiver))
}

fn log_outcome(
    operation: &'static str,
    result: Result<StateDelta, PoolError>,
) -> Result<StateDelta, PoolError> {
    match &result {
        Ok(delta) => tracing::debug!(
            target: "shielded_pool::pool",
            operation,
            sequence = delta.sequence,
            events = delta.events.len(),
            "transition committed"
        ),
        Err(e) => tracing::warn!(
            target: "shielded_pool::pool",
            operation,
            code = e.code(),
            error = %e,
            "transition rejected"
        ),
    }
    result
}
