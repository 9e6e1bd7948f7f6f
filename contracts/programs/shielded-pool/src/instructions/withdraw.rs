//! Withdraw instruction
//!
//! Spends notes and pays a public amount out of custody to a receiver. The
//! receiver declared in the proof must equal the receiver the call was made
//! with, so a valid proof cannot be redirected after it was generated.
//!
//! Flow:
//! 1. Bind receiver, validate asset and amount
//! 2. Mark nullifiers, set the declared root, publish change outputs
//! 3. Push funds to the receiver (last, after all ledger effects)

use crate::constants::{MAX_NULLIFIERS, MAX_OUTPUT_COMMITMENTS};
use crate::error::PoolError;
use crate::events::PoolEvent;
use crate::gateway::VerifiedInputs;
use crate::state::{CircuitKind, IdentifierKind, OperationType, Transition};
use crate::utils::parsing::{
    ensure_consumed, parse_u64_le, read_bytes32, read_hash_list, write_hash_list,
};
use crate::utils::{is_null, AssetTransfer};
use crate::{Address, Hash32};

/// Withdrawal public parameters
///
/// Layout:
/// - new_root: [u8; 32]
/// - nullifier_count: u32, nullifiers: [[u8; 32]; n]
/// - asset: [u8; 32]
/// - amount: u64 (LE)
/// - receiver: [u8; 32]
/// - commitment_count: u32, commitments: [[u8; 32]; m]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WithdrawPublicInputs {
    pub new_root: Hash32,
    pub nullifiers: Vec<Hash32>,
    pub asset: Address,
    pub amount: u64,
    pub receiver: Address,
    pub new_commitments: Vec<Hash32>,
}

impl WithdrawPublicInputs {
    pub fn decode(verified: &VerifiedInputs<'_>) -> Result<Self, PoolError> {
        if verified.circuit() != CircuitKind::Withdraw {
            return Err(PoolError::InvalidPublicInputs("not withdraw inputs"));
        }
        let data = verified.bytes();
        let mut offset = 0;

        let new_root = read_bytes32(data, &mut offset)?;
        let nullifiers = read_hash_list(data, &mut offset, MAX_NULLIFIERS)?;
        let asset = read_bytes32(data, &mut offset)?;
        let amount = parse_u64_le(data, &mut offset)?;
        let receiver = read_bytes32(data, &mut offset)?;
        let new_commitments = read_hash_list(data, &mut offset, MAX_OUTPUT_COMMITMENTS)?;
        ensure_consumed(data, offset)?;

        Ok(Self {
            new_root,
            nullifiers,
            asset,
            amount,
            receiver,
            new_commitments,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.new_root);
        write_hash_list(&mut out, &self.nullifiers);
        out.extend_from_slice(&self.asset);
        out.extend_from_slice(&self.amount.to_le_bytes());
        out.extend_from_slice(&self.receiver);
        write_hash_list(&mut out, &self.new_commitments);
        out
    }
}

pub(crate) fn process_withdraw<A: AssetTransfer + ?Sized>(
    tx: &mut Transition<'_>,
    assets: &A,
    params: WithdrawPublicInputs,
    receiver: &Address,
) -> Result<(), PoolError> {
    if params.receiver != *receiver {
        tracing::warn!(
            target: "shielded_pool::withdraw",
            declared = %hex::encode(params.receiver),
            supplied = %hex::encode(receiver),
            "receiver mismatch"
        );
        return Err(PoolError::ReceiverMismatch {
            declared: params.receiver,
            supplied: *receiver,
        });
    }
    if is_null(receiver) {
        return Err(PoolError::InvalidReceiver);
    }
    if is_null(&params.asset) {
        return Err(PoolError::InvalidAsset);
    }
    if params.amount == 0 {
        return Err(PoolError::InvalidAmount);
    }

    tx.mark_all(
        &params.nullifiers,
        IdentifierKind::Nullifier,
        OperationType::Withdrawal,
    )?;
    tx.set_root(params.new_root);

    for event in PoolEvent::outputs(&params.new_commitments) {
        tx.emit(event);
    }
    tx.emit(PoolEvent::WithdrawExecuted {
        receiver: *receiver,
        asset: params.asset,
        amount: params.amount,
    });

    assets.push(&params.asset, receiver, params.amount)?;

    tracing::info!(
        target: "shielded_pool::withdraw",
        nullifiers = params.nullifiers.len(),
        amount = params.amount,
        asset = %hex::encode(params.asset),
        receiver = %hex::encode(receiver),
        "withdrawal applied"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::LedgerState;
    use crate::utils::MockAssetTransfer;

    fn params() -> WithdrawPublicInputs {
        WithdrawPublicInputs {
            new_root: [7u8; 32],
            nullifiers: vec![[1u8; 32]],
            asset: [2u8; 32],
            amount: 500,
            receiver: [3u8; 32],
            new_commitments: vec![[4u8; 32]],
        }
    }

    #[test]
    fn test_decode_layout() {
        let bytes = params().encode();
        assert_eq!(bytes.len(), 32 + 4 + 32 + 32 + 8 + 32 + 4 + 32);

        let verified = VerifiedInputs::assume_verified(CircuitKind::Withdraw, &bytes);
        assert_eq!(WithdrawPublicInputs::decode(&verified).unwrap(), params());
    }

    #[test]
    fn test_receiver_mismatch_no_push() {
        let mut assets = MockAssetTransfer::new();
        assets.expect_push().never();

        let mut state = LedgerState::new().unwrap();
        let mut tx = state.begin();
        let err = process_withdraw(&mut tx, &assets, params(), &[9u8; 32]).unwrap_err();

        assert_eq!(
            err,
            PoolError::ReceiverMismatch {
                declared: [3u8; 32],
                supplied: [9u8; 32]
            }
        );
    }

    #[test]
    fn test_structural_checks() {
        let mut assets = MockAssetTransfer::new();
        assets.expect_push().never();
        let mut state = LedgerState::new().unwrap();
        let mut tx = state.begin();

        let mut p = params();
        p.receiver = [0u8; 32];
        assert_eq!(
            process_withdraw(&mut tx, &assets, p, &[0u8; 32]),
            Err(PoolError::InvalidReceiver)
        );

        let mut p = params();
        p.asset = [0u8; 32];
        assert_eq!(
            process_withdraw(&mut tx, &assets, p, &[3u8; 32]),
            Err(PoolError::InvalidAsset)
        );

        let mut p = params();
        p.amount = 0;
        assert_eq!(
            process_withdraw(&mut tx, &assets, p, &[3u8; 32]),
            Err(PoolError::InvalidAmount)
        );
    }

    #[test]
    fn test_push_after_effects() {
        let mut assets = MockAssetTransfer::new();
        assets
            .expect_push()
            .withf(|asset, receiver, amount| {
                *asset == [2u8; 32] && *receiver == [3u8; 32] && *amount == 500
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let mut state = LedgerState::new().unwrap();
        let mut tx = state.begin();
        process_withdraw(&mut tx, &assets, params(), &[3u8; 32]).unwrap();
        let delta = tx.commit();

        assert_eq!(delta.root, [7u8; 32]);
        assert_eq!(delta.events.len(), 2);
        assert!(state.registry().is_used(&[1u8; 32]));
    }
}
