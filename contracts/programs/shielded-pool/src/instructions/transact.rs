//! Private transfer instruction (transact)
//!
//! Spends notes and creates new ones entirely inside the pool. No asset
//! moves, so no custody call and no re-entrancy guard.
//!
//! The new root is taken from the proof; output commitments are published
//! as events but not appended on-core.

use crate::constants::{MAX_NULLIFIERS, MAX_OUTPUT_COMMITMENTS};
use crate::error::PoolError;
use crate::events::PoolEvent;
use crate::gateway::VerifiedInputs;
use crate::state::{CircuitKind, IdentifierKind, OperationType, Transition};
use crate::utils::parsing::{ensure_consumed, read_bytes32, read_hash_list, write_hash_list};
use crate::Hash32;

/// Transfer public parameters
///
/// Layout:
/// - new_root: [u8; 32]
/// - nullifier_count: u32, nullifiers: [[u8; 32]; n]
/// - commitment_count: u32, commitments: [[u8; 32]; m]
/// - key_image: [u8; 32]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferPublicInputs {
    pub new_root: Hash32,
    pub nullifiers: Vec<Hash32>,
    pub new_commitments: Vec<Hash32>,
    /// Decoded for completeness; not consumed by a plain transfer
    pub key_image: Hash32,
}

impl TransferPublicInputs {
    pub fn decode(verified: &VerifiedInputs<'_>) -> Result<Self, PoolError> {
        if verified.circuit() != CircuitKind::Transfer {
            return Err(PoolError::InvalidPublicInputs("not transfer inputs"));
        }
        let data = verified.bytes();
        let mut offset = 0;

        let new_root = read_bytes32(data, &mut offset)?;
        let nullifiers = read_hash_list(data, &mut offset, MAX_NULLIFIERS)?;
        let new_commitments = read_hash_list(data, &mut offset, MAX_OUTPUT_COMMITMENTS)?;
        let key_image = read_bytes32(data, &mut offset)?;
        ensure_consumed(data, offset)?;

        Ok(Self {
            new_root,
            nullifiers,
            new_commitments,
            key_image,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            32 + 4 + self.nullifiers.len() * 32 + 4 + self.new_commitments.len() * 32 + 32,
        );
        out.extend_from_slice(&self.new_root);
        write_hash_list(&mut out, &self.nullifiers);
        write_hash_list(&mut out, &self.new_commitments);
        out.extend_from_slice(&self.key_image);
        out
    }
}

pub(crate) fn process_transact(
    tx: &mut Transition<'_>,
    params: TransferPublicInputs,
) -> Result<(), PoolError> {
    tx.mark_all(
        &params.nullifiers,
        IdentifierKind::Nullifier,
        OperationType::PrivateTransfer,
    )?;
    tx.set_root(params.new_root);

    for event in PoolEvent::outputs(&params.new_commitments) {
        tx.emit(event);
    }

    tracing::info!(
        target: "shielded_pool::transact",
        nullifiers = params.nullifiers.len(),
        outputs = params.new_commitments.len(),
        root = %hex::encode(params.new_root),
        "private transfer applied"
    );

    tx.emit(PoolEvent::TransactionExecuted {
        new_root: params.new_root,
        nullifiers: params.nullifiers,
        new_commitments: params.new_commitments,
    });

    Ok(())
}
