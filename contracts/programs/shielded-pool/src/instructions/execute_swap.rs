//! Execute swap instruction
//!
//! Settles two matched orders in one proof. Each order carries a key image
//! that is consumed alongside the spent notes, so an order can execute at
//! most once. Key images are checked in order A then B so a reused order is
//! reported by side.

use std::fmt;

use crate::constants::{MAX_NULLIFIERS, MAX_OUTPUT_COMMITMENTS, SWAP_NULLIFIER_COUNT};
use crate::error::PoolError;
use crate::events::PoolEvent;
use crate::gateway::VerifiedInputs;
use crate::state::{CircuitKind, IdentifierKind, OperationType, Transition};
use crate::utils::parsing::{ensure_consumed, read_bytes32, read_hash_list, write_hash_list};
use crate::Hash32;

/// Side of a matched swap
#[repr(u8)]
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum SwapSide {
    OrderA = 0,
    OrderB = 1,
}

impl fmt::Display for SwapSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwapSide::OrderA => f.write_str("A"),
            SwapSide::OrderB => f.write_str("B"),
        }
    }
}

/// Swap public parameters
///
/// Layout:
/// - new_root: [u8; 32]
/// - nullifier_count: u32, nullifiers: [[u8; 32]; n]
/// - commitment_count: u32, commitments: [[u8; 32]; m]
/// - order_a_key_image: [u8; 32]
/// - order_b_key_image: [u8; 32]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SwapPublicInputs {
    pub new_root: Hash32,
    pub nullifiers: Vec<Hash32>,
    pub new_commitments: Vec<Hash32>,
    pub order_a_key_image: Hash32,
    pub order_b_key_image: Hash32,
}

impl SwapPublicInputs {
    pub fn decode(verified: &VerifiedInputs<'_>) -> Result<Self, PoolError> {
        if verified.circuit() != CircuitKind::Swap {
            return Err(PoolError::InvalidPublicInputs("not swap inputs"));
        }
        let data = verified.bytes();
        let mut offset = 0;

        let new_root = read_bytes32(data, &mut offset)?;
        let nullifiers = read_hash_list(data, &mut offset, MAX_NULLIFIERS)?;
        let new_commitments = read_hash_list(data, &mut offset, MAX_OUTPUT_COMMITMENTS)?;
        let order_a_key_image = read_bytes32(data, &mut offset)?;
        let order_b_key_image = read_bytes32(data, &mut offset)?;
        ensure_consumed(data, offset)?;

        Ok(Self {
            new_root,
            nullifiers,
            new_commitments,
            order_a_key_image,
            order_b_key_image,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.new_root);
        write_hash_list(&mut out, &self.nullifiers);
        write_hash_list(&mut out, &self.new_commitments);
        out.extend_from_slice(&self.order_a_key_image);
        out.extend_from_slice(&self.order_b_key_image);
        out
    }
}

fn mark_order(tx: &mut Transition<'_>, side: SwapSide, key_image: &Hash32) -> Result<(), PoolError> {
    tx.mark(key_image, IdentifierKind::KeyImage, OperationType::Swap)
        .map_err(|e| match e {
            PoolError::AlreadyUsed(key_image) => PoolError::OrderAlreadyExecuted { side, key_image },
            other => other,
        })
}

pub(crate) fn process_execute_swap(
    tx: &mut Transition<'_>,
    params: SwapPublicInputs,
) -> Result<(), PoolError> {
    if params.nullifiers.len() != SWAP_NULLIFIER_COUNT {
        return Err(PoolError::InvalidSwapNullifierCount(params.nullifiers.len()));
    }

    tx.mark_all(&params.nullifiers, IdentifierKind::Nullifier, OperationType::Swap)?;
    mark_order(tx, SwapSide::OrderA, &params.order_a_key_image)?;
    mark_order(tx, SwapSide::OrderB, &params.order_b_key_image)?;
    tx.set_root(params.new_root);

    for event in PoolEvent::outputs(&params.new_commitments) {
        tx.emit(event);
    }
    tx.emit(PoolEvent::SwapExecuted {
        new_root: params.new_root,
        order_a_key_image: params.order_a_key_image,
        order_b_key_image: params.order_b_key_image,
    });

    tracing::info!(
        target: "shielded_pool::swap",
        outputs = params.new_commitments.len(),
        order_a = %hex::encode(params.order_a_key_image),
        order_b = %hex::encode(params.order_b_key_image),
        root = %hex::encode(params.new_root),
        "swap executed"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::LedgerState;

    fn params() -> SwapPublicInputs {
        SwapPublicInputs {
            new_root: [7u8; 32],
            nullifiers: vec![[1u8; 32], [2u8; 32]],
            new_commitments: vec![[3u8; 32], [4u8; 32]],
            order_a_key_image: [0xa0; 32],
            order_b_key_image: [0xb0; 32],
        }
    }

    #[test]
    fn test_decode_layout() {
        let bytes = params().encode();
        assert_eq!(bytes.len(), 32 + 4 + 64 + 4 + 64 + 64);

        let verified = VerifiedInputs::assume_verified(CircuitKind::Swap, &bytes);
        assert_eq!(SwapPublicInputs::decode(&verified).unwrap(), params());
    }

    #[test]
    fn test_nullifier_count_enforced() {
        let mut state = LedgerState::new().unwrap();
        let mut tx = state.begin();

        let mut p = params();
        p.nullifiers.push([5u8; 32]);
        assert_eq!(
            process_execute_swap(&mut tx, p),
            Err(PoolError::InvalidSwapNullifierCount(3))
        );

        let mut p = params();
        p.nullifiers.truncate(1);
        assert_eq!(
            process_execute_swap(&mut tx, p),
            Err(PoolError::InvalidSwapNullifierCount(1))
        );
    }

    #[test]
    fn test_order_reuse_reported_by_side() {
        let mut state = LedgerState::new().unwrap();
        {
            let mut tx = state.begin();
            process_execute_swap(&mut tx, params()).unwrap();
            tx.commit();
        }

        let mut p = params();
        p.nullifiers = vec![[8u8; 32], [9u8; 32]];
        p.order_a_key_image = [0xa1; 32];
        let mut tx = state.begin();
        assert_eq!(
            process_execute_swap(&mut tx, p),
            Err(PoolError::OrderAlreadyExecuted {
                side: SwapSide::OrderB,
                key_image: [0xb0; 32]
            })
        );
    }

    #[test]
    fn test_events() {
        let mut state = LedgerState::new().unwrap();
        let mut tx = state.begin();
        process_execute_swap(&mut tx, params()).unwrap();
        let delta = tx.commit();

        let names: Vec<&str> = delta.events.iter().map(PoolEvent::name).collect();
        assert_eq!(names, vec!["account_updated", "account_updated", "swap_executed"]);
        assert_eq!(delta.marked.len(), 4);
    }
}
