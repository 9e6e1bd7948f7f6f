//! Deposit instruction
//!
//! Moves a public amount of an asset into pool custody and appends the
//! depositor's commitment to the accumulator. The root is computed on-core.
//!
//! Flow:
//! 1. Validate asset, amount, memo size and tree capacity
//! 2. Insert the commitment and publish `AccountUpdated(commitment, memo)`
//! 3. Pull funds from the depositor (last, after all ledger effects)

use crate::constants::MAX_MEMO_SIZE;
use crate::error::PoolError;
use crate::events::PoolEvent;
use crate::state::Transition;
use crate::utils::parsing::{
    ensure_consumed, parse_u64_le, read_bytes32, read_len_prefixed, write_len_prefixed,
};
use crate::utils::{is_null, AssetTransfer};
use crate::{Address, Hash32};

/// Deposit instruction data
///
/// Layout:
/// - depositor: [u8; 32]
/// - asset: [u8; 32]
/// - amount: u64 (LE)
/// - commitment: [u8; 32]
/// - memo_len: u32 (LE)
/// - memo: [u8; memo_len]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DepositData<'a> {
    pub depositor: Address,
    pub asset: Address,
    pub amount: u64,
    pub commitment: Hash32,
    pub memo: &'a [u8],
}

impl<'a> DepositData<'a> {
    pub fn from_bytes(data: &'a [u8]) -> Result<Self, PoolError> {
        let mut offset = 0;
        let depositor = read_bytes32(data, &mut offset)?;
        let asset = read_bytes32(data, &mut offset)?;
        let amount = parse_u64_le(data, &mut offset)?;
        let commitment = read_bytes32(data, &mut offset)?;
        let memo = read_len_prefixed(data, &mut offset, MAX_MEMO_SIZE)?;
        ensure_consumed(data, offset)?;

        Ok(Self {
            depositor,
            asset,
            amount,
            commitment,
            memo,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(32 * 3 + 8 + 4 + self.memo.len());
        out.extend_from_slice(&self.depositor);
        out.extend_from_slice(&self.asset);
        out.extend_from_slice(&self.amount.to_le_bytes());
        out.extend_from_slice(&self.commitment);
        write_len_prefixed(&mut out, self.memo);
        out
    }
}

/// Returns the leaf index the commitment landed at
pub(crate) fn process_deposit<A: AssetTransfer + ?Sized>(
    tx: &mut Transition<'_>,
    assets: &A,
    args: &DepositData<'_>,
) -> Result<u64, PoolError> {
    if is_null(&args.asset) {
        return Err(PoolError::InvalidAsset);
    }
    if args.amount == 0 {
        return Err(PoolError::InvalidAmount);
    }
    if args.memo.len() > MAX_MEMO_SIZE {
        return Err(PoolError::MemoTooLarge);
    }
    if !tx.state().tree().has_capacity() {
        return Err(PoolError::CapacityExhausted);
    }

    let (leaf_index, new_root) = tx.insert_commitment(&args.commitment)?;
    tx.emit(PoolEvent::AccountUpdated {
        commitment: args.commitment,
        memo: args.memo.to_vec(),
    });

    assets.pull(&args.asset, &args.depositor, args.amount)?;

    tracing::info!(
        target: "shielded_pool::deposit",
        leaf_index,
        amount = args.amount,
        asset = %hex::encode(args.asset),
        commitment = %hex::encode(args.commitment),
        root = %hex::encode(new_root),
        "deposit applied"
    );

    Ok(leaf_index)
}
