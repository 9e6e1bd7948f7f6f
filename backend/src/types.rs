//! Wire and storage representations of ledger data
//!
//! Byte fields are lowercase hex without a `0x` prefix.

use serde::{Deserialize, Serialize};
use shielded_pool::{
    Hash32, IdentifierKind, NullifierRecord, OperationType, PoolEvent, StateDelta,
};

/// Hex form of a published [`PoolEvent`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventRecord {
    AccountUpdated {
        commitment: String,
        memo: String,
    },
    TransactionExecuted {
        new_root: String,
        nullifiers: Vec<String>,
        new_commitments: Vec<String>,
    },
    WithdrawExecuted {
        receiver: String,
        asset: String,
        amount: u64,
    },
    SwapExecuted {
        new_root: String,
        order_a_key_image: String,
        order_b_key_image: String,
    },
}

impl From<&PoolEvent> for EventRecord {
    fn from(event: &PoolEvent) -> Self {
        match event {
            PoolEvent::AccountUpdated { commitment, memo } => EventRecord::AccountUpdated {
                commitment: hex::encode(commitment),
                memo: hex::encode(memo),
            },
            PoolEvent::TransactionExecuted {
                new_root,
                nullifiers,
                new_commitments,
            } => EventRecord::TransactionExecuted {
                new_root: hex::encode(new_root),
                nullifiers: nullifiers.iter().map(hex::encode).collect(),
                new_commitments: new_commitments.iter().map(hex::encode).collect(),
            },
            PoolEvent::WithdrawExecuted {
                receiver,
                asset,
                amount,
            } => EventRecord::WithdrawExecuted {
                receiver: hex::encode(receiver),
                asset: hex::encode(asset),
                amount: *amount,
            },
            PoolEvent::SwapExecuted {
                new_root,
                order_a_key_image,
                order_b_key_image,
            } => EventRecord::SwapExecuted {
                new_root: hex::encode(new_root),
                order_a_key_image: hex::encode(order_a_key_image),
                order_b_key_image: hex::encode(order_b_key_image),
            },
        }
    }
}

impl EventRecord {
    pub fn name(&self) -> &'static str {
        match self {
            EventRecord::AccountUpdated { .. } => "AccountUpdated",
            EventRecord::TransactionExecuted { .. } => "TransactionExecuted",
            EventRecord::WithdrawExecuted { .. } => "WithdrawExecuted",
            EventRecord::SwapExecuted { .. } => "SwapExecuted",
        }
    }
}

/// Event as persisted: position within the transition that published it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub sequence: u64,
    pub position: u32,
    pub event: EventRecord,
}

impl StoredEvent {
    /// Events of a committed delta, in publication order
    pub fn from_delta(delta: &StateDelta) -> Vec<StoredEvent> {
        delta
            .events
            .iter()
            .enumerate()
            .map(|(position, event)| StoredEvent {
                sequence: delta.sequence,
                position: position as u32,
                event: EventRecord::from(event),
            })
            .collect()
    }
}

/// Hex form of a consumed identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierRecord {
    pub kind: String,
    pub operation: String,
    pub sequence: u64,
}

impl From<&NullifierRecord> for IdentifierRecord {
    fn from(record: &NullifierRecord) -> Self {
        Self {
            kind: match record.kind {
                IdentifierKind::Nullifier => "nullifier",
                IdentifierKind::KeyImage => "key_image",
            }
            .to_string(),
            operation: record.operation.as_str().to_string(),
            sequence: record.sequence,
        }
    }
}

/// Decode a 32-byte hex value, with or without `0x`
pub fn decode_hash(value: &str) -> Option<Hash32> {
    let value = value.strip_prefix("0x").unwrap_or(value);
    hex::decode(value).ok()?.try_into().ok()
}

/// Byte encoding of a record's kind and operation, for storage columns
pub fn record_codes(record: &NullifierRecord) -> (u8, u8) {
    (record.kind as u8, record.operation as u8)
}

/// Inverse of [`record_codes`]
pub fn record_from_codes(kind: u8, operation: u8, sequence: u64) -> Option<NullifierRecord> {
    Some(NullifierRecord {
        kind: IdentifierKind::from_u8(kind)?,
        operation: OperationType::from_u8(operation)?,
        sequence,
    })
}
