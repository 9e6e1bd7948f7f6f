//! Verification key registry
//!
//! One verification key per circuit kind. Keys are opaque to the pool and are
//! handed to the proof verifier unchanged.

use std::fmt;

/// Circuits that gate a state transition
#[repr(u8)]
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum CircuitKind {
    /// Private transfer (transact)
    Transfer = 0,
    /// Withdrawal to a public receiver
    Withdraw = 1,
    /// Matched swap
    Swap = 2,
}

impl CircuitKind {
    pub const ALL: [CircuitKind; 3] = [CircuitKind::Transfer, CircuitKind::Withdraw, CircuitKind::Swap];

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(CircuitKind::Transfer),
            1 => Some(CircuitKind::Withdraw),
            2 => Some(CircuitKind::Swap),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitKind::Transfer => "transfer",
            CircuitKind::Withdraw => "withdraw",
            CircuitKind::Swap => "swap",
        }
    }
}

impl fmt::Display for CircuitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verification keys indexed by circuit
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VkRegistry {
    transfer: Vec<u8>,
    withdraw: Vec<u8>,
    swap: Vec<u8>,
}

impl VkRegistry {
    pub fn new(transfer: Vec<u8>, withdraw: Vec<u8>, swap: Vec<u8>) -> Self {
        Self {
            transfer,
            withdraw,
            swap,
        }
    }

    /// Same key for every circuit (single universal circuit deployments)
    pub fn uniform(key: Vec<u8>) -> Self {
        Self::new(key.clone(), key.clone(), key)
    }

    pub fn get(&self, circuit: CircuitKind) -> &[u8] {
        match circuit {
            CircuitKind::Transfer => &self.transfer,
            CircuitKind::Withdraw => &self.withdraw,
            CircuitKind::Swap => &self.swap,
        }
    }
}
