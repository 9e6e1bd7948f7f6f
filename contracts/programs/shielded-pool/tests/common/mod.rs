//! Shared fixtures for pool integration tests

#![allow(dead_code)]

use std::sync::Mutex;

use shielded_pool::{
    Address, AssetTransfer, ProofVerifier, ShieldedPool, TransferError, VkRegistry,
};

pub const ASSET: Address = [0x7a; 32];
pub const DEPOSITOR: Address = [0x11; 32];
pub const RECEIVER: Address = [0x22; 32];
pub const PROOF: &[u8] = &[0xab; 64];

/// Verifier with a fixed answer
pub struct StaticVerifier {
    pub accept: bool,
}

impl ProofVerifier for StaticVerifier {
    fn verify(&self, _verification_key: &[u8], _public_inputs: &[u8], _proof: &[u8]) -> bool {
        self.accept
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Movement {
    Pull { asset: Address, from: Address, amount: u64 },
    Push { asset: Address, to: Address, amount: u64 },
}

/// Custodian that records every movement and can be told to fail
#[derive(Default)]
pub struct RecordingCustody {
    pub movements: Mutex<Vec<Movement>>,
    pub fail: Mutex<bool>,
}

impl RecordingCustody {
    pub fn movements(&self) -> Vec<Movement> {
        self.movements.lock().unwrap().clone()
    }

    pub fn set_fail(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }

    fn record(&self, movement: Movement) -> Result<(), TransferError> {
        if *self.fail.lock().unwrap() {
            return Err(TransferError::Rejected("custody offline".to_string()));
        }
        self.movements.lock().unwrap().push(movement);
        Ok(())
    }
}

impl AssetTransfer for RecordingCustody {
    fn pull(&self, asset: &Address, depositor: &Address, amount: u64) -> Result<(), TransferError> {
        self.record(Movement::Pull { asset: *asset, from: *depositor, amount })
    }

    fn push(&self, asset: &Address, receiver: &Address, amount: u64) -> Result<(), TransferError> {
        self.record(Movement::Push { asset: *asset, to: *receiver, amount })
    }
}

pub type TestPool = ShieldedPool<StaticVerifier, RecordingCustody>;

pub fn pool() -> TestPool {
    ShieldedPool::new(
        StaticVerifier { accept: true },
        VkRegistry::uniform(b"test-vk".to_vec()),
        RecordingCustody::default(),
    )
    .unwrap()
}

pub fn id(byte: u8) -> [u8; 32] {
    [byte; 32]
}
