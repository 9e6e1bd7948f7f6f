//! Instruction processors
//!
//! Each processor runs inside an open [`Transition`](crate::state::Transition)
//! and returns early on the first failure; the caller drops the transition,
//! which rolls every write back.

pub mod deposit;
pub mod execute_swap;
pub mod transact;
pub mod withdraw;

pub use deposit::*;
pub use execute_swap::*;
pub use transact::*;
pub use withdraw::*;

use crate::constants::{MAX_PROOF_SIZE, MAX_PUBLIC_INPUTS_SIZE};
use crate::error::PoolError;
use crate::utils::parsing::{read_len_prefixed, write_len_prefixed};

/// `inputs_len:u32 | inputs | proof_len:u32 | proof` shared by every
/// proof-gated instruction
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProofEnvelope<'a> {
    pub public_inputs: &'a [u8],
    pub proof: &'a [u8],
}

impl<'a> ProofEnvelope<'a> {
    pub fn parse(data: &'a [u8], offset: &mut usize) -> Result<Self, PoolError> {
        let public_inputs = read_len_prefixed(data, offset, MAX_PUBLIC_INPUTS_SIZE)?;
        let proof = read_len_prefixed(data, offset, MAX_PROOF_SIZE)?;
        Ok(Self {
            public_inputs,
            proof,
        })
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        write_len_prefixed(out, self.public_inputs);
        write_len_prefixed(out, self.proof);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_parse() {
        let envelope = ProofEnvelope {
            public_inputs: &[1, 2, 3],
            proof: &[9; 10],
        };
        let mut data = Vec::new();
        envelope.write(&mut data);

        let mut offset = 0;
        assert_eq!(ProofEnvelope::parse(&data, &mut offset).unwrap(), envelope);
        assert_eq!(offset, data.len());
    }

    #[test]
    fn test_envelope_rejects_oversized_proof() {
        let mut data = Vec::new();
        write_len_prefixed(&mut data, &[1]);
        write_len_prefixed(&mut data, &vec![0u8; MAX_PROOF_SIZE + 1]);

        let mut offset = 0;
        assert_eq!(
            ProofEnvelope::parse(&data, &mut offset),
            Err(PoolError::InvalidInstructionData)
        );
    }
}
