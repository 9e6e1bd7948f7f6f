//! Proof verification gateway
//!
//! Forwards `(verification key, public inputs, proof)` to an external
//! [`ProofVerifier`] and, on acceptance, hands back a [`VerifiedInputs`] token
//! wrapping the exact bytes that were verified. Public-parameter decoders only
//! accept that token, so a transition can never act on parameters other than
//! the ones the proof attests to.
//!
//! Rejection is final. The gateway never retries.

use crate::constants::{MAX_PROOF_SIZE, MAX_PUBLIC_INPUTS_SIZE};
use crate::error::PoolError;
use crate::state::{CircuitKind, VkRegistry};
use crate::utils::crypto::sha256;
use crate::Hash32;

/// External zero-knowledge proof verifier
#[cfg_attr(test, mockall::automock)]
pub trait ProofVerifier: Send + Sync {
    /// `true` iff `proof` is valid for `public_inputs` under `verification_key`
    fn verify(&self, verification_key: &[u8], public_inputs: &[u8], proof: &[u8]) -> bool;
}

/// Public-input bytes that passed verification for a specific circuit
#[derive(Debug)]
pub struct VerifiedInputs<'a> {
    circuit: CircuitKind,
    bytes: &'a [u8],
    digest: Hash32,
}

impl<'a> VerifiedInputs<'a> {
    pub fn circuit(&self) -> CircuitKind {
        self.circuit
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// SHA-256 of the verified bytes (log correlation)
    pub fn digest(&self) -> &Hash32 {
        &self.digest
    }
}

#[cfg(test)]
impl<'a> VerifiedInputs<'a> {
    /// Decoder tests only
    pub(crate) fn assume_verified(circuit: CircuitKind, bytes: &'a [u8]) -> Self {
        Self {
            circuit,
            bytes,
            digest: sha256(bytes),
        }
    }
}

/// Gateway holding the verifier and per-circuit keys
pub struct ProofGateway<V> {
    verifier: V,
    keys: VkRegistry,
}

impl<V: ProofVerifier> ProofGateway<V> {
    pub fn new(verifier: V, keys: VkRegistry) -> Self {
        Self { verifier, keys }
    }

    pub fn verifier(&self) -> &V {
        &self.verifier
    }

    pub fn keys(&self) -> &VkRegistry {
        &self.keys
    }

    pub fn verification_key(&self, circuit: CircuitKind) -> &[u8] {
        self.keys.get(circuit)
    }

    /// Verify `proof` over `public_inputs` with the key configured for `circuit`
    pub fn verify<'a>(
        &self,
        circuit: CircuitKind,
        public_inputs: &'a [u8],
        proof: &[u8],
    ) -> Result<VerifiedInputs<'a>, PoolError> {
        if proof.is_empty() || proof.len() > MAX_PROOF_SIZE {
            return Err(PoolError::InvalidProofLength);
        }
        if public_inputs.len() > MAX_PUBLIC_INPUTS_SIZE {
            return Err(PoolError::InvalidPublicInputs("public inputs too large"));
        }

        let digest = sha256(public_inputs);

        if !self
            .verifier
            .verify(self.keys.get(circuit), public_inputs, proof)
        {
            tracing::warn!(
                target: "shielded_pool::gateway",
                %circuit,
                inputs_digest = %hex::encode(digest),
                proof_len = proof.len(),
                "proof rejected"
            );
            return Err(PoolError::ProofRejected(circuit));
        }

        tracing::debug!(
            target: "shielded_pool::gateway",
            %circuit,
            inputs_digest = %hex::encode(digest),
            "proof accepted"
        );

        Ok(VerifiedInputs {
            circuit,
            bytes: public_inputs,
            digest,
        })
    }
}
