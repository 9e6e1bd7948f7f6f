//! Cryptographic utilities for the commitment tree
//!
//! Node hashing defaults to domain-separated SHA-256. With the `poseidon`
//! feature, nodes are hashed with BN254 Poseidon (x5, big-endian), matching
//! the parameters used by Light Protocol circuits.

use sha2::{Digest, Sha256};

use crate::error::PoolError;
use crate::Hash32;

#[cfg(not(feature = "poseidon"))]
use crate::constants::{DS_LEAF, DS_NODE};

/// Hash of a single leaf value (used for the level-0 zero hash)
#[inline]
pub fn hash_leaf(leaf: &Hash32) -> Result<Hash32, PoolError> {
    #[cfg(feature = "poseidon")]
    {
        poseidon_hash(&[leaf.as_slice()])
    }

    #[cfg(not(feature = "poseidon"))]
    {
        let mut hasher = Sha256::new();
        hasher.update([DS_LEAF]);
        hasher.update(leaf);
        Ok(hasher.finalize().into())
    }
}

/// Hash of two child nodes. Order matters: `hash_pair(a, b) != hash_pair(b, a)`.
#[inline]
pub fn hash_pair(left: &Hash32, right: &Hash32) -> Result<Hash32, PoolError> {
    #[cfg(feature = "poseidon")]
    {
        poseidon_hash(&[left.as_slice(), right.as_slice()])
    }

    #[cfg(not(feature = "poseidon"))]
    {
        let mut hasher = Sha256::new();
        hasher.update([DS_NODE]);
        hasher.update(left);
        hasher.update(right);
        Ok(hasher.finalize().into())
    }
}

#[cfg(feature = "poseidon")]
fn poseidon_hash(inputs: &[&[u8]]) -> Result<Hash32, PoolError> {
    use solana_poseidon::{hashv, Endianness, Parameters};

    let hash = hashv(Parameters::Bn254X5, Endianness::BigEndian, inputs).map_err(|e| {
        tracing::error!(target: "shielded_pool::crypto", error = %e, "poseidon hash failed");
        PoolError::HashFailure
    })?;

    Ok(hash.to_bytes())
}

/// SHA-256 digest of arbitrary bytes (public-input fingerprints)
#[inline]
pub fn sha256(data: &[u8]) -> Hash32 {
    Sha256::digest(data).into()
}

/// Fold a leaf up a sibling path. Even positions hash as the left child.
pub fn compute_merkle_root(
    leaf: &Hash32,
    leaf_index: u64,
    siblings: &[Hash32],
) -> Result<Hash32, PoolError> {
    let mut current = *leaf;
    let mut index = leaf_index;

    for sibling in siblings {
        current = if index & 1 == 0 {
            hash_pair(&current, sibling)?
        } else {
            hash_pair(sibling, &current)?
        };
        index /= 2;
    }

    Ok(current)
}
