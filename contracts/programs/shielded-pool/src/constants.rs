//! Pool constants
//!
//! Tree geometry, wire-format bounds and hashing domain separators.

// =============================================================================
// Commitment Tree
// =============================================================================

/// Fixed tree depth. Proof paths are always full depth regardless of occupancy.
pub const TREE_DEPTH: usize = 32;

/// Maximum number of leaves (2^32)
pub const MAX_LEAVES: u64 = 1u64 << TREE_DEPTH;

/// Canonical empty leaf. `ZERO_HASHES[0]` is the leaf hash of this value.
pub const EMPTY_LEAF: [u8; 32] = [0u8; 32];

// =============================================================================
// Hashing
// =============================================================================

/// Domain separator for leaf hashing (SHA-256 mode)
pub const DS_LEAF: u8 = 0x00;

/// Domain separator for internal node hashing (SHA-256 mode)
pub const DS_NODE: u8 = 0x01;

// =============================================================================
// Public Parameter Bounds
// =============================================================================

/// Maximum nullifiers a single transition may consume
pub const MAX_NULLIFIERS: usize = 16;

/// Maximum output commitments a single transition may publish
pub const MAX_OUTPUT_COMMITMENTS: usize = 16;

/// A swap always consumes exactly one note per matched order
pub const SWAP_NULLIFIER_COUNT: usize = 2;

/// Largest public-input encoding any circuit can produce:
/// root + 2 counts + asset + amount + receiver + 2 key images + bounded lists
pub const MAX_PUBLIC_INPUTS_SIZE: usize =
    32 + 4 + MAX_NULLIFIERS * 32 + 32 + 8 + 32 + 4 + MAX_OUTPUT_COMMITMENTS * 32 + 64;

// =============================================================================
// Instruction Envelope
// =============================================================================

/// Maximum proof size accepted by the gateway
pub const MAX_PROOF_SIZE: usize = 4096;

/// Maximum opaque memo attached to a deposit
pub const MAX_MEMO_SIZE: usize = 1024;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_matches_depth() {
        assert_eq!(MAX_LEAVES, 4_294_967_296);
        assert_eq!(MAX_LEAVES - 1, u32::MAX as u64);
    }

    #[test]
    fn test_domain_separators_distinct() {
        assert_ne!(DS_LEAF, DS_NODE);
    }
}
