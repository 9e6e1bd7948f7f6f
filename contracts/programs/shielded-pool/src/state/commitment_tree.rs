//! Commitment tree (incremental Merkle accumulator)
//!
//! Fixed depth 32, append-only, write-once per leaf. Nodes live in a sparse
//! map keyed by `(level << 32) | position`; a missing entry stands for the
//! zero hash of that level, so the ~2^33 empty slots are never materialized.
//!
//! The current root is not necessarily the root of the stored nodes: proof-gated
//! transitions replace it with the root their proof attests to.

use std::collections::HashMap;

use crate::constants::{EMPTY_LEAF, MAX_LEAVES, TREE_DEPTH};
use crate::error::PoolError;
use crate::utils::crypto::{hash_leaf, hash_pair};
use crate::Hash32;

/// Composite storage key: level in the upper 32 bits, position in the lower 32
#[inline(always)]
pub fn node_key(level: u32, position: u32) -> u64 {
    ((level as u64) << 32) | position as u64
}

/// Split a composite key back into `(level, position)`
#[inline(always)]
pub fn split_node_key(key: u64) -> (u32, u32) {
    ((key >> 32) as u32, key as u32)
}

/// Record of one insertion, enough to undo it
#[derive(Clone, Debug)]
pub struct Insertion {
    pub leaf_index: u64,
    pub root: Hash32,
    previous_root: Hash32,
    /// `(key, value before the write)` for the leaf slot and all 32 ancestors
    overwritten: Vec<(u64, Option<Hash32>)>,
}

impl Insertion {
    /// Storage keys written by this insertion, leaf first
    pub fn written_keys(&self) -> impl Iterator<Item = u64> + '_ {
        self.overwritten.iter().map(|(key, _)| *key)
    }
}

/// Sparse incremental Merkle tree
#[derive(Clone, Debug)]
pub struct CommitmentTree {
    /// Current root (computed on deposit, declared by proofs otherwise)
    root: Hash32,

    /// Next free leaf position
    next_index: u64,

    /// Written nodes, keyed by `node_key`
    nodes: HashMap<u64, Hash32>,

    /// `zero_hashes[i]` is the root of an empty subtree of height `i`
    zero_hashes: [Hash32; TREE_DEPTH],
}

impl CommitmentTree {
    /// Create an empty tree. Computes the zero-hash table once.
    pub fn new() -> Result<Self, PoolError> {
        let zero_hashes = compute_zero_hashes()?;
        let root = hash_pair(&zero_hashes[TREE_DEPTH - 1], &zero_hashes[TREE_DEPTH - 1])?;

        Ok(Self {
            root,
            next_index: 0,
            nodes: HashMap::new(),
            zero_hashes,
        })
    }

    /// Rebuild a tree from persisted parts
    pub fn restore(
        root: Hash32,
        next_index: u64,
        nodes: impl IntoIterator<Item = (u64, Hash32)>,
    ) -> Result<Self, PoolError> {
        if next_index > MAX_LEAVES {
            return Err(PoolError::InvalidSnapshot("next index beyond capacity"));
        }

        let mut tree = Self::new()?;
        for (key, value) in nodes {
            let (level, position) = split_node_key(key);
            if level as usize > TREE_DEPTH {
                return Err(PoolError::InvalidSnapshot("node level beyond tree depth"));
            }
            if (position as u64) >= (MAX_LEAVES >> level) {
                return Err(PoolError::InvalidSnapshot("node position beyond level width"));
            }
            tree.nodes.insert(key, value);
        }
        tree.root = root;
        tree.next_index = next_index;

        Ok(tree)
    }

    // Getters
    pub fn root(&self) -> Hash32 {
        self.root
    }

    pub fn next_index(&self) -> u64 {
        self.next_index
    }

    pub fn zero_hash(&self, level: usize) -> Option<&Hash32> {
        self.zero_hashes.get(level)
    }

    pub fn zero_hashes(&self) -> &[Hash32; TREE_DEPTH] {
        &self.zero_hashes
    }

    /// Raw stored value at `(level, position)`; `None` if never written
    pub fn node(&self, level: u32, position: u32) -> Option<Hash32> {
        self.nodes.get(&node_key(level, position)).copied()
    }

    pub(crate) fn node_by_key(&self, key: u64) -> Option<Hash32> {
        self.nodes.get(&key).copied()
    }

    /// All written nodes (persistence)
    pub fn nodes(&self) -> impl Iterator<Item = (u64, Hash32)> + '_ {
        self.nodes.iter().map(|(k, v)| (*k, *v))
    }

    pub fn has_capacity(&self) -> bool {
        self.next_index < MAX_LEAVES
    }

    /// Replace the current root, returning the previous one
    pub(crate) fn set_root(&mut self, root: Hash32) -> Hash32 {
        std::mem::replace(&mut self.root, root)
    }

    /// Insert a leaf at the next free position and recompute its path.
    ///
    /// Every hash on the path is computed before anything is written, so a
    /// failure leaves the tree untouched.
    pub fn insert(&mut self, leaf: &Hash32) -> Result<Insertion, PoolError> {
        let leaf_index = self.next_index;
        if leaf_index >= MAX_LEAVES {
            return Err(PoolError::CapacityExhausted);
        }

        // (level, position, value) for the leaf and each ancestor
        let mut path: Vec<(u32, u64, Hash32)> = Vec::with_capacity(TREE_DEPTH + 1);
        let mut position = leaf_index;
        let mut current = *leaf;
        path.push((0, position, current));

        for level in 0..TREE_DEPTH {
            let sibling = self
                .nodes
                .get(&node_key(level as u32, (position ^ 1) as u32))
                .unwrap_or(&self.zero_hashes[level]);

            current = if position & 1 == 0 {
                hash_pair(&current, sibling)?
            } else {
                hash_pair(sibling, &current)?
            };
            position /= 2;
            path.push((level as u32 + 1, position, current));
        }

        let overwritten = path
            .into_iter()
            .map(|(level, position, value)| {
                let key = node_key(level, position as u32);
                (key, self.nodes.insert(key, value))
            })
            .collect();

        let previous_root = self.set_root(current);
        self.next_index = leaf_index + 1;

        Ok(Insertion {
            leaf_index,
            root: current,
            previous_root,
            overwritten,
        })
    }

    /// Undo an insertion. Must be applied in reverse insertion order.
    pub(crate) fn revert(&mut self, insertion: Insertion) {
        for (key, previous) in insertion.overwritten.into_iter().rev() {
            match previous {
                Some(value) => {
                    self.nodes.insert(key, value);
                }
                None => {
                    self.nodes.remove(&key);
                }
            }
        }
        self.root = insertion.previous_root;
        self.next_index = insertion.leaf_index;
    }
}

fn compute_zero_hashes() -> Result<[Hash32; TREE_DEPTH], PoolError> {
    let mut zero_hashes = [[0u8; 32]; TREE_DEPTH];
    zero_hashes[0] = hash_leaf(&EMPTY_LEAF)?;
    for level in 1..TREE_DEPTH {
        zero_hashes[level] = hash_pair(&zero_hashes[level - 1], &zero_hashes[level - 1])?;
    }
    Ok(zero_hashes)
}
