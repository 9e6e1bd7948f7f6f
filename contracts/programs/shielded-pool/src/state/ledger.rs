//! Ledger state and the transition journal
//!
//! `LedgerState` owns the accumulator and the replay registry. It is mutated
//! only through a [`Transition`], which journals every write and undoes all of
//! them when dropped without [`Transition::commit`]. Published events are not
//! retained: each commit hands them to the host in its [`StateDelta`].

use std::collections::BTreeMap;

use crate::error::PoolError;
use crate::events::PoolEvent;
use crate::state::commitment_tree::{CommitmentTree, Insertion};
use crate::state::nullifier::{IdentifierKind, NullifierRecord, NullifierRegistry, OperationType};
use crate::Hash32;

/// Complete ledger state
#[derive(Clone, Debug)]
pub struct LedgerState {
    tree: CommitmentTree,
    registry: NullifierRegistry,
    /// Number of committed transitions
    sequence: u64,
}

/// Persistable image of the ledger (events are stored separately)
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub root: Hash32,
    pub next_index: u64,
    pub sequence: u64,
    pub nodes: Vec<(u64, Hash32)>,
    pub identifiers: Vec<(Hash32, NullifierRecord)>,
}

/// Everything a committed transition changed
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateDelta {
    pub sequence: u64,
    pub root: Hash32,
    pub next_index: u64,
    /// Final value of every node written, ordered by key
    pub nodes: Vec<(u64, Hash32)>,
    pub marked: Vec<(Hash32, NullifierRecord)>,
    pub events: Vec<PoolEvent>,
}

impl LedgerState {
    pub fn new() -> Result<Self, PoolError> {
        Ok(Self {
            tree: CommitmentTree::new()?,
            registry: NullifierRegistry::new(),
            sequence: 0,
        })
    }

    pub fn restore(snapshot: LedgerSnapshot) -> Result<Self, PoolError> {
        let tree = CommitmentTree::restore(snapshot.root, snapshot.next_index, snapshot.nodes)?;
        Ok(Self {
            tree,
            registry: NullifierRegistry::restore(snapshot.identifiers),
            sequence: snapshot.sequence,
        })
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        let mut nodes: Vec<(u64, Hash32)> = self.tree.nodes().collect();
        nodes.sort_unstable_by_key(|(key, _)| *key);
        let mut identifiers: Vec<(Hash32, NullifierRecord)> =
            self.registry.records().map(|(id, record)| (*id, *record)).collect();
        identifiers.sort_unstable_by(|a, b| a.0.cmp(&b.0));

        LedgerSnapshot {
            root: self.tree.root(),
            next_index: self.tree.next_index(),
            sequence: self.sequence,
            nodes,
            identifiers,
        }
    }

    pub fn tree(&self) -> &CommitmentTree {
        &self.tree
    }

    pub fn registry(&self) -> &NullifierRegistry {
        &self.registry
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Open a journaled transition
    pub fn begin(&mut self) -> Transition<'_> {
        let sequence = self.sequence + 1;
        Transition {
            state: self,
            sequence,
            undo: Vec::new(),
            pending_events: Vec::new(),
            committed: false,
        }
    }
}

enum UndoEntry {
    Inserted(Insertion),
    Root(Hash32),
    Marked(Vec<Hash32>),
}

/// In-flight transition. Rolls back on drop unless committed.
pub struct Transition<'a> {
    state: &'a mut LedgerState,
    sequence: u64,
    undo: Vec<UndoEntry>,
    pending_events: Vec<PoolEvent>,
    committed: bool,
}

impl<'a> Transition<'a> {
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn state(&self) -> &LedgerState {
        &*self.state
    }

    /// Append a commitment; returns `(leaf_index, new_root)`
    pub fn insert_commitment(&mut self, commitment: &Hash32) -> Result<(u64, Hash32), PoolError> {
        let insertion = self.state.tree.insert(commitment)?;
        let result = (insertion.leaf_index, insertion.root);
        self.undo.push(UndoEntry::Inserted(insertion));
        Ok(result)
    }

    /// Replace the current root with a proof-attested one
    pub fn set_root(&mut self, root: Hash32) {
        let previous = self.state.tree.set_root(root);
        self.undo.push(UndoEntry::Root(previous));
    }

    /// Check and mark a batch of identifiers, all or nothing
    pub fn mark_all(
        &mut self,
        ids: &[Hash32],
        kind: IdentifierKind,
        operation: OperationType,
    ) -> Result<(), PoolError> {
        let record = NullifierRecord {
            kind,
            operation,
            sequence: self.sequence,
        };
        self.state.registry.check_and_mark_all(ids, record)?;
        self.undo.push(UndoEntry::Marked(ids.to_vec()));
        Ok(())
    }

    pub fn mark(
        &mut self,
        id: &Hash32,
        kind: IdentifierKind,
        operation: OperationType,
    ) -> Result<(), PoolError> {
        self.mark_all(std::slice::from_ref(id), kind, operation)
    }

    pub fn emit(&mut self, event: PoolEvent) {
        self.pending_events.push(event);
    }

    /// Make every journaled write permanent and publish pending events
    pub fn commit(mut self) -> StateDelta {
        let undo = std::mem::take(&mut self.undo);
        let events = std::mem::take(&mut self.pending_events);
        self.committed = true;

        let mut nodes = BTreeMap::new();
        let mut marked = Vec::new();
        for entry in &undo {
            match entry {
                UndoEntry::Inserted(insertion) => {
                    for key in insertion.written_keys() {
                        if let Some(value) = self.state.tree.node_by_key(key) {
                            nodes.insert(key, value);
                        }
                    }
                }
                UndoEntry::Marked(ids) => {
                    for id in ids {
                        if let Some(record) = self.state.registry.record(id) {
                            marked.push((*id, *record));
                        }
                    }
                }
                UndoEntry::Root(_) => {}
            }
        }

        self.state.sequence = self.sequence;

        StateDelta {
            sequence: self.sequence,
            root: self.state.tree.root(),
            next_index: self.state.tree.next_index(),
            nodes: nodes.into_iter().collect(),
            marked,
            events,
        }
    }

    fn rollback(&mut self) {
        while let Some(entry) = self.undo.pop() {
            match entry {
                UndoEntry::Inserted(insertion) => self.state.tree.revert(insertion),
                UndoEntry::Root(previous) => {
                    self.state.tree.set_root(previous);
                }
                UndoEntry::Marked(ids) => {
                    for id in &ids {
                        self.state.registry.unmark(id);
                    }
                }
            }
        }
        self.pending_events.clear();
    }
}

impl Drop for Transition<'_> {
    fn drop(&mut self) {
        if !self.committed && !self.undo.is_empty() {
            tracing::debug!(
                target: "shielded_pool::ledger",
                sequence = self.sequence,
                writes = self.undo.len(),
                "rolling back transition"
            );
            self.rollback();
        }
    }
}
