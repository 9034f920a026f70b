//! Operations received before their causal past.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::id::{Counter, OpId, PeerId};
use crate::op::Operation;

/// Buffered operations, indexed by the missing atom each one waits on.
///
/// Nothing here is ever dropped or capped: an operation stays until the
/// atom it waits on is applied. [`len`](Self::len) exposes the size so the
/// owner can observe unbounded growth.
#[derive(Debug, Clone, Default)]
pub struct PendingBuffer {
    waiting: HashMap<PeerId, BTreeMap<Counter, Vec<Operation>>>,
    buffered: HashSet<OpId>,
}

impl PendingBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Park `op` until atom `missing` is applied.
    ///
    /// Returns `false` if an operation with the same id is already parked.
    pub fn push(&mut self, missing: OpId, op: Operation) -> bool {
        if !self.buffered.insert(op.id) {
            return false;
        }
        self.waiting
            .entry(missing.peer)
            .or_default()
            .entry(missing.counter)
            .or_default()
            .push(op);
        true
    }

    /// Remove every operation waiting on an atom of `peer` below `end`.
    pub fn take_ready(&mut self, peer: PeerId, end: Counter) -> Vec<Operation> {
        let Some(by_counter) = self.waiting.get_mut(&peer) else {
            return Vec::new();
        };

        let still_waiting = by_counter.split_off(&end);
        let ready = core::mem::replace(by_counter, still_waiting);
        if by_counter.is_empty() {
            self.waiting.remove(&peer);
        }

        let ops: Vec<Operation> = ready.into_values().flatten().collect();
        for op in &ops {
            self.buffered.remove(&op.id);
        }
        ops
    }

    /// Whether an operation starting at `id` is parked.
    #[must_use]
    pub fn contains(&self, id: OpId) -> bool {
        self.buffered.contains(&id)
    }

    /// The atoms parked operations are waiting on, sorted.
    #[must_use]
    pub fn missing(&self) -> Vec<OpId> {
        let mut ids: Vec<OpId> = self
            .waiting
            .iter()
            .flat_map(|(&peer, by_counter)| by_counter.keys().map(move |&c| OpId::new(peer, c)))
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Number of parked operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffered.len()
    }

    /// Whether nothing is parked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffered.is_empty()
    }
}
