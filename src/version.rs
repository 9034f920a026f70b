//! Causal version tracking: version vectors and frontiers.

use core::cmp::Ordering;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::id::{Counter, OpId, PeerId};

/// A contiguous run of one peer's counters, `start..end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdSpan {
    /// Peer owning the run.
    pub peer: PeerId,
    /// First counter in the run.
    pub start: Counter,
    /// One past the last counter in the run.
    pub end: Counter,
}

impl IdSpan {
    /// Number of atoms in the span.
    pub fn len(&self) -> Counter {
        self.end.saturating_sub(self.start)
    }

    /// Whether the span covers no atoms.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Per-peer causal frontier summary.
///
/// An entry `peer → c` means every operation of `peer` with counter `<= c`
/// is known. Peers without an entry have contributed nothing yet. Entries
/// only ever grow and never skip counters, because an operation is applied
/// only after its full causal past.
///
/// # Example
///
/// ```
/// use crdt_doc::{OpId, VersionVector};
///
/// let mut a = VersionVector::new();
/// a.extend_to_include(OpId::new(1, 4));
///
/// let mut b = VersionVector::new();
/// b.extend_to_include(OpId::new(1, 2));
///
/// assert!(a.includes_id(OpId::new(1, 3)));
/// assert!(a > b);
/// assert_eq!(a.next_counter(1), 5);
/// assert_eq!(a.next_counter(7), 0);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionVector(HashMap<PeerId, Counter>);

impl VersionVector {
    /// Create an empty version vector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Last counter known for `peer`, if any.
    #[must_use]
    pub fn get(&self, peer: PeerId) -> Option<Counter> {
        self.0.get(&peer).copied()
    }

    /// Counter the next unseen operation of `peer` must have.
    #[must_use]
    pub fn next_counter(&self, peer: PeerId) -> Counter {
        self.get(peer).map_or(0, |c| c + 1)
    }

    /// Whether the atom `id` is covered.
    #[must_use]
    pub fn includes_id(&self, id: OpId) -> bool {
        self.get(id.peer).map_or(false, |c| id.counter <= c)
    }

    /// Whether every atom covered by `other` is covered by `self`.
    #[must_use]
    pub fn includes_vv(&self, other: &Self) -> bool {
        other
            .0
            .iter()
            .all(|(&peer, &c)| self.get(peer).map_or(false, |mine| mine >= c))
    }

    /// Grow the entry for `id.peer` so that it covers `id`.
    pub fn extend_to_include(&mut self, id: OpId) {
        self.0
            .entry(id.peer)
            .and_modify(|c| *c = (*c).max(id.counter))
            .or_insert(id.counter);
    }

    /// Set the last known counter of `peer`, overwriting any entry.
    pub fn set_last(&mut self, id: OpId) {
        self.0.insert(id.peer, id.counter);
    }

    /// Pointwise maximum with `other`.
    pub fn merge(&mut self, other: &Self) {
        for (&peer, &c) in &other.0 {
            self.extend_to_include(OpId::new(peer, c));
        }
    }

    /// Spans of atoms covered by `self` but not by `other`, sorted by peer.
    #[must_use]
    pub fn sub_spans(&self, other: &Self) -> Vec<IdSpan> {
        let mut spans: Vec<IdSpan> = self
            .0
            .iter()
            .filter_map(|(&peer, &last)| {
                let start = other.next_counter(peer);
                (start <= last).then_some(IdSpan {
                    peer,
                    start,
                    end: last + 1,
                })
            })
            .collect();
        spans.sort_by_key(|s| s.peer);
        spans
    }

    /// Atoms each side is missing: `(only in self, only in other)`.
    #[must_use]
    pub fn diff(&self, other: &Self) -> (Vec<IdSpan>, Vec<IdSpan>) {
        (self.sub_spans(other), other.sub_spans(self))
    }

    /// Iterate over `(peer, last counter)` entries in peer order.
    pub fn iter(&self) -> impl Iterator<Item = (PeerId, Counter)> + '_ {
        let mut entries: Vec<_> = self.0.iter().map(|(&p, &c)| (p, c)).collect();
        entries.sort_unstable();
        entries.into_iter()
    }

    /// Number of peers with an entry.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no operation is covered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Total number of atoms covered.
    #[must_use]
    pub fn atom_count(&self) -> u64 {
        self.0.values().map(|&c| u64::from(c) + 1).sum()
    }
}

/// Causal comparison: `None` means the versions are concurrent.
impl PartialOrd for VersionVector {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self.includes_vv(other), other.includes_vv(self)) {
            (true, true) => Some(Ordering::Equal),
            (true, false) => Some(Ordering::Greater),
            (false, true) => Some(Ordering::Less),
            (false, false) => None,
        }
    }
}

impl FromIterator<(PeerId, Counter)> for VersionVector {
    fn from_iter<I: IntoIterator<Item = (PeerId, Counter)>>(iter: I) -> Self {
        let mut vv = Self::new();
        for (peer, c) in iter {
            vv.extend_to_include(OpId::new(peer, c));
        }
        vv
    }
}

/// The operations no other known operation depends on.
///
/// New local operations use the current frontiers as their explicit
/// dependencies. Kept sorted so that equal histories have equal frontiers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frontiers(Vec<OpId>);

impl Frontiers {
    /// Empty frontiers (the empty history).
    pub fn new() -> Self {
        Self::default()
    }

    /// Update after applying an operation whose last atom is `last` and
    /// whose explicit dependencies are `deps`.
    ///
    /// The op's same-peer predecessor is an implicit dependency, so any
    /// frontier entry of that peer is superseded too.
    pub fn advance(&mut self, deps: &[OpId], last: OpId) {
        self.0
            .retain(|id| id.peer != last.peer && !deps.contains(id));
        self.0.push(last);
        self.0.sort_unstable();
    }

    /// The ids as a slice.
    pub fn as_slice(&self) -> &[OpId] {
        &self.0
    }

    /// Whether `id` is one of the frontier entries.
    pub fn contains(&self, id: &OpId) -> bool {
        self.0.contains(id)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the history is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<OpId>> for Frontiers {
    fn from(mut ids: Vec<OpId>) -> Self {
        ids.sort_unstable();
        ids.dedup();
        Self(ids)
    }
}
