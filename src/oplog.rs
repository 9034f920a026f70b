//! Append-only, causally ordered operation history.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::clock::{Clock, Lamport};
use crate::error::{DocError, Result};
use crate::id::{OpId, PeerId};
use crate::op::Operation;
use crate::version::{Frontiers, VersionVector};

/// All applied operations, grouped per peer in counter order.
///
/// Each peer's history is contiguous from counter 0, so the version vector
/// is exactly the set of stored atoms and membership is a single lookup.
#[derive(Debug, Clone, Default)]
pub struct OpLog {
    changes: HashMap<PeerId, Vec<Operation>>,
    vv: VersionVector,
    frontiers: Frontiers,
    clock: Clock,
}

impl OpLog {
    /// Create an empty log reading `SystemTime` for local timestamps.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty log with the given clock.
    pub fn with_clock(clock: Clock) -> Self {
        Self {
            clock,
            ..Self::default()
        }
    }

    /// Append `op`, which must continue its peer's history exactly.
    ///
    /// Advances the version vector, frontiers and clock.
    pub fn append(&mut self, op: Operation) -> Result<()> {
        let expected = self.vv.next_counter(op.id.peer);
        if op.id.counter != expected {
            return Err(DocError::OutOfOrderOp {
                id: op.id,
                expected,
            });
        }

        let last = op.last_id();
        self.vv.extend_to_include(last);
        self.frontiers.advance(&op.deps, last);
        self.clock.observe(op.lamport, op.atom_len(), op.timestamp);
        self.changes.entry(op.id.peer).or_default().push(op);
        Ok(())
    }

    /// Whether the atom `id` has been applied.
    #[must_use]
    pub fn contains(&self, id: OpId) -> bool {
        self.vv.includes_id(id)
    }

    /// The stored operation containing atom `id`.
    #[must_use]
    pub fn get(&self, id: OpId) -> Option<&Operation> {
        let ops = self.changes.get(&id.peer)?;
        let idx = ops.partition_point(|op| op.end_counter() <= id.counter);
        ops.get(idx).filter(|op| op.contains_id(id))
    }

    /// Lamport of atom `id`, if it has been applied.
    #[must_use]
    pub fn lamport_of(&self, id: OpId) -> Option<Lamport> {
        self.get(id).map(|op| op.lamport + (id.counter - op.id.counter))
    }

    /// The version vector of everything `frontiers` causally depends on,
    /// the frontiers themselves included.
    pub fn frontiers_to_vv(&self, frontiers: &Frontiers) -> Result<VersionVector> {
        let mut vv = VersionVector::new();
        let mut stack = frontiers.as_slice().to_vec();
        while let Some(id) = stack.pop() {
            if vv.includes_id(id) {
                continue;
            }
            let Some(ops) = self.changes.get(&id.peer).filter(|_| self.contains(id)) else {
                return Err(DocError::FrontiersNotIncluded(id));
            };

            // Everything of this peer up to `id` is covered; only the
            // cross-peer dependencies of the newly covered ops remain.
            let start = vv.next_counter(id.peer);
            let first = ops.partition_point(|op| op.end_counter() <= start);
            for op in ops[first..].iter().take_while(|op| op.id.counter <= id.counter) {
                stack.extend(op.deps.iter().copied().chain(op.container.creation_id()));
            }
            vv.extend_to_include(id);
        }
        Ok(vv)
    }

    /// Causal order of this log's frontiers relative to `other`.
    ///
    /// `Some(Greater)` means the log has seen everything `other` has and
    /// more; `None` means the two are concurrent. Fails if `other` names
    /// an operation this log does not hold.
    pub fn cmp_frontiers(&self, other: &Frontiers) -> Result<Option<Ordering>> {
        let other = self.frontiers_to_vv(other)?;
        Ok(self.vv.partial_cmp(&other))
    }

    /// Largest wall-clock timestamp among the operations `frontiers` points
    /// at. Unknown ids are ignored; 0 when none is known.
    #[must_use]
    pub fn get_timestamp_of_version(&self, frontiers: &Frontiers) -> u64 {
        frontiers
            .as_slice()
            .iter()
            .filter_map(|id| self.get(*id))
            .map(|op| op.timestamp)
            .max()
            .unwrap_or(0)
    }

    /// Every stored operation not covered by `vv`, in causal order.
    ///
    /// Operations partially covered by `vv` are trimmed to their unknown
    /// suffix. The result is sorted by `(lamport, peer)`; a dependency always
    /// has a smaller Lamport than its dependents, so it comes first.
    pub fn diff_since(&self, vv: &VersionVector) -> Vec<Operation> {
        let mut out = Vec::new();
        for span in self.vv.sub_spans(vv) {
            let Some(ops) = self.changes.get(&span.peer) else {
                continue;
            };
            let first = ops.partition_point(|op| op.end_counter() <= span.start);
            for op in &ops[first..] {
                out.push(op.slice_from(span.start));
            }
        }
        out.sort_by_key(|op| (op.lamport, op.id.peer));
        out
    }

    /// Operations covered by `to` but not by `from`, in causal order.
    ///
    /// Both versions are expected to fall on operation boundaries of this
    /// log, as versions taken from a document always do.
    pub fn changes_between(&self, from: &VersionVector, to: &VersionVector) -> Vec<Operation> {
        let mut ops = self.diff_since(from);
        ops.retain(|op| to.includes_id(op.last_id()));
        ops
    }

    /// Every stored operation, in causal order.
    pub fn iter_causal(&self) -> impl Iterator<Item = Operation> {
        self.diff_since(&VersionVector::new()).into_iter()
    }

    /// Current version vector.
    pub fn version(&self) -> &VersionVector {
        &self.vv
    }

    /// Current frontiers.
    pub fn frontiers(&self) -> &Frontiers {
        &self.frontiers
    }

    /// Id the next operation of `peer` must have.
    #[must_use]
    pub fn next_id(&self, peer: PeerId) -> OpId {
        OpId::new(peer, self.vv.next_counter(peer))
    }

    /// Lamport the next local operation takes.
    #[must_use]
    pub fn next_lamport(&self) -> Lamport {
        self.clock.next_lamport()
    }

    /// Timestamp for a new local operation.
    #[must_use]
    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    /// Largest timestamp among applied operations.
    #[must_use]
    pub fn latest_timestamp(&self) -> u64 {
        self.clock.latest_timestamp()
    }

    /// Number of stored operations.
    #[must_use]
    pub fn len_ops(&self) -> usize {
        self.changes.values().map(Vec::len).sum()
    }

    /// Number of stored atoms.
    #[must_use]
    pub fn len_atoms(&self) -> u64 {
        self.vv.atom_count()
    }

    /// Whether nothing has been applied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}
