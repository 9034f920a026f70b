//! Operations: the unit of history exchanged between replicas.
//!
//! An operation spans one or more *atoms*. Inserting `n` list values or an
//! `n`-char string is a single operation occupying counters
//! `id.counter..id.counter + n` and Lamports `lamport..lamport + n`; atom
//! `i + 1` is anchored right after atom `i`. Every other variant is one atom.

use serde::{Deserialize, Serialize};

use crate::clock::{IdLp, Lamport};
use crate::error::DecodeError;
use crate::id::{ContainerId, ContainerType, Counter, OpId};
use crate::value::Value;

/// A single causal event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    /// Id of the first atom.
    pub id: OpId,
    /// Lamport timestamp of the first atom.
    pub lamport: Lamport,
    /// Explicit causal dependencies: the creator's frontiers at creation time.
    pub deps: Vec<OpId>,
    /// Container the operation targets.
    pub container: ContainerId,
    /// Wall-clock milliseconds at creation; informational only.
    pub timestamp: u64,
    /// What the operation does.
    pub content: OpContent,
}

/// Operation payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OpContent {
    /// Insert sequence elements after `after` (`None` = at the head).
    Insert {
        /// Left origin of the first inserted atom.
        after: Option<OpId>,
        /// The inserted elements.
        content: InsertContent,
    },
    /// Tombstone the sequence elements created by `targets`.
    Delete {
        /// Element ids to tombstone.
        targets: Vec<OpId>,
    },
    /// Last-writer-wins write of a map field; `None` removes the field.
    SetField {
        /// Field name.
        key: String,
        /// New value, or `None` for a removal.
        value: Option<Value>,
    },
    /// Create a child container of `kind` whose id derives from this op's id.
    CreateContainer {
        /// Where the reference to the child lives inside the target container.
        slot: Slot,
        /// Kind of the child container.
        kind: ContainerType,
    },
}

/// Elements carried by an insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InsertContent {
    /// List values, one atom each.
    Values(Vec<Value>),
    /// Text, one atom per char.
    Text(String),
}

/// Position of a nested container reference inside its parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Slot {
    /// A new list element anchored after the given element.
    After(Option<OpId>),
    /// A map field.
    Key(String),
}

impl InsertContent {
    fn atom_len(&self) -> usize {
        match self {
            Self::Values(values) => values.len(),
            Self::Text(text) => text.chars().count(),
        }
    }

    fn skip(&self, n: usize) -> Self {
        match self {
            Self::Values(values) => Self::Values(values[n..].to_vec()),
            Self::Text(text) => Self::Text(text.chars().skip(n).collect()),
        }
    }
}

impl OpContent {
    /// Whether a plain value in the payload holds a container reference.
    /// References are only minted by [`OpContent::CreateContainer`].
    pub fn carries_container_value(&self) -> bool {
        match self {
            Self::Insert {
                content: InsertContent::Values(values),
                ..
            } => values.iter().any(Value::contains_container),
            Self::SetField {
                value: Some(value), ..
            } => value.contains_container(),
            _ => false,
        }
    }
}

impl Operation {
    /// Number of atoms (counters) the operation occupies.
    pub fn atom_len(&self) -> Counter {
        match &self.content {
            OpContent::Insert { content, .. } => content.atom_len() as Counter,
            _ => 1,
        }
    }

    /// One past the last counter of the operation.
    pub fn end_counter(&self) -> Counter {
        self.id.counter + self.atom_len()
    }

    /// Id of the last atom.
    pub fn last_id(&self) -> OpId {
        self.id.inc(self.atom_len() - 1)
    }

    /// Conflict-resolution key of the first atom.
    pub fn id_lp(&self) -> IdLp {
        IdLp::new(self.lamport, self.id.peer)
    }

    /// Whether atom `id` belongs to this operation.
    pub fn contains_id(&self, id: OpId) -> bool {
        id.peer == self.id.peer && id.counter >= self.id.counter && id.counter < self.end_counter()
    }

    /// Id of the container this operation creates, if any.
    pub fn created_container(&self) -> Option<ContainerId> {
        match &self.content {
            OpContent::CreateContainer { kind, .. } => Some(ContainerId::new_normal(self.id, *kind)),
            _ => None,
        }
    }

    /// Every atom that must be known before this operation can apply:
    /// explicit deps, the same-peer predecessor, and the creation op of a
    /// non-root target container.
    pub fn dependencies(&self) -> impl Iterator<Item = OpId> + '_ {
        let predecessor = self
            .id
            .counter
            .checked_sub(1)
            .map(|c| OpId::new(self.id.peer, c));
        self.deps
            .iter()
            .copied()
            .chain(predecessor)
            .chain(self.container.creation_id())
    }

    /// The suffix of this operation starting at `counter`.
    ///
    /// Only multi-atom inserts can be split; the suffix's first atom keeps
    /// its original anchor, which is the atom right before it.
    pub fn slice_from(&self, counter: Counter) -> Self {
        let skip = counter.saturating_sub(self.id.counter);
        if skip == 0 {
            return self.clone();
        }

        let content = match &self.content {
            OpContent::Insert { content, .. } => OpContent::Insert {
                after: Some(self.id.inc(skip - 1)),
                content: content.skip(skip as usize),
            },
            other => other.clone(),
        };

        Self {
            id: self.id.inc(skip),
            lamport: self.lamport + skip,
            deps: self.deps.clone(),
            container: self.container.clone(),
            timestamp: self.timestamp,
            content,
        }
    }

    /// Structural checks run on every decoded operation.
    pub fn validate(&self) -> Result<(), DecodeError> {
        let invalid = |reason| DecodeError::InvalidOp {
            id: self.id,
            reason,
        };

        let len = match &self.content {
            OpContent::Insert { content, .. } => content.atom_len(),
            _ => 1,
        };
        if len == 0 {
            return Err(invalid("empty insert"));
        }
        let len = Counter::try_from(len).map_err(|_| invalid("insert too long"))?;
        if self.id.counter.checked_add(len).is_none() || self.lamport.checked_add(len).is_none() {
            return Err(invalid("counter overflow"));
        }
        if self
            .deps
            .iter()
            .any(|d| d.peer == self.id.peer && d.counter >= self.id.counter)
        {
            return Err(invalid("depends on itself or its future"));
        }

        if self.content.carries_container_value() {
            return Err(invalid("container reference outside a container slot"));
        }

        let kind = self.container.kind();
        match &self.content {
            OpContent::Insert { content, .. } => match (content, kind) {
                (InsertContent::Values(_), ContainerType::List)
                | (InsertContent::Text(_), ContainerType::Text) => {}
                _ => return Err(invalid("insert content does not match container kind")),
            },
            OpContent::Delete { targets } => {
                if targets.is_empty() {
                    return Err(invalid("empty delete"));
                }
                if kind == ContainerType::Map {
                    return Err(invalid("sequence delete on a map"));
                }
            }
            OpContent::SetField { .. } => {
                if kind != ContainerType::Map {
                    return Err(invalid("field write on a non-map container"));
                }
            }
            OpContent::CreateContainer { slot, .. } => match (slot, kind) {
                (Slot::After(_), ContainerType::List) | (Slot::Key(_), ContainerType::Map) => {}
                _ => return Err(invalid("container slot does not match parent kind")),
            },
        }
        Ok(())
    }
}
