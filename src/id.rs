//! Identifiers shared by every layer of the engine.

use core::cmp::Ordering;
use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DocError;

/// Opaque replica identifier, stable for the lifetime of a replica.
pub type PeerId = u64;

/// Per-peer operation counter, starting at 0 and strictly increasing.
pub type Counter = u32;

/// Globally unique identifier of a single operation atom.
///
/// Ordered by counter first, with the peer as tie-break.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OpId {
    /// Peer that created the operation.
    pub peer: PeerId,
    /// Position of the atom in that peer's history.
    pub counter: Counter,
}

impl OpId {
    /// Create an id from its parts.
    pub const fn new(peer: PeerId, counter: Counter) -> Self {
        Self { peer, counter }
    }

    /// The id `n` atoms further along the same peer's history.
    #[must_use]
    pub const fn inc(self, n: Counter) -> Self {
        Self {
            peer: self.peer,
            counter: self.counter + n,
        }
    }
}

impl Ord for OpId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.counter
            .cmp(&other.counter)
            .then(self.peer.cmp(&other.peer))
    }
}

impl PartialOrd for OpId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.counter, self.peer)
    }
}

impl fmt::Debug for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// The kind of a container, fixed when the container is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ContainerType {
    /// Ordered sequence of values.
    List,
    /// Last-writer-wins map keyed by string.
    Map,
    /// Collaborative text.
    Text,
}

impl fmt::Display for ContainerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::List => "List",
            Self::Map => "Map",
            Self::Text => "Text",
        })
    }
}

impl FromStr for ContainerType {
    type Err = DocError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "List" => Ok(Self::List),
            "Map" => Ok(Self::Map),
            "Text" => Ok(Self::Text),
            _ => Err(DocError::InvalidContainerId(s.to_string())),
        }
    }
}

/// Identifies a container.
///
/// Root containers are addressed by name and exist implicitly. Every other
/// container is created by an operation and takes that operation's id, so
/// two replicas can never mint the same id with different kinds.
///
/// String form: `/<name>:<Kind>` for roots, `<counter>@<peer>:<Kind>`
/// otherwise.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ContainerId {
    /// A named top-level container.
    Root {
        /// Name given by the application.
        name: String,
        /// Container kind.
        kind: ContainerType,
    },
    /// A container created by the operation `counter@peer`.
    Normal {
        /// Peer of the creating operation.
        peer: PeerId,
        /// Counter of the creating operation.
        counter: Counter,
        /// Container kind.
        kind: ContainerType,
    },
}

impl ContainerId {
    /// Id of the root container `name` of the given kind.
    pub fn new_root(name: impl Into<String>, kind: ContainerType) -> Self {
        Self::Root {
            name: name.into(),
            kind,
        }
    }

    /// Id of the container created by operation `id`.
    pub fn new_normal(id: OpId, kind: ContainerType) -> Self {
        Self::Normal {
            peer: id.peer,
            counter: id.counter,
            kind,
        }
    }

    /// Kind of the container.
    pub fn kind(&self) -> ContainerType {
        match self {
            Self::Root { kind, .. } | Self::Normal { kind, .. } => *kind,
        }
    }

    /// Whether this is a named root container.
    pub fn is_root(&self) -> bool {
        matches!(self, Self::Root { .. })
    }

    /// Name of a root container.
    pub fn root_name(&self) -> Option<&str> {
        match self {
            Self::Root { name, .. } => Some(name),
            Self::Normal { .. } => None,
        }
    }

    /// Id of the operation that created a non-root container.
    pub fn creation_id(&self) -> Option<OpId> {
        match self {
            Self::Root { .. } => None,
            Self::Normal { peer, counter, .. } => Some(OpId::new(*peer, *counter)),
        }
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root { name, kind } => write!(f, "/{name}:{kind}"),
            Self::Normal {
                peer,
                counter,
                kind,
            } => write!(f, "{}:{kind}", OpId::new(*peer, *counter)),
        }
    }
}

impl fmt::Debug for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for ContainerId {
    type Err = DocError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DocError::InvalidContainerId(s.to_string());
        let (head, kind) = s.rsplit_once(':').ok_or_else(invalid)?;
        let kind: ContainerType = kind.parse().map_err(|_| invalid())?;

        if let Some(name) = head.strip_prefix('/') {
            return Ok(Self::new_root(name, kind));
        }

        let (counter, peer) = head.split_once('@').ok_or_else(invalid)?;
        let counter = counter.parse().map_err(|_| invalid())?;
        let peer = peer.parse().map_err(|_| invalid())?;
        Ok(Self::new_normal(OpId::new(peer, counter), kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn op_id_orders_by_counter_then_peer() {
        let a = OpId::new(9, 1);
        let b = OpId::new(1, 2);
        let c = OpId::new(2, 2);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn op_id_inc() {
        assert_eq!(OpId::new(3, 4).inc(2), OpId::new(3, 6));
    }

    #[test]
    fn root_container_string_form() {
        let id = ContainerId::new_root("todo:items", ContainerType::List);
        assert_eq!(id.to_string(), "/todo:items:List");
        assert_eq!(id.to_string().parse::<ContainerId>().unwrap(), id);
        assert_eq!(id.root_name(), Some("todo:items"));
    }

    #[test]
    fn normal_container_string_form() {
        let id = ContainerId::new_normal(OpId::new(42, 7), ContainerType::Map);
        assert_eq!(id.to_string(), "7@42:Map");
        assert_eq!("7@42:Map".parse::<ContainerId>().unwrap(), id);
        assert_eq!(id.creation_id(), Some(OpId::new(42, 7)));
        assert!(!id.is_root());
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("nope".parse::<ContainerId>().is_err());
        assert!("1@x:List".parse::<ContainerId>().is_err());
        assert!("/a:Tree".parse::<ContainerId>().is_err());
    }
}
