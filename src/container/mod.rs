//! Container CRDTs and the registry that owns them.

mod list;
mod map;
mod registry;
mod sequence;
mod text;

pub use list::ListState;
pub use map::MapState;
pub use registry::ContainerRegistry;
pub use text::TextState;

use crate::crdt::OpCrdt;
use crate::id::ContainerType;
use crate::op::Operation;

/// A container's state, tagged with its kind at creation.
#[derive(Debug, Clone)]
pub enum ContainerState {
    /// List state.
    List(ListState),
    /// Map state.
    Map(MapState),
    /// Text state.
    Text(TextState),
}

impl ContainerState {
    /// Empty state of the given kind.
    pub fn new(kind: ContainerType) -> Self {
        match kind {
            ContainerType::List => Self::List(ListState::default()),
            ContainerType::Map => Self::Map(MapState::default()),
            ContainerType::Text => Self::Text(TextState::default()),
        }
    }

    /// Kind of the container.
    pub fn kind(&self) -> ContainerType {
        match self {
            Self::List(_) => ContainerType::List,
            Self::Map(_) => ContainerType::Map,
            Self::Text(_) => ContainerType::Text,
        }
    }

    /// The list state, if this is a list.
    pub fn as_list(&self) -> Option<&ListState> {
        match self {
            Self::List(list) => Some(list),
            _ => None,
        }
    }

    /// The map state, if this is a map.
    pub fn as_map(&self) -> Option<&MapState> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// The text state, if this is text.
    pub fn as_text(&self) -> Option<&TextState> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl OpCrdt for ContainerState {
    fn can_apply(&self, op: &Operation) -> bool {
        match self {
            Self::List(list) => list.can_apply(op),
            Self::Map(map) => map.can_apply(op),
            Self::Text(text) => text.can_apply(op),
        }
    }

    fn apply_op(&mut self, op: &Operation) {
        match self {
            Self::List(list) => list.apply_op(op),
            Self::Map(map) => map.apply_op(op),
            Self::Text(text) => text.apply_op(op),
        }
    }
}
