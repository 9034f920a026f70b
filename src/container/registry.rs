use std::collections::HashMap;

use crate::error::{DocError, Result};
use crate::id::ContainerId;

use super::ContainerState;

/// Arena owning every container of a document.
///
/// Containers never hold each other: a nested container is referenced by
/// its [`ContainerId`] and resolved here. Root containers spring into
/// existence on first use; all others are registered by the operation
/// that creates them.
#[derive(Debug, Clone, Default)]
pub struct ContainerRegistry {
    containers: HashMap<ContainerId, ContainerState>,
}

impl ContainerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a container.
    pub fn get(&self, id: &ContainerId) -> Option<&ContainerState> {
        self.containers.get(id)
    }

    /// Whether `id` can be resolved: it is registered or it is a root.
    pub fn is_resolvable(&self, id: &ContainerId) -> bool {
        id.is_root() || self.containers.contains_key(id)
    }

    /// Mutable access, creating root containers on demand.
    pub fn resolve_mut(&mut self, id: &ContainerId) -> Result<&mut ContainerState> {
        if id.is_root() {
            return Ok(self
                .containers
                .entry(id.clone())
                .or_insert_with(|| ContainerState::new(id.kind())));
        }
        self.containers
            .get_mut(id)
            .ok_or_else(|| DocError::UnknownContainer(id.clone()))
    }

    /// Register an empty container under `id`. Registering twice is a no-op.
    pub fn register(&mut self, id: ContainerId) {
        let kind = id.kind();
        self.containers
            .entry(id)
            .or_insert_with(|| ContainerState::new(kind));
    }

    /// Root container ids in sorted order.
    pub fn roots(&self) -> Vec<&ContainerId> {
        let mut roots: Vec<_> = self.containers.keys().filter(|id| id.is_root()).collect();
        roots.sort();
        roots
    }

    /// Number of registered containers.
    pub fn len(&self) -> usize {
        self.containers.len()
    }

    /// Whether no container exists yet.
    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }
}
