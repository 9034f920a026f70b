use std::collections::BTreeMap;

use crate::clock::IdLp;
use crate::crdt::OpCrdt;
use crate::id::OpId;
use crate::op::{OpContent, Operation, Slot};
use crate::value::Value;

/// State of a map container: one last-writer-wins register per key.
///
/// Concurrent writes to a key are resolved by the larger `(lamport, peer)`,
/// so the outcome never depends on wall-clock time or arrival order.
/// Removals are writes of "no value" and follow the same rule.
#[derive(Debug, Clone, Default)]
pub struct MapState {
    fields: BTreeMap<String, MapEntry>,
}

#[derive(Debug, Clone)]
struct MapEntry {
    value: Option<Value>,
    key: IdLp,
    id: OpId,
}

impl MapState {
    /// Current value of `key`; `None` if unset or removed.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key).and_then(|e| e.value.as_ref())
    }

    /// Id of the operation that wrote the current value of `key`.
    #[must_use]
    pub fn winner(&self, key: &str) -> Option<OpId> {
        self.fields.get(key).map(|e| e.id)
    }

    /// Whether `key` currently holds a value.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Live keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.iter().map(|(k, _)| k)
    }

    /// Live `(key, value)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> + '_ {
        self.fields
            .iter()
            .filter_map(|(k, e)| e.value.as_ref().map(|v| (k.as_str(), v)))
    }

    /// Number of live keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Whether no key holds a value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn write(&mut self, field: &str, value: Option<Value>, key: IdLp, id: OpId) {
        match self.fields.get_mut(field) {
            Some(entry) if entry.key >= key => {}
            Some(entry) => *entry = MapEntry { value, key, id },
            None => {
                self.fields
                    .insert(field.to_string(), MapEntry { value, key, id });
            }
        }
    }
}

impl OpCrdt for MapState {
    fn can_apply(&self, op: &Operation) -> bool {
        matches!(
            op.content,
            OpContent::SetField { .. }
                | OpContent::CreateContainer {
                    slot: Slot::Key(_),
                    ..
                }
        )
    }

    fn apply_op(&mut self, op: &Operation) {
        match &op.content {
            OpContent::SetField { key, value } => {
                self.write(key, value.clone(), op.id_lp(), op.id);
            }
            OpContent::CreateContainer {
                slot: Slot::Key(key),
                ..
            } => {
                let child = op.created_container().map(Value::Container);
                self.write(key, child, op.id_lp(), op.id);
            }
            _ => {}
        }
    }
}
