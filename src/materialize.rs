//! Plain nested snapshots of a document.

use std::collections::BTreeMap;

use crate::container::ContainerState;
use crate::doc::Document;
use crate::error::{DocError, Result};
use crate::id::{ContainerId, ContainerType};
use crate::value::Value;

impl Document {
    /// The whole document as a plain value: a map from root name to content.
    ///
    /// Roots of different kinds may share a name; those are keyed by their
    /// full id string (`/x:List`, `/x:Text`) so neither hides the other.
    /// Container references are replaced by the content of the referenced
    /// container, recursively. Deleted elements and removed keys are absent.
    pub fn get_deep_value(&self) -> Value {
        let roots = self.registry().roots();
        let mut names: BTreeMap<&str, usize> = BTreeMap::new();
        for id in &roots {
            if let Some(name) = id.root_name() {
                *names.entry(name).or_default() += 1;
            }
        }

        let mut out = BTreeMap::new();
        for id in &roots {
            let Some(name) = id.root_name() else {
                continue;
            };
            let key = if names.get(name).copied().unwrap_or(0) > 1 {
                id.to_string()
            } else {
                name.to_string()
            };
            out.insert(key, self.deep_value(id));
        }
        Value::Map(out)
    }

    /// One container's content as a plain value.
    pub fn get_deep_value_of(&self, id: &ContainerId) -> Result<Value> {
        if !self.registry().is_resolvable(id) {
            return Err(DocError::UnknownContainer(id.clone()));
        }
        Ok(self.deep_value(id))
    }

    /// [`get_deep_value`](Self::get_deep_value) as JSON.
    pub fn to_json(&self) -> serde_json::Value {
        self.get_deep_value().to_json()
    }

    fn deep_value(&self, id: &ContainerId) -> Value {
        match self.state(id) {
            Some(ContainerState::List(list)) => {
                Value::List(list.iter().map(|v| self.resolve(v)).collect())
            }
            Some(ContainerState::Map(map)) => Value::Map(
                map.iter()
                    .map(|(k, v)| (k.to_string(), self.resolve(v)))
                    .collect(),
            ),
            Some(ContainerState::Text(text)) => Value::String(text.to_string()),
            None => match id.kind() {
                ContainerType::List => Value::List(Vec::new()),
                ContainerType::Map => Value::Map(BTreeMap::new()),
                ContainerType::Text => Value::String(String::new()),
            },
        }
    }

    fn resolve(&self, value: &Value) -> Value {
        match value {
            Value::Container(child) => self.deep_value(child),
            other => other.clone(),
        }
    }
}
