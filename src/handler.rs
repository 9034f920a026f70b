//! Handles for editing one container of a [`Document`].
//!
//! A handle borrows the document mutably for as long as it lives. Every
//! edit validates its arguments first, then creates one operation, applies
//! it and appends it to the log.

use core::fmt;

use crate::container::{ListState, MapState, TextState};
use crate::doc::Document;
use crate::error::{DocError, Result};
use crate::id::{ContainerId, ContainerType, OpId};
use crate::op::{InsertContent, OpContent, Slot};
use crate::value::Value;

fn check_range(index: usize, count: usize, len: usize) -> Result<()> {
    match index.checked_add(count) {
        Some(end) if end <= len => Ok(()),
        _ => Err(DocError::IndexOutOfBounds {
            index: index.saturating_add(count),
            len,
        }),
    }
}

fn check_insert(index: usize, len: usize) -> Result<()> {
    if index > len {
        return Err(DocError::IndexOutOfBounds { index, len });
    }
    Ok(())
}

/// Editing handle for a list container.
pub struct ListHandle<'a> {
    doc: &'a mut Document,
    id: ContainerId,
}

impl<'a> ListHandle<'a> {
    pub(crate) fn new(doc: &'a mut Document, id: ContainerId) -> Self {
        Self { doc, id }
    }

    /// Id of the container.
    pub fn id(&self) -> &ContainerId {
        &self.id
    }

    fn state(&self) -> Option<&ListState> {
        self.doc.state(&self.id).and_then(|s| s.as_list())
    }

    /// Number of visible elements.
    pub fn len(&self) -> usize {
        self.state().map_or(0, ListState::len)
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value at `index`. Nested containers come back as [`Value::Container`].
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.state()?.get(index)
    }

    /// Id of the element at `index`.
    pub fn get_id(&self, index: usize) -> Option<OpId> {
        self.state()?.get_id(index)
    }

    /// Shallow copy of the visible values.
    pub fn to_vec(&self) -> Vec<Value> {
        self.state().map(ListState::to_vec).unwrap_or_default()
    }

    /// Insert `value` so it ends up at `index`.
    pub fn insert(&mut self, index: usize, value: impl Into<Value>) -> Result<()> {
        self.insert_many(index, vec![value.into()])
    }

    /// Insert `values` as one operation starting at `index`.
    pub fn insert_many(&mut self, index: usize, values: Vec<Value>) -> Result<()> {
        check_insert(index, self.len())?;
        if values.is_empty() {
            return Ok(());
        }
        let after = self.state().and_then(|s| s.anchor_for(index));
        self.doc.apply_local(
            &self.id,
            OpContent::Insert {
                after,
                content: InsertContent::Values(values),
            },
        )?;
        Ok(())
    }

    /// Append `value` at the end.
    pub fn push(&mut self, value: impl Into<Value>) -> Result<()> {
        let len = self.len();
        self.insert(len, value)
    }

    /// Tombstone `count` visible elements starting at `index`.
    pub fn delete(&mut self, index: usize, count: usize) -> Result<()> {
        check_range(index, count, self.len())?;
        if count == 0 {
            return Ok(());
        }
        let targets = self
            .state()
            .map(|s| s.ids_in_range(index, count))
            .unwrap_or_default();
        self.doc
            .apply_local(&self.id, OpContent::Delete { targets })?;
        Ok(())
    }

    /// Create a child container of `kind` at `index` and return its id.
    pub fn insert_container(&mut self, index: usize, kind: ContainerType) -> Result<ContainerId> {
        check_insert(index, self.len())?;
        let after = self.state().and_then(|s| s.anchor_for(index));
        let op = self.doc.apply_local(
            &self.id,
            OpContent::CreateContainer {
                slot: Slot::After(after),
                kind,
            },
        )?;
        Ok(ContainerId::new_normal(op, kind))
    }
}

impl fmt::Debug for ListHandle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListHandle").field("id", &self.id).finish()
    }
}

/// Editing handle for a map container.
pub struct MapHandle<'a> {
    doc: &'a mut Document,
    id: ContainerId,
}

impl<'a> MapHandle<'a> {
    pub(crate) fn new(doc: &'a mut Document, id: ContainerId) -> Self {
        Self { doc, id }
    }

    /// Id of the container.
    pub fn id(&self) -> &ContainerId {
        &self.id
    }

    fn state(&self) -> Option<&MapState> {
        self.doc.state(&self.id).and_then(|s| s.as_map())
    }

    /// Current value of `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.state()?.get(key)
    }

    /// Whether `key` holds a value.
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Live keys in sorted order.
    pub fn keys(&self) -> Vec<String> {
        self.state()
            .map(|s| s.keys().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        self.state().map_or(0, MapState::len)
    }

    /// Whether no key holds a value.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write `value` under `key`. A value holding a container reference is
    /// rejected with [`DocError::ContainerValue`]; use
    /// [`set_container`](Self::set_container) to nest containers.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> Result<()> {
        self.write(key, Some(value.into()))
    }

    /// Remove `key`. Concurrent writes are resolved like any other write.
    pub fn delete(&mut self, key: &str) -> Result<()> {
        self.write(key, None)
    }

    fn write(&mut self, key: &str, value: Option<Value>) -> Result<()> {
        self.doc.apply_local(
            &self.id,
            OpContent::SetField {
                key: key.to_string(),
                value,
            },
        )?;
        Ok(())
    }

    /// Create a child container of `kind` under `key` and return its id.
    pub fn set_container(&mut self, key: &str, kind: ContainerType) -> Result<ContainerId> {
        let op = self.doc.apply_local(
            &self.id,
            OpContent::CreateContainer {
                slot: Slot::Key(key.to_string()),
                kind,
            },
        )?;
        Ok(ContainerId::new_normal(op, kind))
    }
}

impl fmt::Debug for MapHandle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapHandle").field("id", &self.id).finish()
    }
}

/// Editing handle for a text container. Indices count chars.
pub struct TextHandle<'a> {
    doc: &'a mut Document,
    id: ContainerId,
}

impl<'a> TextHandle<'a> {
    pub(crate) fn new(doc: &'a mut Document, id: ContainerId) -> Self {
        Self { doc, id }
    }

    /// Id of the container.
    pub fn id(&self) -> &ContainerId {
        &self.id
    }

    fn state(&self) -> Option<&TextState> {
        self.doc.state(&self.id).and_then(|s| s.as_text())
    }

    /// Length in chars.
    pub fn len_unicode(&self) -> usize {
        self.state().map_or(0, TextState::len_unicode)
    }

    /// Length in UTF-8 bytes.
    pub fn len_utf8(&self) -> usize {
        self.state().map_or(0, TextState::len_utf8)
    }

    /// Length in UTF-16 code units.
    pub fn len_utf16(&self) -> usize {
        self.state().map_or(0, TextState::len_utf16)
    }

    /// Whether the text is empty.
    pub fn is_empty(&self) -> bool {
        self.len_unicode() == 0
    }

    /// Char at `index`.
    pub fn char_at(&self, index: usize) -> Option<char> {
        self.state()?.char_at(index)
    }

    /// Insert `text` at char `index` as a single operation.
    pub fn insert(&mut self, index: usize, text: &str) -> Result<()> {
        check_insert(index, self.len_unicode())?;
        if text.is_empty() {
            return Ok(());
        }
        let after = self.state().and_then(|s| s.anchor_for(index));
        self.doc.apply_local(
            &self.id,
            OpContent::Insert {
                after,
                content: InsertContent::Text(text.to_string()),
            },
        )?;
        Ok(())
    }

    /// Delete `count` chars starting at `index`.
    pub fn delete(&mut self, index: usize, count: usize) -> Result<()> {
        check_range(index, count, self.len_unicode())?;
        if count == 0 {
            return Ok(());
        }
        let targets = self
            .state()
            .map(|s| s.ids_in_range(index, count))
            .unwrap_or_default();
        self.doc
            .apply_local(&self.id, OpContent::Delete { targets })?;
        Ok(())
    }
}

impl fmt::Display for TextHandle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.state() {
            Some(text) => fmt::Display::fmt(text, f),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for TextHandle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextHandle").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> Document {
        Document::builder().peer_id(1).build()
    }

    #[test]
    fn list_insert_get_delete() {
        let mut d = doc();
        let mut list = d.get_list("l");
        list.push("a").unwrap();
        list.push("c").unwrap();
        list.insert(1, "b").unwrap();
        assert_eq!(list.to_vec(), vec![Value::from("a"), "b".into(), "c".into()]);

        list.delete(0, 2).unwrap();
        assert_eq!(list.to_vec(), vec![Value::from("c")]);
        assert_eq!(list.get(0), Some(&Value::from("c")));
        assert!(list.get(1).is_none());
    }

    #[test]
    fn list_bounds_are_checked_before_mutation() {
        let mut d = doc();
        let mut list = d.get_list("l");
        list.push(1).unwrap();
        assert_eq!(
            list.insert(3, 2).unwrap_err(),
            DocError::IndexOutOfBounds { index: 3, len: 1 }
        );
        assert_eq!(
            list.delete(0, 2).unwrap_err(),
            DocError::IndexOutOfBounds { index: 2, len: 1 }
        );
        assert_eq!(d.oplog_len(), 1);
    }

    #[test]
    fn insert_many_is_one_operation() {
        let mut d = doc();
        d.get_list("l")
            .insert_many(0, vec![1.into(), 2.into(), 3.into()])
            .unwrap();
        assert_eq!(d.oplog_len(), 1);
        assert_eq!(d.get_list("l").len(), 3);
        assert_eq!(d.get_list("l").get_id(2), Some(OpId::new(1, 2)));
    }

    #[test]
    fn map_set_delete_keys() {
        let mut d = doc();
        let mut map = d.get_map("m");
        map.set("b", true).unwrap();
        map.set("a", 1.5).unwrap();
        map.set("gone", "x").unwrap();
        map.delete("gone").unwrap();
        assert_eq!(map.keys(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(map.get("a"), Some(&Value::Double(1.5)));
        assert!(!map.contains_key("gone"));
    }

    #[test]
    fn text_edit_and_lengths() {
        let mut d = doc();
        let mut text = d.get_text("t");
        text.insert(0, "héllo").unwrap();
        text.insert(5, " wörld").unwrap();
        text.delete(0, 1).unwrap();
        assert_eq!(text.to_string(), "éllo wörld");
        assert_eq!(text.len_unicode(), 10);
        assert_eq!(text.len_utf8(), 12);
        assert_eq!(text.char_at(0), Some('é'));
        assert!(text.insert(11, "!").is_err());
    }

    #[test]
    fn nested_containers_resolve_through_ids() {
        let mut d = doc();
        let child = d.get_list("l").insert_container(0, ContainerType::Map).unwrap();
        assert_eq!(d.get_list("l").get(0), Some(&Value::Container(child.clone())));

        d.map(&child).unwrap().set("k", "v").unwrap();
        let inner = d
            .map(&child)
            .unwrap()
            .set_container("notes", ContainerType::Text)
            .unwrap();
        d.text(&inner).unwrap().insert(0, "deep").unwrap();

        assert_eq!(d.text(&inner).unwrap().to_string(), "deep");
        assert_eq!(
            d.map(&child).unwrap().get("notes"),
            Some(&Value::Container(inner))
        );
    }

    #[test]
    fn raw_container_values_are_rejected_before_mutation() {
        let mut d = doc();
        d.get_map("m").set("k", 1).unwrap();
        let root = ContainerId::new_root("m", ContainerType::Map);

        assert_eq!(
            d.get_map("m").set("loop", Value::from(root.clone())).unwrap_err(),
            DocError::ContainerValue
        );
        let nested = Value::List(vec![Value::from(root)]);
        assert_eq!(
            d.get_list("l").push(nested).unwrap_err(),
            DocError::ContainerValue
        );

        assert_eq!(d.oplog_len(), 1);
        assert!(!d.get_map("m").contains_key("loop"));
        assert!(d.get_list("l").is_empty());
        assert_eq!(d.to_json(), serde_json::json!({"m": {"k": 1}}));
    }
}
