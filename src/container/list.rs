use crate::crdt::OpCrdt;
use crate::id::OpId;
use crate::op::{InsertContent, OpContent, Operation, Slot};
use crate::value::Value;

use super::sequence::Sequence;

/// State of a list container: an RGA over [`Value`]s.
///
/// A slot holding a nested container stores [`Value::Container`]; the
/// child's content lives in the registry.
#[derive(Debug, Clone, Default)]
pub struct ListState {
    seq: Sequence<Value>,
}

impl ListState {
    /// Number of visible elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seq.len()
    }

    /// Whether the list has no visible elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value at visible `index`; nested containers come back as references.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.seq.get(index)
    }

    /// Id of the element at visible `index`.
    #[must_use]
    pub fn get_id(&self, index: usize) -> Option<OpId> {
        self.seq.id_at(index)
    }

    /// Visible values in order.
    pub fn iter(&self) -> impl Iterator<Item = &Value> + '_ {
        self.seq.iter()
    }

    /// Shallow copy of the visible values.
    #[must_use]
    pub fn to_vec(&self) -> Vec<Value> {
        self.iter().cloned().collect()
    }

    pub(crate) fn anchor_for(&self, index: usize) -> Option<OpId> {
        self.seq.anchor_for(index)
    }

    pub(crate) fn ids_in_range(&self, index: usize, count: usize) -> Vec<OpId> {
        self.seq.ids_in_range(index, count)
    }
}

impl OpCrdt for ListState {
    fn can_apply(&self, op: &Operation) -> bool {
        match &op.content {
            OpContent::Insert { after, .. } => self.seq.has_anchor(*after),
            OpContent::CreateContainer {
                slot: Slot::After(after),
                ..
            } => self.seq.has_anchor(*after),
            OpContent::Delete { .. } => true,
            _ => false,
        }
    }

    fn apply_op(&mut self, op: &Operation) {
        match &op.content {
            OpContent::Insert {
                after,
                content: InsertContent::Values(values),
            } => {
                self.seq
                    .integrate_run(op.id, op.id_lp(), *after, values.iter().cloned());
            }
            OpContent::CreateContainer {
                slot: Slot::After(after),
                ..
            } => {
                if let Some(child) = op.created_container() {
                    self.seq
                        .integrate(op.id, op.id_lp(), *after, Value::Container(child));
                }
            }
            OpContent::Delete { targets } => {
                for target in targets {
                    self.seq.delete(*target);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{ContainerId, ContainerType};

    fn op(peer: u64, counter: u32, lamport: u32, content: OpContent) -> Operation {
        Operation {
            id: OpId::new(peer, counter),
            lamport,
            deps: vec![],
            container: ContainerId::new_root("list", ContainerType::List),
            timestamp: 0,
            content,
        }
    }

    fn insert(after: Option<OpId>, values: Vec<Value>) -> OpContent {
        OpContent::Insert {
            after,
            content: InsertContent::Values(values),
        }
    }

    #[test]
    fn multi_value_insert_chains_atoms() {
        let mut list = ListState::default();
        list.apply_op(&op(1, 0, 0, insert(None, vec!["A".into(), "B".into(), "C".into()])));
        assert_eq!(list.to_vec(), vec![Value::from("A"), "B".into(), "C".into()]);
        assert_eq!(list.get_id(2), Some(OpId::new(1, 2)));
    }

    #[test]
    fn delete_tombstones_and_is_idempotent() {
        let mut list = ListState::default();
        list.apply_op(&op(1, 0, 0, insert(None, vec![1.into(), 2.into()])));
        let del = op(
            1,
            2,
            2,
            OpContent::Delete {
                targets: vec![OpId::new(1, 0)],
            },
        );
        list.apply_op(&del);
        list.apply_op(&del);
        assert_eq!(list.to_vec(), vec![Value::from(2)]);
    }

    #[test]
    fn nested_container_slot_holds_reference() {
        let mut list = ListState::default();
        let create = op(
            4,
            0,
            0,
            OpContent::CreateContainer {
                slot: Slot::After(None),
                kind: ContainerType::Text,
            },
        );
        assert!(list.can_apply(&create));
        list.apply_op(&create);
        assert_eq!(
            list.get(0),
            Some(&Value::Container(ContainerId::new_normal(
                OpId::new(4, 0),
                ContainerType::Text
            )))
        );
    }

    #[test]
    fn missing_anchor_is_not_applicable() {
        let list = ListState::default();
        let orphan = op(1, 0, 0, insert(Some(OpId::new(9, 9)), vec![1.into()]));
        assert!(!list.can_apply(&orphan));
    }
}
