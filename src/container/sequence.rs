use std::collections::HashMap;

use crate::clock::IdLp;
use crate::id::{Counter, OpId};

/// Replicated Growable Array core shared by lists and text.
///
/// Every element is identified by the id of the atom that inserted it and
/// remembers its *parent*: the element it was inserted right after (`None`
/// for the head). The elements form a tree; the document order is a
/// depth-first walk where siblings are visited by *descending* `IdLp`, so
/// the newest concurrent insert at a position comes first. Because the
/// walk depends only on the set of elements, every replica holding the
/// same elements computes the same order, whatever the arrival sequence.
///
/// Deleted elements stay in the tree as tombstones so later inserts
/// anchored to them keep a well-defined position.
#[derive(Debug, Clone)]
pub(crate) struct Sequence<T> {
    nodes: HashMap<OpId, Node<T>>,
    /// Children of each parent, sorted by descending key.
    children: HashMap<Option<OpId>, Vec<OpId>>,
    /// Linearized tree including tombstones.
    order: Vec<OpId>,
    visible: usize,
}

#[derive(Debug, Clone)]
struct Node<T> {
    value: T,
    key: IdLp,
    deleted: bool,
}

impl<T> Default for Sequence<T> {
    fn default() -> Self {
        Self {
            nodes: HashMap::new(),
            children: HashMap::new(),
            order: Vec::new(),
            visible: 0,
        }
    }
}

impl<T> Sequence<T> {
    /// Number of visible elements.
    pub fn len(&self) -> usize {
        self.visible
    }

    /// Whether element `id` exists (visible or tombstoned).
    pub fn contains(&self, id: OpId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Whether `parent` is a valid anchor.
    pub fn has_anchor(&self, parent: Option<OpId>) -> bool {
        parent.map_or(true, |p| self.contains(p))
    }

    /// Integrate element `id` after `parent`. Re-integrating a known id is
    /// a no-op. The parent must already be present.
    pub fn integrate(&mut self, id: OpId, key: IdLp, parent: Option<OpId>, value: T) {
        self.integrate_run(id, key, parent, std::iter::once(value));
    }

    /// Integrate a run of elements: element `i` gets id `first + i` and
    /// key `(key.lamport + i, key.peer)`, and is anchored after element
    /// `i - 1` (the first after `parent`).
    ///
    /// A fresh element has no children yet, so the element following it in
    /// the run lands right behind it. The position is computed once and the
    /// run is spliced into the order in one go.
    pub fn integrate_run<I>(&mut self, first: OpId, key: IdLp, parent: Option<OpId>, values: I)
    where
        I: IntoIterator<Item = T>,
    {
        let mut parent = parent;
        let mut run = Vec::new();
        let mut start = 0;
        for (i, value) in values.into_iter().enumerate() {
            let i = i as Counter;
            let id = first.inc(i);
            if self.contains(id) {
                self.splice(start, &mut run);
                parent = Some(id);
                continue;
            }

            let key = IdLp::new(key.lamport + i, key.peer);
            if run.is_empty() {
                let (rank, pos) = self.slot_for(parent, key);
                start = pos;
                self.children.entry(parent).or_default().insert(rank, id);
            } else {
                self.children.insert(parent, vec![id]);
            }
            run.push(id);
            self.nodes.insert(
                id,
                Node {
                    value,
                    key,
                    deleted: false,
                },
            );
            self.visible += 1;
            parent = Some(id);
        }
        self.splice(start, &mut run);
    }

    /// Sibling rank and order position for a new child of `parent`.
    fn slot_for(&self, parent: Option<OpId>, key: IdLp) -> (usize, usize) {
        let siblings = self.children.get(&parent).map(Vec::as_slice).unwrap_or(&[]);
        let rank = siblings.partition_point(|s| self.nodes[s].key > key);

        // Right after the parent if we are the first child, otherwise after
        // the whole subtree of the sibling that precedes us.
        let pos = match rank.checked_sub(1).map(|i| siblings[i]) {
            None => parent.map_or(0, |p| self.position(p) + 1),
            Some(prev) => self.position(self.last_descendant(prev)) + 1,
        };
        (rank, pos)
    }

    fn splice(&mut self, at: usize, run: &mut Vec<OpId>) {
        if !run.is_empty() {
            self.order.splice(at..at, run.drain(..));
        }
    }

    /// Tombstone element `id`. Returns `true` if it was visible.
    pub fn delete(&mut self, id: OpId) -> bool {
        match self.nodes.get_mut(&id) {
            Some(node) if !node.deleted => {
                node.deleted = true;
                self.visible -= 1;
                true
            }
            _ => false,
        }
    }

    /// Id of the visible element at `index`.
    pub fn id_at(&self, index: usize) -> Option<OpId> {
        self.visible_ids().nth(index)
    }

    /// Ids of `count` visible elements starting at `index`.
    pub fn ids_in_range(&self, index: usize, count: usize) -> Vec<OpId> {
        self.visible_ids().skip(index).take(count).collect()
    }

    /// Anchor for an insert at visible `index`: the visible element to its left.
    pub fn anchor_for(&self, index: usize) -> Option<OpId> {
        index.checked_sub(1).and_then(|i| self.id_at(i))
    }

    /// Value of the visible element at `index`.
    pub fn get(&self, index: usize) -> Option<&T> {
        self.id_at(index).map(|id| &self.nodes[&id].value)
    }

    /// Visible values in document order.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.order.iter().filter_map(move |id| {
            let node = &self.nodes[id];
            (!node.deleted).then_some(&node.value)
        })
    }

    fn visible_ids(&self) -> impl Iterator<Item = OpId> + '_ {
        self.order
            .iter()
            .copied()
            .filter(move |id| !self.nodes[id].deleted)
    }

    fn position(&self, id: OpId) -> usize {
        self.order
            .iter()
            .position(|x| *x == id)
            .unwrap_or(self.order.len())
    }

    fn last_descendant(&self, mut id: OpId) -> OpId {
        while let Some(&last) = self.children.get(&Some(id)).and_then(|c| c.last()) {
            id = last;
        }
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(peer: u64, counter: u32) -> OpId {
        OpId::new(peer, counter)
    }

    fn key(lamport: u32, peer: u64) -> IdLp {
        IdLp::new(lamport, peer)
    }

    fn values(seq: &Sequence<char>) -> String {
        seq.iter().collect()
    }

    #[test]
    fn sequential_appends() {
        let mut seq = Sequence::default();
        seq.integrate(id(1, 0), key(0, 1), None, 'a');
        seq.integrate(id(1, 1), key(1, 1), Some(id(1, 0)), 'b');
        seq.integrate(id(1, 2), key(2, 1), Some(id(1, 1)), 'c');
        assert_eq!(values(&seq), "abc");
        assert_eq!(seq.len(), 3);
        assert_eq!(seq.anchor_for(3), Some(id(1, 2)));
        assert_eq!(seq.anchor_for(0), None);
    }

    #[test]
    fn newer_sibling_goes_first() {
        let mut seq = Sequence::default();
        seq.integrate(id(1, 0), key(0, 1), None, 'a');
        seq.integrate(id(1, 1), key(1, 1), Some(id(1, 0)), 'c');
        // Inserted later between 'a' and 'c'.
        seq.integrate(id(1, 2), key(2, 1), Some(id(1, 0)), 'b');
        assert_eq!(values(&seq), "abc");
    }

    #[test]
    fn concurrent_inserts_converge_in_any_order() {
        let ops = [
            (id(1, 0), key(0, 1), None, 'x'),
            (id(2, 0), key(1, 2), Some(id(1, 0)), 'A'),
            (id(2, 1), key(2, 2), Some(id(2, 0)), 'B'),
            (id(3, 0), key(1, 3), Some(id(1, 0)), 'C'),
            (id(3, 1), key(2, 3), Some(id(3, 0)), 'D'),
        ];

        let mut forward = Sequence::default();
        for (i, k, p, v) in ops {
            forward.integrate(i, k, p, v);
        }

        // Same ops, causal but different interleaving.
        let mut shuffled = Sequence::default();
        for idx in [0, 3, 1, 4, 2] {
            let (i, k, p, v) = ops[idx];
            shuffled.integrate(i, k, p, v);
        }

        assert_eq!(values(&forward), values(&shuffled));
        // Peer 3's run has the larger key and keeps its chars together.
        assert_eq!(values(&forward), "xCDAB");
    }

    #[test]
    fn tombstones_keep_anchor_positions() {
        let mut seq = Sequence::default();
        seq.integrate(id(1, 0), key(0, 1), None, 'a');
        seq.integrate(id(1, 1), key(1, 1), Some(id(1, 0)), 'b');
        seq.integrate(id(1, 2), key(2, 1), Some(id(1, 1)), 'c');

        assert!(seq.delete(id(1, 1)));
        assert!(!seq.delete(id(1, 1)));
        assert_eq!(values(&seq), "ac");

        // A concurrent insert anchored to the deleted 'b'.
        seq.integrate(id(2, 0), key(2, 2), Some(id(1, 1)), 'X');
        assert_eq!(values(&seq), "aXc");
        assert_eq!(seq.len(), 3);
    }

    #[test]
    fn run_matches_atom_by_atom_integration() {
        let mut by_atom = Sequence::default();
        let mut by_run = Sequence::default();
        for seq in [&mut by_atom, &mut by_run] {
            seq.integrate(id(1, 0), key(0, 1), None, 'a');
            seq.integrate(id(1, 1), key(1, 1), Some(id(1, 0)), 'z');
            seq.integrate(id(3, 0), key(1, 3), Some(id(1, 0)), 'Q');
        }

        let mut parent = Some(id(1, 0));
        for (i, ch) in "XYZ".chars().enumerate() {
            let i = i as u32;
            by_atom.integrate(id(2, i), key(1 + i, 2), parent, ch);
            parent = Some(id(2, i));
        }
        by_run.integrate_run(id(2, 0), key(1, 2), Some(id(1, 0)), "XYZ".chars());

        assert_eq!(values(&by_run), values(&by_atom));
        assert_eq!(values(&by_run), "aQXYZz");

        // A later insert inside the run still finds its anchor.
        by_run.integrate(id(1, 2), key(5, 1), Some(id(2, 1)), '!');
        assert_eq!(values(&by_run), "aQXY!Zz");
    }

    #[test]
    fn run_skips_known_prefix() {
        let mut seq = Sequence::default();
        seq.integrate_run(id(1, 0), key(0, 1), None, "ab".chars());
        seq.integrate_run(id(1, 0), key(0, 1), None, "abcd".chars());
        assert_eq!(values(&seq), "abcd");
        assert_eq!(seq.len(), 4);
    }

    #[test]
    fn duplicate_integrate_is_ignored() {
        let mut seq = Sequence::default();
        seq.integrate(id(1, 0), key(0, 1), None, 'a');
        seq.integrate(id(1, 0), key(0, 1), None, 'a');
        assert_eq!(seq.len(), 1);
        assert_eq!(seq.ids_in_range(0, 5), vec![id(1, 0)]);
    }
}
