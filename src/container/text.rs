use core::fmt;

use crate::crdt::OpCrdt;
use crate::id::OpId;
use crate::op::{InsertContent, OpContent, Operation};

use super::sequence::Sequence;

/// State of a text container: an RGA over Unicode scalar values.
///
/// Indices are in chars. An inserted string is one operation whose chars
/// occupy consecutive counters, each anchored right after the previous
/// one, so a run typed on one replica stays contiguous when merged.
#[derive(Debug, Clone, Default)]
pub struct TextState {
    seq: Sequence<char>,
}

impl TextState {
    /// Number of visible chars.
    #[must_use]
    pub fn len_unicode(&self) -> usize {
        self.seq.len()
    }

    /// Length of the visible text in UTF-8 bytes.
    #[must_use]
    pub fn len_utf8(&self) -> usize {
        self.seq.iter().map(|c| c.len_utf8()).sum()
    }

    /// Length of the visible text in UTF-16 code units.
    #[must_use]
    pub fn len_utf16(&self) -> usize {
        self.seq.iter().map(|c| c.len_utf16()).sum()
    }

    /// Whether the visible text is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seq.len() == 0
    }

    /// Char at visible `index`.
    #[must_use]
    pub fn char_at(&self, index: usize) -> Option<char> {
        self.seq.get(index).copied()
    }

    pub(crate) fn anchor_for(&self, index: usize) -> Option<OpId> {
        self.seq.anchor_for(index)
    }

    pub(crate) fn ids_in_range(&self, index: usize, count: usize) -> Vec<OpId> {
        self.seq.ids_in_range(index, count)
    }
}

impl fmt::Display for TextState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for ch in self.seq.iter() {
            write!(f, "{ch}")?;
        }
        Ok(())
    }
}

impl OpCrdt for TextState {
    fn can_apply(&self, op: &Operation) -> bool {
        match &op.content {
            OpContent::Insert { after, .. } => self.seq.has_anchor(*after),
            OpContent::Delete { .. } => true,
            _ => false,
        }
    }

    fn apply_op(&mut self, op: &Operation) {
        match &op.content {
            OpContent::Insert {
                after,
                content: InsertContent::Text(text),
            } => {
                self.seq.integrate_run(op.id, op.id_lp(), *after, text.chars());
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
