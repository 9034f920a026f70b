//! Binary batch format exchanged by `export_from` and `import`.
//!
//! ```text
//! [MAGIC: 0xCD][FORMAT_VERSION: u8][BATCH_KIND: u8][PAYLOAD: postcard Vec<Operation>]
//! ```
//!
//! The payload carries every operation's id, Lamport, dependencies, target
//! container, timestamp and content, so a batch can be replayed by any
//! process that shares this format. Decoding validates the whole batch
//! before handing back a single operation.

use serde::{Deserialize, Serialize};

use crate::error::{DecodeError, DocError};
use crate::op::Operation;

/// Magic byte identifying an encoded operation batch.
pub const MAGIC_BYTE: u8 = 0xCD;

/// Current batch format revision.
pub const FORMAT_VERSION: u8 = 1;

/// Size of the batch header in bytes.
pub const HEADER_SIZE: usize = 3;

/// What a batch was exported as. Both kinds import the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum BatchKind {
    /// Operations missing from a given version.
    Updates = 1,
    /// The complete history.
    Snapshot = 2,
}

impl BatchKind {
    /// Convert from a raw byte.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Updates),
            2 => Some(Self::Snapshot),
            _ => None,
        }
    }
}

/// A decoded (or about to be encoded) batch of operations.
///
/// # Example
///
/// ```
/// use crdt_doc::encoding::{BatchKind, EncodedBatch};
///
/// let batch = EncodedBatch::new(BatchKind::Updates, vec![]);
/// let bytes = batch.to_bytes().unwrap();
/// let decoded = EncodedBatch::from_bytes(&bytes).unwrap();
/// assert_eq!(decoded, batch);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedBatch {
    /// How the batch was produced.
    pub kind: BatchKind,
    /// Operations in causal order.
    pub ops: Vec<Operation>,
}

impl EncodedBatch {
    /// Create a batch.
    pub fn new(kind: BatchKind, ops: Vec<Operation>) -> Self {
        Self { kind, ops }
    }

    /// Serialize header and payload.
    pub fn to_bytes(&self) -> Result<Vec<u8>, DocError> {
        let header = vec![MAGIC_BYTE, FORMAT_VERSION, self.kind as u8];
        postcard::to_extend(&self.ops, header).map_err(|e| DocError::Encode(e.to_string()))
    }

    /// Parse and validate a batch. Nothing is returned unless every
    /// operation in it is structurally sound.
    pub fn from_bytes(data: &[u8]) -> Result<Self, DecodeError> {
        if data.len() < HEADER_SIZE {
            return Err(DecodeError::TooShort);
        }
        if data[0] != MAGIC_BYTE {
            return Err(DecodeError::InvalidMagic(data[0]));
        }
        if data[1] == 0 || data[1] > FORMAT_VERSION {
            return Err(DecodeError::UnsupportedVersion(data[1]));
        }
        let kind = BatchKind::from_byte(data[2]).ok_or(DecodeError::UnknownBatchKind(data[2]))?;

        let (ops, rest): (Vec<Operation>, _) = postcard::take_from_bytes(&data[HEADER_SIZE..])
            .map_err(|e| DecodeError::Payload(e.to_string()))?;
        if !rest.is_empty() {
            return Err(DecodeError::TrailingBytes(rest.len()));
        }

        for op in &ops {
            op.validate()?;
        }

        Ok(Self { kind, ops })
    }

    /// Check if bytes start like a batch (magic byte present).
    pub fn is_batch(data: &[u8]) -> bool {
        data.first() == Some(&MAGIC_BYTE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{ContainerId, ContainerType, OpId};
    use crate::op::{InsertContent, OpContent, Slot};
    use crate::value::Value;

    fn sample_ops() -> Vec<Operation> {
        let list = ContainerId::new_root("list", ContainerType::List);
        vec![
            Operation {
                id: OpId::new(7, 0),
                lamport: 0,
                deps: vec![],
                container: list.clone(),
                timestamp: 1_700_000_000_000,
                content: OpContent::Insert {
                    after: None,
                    content: InsertContent::Values(vec![Value::from("A"), Value::from(2.5)]),
                },
            },
            Operation {
                id: OpId::new(7, 2),
                lamport: 2,
                deps: vec![],
                container: list,
                timestamp: 1_700_000_000_001,
                content: OpContent::CreateContainer {
                    slot: Slot::After(Some(OpId::new(7, 1))),
                    kind: ContainerType::Map,
                },
            },
        ]
    }

    #[test]
    fn roundtrip_preserves_every_field() {
        let batch = EncodedBatch::new(BatchKind::Snapshot, sample_ops());
        let bytes = batch.to_bytes().unwrap();
        assert!(EncodedBatch::is_batch(&bytes));
        assert_eq!(EncodedBatch::from_bytes(&bytes).unwrap(), batch);
    }

    #[test]
    fn header_errors() {
        assert_eq!(EncodedBatch::from_bytes(&[MAGIC_BYTE]), Err(DecodeError::TooShort));
        assert_eq!(
            EncodedBatch::from_bytes(&[0xAB, 1, 1, 0]),
            Err(DecodeError::InvalidMagic(0xAB))
        );
        assert_eq!(
            EncodedBatch::from_bytes(&[MAGIC_BYTE, 9, 1, 0]),
            Err(DecodeError::UnsupportedVersion(9))
        );
        assert_eq!(
            EncodedBatch::from_bytes(&[MAGIC_BYTE, 1, 77, 0]),
            Err(DecodeError::UnknownBatchKind(77))
        );
    }

    #[test]
    fn truncated_payload_is_rejected() {
        let bytes = EncodedBatch::new(BatchKind::Updates, sample_ops())
            .to_bytes()
            .unwrap();
        for cut in HEADER_SIZE..bytes.len() {
            assert!(
                EncodedBatch::from_bytes(&bytes[..cut]).is_err(),
                "truncation at {cut} was accepted"
            );
        }
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut bytes = EncodedBatch::new(BatchKind::Updates, sample_ops())
            .to_bytes()
            .unwrap();
        bytes.push(0);
        assert_eq!(EncodedBatch::from_bytes(&bytes), Err(DecodeError::TrailingBytes(1)));
    }

    #[test]
    fn structurally_invalid_op_is_rejected() {
        let mut ops = sample_ops();
        ops[1].container = ContainerId::new_root("text", ContainerType::Text);
        let bytes = EncodedBatch::new(BatchKind::Updates, ops).to_bytes().unwrap();
        assert!(matches!(
            EncodedBatch::from_bytes(&bytes),
            Err(DecodeError::InvalidOp { .. })
        ));
    }
}
