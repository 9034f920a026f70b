use thiserror::Error;

use crate::id::{ContainerId, ContainerType, Counter, OpId};

/// Result alias used throughout the crate.
pub type Result<T, E = DocError> = core::result::Result<T, E>;

/// A malformed or truncated encoded batch.
///
/// Decoding is all-or-nothing: when any of these is returned, no operation
/// from the batch has touched the document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Data is too short to contain a batch header.
    #[error("data too short for batch header")]
    TooShort,
    /// Missing or incorrect magic byte.
    #[error("invalid magic byte: 0x{0:02X}")]
    InvalidMagic(u8),
    /// The batch was written by a newer format revision.
    #[error("unsupported batch format version {0}")]
    UnsupportedVersion(u8),
    /// Unknown batch kind byte.
    #[error("unknown batch kind {0}")]
    UnknownBatchKind(u8),
    /// The postcard payload could not be decoded.
    #[error("payload decode failed: {0}")]
    Payload(String),
    /// Bytes were left over after the payload.
    #[error("{0} trailing bytes after payload")]
    TrailingBytes(usize),
    /// An operation decoded fine but is structurally impossible.
    #[error("invalid operation {id}: {reason}")]
    InvalidOp {
        /// Id of the offending operation.
        id: OpId,
        /// What is wrong with it.
        reason: &'static str,
    },
}

/// Errors surfaced by [`Document`](crate::Document) and its handles.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocError {
    /// The encoded batch passed to `import` is malformed.
    #[error(transparent)]
    Decode(#[from] DecodeError),
    /// Serializing a batch failed.
    #[error("encode error: {0}")]
    Encode(String),
    /// No container is registered under this id.
    #[error("unknown container {0}")]
    UnknownContainer(ContainerId),
    /// A handle of one kind was requested for a container of another.
    #[error("expected a {expected} container, found {found}")]
    WrongContainerKind {
        /// Kind the caller asked for.
        expected: ContainerType,
        /// Kind the container actually has.
        found: ContainerType,
    },
    /// A position does not exist in the visible sequence.
    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBounds {
        /// Requested position (or end of the requested range).
        index: usize,
        /// Current visible length.
        len: usize,
    },
    /// An operation was appended whose counter does not continue its peer's history.
    #[error("operation {id} does not extend the log (next counter is {expected})")]
    OutOfOrderOp {
        /// Id of the rejected operation.
        id: OpId,
        /// The counter the log expected for that peer.
        expected: Counter,
    },
    /// A raw container reference was written as a plain value. Nested
    /// containers are created with `insert_container` or `set_container`.
    #[error("container references cannot be written as values")]
    ContainerValue,
    /// Frontiers name an operation this replica has not seen.
    #[error("frontiers include unknown operation {0}")]
    FrontiersNotIncluded(OpId),
    /// A string could not be parsed as a [`ContainerId`].
    #[error("invalid container id: {0:?}")]
    InvalidContainerId(String),
}
