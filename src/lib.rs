//! # crdt-doc
//!
//! A replicated structured-data engine for local-first applications.
//!
//! Every replica ("peer") holds a [`Document`]: a tree of nested mutable
//! containers (lists, maps and collaborative text). Peers edit offline,
//! exchange deltas in any order, any number of times, and converge to the
//! same state without coordination.
//!
//! ## Quick Start
//!
//! ```
//! use crdt_doc::prelude::*;
//!
//! let mut a = Document::builder().peer_id(1).build();
//! let mut b = Document::builder().peer_id(2).build();
//!
//! a.get_list("todo").push("milk").unwrap();
//! b.get_list("todo").push("eggs").unwrap();
//!
//! // Exchange only what the other side is missing.
//! let to_b = a.export_from(Some(b.version())).unwrap();
//! let to_a = b.export_from(Some(a.version())).unwrap();
//! b.import(&to_b).unwrap();
//! a.import(&to_a).unwrap();
//!
//! assert_eq!(a.get_deep_value(), b.get_deep_value());
//! assert_eq!(a.get_list("todo").len(), 2);
//! ```
//!
//! ## How it works
//!
//! - Every edit becomes an [`Operation`] identified by an [`OpId`]
//!   `(peer, counter)` and stamped with a Lamport timestamp and the
//!   [`Frontiers`] it was made on.
//! - The [`OpLog`](oplog::OpLog) stores each peer's operations contiguously;
//!   its [`VersionVector`] summarizes what is known.
//! - [`Document::import`] applies an operation only after its causal past.
//!   Anything early waits in a pending buffer.
//! - Lists and text are RGA sequences; maps are last-writer-wins per key.
//!   Concurrent edits are ordered by `(lamport, peer)`.
//!
//! ## The `Crdt` Trait
//!
//! [`Document`] implements [`Crdt`], so two in-process replicas can be
//! merged directly. Merge is commutative, associative, and idempotent.

#![warn(missing_docs)]

mod container;
mod crdt;
mod doc;
mod error;
mod handler;
mod id;
mod materialize;
mod op;
mod value;
mod version;

pub mod clock;
pub mod encoding;
pub mod events;
pub mod oplog;
pub mod pending;
pub mod prelude;

pub use container::{ContainerRegistry, ContainerState, ListState, MapState, TextState};
pub use crdt::{Crdt, OpCrdt};
pub use doc::{DocBuilder, DocConfig, Document, ImportStatus};
pub use error::{DecodeError, DocError, Result};
pub use handler::{ListHandle, MapHandle, TextHandle};
pub use id::{ContainerId, ContainerType, Counter, OpId, PeerId};
pub use op::{InsertContent, OpContent, Operation, Slot};
pub use value::Value;
pub use version::{Frontiers, IdSpan, VersionVector};
