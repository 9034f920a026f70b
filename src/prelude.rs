//! Convenient re-exports for common usage.
//!
//! ```
//! use crdt_doc::prelude::*;
//! ```

pub use crate::Crdt;
pub use crate::ContainerId;
pub use crate::ContainerType;
pub use crate::DocError;
pub use crate::Document;
pub use crate::Value;
pub use crate::VersionVector;
