//! Logical and physical time attached to operations.
//!
//! Every operation carries a Lamport timestamp strictly greater than the
//! Lamport of everything it depends on, so ordering by `(lamport, peer)`
//! never contradicts causality. That pair is the single tie-break rule used
//! by every container: map writes with the larger key win, sequence siblings
//! with the larger key sort first.
//!
//! Operations also record a wall-clock timestamp (milliseconds). It is
//! informational only and never consulted for conflict resolution.
//!
//! # Example
//!
//! ```
//! use crdt_doc::clock::{Clock, IdLp};
//!
//! fn fixed() -> u64 { 1_000 }
//!
//! let mut clock = Clock::with_time_source(fixed);
//! assert_eq!(clock.next_lamport(), 0);
//!
//! // A remote op with lamport 5 spanning 3 atoms was applied.
//! clock.observe(5, 3, 900);
//! assert_eq!(clock.next_lamport(), 8);
//! assert_eq!(clock.now(), 1_000);
//!
//! assert!(IdLp::new(2, 1) > IdLp::new(1, 9));
//! ```

use core::cmp;

use serde::{Deserialize, Serialize};

use crate::id::{Counter, PeerId};

/// Lamport timestamp.
pub type Lamport = u32;

/// Conflict-resolution key: Lamport first, peer as tie-break.
///
/// Distinct atoms always have distinct keys because a peer never reuses a
/// Lamport value for two of its own atoms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdLp {
    /// Lamport timestamp of the atom.
    pub lamport: Lamport,
    /// Peer that created the atom.
    pub peer: PeerId,
}

impl IdLp {
    /// Create a key from its parts.
    pub const fn new(lamport: Lamport, peer: PeerId) -> Self {
        Self { lamport, peer }
    }
}

impl Ord for IdLp {
    fn cmp(&self, other: &Self) -> cmp::Ordering {
        self.lamport
            .cmp(&other.lamport)
            .then(self.peer.cmp(&other.peer))
    }
}

impl PartialOrd for IdLp {
    fn partial_cmp(&self, other: &Self) -> Option<cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Per-document clock: next Lamport value plus the latest wall-clock time seen.
#[derive(Debug, Clone)]
pub struct Clock {
    next_lamport: Lamport,
    latest_timestamp: u64,
    /// Physical time source in milliseconds.
    physical_time_fn: fn() -> u64,
}

fn system_time_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

impl Clock {
    /// Create a clock reading `SystemTime`.
    pub fn new() -> Self {
        Self::with_time_source(system_time_ms)
    }

    /// Create a clock with a custom physical time source.
    pub fn with_time_source(time_fn: fn() -> u64) -> Self {
        Self {
            next_lamport: 0,
            latest_timestamp: 0,
            physical_time_fn: time_fn,
        }
    }

    /// Lamport value the next local operation will take.
    pub fn next_lamport(&self) -> Lamport {
        self.next_lamport
    }

    /// Largest wall-clock timestamp recorded by any applied operation.
    pub fn latest_timestamp(&self) -> u64 {
        self.latest_timestamp
    }

    /// Timestamp for a local operation.
    ///
    /// Never goes below a timestamp already observed, even if the physical
    /// clock moved backwards.
    pub fn now(&self) -> u64 {
        cmp::max((self.physical_time_fn)(), self.latest_timestamp)
    }

    /// Account for an applied operation (local or remote) covering `len`
    /// Lamport values starting at `lamport`.
    pub fn observe(&mut self, lamport: Lamport, len: Counter, timestamp: u64) {
        self.next_lamport = cmp::max(self.next_lamport, lamport + len);
        self.latest_timestamp = cmp::max(self.latest_timestamp, timestamp);
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}
