//! The replicated document: oplog, containers, pending buffer and listeners.
//!
//! # Example
//!
//! ```
//! use crdt_doc::Document;
//!
//! let mut alice = Document::builder().peer_id(1).build();
//! let mut bob = Document::builder().peer_id(2).build();
//!
//! alice.get_text("doc").insert(0, "Hello").unwrap();
//! bob.import(&alice.export_from(None).unwrap()).unwrap();
//!
//! bob.get_text("doc").insert(5, " World").unwrap();
//! alice.import(&bob.export_from(Some(alice.version())).unwrap()).unwrap();
//!
//! assert_eq!(alice.get_text("doc").to_string(), "Hello World");
//! assert_eq!(alice.version(), bob.version());
//! ```

use std::collections::{BTreeSet, VecDeque};

use tracing::{debug, trace, warn};

use crate::clock::Clock;
use crate::container::{ContainerRegistry, ContainerState};
use crate::crdt::{Crdt, OpCrdt};
use crate::encoding::{BatchKind, EncodedBatch};
use crate::error::{DocError, Result};
use crate::events::{DocEvent, EventOrigin, SubscriptionId, Subscribers};
use crate::handler::{ListHandle, MapHandle, TextHandle};
use crate::id::{ContainerId, ContainerType, OpId, PeerId};
use crate::op::{OpContent, Operation};
use crate::oplog::OpLog;
use crate::pending::PendingBuffer;
use crate::version::{Frontiers, VersionVector};

/// Pending-buffer size above which `import` logs a warning.
const DEFAULT_PENDING_WARN_THRESHOLD: usize = 1024;

/// Configuration for a [`Document`].
#[derive(Debug, Clone)]
pub struct DocConfig {
    /// Fixed peer id. `None` draws a random one.
    pub peer: Option<PeerId>,
    /// Whether local operations record wall-clock time. When off they carry 0.
    pub record_timestamps: bool,
    /// Physical time source in milliseconds. `None` reads `SystemTime`.
    pub time_source: Option<fn() -> u64>,
    /// Warn once the pending buffer grows past this many operations.
    pub pending_warn_threshold: usize,
}

impl Default for DocConfig {
    fn default() -> Self {
        Self {
            peer: None,
            record_timestamps: true,
            time_source: None,
            pending_warn_threshold: DEFAULT_PENDING_WARN_THRESHOLD,
        }
    }
}

/// Builder for a [`Document`] with custom configuration.
#[derive(Debug, Clone, Default)]
pub struct DocBuilder {
    config: DocConfig,
}

impl DocBuilder {
    /// Use a fixed peer id instead of a random one.
    pub fn peer_id(mut self, peer: PeerId) -> Self {
        self.config.peer = Some(peer);
        self
    }

    /// Turn wall-clock timestamps on local operations on or off.
    pub fn record_timestamps(mut self, record: bool) -> Self {
        self.config.record_timestamps = record;
        self
    }

    /// Read physical time from `time_fn` (milliseconds).
    pub fn time_source(mut self, time_fn: fn() -> u64) -> Self {
        self.config.time_source = Some(time_fn);
        self
    }

    /// Set the pending-buffer warning threshold.
    pub fn pending_warn_threshold(mut self, threshold: usize) -> Self {
        self.config.pending_warn_threshold = threshold;
        self
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: DocConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the document.
    pub fn build(self) -> Document {
        Document::with_config(self.config)
    }
}

/// Outcome of one [`Document::import`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportStatus {
    /// Operations applied, including ones released from the pending buffer.
    pub applied: usize,
    /// Operations parked by this call that are still waiting afterwards.
    pub buffered: usize,
    /// Operations that were already known or already parked.
    pub skipped: usize,
    /// Causally ready operations dropped because their Lamport does not
    /// exceed the Lamport of an operation they depend on.
    pub rejected: usize,
}

enum Integration {
    Applied { peer: PeerId, end: u32 },
    Buffered(OpId),
    Skipped,
    Rejected,
}

/// A replica of a structured document.
///
/// All mutation goes through `&mut self`, so an edit or an import is
/// always a critical section. `Document` is `Send`; share it across
/// threads behind a `Mutex`.
#[derive(Debug)]
pub struct Document {
    peer: PeerId,
    config: DocConfig,
    oplog: OpLog,
    registry: ContainerRegistry,
    pending: PendingBuffer,
    subscribers: Subscribers,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document with a random peer id.
    pub fn new() -> Self {
        Self::with_config(DocConfig::default())
    }

    /// Create an empty document with the given configuration.
    pub fn with_config(config: DocConfig) -> Self {
        let peer = config.peer.unwrap_or_else(rand::random::<PeerId>);
        let clock = match config.time_source {
            Some(time_fn) => Clock::with_time_source(time_fn),
            None => Clock::new(),
        };
        Self {
            peer,
            config,
            oplog: OpLog::with_clock(clock),
            registry: ContainerRegistry::new(),
            pending: PendingBuffer::new(),
            subscribers: Subscribers::default(),
        }
    }

    /// Start building a document with custom configuration.
    pub fn builder() -> DocBuilder {
        DocBuilder::default()
    }

    /// This replica's peer id.
    pub fn peer_id(&self) -> PeerId {
        self.peer
    }

    /// The configuration the document was built with.
    pub fn config(&self) -> &DocConfig {
        &self.config
    }

    /// Everything this replica has applied.
    pub fn version(&self) -> &VersionVector {
        self.oplog.version()
    }

    /// Operations no other applied operation depends on.
    pub fn frontiers(&self) -> &Frontiers {
        self.oplog.frontiers()
    }

    /// The operation log.
    pub fn oplog(&self) -> &OpLog {
        &self.oplog
    }

    /// Number of operations in the log.
    pub fn oplog_len(&self) -> usize {
        self.oplog.len_ops()
    }

    /// Number of operations waiting for their causal past.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Atoms the pending operations are waiting on.
    pub fn pending_missing(&self) -> Vec<OpId> {
        self.pending.missing()
    }

    /// Handle to the root list `name`.
    pub fn get_list(&mut self, name: &str) -> ListHandle<'_> {
        ListHandle::new(self, ContainerId::new_root(name, ContainerType::List))
    }

    /// Handle to the root map `name`.
    pub fn get_map(&mut self, name: &str) -> MapHandle<'_> {
        MapHandle::new(self, ContainerId::new_root(name, ContainerType::Map))
    }

    /// Handle to the root text `name`.
    pub fn get_text(&mut self, name: &str) -> TextHandle<'_> {
        TextHandle::new(self, ContainerId::new_root(name, ContainerType::Text))
    }

    /// Handle to any list, usually one found through a container reference.
    pub fn list(&mut self, id: &ContainerId) -> Result<ListHandle<'_>> {
        self.check_container(id, ContainerType::List)?;
        Ok(ListHandle::new(self, id.clone()))
    }

    /// Handle to any map.
    pub fn map(&mut self, id: &ContainerId) -> Result<MapHandle<'_>> {
        self.check_container(id, ContainerType::Map)?;
        Ok(MapHandle::new(self, id.clone()))
    }

    /// Handle to any text.
    pub fn text(&mut self, id: &ContainerId) -> Result<TextHandle<'_>> {
        self.check_container(id, ContainerType::Text)?;
        Ok(TextHandle::new(self, id.clone()))
    }

    fn check_container(&self, id: &ContainerId, expected: ContainerType) -> Result<()> {
        if id.kind() != expected {
            return Err(DocError::WrongContainerKind {
                expected,
                found: id.kind(),
            });
        }
        if !self.registry.is_resolvable(id) {
            return Err(DocError::UnknownContainer(id.clone()));
        }
        Ok(())
    }

    /// Current state of a container; `None` for a root nobody has written to.
    pub(crate) fn state(&self, id: &ContainerId) -> Option<&ContainerState> {
        self.registry.get(id)
    }

    pub(crate) fn registry(&self) -> &ContainerRegistry {
        &self.registry
    }

    /// Register a listener called after every change.
    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&DocEvent) + Send + 'static,
    {
        self.subscribers.subscribe(Box::new(listener))
    }

    /// Remove a listener. Returns `false` if it was already gone.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    /// Create a local operation on `container`, apply it and notify listeners.
    ///
    /// Callers check bounds beforehand; nothing is mutated on error.
    pub(crate) fn apply_local(&mut self, container: &ContainerId, content: OpContent) -> Result<OpId> {
        if content.carries_container_value() {
            return Err(DocError::ContainerValue);
        }
        let op = Operation {
            id: self.oplog.next_id(self.peer),
            lamport: self.oplog.next_lamport(),
            deps: self.oplog.frontiers().as_slice().to_vec(),
            container: container.clone(),
            timestamp: if self.config.record_timestamps {
                self.oplog.now()
            } else {
                0
            },
            content,
        };
        op.validate()?;

        let from = self.version().clone();
        let state = self.registry.resolve_mut(container)?;
        state.apply_op(&op);
        if let Some(child) = op.created_container() {
            self.registry.register(child);
        }

        let id = op.id;
        trace!(%id, container = %container, "local op");
        self.oplog.append(op)?;
        self.notify(EventOrigin::Local, vec![container.clone()], from);
        Ok(id)
    }

    /// Apply a batch produced by [`export_from`](Self::export_from).
    ///
    /// The whole batch is decoded and validated first; a malformed batch
    /// returns [`DocError::Decode`] and leaves the document untouched.
    /// Operations whose causal past is missing are parked and applied as
    /// soon as it arrives. Re-importing known operations is a no-op. An
    /// operation whose Lamport is not above its dependencies' is dropped and
    /// counted in [`ImportStatus::rejected`].
    pub fn import(&mut self, bytes: &[u8]) -> Result<ImportStatus> {
        let batch = EncodedBatch::from_bytes(bytes)?;
        debug!(kind = ?batch.kind, ops = batch.ops.len(), "importing batch");

        let from = self.version().clone();
        let pending_before = self.pending.len();
        let mut status = ImportStatus::default();
        let mut touched = BTreeSet::new();
        let mut parked = Vec::new();

        let mut queue: VecDeque<Operation> = batch.ops.into();
        while let Some(op) = queue.pop_front() {
            match self.integrate(op, &mut touched)? {
                Integration::Applied { peer, end } => {
                    status.applied += 1;
                    queue.extend(self.pending.take_ready(peer, end));
                }
                Integration::Buffered(id) => parked.push(id),
                Integration::Skipped => status.skipped += 1,
                Integration::Rejected => status.rejected += 1,
            }
        }

        parked.sort_unstable();
        parked.dedup();
        status.buffered = parked
            .into_iter()
            .filter(|id| self.pending.contains(*id))
            .count();

        let threshold = self.config.pending_warn_threshold;
        let pending = self.pending.len();
        if pending > threshold && pending_before <= threshold {
            warn!(pending, threshold, "pending buffer grew past threshold");
        }

        debug!(
            applied = status.applied,
            buffered = status.buffered,
            skipped = status.skipped,
            rejected = status.rejected,
            pending,
            "import done"
        );
        if status.applied > 0 {
            self.notify(EventOrigin::Import, touched.into_iter().collect(), from);
        }
        Ok(status)
    }

    fn integrate(&mut self, op: Operation, touched: &mut BTreeSet<ContainerId>) -> Result<Integration> {
        let next = self.oplog.version().next_counter(op.id.peer);
        if op.end_counter() <= next {
            trace!(id = %op.id, "skipping known op");
            return Ok(Integration::Skipped);
        }
        let op = if op.id.counter < next {
            op.slice_from(next)
        } else {
            op
        };

        let missing = op.dependencies().find(|dep| !self.oplog.contains(*dep));
        if let Some(missing) = missing {
            return Ok(self.park(missing, op));
        }

        let stale = op
            .dependencies()
            .find(|dep| self.oplog.lamport_of(*dep).map_or(false, |lp| lp >= op.lamport));
        if let Some(dep) = stale {
            warn!(id = %op.id, lamport = op.lamport, %dep, "operation is not newer than its dependency");
            return Ok(Integration::Rejected);
        }

        let state = match self.registry.resolve_mut(&op.container) {
            Ok(state) => state,
            Err(_) => {
                warn!(id = %op.id, container = %op.container, "operation targets an unknown container");
                let key = op.container.creation_id().unwrap_or(op.id);
                return Ok(self.park(key, op));
            }
        };
        if state.can_apply(&op) {
            state.apply_op(&op);
        } else {
            warn!(id = %op.id, container = %op.container, "operation has no effect on its container");
        }
        if let Some(child) = op.created_container() {
            self.registry.register(child);
        }

        trace!(id = %op.id, container = %op.container, "applied op");
        touched.insert(op.container.clone());
        let (peer, end) = (op.id.peer, op.end_counter());
        self.oplog.append(op)?;
        Ok(Integration::Applied { peer, end })
    }

    fn park(&mut self, missing: OpId, op: Operation) -> Integration {
        let id = op.id;
        if self.pending.push(missing, op) {
            trace!(%id, %missing, "buffered op");
            Integration::Buffered(id)
        } else {
            Integration::Skipped
        }
    }

    fn notify(&mut self, origin: EventOrigin, containers: Vec<ContainerId>, from: VersionVector) {
        if self.subscribers.is_empty() {
            return;
        }
        let event = DocEvent {
            origin,
            containers,
            from,
            to: self.version().clone(),
        };
        self.subscribers.emit(&event);
    }

    /// Encode the operations missing from `since`, or the whole history
    /// when `since` is `None`.
    pub fn export_from(&self, since: Option<&VersionVector>) -> Result<Vec<u8>> {
        let (kind, ops) = match since {
            Some(vv) => (BatchKind::Updates, self.oplog.diff_since(vv)),
            None => (BatchKind::Snapshot, self.oplog.iter_causal().collect()),
        };
        debug!(?kind, ops = ops.len(), "exporting batch");
        EncodedBatch::new(kind, ops).to_bytes()
    }

    /// Encode the whole history.
    pub fn export_snapshot(&self) -> Result<Vec<u8>> {
        self.export_from(None)
    }

    /// A new replica with a fresh peer id and this document's full history.
    pub fn fork(&self) -> Result<Self> {
        let mut config = self.config.clone();
        config.peer = None;
        let mut forked = Self::with_config(config);
        forked.import(&self.export_snapshot()?)?;
        Ok(forked)
    }
}

impl Crdt for Document {
    fn merge(&mut self, other: &Self) {
        let imported = other
            .export_from(Some(self.version()))
            .and_then(|bytes| self.import(&bytes));
        if let Err(err) = imported {
            warn!(%err, "merge failed");
        }
    }
}
