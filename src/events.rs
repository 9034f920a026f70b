//! Change notifications.
//!
//! A [`Document`](crate::Document) keeps an explicit list of listeners and
//! invokes them synchronously, in subscription order, after every local
//! edit and after every import batch that applied at least one operation.
//!
//! # Example
//!
//! ```
//! use std::sync::{Arc, Mutex};
//! use crdt_doc::{Document, events::EventOrigin};
//!
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let sink = Arc::clone(&seen);
//!
//! let mut doc = Document::new();
//! let sub = doc.subscribe(move |event| sink.lock().unwrap().push(event.origin));
//!
//! doc.get_text("notes").insert(0, "hi").unwrap();
//! assert_eq!(*seen.lock().unwrap(), vec![EventOrigin::Local]);
//!
//! assert!(doc.unsubscribe(sub));
//! doc.get_text("notes").insert(2, "!").unwrap();
//! assert_eq!(seen.lock().unwrap().len(), 1);
//! ```

use core::fmt;

use crate::id::ContainerId;
use crate::version::VersionVector;

/// What caused a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventOrigin {
    /// An edit made through a handle on this document.
    Local,
    /// Operations applied by [`Document::import`](crate::Document::import).
    Import,
}

/// Notification delivered to listeners.
#[derive(Debug, Clone, PartialEq)]
pub struct DocEvent {
    /// What caused the change.
    pub origin: EventOrigin,
    /// Containers touched, sorted and deduplicated.
    pub containers: Vec<ContainerId>,
    /// Version before the change.
    pub from: VersionVector,
    /// Version after the change.
    pub to: VersionVector,
}

/// Handle returned by [`Document::subscribe`](crate::Document::subscribe).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&DocEvent) + Send>;

/// Ordered listener registry.
#[derive(Default)]
pub(crate) struct Subscribers {
    next_id: u64,
    listeners: Vec<(SubscriptionId, Listener)>,
}

impl Subscribers {
    pub(crate) fn subscribe(&mut self, listener: Listener) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, listener));
        id
    }

    pub(crate) fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(sub, _)| *sub != id);
        self.listeners.len() != before
    }

    pub(crate) fn emit(&mut self, event: &DocEvent) {
        for (_, listener) in &mut self.listeners {
            listener(event);
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl fmt::Debug for Subscribers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscribers")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn event() -> DocEvent {
        DocEvent {
            origin: EventOrigin::Import,
            containers: vec![],
            from: VersionVector::new(),
            to: VersionVector::new(),
        }
    }

    #[test]
    fn listeners_run_in_subscription_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut subs = Subscribers::default();
        for tag in ["first", "second"] {
            let log = Arc::clone(&log);
            subs.subscribe(Box::new(move |_| log.lock().unwrap().push(tag)));
        }
        subs.emit(&event());
        assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn unsubscribe_is_exact() {
        let mut subs = Subscribers::default();
        let a = subs.subscribe(Box::new(|_| {}));
        let b = subs.subscribe(Box::new(|_| {}));
        assert_ne!(a, b);
        assert!(subs.unsubscribe(a));
        assert!(!subs.unsubscribe(a));
        assert!(!subs.is_empty());
        assert!(subs.unsubscribe(b));
        assert!(subs.is_empty());
    }
}
