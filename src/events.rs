//! # Event Bus
//!
//! In-process publish/subscribe with explicit subscriber lists per topic.
//!
//! Delivery is synchronous and in subscription order, on the caller's thread.
//! The bus is single-threaded (`Rc`-shared, not `Send`). A handler may hold a
//! clone of the bus and publish from inside a delivery; such events are queued
//! and delivered after the current event has reached all of its subscribers,
//! so every subscriber sees events in the same order.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::hash::Hash;
use std::rc::Rc;

use log::{debug, warn};
use serde::Serialize;

use crate::catalog::TrackId;
use crate::filter::DateWindow;
use crate::Bounds;

/// An event that can be routed by topic.
pub trait Topic {
    type Kind: Copy + Eq + Hash + std::fmt::Debug;

    fn kind(&self) -> Self::Kind;
}

/// Handle returned by [`EventBus::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler<E> = Rc<dyn Fn(&E)>;

struct Subscriber<E: Topic> {
    id: SubscriptionId,
    /// `None` subscribes to every topic
    kind: Option<<E as Topic>::Kind>,
    handler: Handler<E>,
}

/// Synchronous multi-subscriber event bus.
pub struct EventBus<E: Topic> {
    subscribers: RefCell<Vec<Subscriber<E>>>,
    queue: RefCell<VecDeque<E>>,
    dispatching: Cell<bool>,
    next_id: Cell<u64>,
}

impl<E: Topic> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Topic> EventBus<E> {
    pub fn new() -> Self {
        Self {
            subscribers: RefCell::new(Vec::new()),
            queue: RefCell::new(VecDeque::new()),
            dispatching: Cell::new(false),
            next_id: Cell::new(0),
        }
    }

    fn add(&self, kind: Option<E::Kind>, handler: Handler<E>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.subscribers.borrow_mut().push(Subscriber { id, kind, handler });
        id
    }

    /// Subscribe to one topic.
    pub fn subscribe<F>(&self, kind: E::Kind, handler: F) -> SubscriptionId
    where
        F: Fn(&E) + 'static,
    {
        self.add(Some(kind), Rc::new(handler))
    }

    /// Subscribe to every topic.
    pub fn subscribe_all<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&E) + 'static,
    {
        self.add(None, Rc::new(handler))
    }

    /// Remove a subscription. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.borrow_mut();
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        subscribers.len() != before
    }

    /// Number of subscribers that receive events of `kind`.
    pub fn subscriber_count(&self, kind: E::Kind) -> usize {
        self.subscribers
            .borrow()
            .iter()
            .filter(|s| s.kind.map_or(true, |k| k == kind))
            .count()
    }

    /// Deliver an event to its subscribers.
    ///
    /// Called from inside a handler, the event is queued behind the one being
    /// delivered. If a handler panics, events still queued are discarded and
    /// the bus stays usable for later publishes.
    pub fn publish(&self, event: E) {
        self.queue.borrow_mut().push_back(event);
        if self.dispatching.get() {
            return;
        }

        let _guard = Dispatching::enter(self);
        loop {
            let next = self.queue.borrow_mut().pop_front();
            let Some(event) = next else { break };
            self.deliver(&event);
        }
    }

    fn deliver(&self, event: &E) {
        let kind = event.kind();
        // Snapshot so handlers can subscribe/unsubscribe while we iterate
        let handlers: Vec<Handler<E>> = self
            .subscribers
            .borrow()
            .iter()
            .filter(|s| s.kind.map_or(true, |k| k == kind))
            .map(|s| Rc::clone(&s.handler))
            .collect();

        debug!("[EventBus] {:?} -> {} subscribers", kind, handlers.len());
        for handler in handlers {
            handler(event);
        }
    }
}

/// Marks a bus as dispatching until dropped, including on unwind.
struct Dispatching<'a, E: Topic> {
    bus: &'a EventBus<E>,
}

impl<'a, E: Topic> Dispatching<'a, E> {
    fn enter(bus: &'a EventBus<E>) -> Self {
        bus.dispatching.set(true);
        Self { bus }
    }
}

impl<E: Topic> Drop for Dispatching<'_, E> {
    fn drop(&mut self) {
        self.bus.dispatching.set(false);
        if std::thread::panicking() {
            let dropped = self.bus.queue.borrow_mut().drain(..).count();
            if dropped > 0 {
                warn!("[EventBus] Handler panicked, dropped {} queued events", dropped);
            }
        }
    }
}

// ============================================================================
// Session Events
// ============================================================================

/// Topics of [`SessionEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionEventKind {
    TrackRegistered,
    ActivityTypeAdded,
    BatchComplete,
    DateBoundsChanged,
    VisibilityChanged,
    ViewportFitted,
    PopupsChanged,
}

/// State changes announced by a [`TrackSession`](crate::TrackSession).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SessionEvent {
    TrackRegistered {
        track_id: TrackId,
        name: String,
    },
    /// First track of a new activity type; a UI adds a toggle for it
    ActivityTypeAdded {
        activity_type: String,
        enabled: bool,
    },
    BatchComplete {
        track_count: usize,
    },
    /// Overall date range of the loaded tracks; `None` if none is dated
    DateBoundsChanged {
        bounds: Option<DateWindow>,
    },
    VisibilityChanged {
        visible: Vec<TrackId>,
    },
    ViewportFitted {
        bounds: Bounds,
    },
    PopupsChanged {
        open: Vec<TrackId>,
    },
}

impl Topic for SessionEvent {
    type Kind = SessionEventKind;

    fn kind(&self) -> SessionEventKind {
        match self {
            SessionEvent::TrackRegistered { .. } => SessionEventKind::TrackRegistered,
            SessionEvent::ActivityTypeAdded { .. } => SessionEventKind::ActivityTypeAdded,
            SessionEvent::BatchComplete { .. } => SessionEventKind::BatchComplete,
            SessionEvent::DateBoundsChanged { .. } => SessionEventKind::DateBoundsChanged,
            SessionEvent::VisibilityChanged { .. } => SessionEventKind::VisibilityChanged,
            SessionEvent::ViewportFitted { .. } => SessionEventKind::ViewportFitted,
            SessionEvent::PopupsChanged { .. } => SessionEventKind::PopupsChanged,
        }
    }
}
