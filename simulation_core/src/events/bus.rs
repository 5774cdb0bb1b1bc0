//! Synchronous publish/subscribe dispatcher.
//!
//! # Reentrancy
//!
//! Handlers may publish while a dispatch is running. Those nested publishes are
//! appended to a pending FIFO and delivered after the current event has reached all
//! of its handlers (breadth-first). The outermost `publish` call returns only once
//! the pending FIFO is drained, so a caller outside any handler always observes
//! fully synchronous delivery. A single top-level publish delivers at most
//! [`MAX_CASCADE`] events; anything beyond that is dropped with a warning.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use tracing::{trace, warn};

use super::{SimEvent, Topic};

/// Upper bound on events delivered by one top-level publish, cascades included.
pub const MAX_CASCADE: usize = 10_000;

type Handler = Rc<RefCell<dyn FnMut(&SimEvent)>>;

struct Registration {
    id: u64,
    /// `None` receives every topic.
    topic: Option<Topic>,
    handler: Handler,
}

#[derive(Default)]
struct BusInner {
    next_id: Cell<u64>,
    handlers: RefCell<Vec<Registration>>,
    pending: RefCell<VecDeque<SimEvent>>,
    dispatching: Cell<bool>,
}

impl BusInner {
    fn remove(&self, id: u64) -> bool {
        let mut handlers = self.handlers.borrow_mut();
        let before = handlers.len();
        handlers.retain(|r| r.id != id);
        handlers.len() != before
    }
}

/// Shared handle to one bus. Clones publish to and subscribe on the same bus.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Rc<BusInner>,
}

impl EventBus {
    /// Create a new bus with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for one topic.
    pub fn subscribe<F>(&self, topic: Topic, handler: F) -> Subscription
    where
        F: FnMut(&SimEvent) + 'static,
    {
        self.register(Some(topic), Rc::new(RefCell::new(handler)))
    }

    /// Register a handler that receives every event.
    pub fn subscribe_all<F>(&self, handler: F) -> Subscription
    where
        F: FnMut(&SimEvent) + 'static,
    {
        self.register(None, Rc::new(RefCell::new(handler)))
    }

    fn register(&self, topic: Option<Topic>, handler: Handler) -> Subscription {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        self.inner
            .handlers
            .borrow_mut()
            .push(Registration { id, topic, handler });

        Subscription {
            id,
            bus: Rc::downgrade(&self.inner),
        }
    }

    /// Deliver an event to every handler subscribed to its topic, in subscription order.
    ///
    /// Handlers are those registered when delivery of this event starts.
    pub fn publish(&self, event: SimEvent) {
        trace!(topic = %event.topic(), "publish");
        self.inner.pending.borrow_mut().push_back(event);

        if self.inner.dispatching.get() {
            return;
        }

        self.inner.dispatching.set(true);
        let _guard = DispatchGuard(&self.inner);

        let mut delivered = 0usize;
        loop {
            let next = self.inner.pending.borrow_mut().pop_front();
            let Some(event) = next else { break };

            if delivered >= MAX_CASCADE {
                let dropped = self.inner.pending.borrow().len() + 1;
                self.inner.pending.borrow_mut().clear();
                warn!(dropped, "event cascade exceeded limit, dropping remaining events");
                break;
            }
            delivered += 1;

            let topic = event.topic();
            let handlers: Vec<Handler> = self
                .inner
                .handlers
                .borrow()
                .iter()
                .filter(|r| r.topic.map_or(true, |t| t == topic))
                .map(|r| Rc::clone(&r.handler))
                .collect();

            for handler in handlers {
                let mut call = handler.borrow_mut();
                (&mut *call)(&event);
            }
        }
    }

    /// Number of handlers that would receive `topic`.
    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.inner
            .handlers
            .borrow()
            .iter()
            .filter(|r| r.topic.map_or(true, |t| t == topic))
            .count()
    }

    /// Check if a dispatch is currently running.
    pub fn is_dispatching(&self) -> bool {
        self.inner.dispatching.get()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("handlers", &self.inner.handlers.borrow().len())
            .field("pending", &self.inner.pending.borrow().len())
            .field("dispatching", &self.inner.dispatching.get())
            .finish()
    }
}

struct DispatchGuard<'a>(&'a BusInner);

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        self.0.dispatching.set(false);
    }
}

/// Handle returned by a subscription. Dropping it keeps the handler registered.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    bus: Weak<BusInner>,
}

impl Subscription {
    /// Remove the handler. Returns false if it was already gone or the bus is dropped.
    pub fn unsubscribe(self) -> bool {
        self.bus.upgrade().map_or(false, |bus| bus.remove(self.id))
    }
}
