//! Deferred event delivery.
//!
//! `Notifier` queues events emitted while the emitter holds internal state
//! borrows. `flush` delivers them later, one at a time, with no borrow of the
//! notifier held while a listener runs.

use crate::subscription::{SubscriptionId, SubscriptionManager};
use alloc::collections::VecDeque;
use core::cell::{Cell, RefCell};

/// An event queue together with its subscriptions.
pub struct Notifier<E> {
    subscriptions: RefCell<SubscriptionManager<E>>,
    pending: RefCell<VecDeque<E>>,
    flushing: Cell<bool>,
}

impl<E> Default for Notifier<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Notifier<E> {
    /// Creates a notifier with no subscribers.
    pub fn new() -> Self {
        Self {
            subscriptions: RefCell::new(SubscriptionManager::new()),
            pending: RefCell::new(VecDeque::new()),
            flushing: Cell::new(false),
        }
    }

    /// Registers a listener.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&E) + 'static,
    {
        self.subscriptions.borrow_mut().subscribe(callback)
    }

    /// Removes a listener.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscriptions.borrow_mut().unsubscribe(id)
    }

    /// Returns the number of listeners.
    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.borrow().len()
    }

    /// Queues an event for the next flush.
    ///
    /// Events are dropped when nobody listens.
    pub fn emit(&self, event: E) {
        if self.subscriptions.borrow().is_empty() {
            return;
        }
        self.pending.borrow_mut().push_back(event);
    }

    /// Returns the number of queued events.
    pub fn pending_count(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Delivers queued events in emission order.
    ///
    /// Events emitted by listeners during the flush are delivered by the same
    /// flush. A nested call from inside a listener returns immediately.
    pub fn flush(&self) {
        if self.flushing.replace(true) {
            return;
        }
        loop {
            let next = self.pending.borrow_mut().pop_front();
            let Some(event) = next else { break };
            let callbacks = self.subscriptions.borrow().active_callbacks();
            for callback in callbacks {
                callback(&event);
            }
        }
        self.flushing.set(false);
    }

    /// Drops every queued event without delivering it.
    pub fn discard_pending(&self) {
        self.pending.borrow_mut().clear();
    }
}
