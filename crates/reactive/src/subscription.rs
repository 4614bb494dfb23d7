//! Subscription management.
//!
//! This module provides subscription IDs and a manager for tracking the
//! callbacks registered for one event type.

use alloc::rc::Rc;
use alloc::vec::Vec;
use hashbrown::HashMap;

/// Unique identifier for a subscription.
pub type SubscriptionId = u64;

/// Callback type for event notifications.
pub type EventCallback<E> = Rc<dyn Fn(&E)>;

/// A subscription to events.
pub struct Subscription<E> {
    /// Unique identifier
    id: SubscriptionId,
    /// Callback to invoke on events
    callback: EventCallback<E>,
    /// Whether this subscription is active
    active: bool,
}

impl<E> Subscription<E> {
    /// Creates a new subscription.
    pub fn new<F>(id: SubscriptionId, callback: F) -> Self
    where
        F: Fn(&E) + 'static,
    {
        Self {
            id,
            callback: Rc::new(callback),
            active: true,
        }
    }

    /// Returns the subscription ID.
    #[inline]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Returns whether this subscription is active.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Deactivates this subscription.
    #[inline]
    pub fn deactivate(&mut self) {
        self.active = false;
    }

    /// Notifies this subscription of an event.
    pub fn notify(&self, event: &E) {
        if self.active {
            (self.callback)(event);
        }
    }
}

/// Manages subscriptions for one event type.
pub struct SubscriptionManager<E> {
    /// Registered subscriptions
    subscriptions: HashMap<SubscriptionId, Subscription<E>>,
    /// Next subscription ID to assign
    next_id: SubscriptionId,
}

impl<E> Default for SubscriptionManager<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> SubscriptionManager<E> {
    /// Creates a new subscription manager.
    pub fn new() -> Self {
        Self {
            subscriptions: HashMap::new(),
            next_id: 1,
        }
    }

    /// Subscribes with the given callback.
    ///
    /// Returns the subscription ID that can be used to unsubscribe.
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: Fn(&E) + 'static,
    {
        let id = self.next_id;
        self.next_id += 1;
        self.subscriptions.insert(id, Subscription::new(id, callback));
        id
    }

    /// Unsubscribes by ID.
    ///
    /// Returns true if the subscription was found and removed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscriptions.remove(&id).is_some()
    }

    /// Pauses or resumes a subscription without removing it.
    pub fn set_active(&mut self, id: SubscriptionId, active: bool) -> bool {
        match self.subscriptions.get_mut(&id) {
            Some(sub) => {
                sub.active = active;
                true
            }
            None => false,
        }
    }

    /// Notifies all active subscriptions of an event.
    pub fn notify_all(&self, event: &E) {
        for callback in self.active_callbacks() {
            callback(event);
        }
    }

    /// Returns the active callbacks in subscription order.
    ///
    /// Callers that must release a borrow of the manager before running
    /// listener code take this snapshot first.
    pub fn active_callbacks(&self) -> Vec<EventCallback<E>> {
        let mut active: Vec<&Subscription<E>> =
            self.subscriptions.values().filter(|s| s.active).collect();
        active.sort_by_key(|s| s.id);
        active.into_iter().map(|s| s.callback.clone()).collect()
    }

    /// Returns the number of subscriptions.
    #[inline]
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Returns true if there are no subscriptions.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Returns all subscription IDs.
    pub fn subscription_ids(&self) -> Vec<SubscriptionId> {
        let mut ids: Vec<_> = self.subscriptions.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Clears all subscriptions.
    pub fn clear(&mut self) {
        self.subscriptions.clear();
    }
}
