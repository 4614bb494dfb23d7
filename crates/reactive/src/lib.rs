//! Reshape Reactive - Deferred change notifications.
//!
//! Tables and models announce lifecycle changes (reset, finish, filter,
//! update) to subscribers. Events are queued while the emitter still holds
//! its internal borrows and dispatched later by `Notifier::flush`, so a
//! listener may freely call back into the emitter.
//!
//! # Core Concepts
//!
//! - `SubscriptionManager`: Owns the callbacks registered for one event type
//! - `Notifier`: An event queue plus its subscriptions, flushed on demand
//!
//! # Example
//!
//! ```rust
//! use reshape_reactive::Notifier;
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let notifier: Notifier<&'static str> = Notifier::new();
//! let seen = Rc::new(Cell::new(0));
//! let seen_clone = seen.clone();
//! notifier.subscribe(move |_event| seen_clone.set(seen_clone.get() + 1));
//!
//! notifier.emit("reset");
//! assert_eq!(seen.get(), 0); // queued, not yet delivered
//! notifier.flush();
//! assert_eq!(seen.get(), 1);
//! ```

#![no_std]

extern crate alloc;

pub mod notify;
pub mod subscription;

pub use notify::Notifier;
pub use subscription::{EventCallback, Subscription, SubscriptionId, SubscriptionManager};
