//! Typed event subscriptions
//!
//! A component that emits events owns an [`Observers`] list and exposes a
//! [`Subscriptions`] handle to the outside. The handle can only subscribe and
//! unsubscribe; publishing stays with the owner.
//!
//! [`Observers::publish`] is public so owners in other crates can emit. The
//! owner must keep its `Observers` field private and never return it by
//! reference. Callers then have no way to publish:
//!
//! ```compile_fail
//! use trellis_core::observers::Observers;
//!
//! let mut sizes = Observers::<u32>::new();
//! sizes.handle().publish(&42);
//! ```
//!
//! ```rust
//! use trellis_core::observers::Observers;
//!
//! let mut sizes = Observers::<u32>::new();
//! let id = sizes.handle().subscribe(|size| println!("resized to {size}"));
//!
//! sizes.publish(&42);
//! assert!(sizes.handle().unsubscribe(id));
//! ```

use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Token returned by [`Subscriptions::subscribe`]
    pub struct SubscriptionId;
}

type Handler<E> = Box<dyn FnMut(&E)>;

/// Ordered list of event handlers for a single event type
pub struct Observers<E> {
    handlers: SlotMap<SubscriptionId, Handler<E>>,
}

impl<E> Default for Observers<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> std::fmt::Debug for Observers<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observers")
            .field("subscribers", &self.handlers.len())
            .finish()
    }
}

impl<E> Observers<E> {
    pub fn new() -> Self {
        Self {
            handlers: SlotMap::with_key(),
        }
    }

    /// Subscribe/unsubscribe view of this list, safe to hand to callers
    pub fn handle(&mut self) -> Subscriptions<'_, E> {
        Subscriptions { observers: self }
    }

    /// Deliver an event to every subscriber
    ///
    /// Only the owner of the list should call this. Hand out
    /// [`handle`](Self::handle) instead of the list itself.
    pub fn publish(&mut self, event: &E) {
        for handler in self.handlers.values_mut() {
            handler(event);
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Subscribe/unsubscribe access to an [`Observers`] list
pub struct Subscriptions<'a, E> {
    observers: &'a mut Observers<E>,
}

impl<E> Subscriptions<'_, E> {
    pub fn subscribe<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: FnMut(&E) + 'static,
    {
        self.observers.handlers.insert(Box::new(handler))
    }

    /// Returns false if the subscription was already gone
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.observers.handlers.remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}
