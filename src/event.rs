//! Typed event channels.
//!
//! The bus keeps one channel per event type. Handlers are boxed closures
//! invoked synchronously by [`publish`](EventBus::publish) in subscription
//! order. Unsubscribing takes effect before the next publish; delivery is
//! never deferred, and handlers have no access to the bus, so there is no
//! window in which an unsubscribed handler could still fire.

use std::any::{Any, TypeId};

use rustc_hash::FxHashMap;

/// Handle returned by [`EventBus::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: u64,
    /// `Box<dyn FnMut(&E)>` behind `Any`; downcast per publish.
    handler: Box<dyn Any>,
}

/// Synchronous publish/subscribe bus keyed by event type.
#[derive(Default)]
pub struct EventBus {
    channels: FxHashMap<TypeId, Vec<Subscription>>,
    /// Reverse map so unsubscribe does not need the event type.
    by_id: FxHashMap<u64, TypeId>,
    next_id: u64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for events of type `E`. Handlers on the same
    /// channel fire in subscription order.
    pub fn subscribe<E, F>(&mut self, handler: F) -> SubscriptionId
    where
        E: 'static,
        F: FnMut(&E) + 'static,
    {
        let id = self.next_id;
        self.next_id += 1;
        let boxed: Box<dyn FnMut(&E)> = Box::new(handler);
        self.channels
            .entry(TypeId::of::<E>())
            .or_default()
            .push(Subscription {
                id,
                handler: Box::new(boxed),
            });
        self.by_id.insert(id, TypeId::of::<E>());
        log::trace!("[EventBus] subscription {id} added");
        SubscriptionId(id)
    }

    /// Drop a subscription. Returns false if the id is unknown or already
    /// removed. After this returns the handler never fires again; there are
    /// no queued deliveries that could still reach it.
    pub fn unsubscribe(&mut self, subscription: SubscriptionId) -> bool {
        let Some(type_id) = self.by_id.remove(&subscription.0) else {
            return false;
        };
        if let Some(channel) = self.channels.get_mut(&type_id) {
            channel.retain(|sub| sub.id != subscription.0);
        }
        log::trace!("[EventBus] subscription {} removed", subscription.0);
        true
    }

    /// Deliver `event` to every subscriber of `E`, in subscription order,
    /// and return how many handlers ran. The channel cannot change while a
    /// publish runs (handlers do not receive the bus), so the walk is a
    /// plain in-order pass.
    pub fn publish<E: 'static>(&mut self, event: &E) -> usize {
        let Some(channel) = self.channels.get_mut(&TypeId::of::<E>()) else {
            return 0;
        };
        let mut delivered = 0;
        for sub in channel.iter_mut() {
            if let Some(handler) = sub.handler.downcast_mut::<Box<dyn FnMut(&E)>>() {
                handler(event);
                delivered += 1;
            }
        }
        delivered
    }

    /// Live subscriber count for `E`.
    pub fn subscriber_count<E: 'static>(&self) -> usize {
        self.channels
            .get(&TypeId::of::<E>())
            .map_or(0, Vec::len)
    }
}
