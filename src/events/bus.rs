//! # Event bus for broadcasting runtime events.
//!
//! [`Bus`] wraps [`tokio::sync::broadcast`] so the supervisor, reader,
//! writer gate and heartbeat can publish [`Event`]s to any number of
//! subscribers without blocking the control plane.
//!
//! - **Broadcast semantics**: every active subscriber receives a clone
//! - **Non-persistent**: events published with no subscribers are dropped
//! - **Bounded capacity**: slow subscribers observe `Lagged` and skip

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for runtime events.
#[derive(Clone)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a bus with the given ring capacity (min 1).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all current subscribers.
    ///
    /// Dropped silently when nobody listens; the engine runs fine without
    /// observers.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a receiver for all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;

    #[tokio::test]
    async fn events_reach_every_subscriber() {
        let bus = Bus::new(8);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(Event::now(EventKind::Connected));

        assert_eq!(rx1.recv().await.unwrap().kind, EventKind::Connected);
        assert_eq!(rx2.recv().await.unwrap().kind, EventKind::Connected);
    }

    #[tokio::test]
    async fn publishing_without_subscribers_is_fine() {
        let bus = Bus::new(1);
        bus.publish(Event::now(EventKind::PingSent));
    }
}
