//! # Subscriber trait.
//!
//! Implement [`Subscribe`] to observe the full event stream. Each subscriber
//! gets a dedicated bounded queue and worker task, so a slow observer delays
//! only itself, never the reader or the supervisor.
//!
//! ## Rules
//! - `on_event` is invoked **serially** per subscriber, in queue order.
//! - Do not assume a particular thread; only non-concurrency is guaranteed.
//! - Panics are caught, reported as `SubscriberPanicked`, and the worker
//!   keeps processing.

use async_trait::async_trait;

use crate::events::Event;

/// Asynchronous observer of runtime events.
///
/// ```rust
/// use async_trait::async_trait;
/// use wsvisor::{Event, EventKind, Subscribe};
///
/// struct Counter;
///
/// #[async_trait]
/// impl Subscribe for Counter {
///     async fn on_event(&self, ev: &Event) {
///         if ev.kind == EventKind::MessageReceived {
///             // count it
///         }
///     }
///     fn name(&self) -> &'static str { "counter" }
/// }
/// ```
#[async_trait]
pub trait Subscribe: Send + Sync {
    /// Handles one event. Invoked serially per subscriber.
    async fn on_event(&self, ev: &Event);

    /// Stable subscriber name for diagnostics.
    fn name(&self) -> &'static str;

    /// Queue depth before events are dropped for this subscriber.
    fn queue_capacity(&self) -> usize {
        256
    }
}
