//! # Runtime events emitted by the supervisor, reader, writer and heartbeat.
//!
//! The [`EventKind`] enum covers four planes:
//! - **State**: every [`ConnectionState`] transition
//! - **Dialing**: attempts, failures, retry pacing, exhaustion
//! - **Traffic**: frames in and out, heartbeat pings/pongs
//! - **Shutdown & plumbing**: stop requests, subscriber overflow/panic
//!
//! ## Ordering guarantees
//! Each event carries a globally unique sequence number (`seq`) that
//! increases monotonically, so subscribers can order events correctly even
//! when they arrive through independent queues.
//!
//! ## Example
//! ```rust
//! use wsvisor::{Event, EventKind};
//!
//! let ev = Event::now(EventKind::ConnectFailed)
//!     .with_error("connection refused")
//!     .with_attempt(3);
//!
//! assert_eq!(ev.kind, EventKind::ConnectFailed);
//! assert_eq!(ev.error.as_deref(), Some("connection refused"));
//! assert_eq!(ev.attempt, Some(3));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use bytes::Bytes;

use crate::processor::FrameKind;
use crate::state::ConnectionState;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === State plane ===
    /// The state cell moved; `state` holds the new value.
    StateChanged,

    // === Dialing plane ===
    /// The connector is about to dial; `attempt` holds the 1-based count.
    ConnectAttempt,
    /// Handshake completed; a live session begins.
    Connected,
    /// The dial failed; `error` and `attempt` are set.
    ConnectFailed,
    /// A live session ended; `error` is set unless the peer closed cleanly.
    Disconnected,
    /// A retry wait was scheduled; `delay` and `attempt` are set.
    RetryScheduled,
    /// The retry progression gave up; `attempt` holds the total performed.
    RetriesExhausted,

    // === Traffic plane ===
    /// A data frame went out; `frame` and `bytes` are set.
    MessageSent,
    /// A data frame arrived; `frame`, `bytes` and `payload` are set.
    MessageReceived,
    /// Heartbeat ping written.
    PingSent,
    /// Pong observed by the reader.
    PongReceived,
    /// Close frame written during teardown.
    CloseSent,

    // === Shutdown ===
    /// External stop or OS signal observed.
    ShutdownRequested,
    /// Terminal: all tasks joined, resources released.
    Stopped,

    // === Subscriber plumbing ===
    /// A subscriber dropped an event (queue full or worker closed).
    SubscriberOverflow,
    /// A subscriber panicked during event processing.
    SubscriberPanicked,
}

/// Runtime event with optional metadata.
///
/// `seq` orders events globally; `at` is wall-clock and only suitable for
/// display. The remaining fields are populated per kind, see [`EventKind`].
#[derive(Debug, Clone)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp (may go backwards, use for logging only).
    pub at: SystemTime,
    /// The kind of event.
    pub kind: EventKind,
    /// New connection state, for `StateChanged`.
    pub state: Option<ConnectionState>,
    /// Error message, if the event represents a failure.
    pub error: Option<String>,
    /// Dial attempt count (starting from 1).
    pub attempt: Option<u32>,
    /// Scheduled retry delay.
    pub delay: Option<Duration>,
    /// Frame kind for traffic events.
    pub frame: Option<FrameKind>,
    /// Payload length for traffic events.
    pub bytes: Option<usize>,
    /// Received payload, for `MessageReceived`. `Bytes` keeps the clone
    /// cheap across subscriber queues.
    pub payload: Option<Bytes>,
}

impl Event {
    /// Creates a new event of the given kind with the next sequence number.
    pub fn now(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            state: None,
            error: None,
            attempt: None,
            delay: None,
            frame: None,
            bytes: None,
            payload: None,
        }
    }

    /// Attaches the new connection state.
    pub fn with_state(mut self, state: ConnectionState) -> Self {
        self.state = Some(state);
        self
    }

    /// Attaches an error message.
    pub fn with_error(mut self, msg: impl Into<String>) -> Self {
        self.error = Some(msg.into());
        self
    }

    /// Attaches an attempt count.
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a retry delay.
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay = Some(d);
        self
    }

    /// Attaches a frame kind and payload length.
    pub fn with_frame(mut self, frame: FrameKind, bytes: usize) -> Self {
        self.frame = Some(frame);
        self.bytes = Some(bytes);
        self
    }

    /// Attaches the received payload.
    pub fn with_payload(mut self, payload: Bytes) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Creates a subscriber overflow event.
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::now(EventKind::SubscriberOverflow)
            .with_error(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::now(EventKind::SubscriberPanicked)
            .with_error(format!("subscriber={subscriber} panic={info}"))
    }

    /// True for the internal subscriber-plumbing kinds, which must never
    /// trigger further overflow diagnostics.
    pub(crate) fn is_plumbing(&self) -> bool {
        matches!(
            self.kind,
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_numbers_increase() {
        let a = Event::now(EventKind::Connected);
        let b = Event::now(EventKind::Disconnected);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn builder_attaches_metadata() {
        let ev = Event::now(EventKind::RetryScheduled)
            .with_attempt(4)
            .with_delay(Duration::from_secs(3))
            .with_error("connection lost");
        assert_eq!(ev.attempt, Some(4));
        assert_eq!(ev.delay, Some(Duration::from_secs(3)));
        assert_eq!(ev.error.as_deref(), Some("connection lost"));
    }
}
