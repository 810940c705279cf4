//! Built-in subscriber that mirrors the event stream into `tracing`.

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Logs lifecycle events at conventional levels; traffic events at debug.
pub struct LogSubscriber;

#[async_trait]
impl Subscribe for LogSubscriber {
    async fn on_event(&self, ev: &Event) {
        match ev.kind {
            EventKind::StateChanged => {
                info!(seq = ev.seq, state = ?ev.state, "state_changed");
            }
            EventKind::ConnectAttempt => {
                info!(attempt = ev.attempt, "connect_attempt");
            }
            EventKind::Connected => info!("connected"),
            EventKind::ConnectFailed => {
                warn!(attempt = ev.attempt, error = ev.error.as_deref(), "connect_failed");
            }
            EventKind::Disconnected => {
                info!(error = ev.error.as_deref(), "disconnected");
            }
            EventKind::RetryScheduled => {
                info!(attempt = ev.attempt, delay = ?ev.delay, "retry_scheduled");
            }
            EventKind::RetriesExhausted => {
                warn!(attempts = ev.attempt, "retries_exhausted");
            }
            EventKind::MessageSent | EventKind::MessageReceived => {
                debug!(kind = ?ev.kind, frame = ?ev.frame, bytes = ev.bytes, "frame");
            }
            EventKind::PingSent | EventKind::PongReceived | EventKind::CloseSent => {
                debug!(kind = ?ev.kind, "control_frame");
            }
            EventKind::ShutdownRequested => info!("shutdown_requested"),
            EventKind::Stopped => info!("stopped"),
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked => {
                warn!(error = ev.error.as_deref(), "subscriber_incident");
            }
        }
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
