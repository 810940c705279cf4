//! # Writer gate.
//!
//! Every outbound frame (user data, heartbeat pings, pong replies, the
//! goodbye close) passes through one serialized critical section. That is
//! the whole concurrency story for writes: at most one transport-write is
//! in flight at any instant, no matter how many producers race.
//!
//! ## Send flow
//! ```text
//! send(frame, bytes)
//!   ├─► validate (size / rate / content)       reject before the wire
//!   ├─► acquire gate (watchdog-tracked)
//!   ├─► write with write-timeout deadline
//!   ├─► on failure: classify → error book → recovery selector (optional)
//!   └─► on success: stats, audit line, bus event
//! ```
//!
//! ## Rules
//! - No internal retry; callers get a typed failure.
//! - Cancellation never aborts a write mid-frame: the current write runs to
//!   its deadline, the next acquisition observes the installed/taken state.
//! - Only data frames move the message/byte counters; control frames are
//!   audited but not counted.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::SplitSink;
use futures::SinkExt;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use crate::audit::{AuditLog, Direction};
use crate::classify::classify;
use crate::config::ClientConfig;
use crate::error::{ConnectionError, ErrorKind, Op};
use crate::events::{Bus, Event, EventKind};
use crate::processor::{FrameKind, MessageProcessor};
use crate::recovery::{strategy_for, RecoveryHistory, RecoveryStrategy};
use crate::stats::Stats;
use crate::transport::WsStream;
use crate::watchdog::LockWatchdog;

/// Deadline for the liveness probe ping.
const PROBE_DEADLINE: Duration = Duration::from_secs(5);

type Sink = SplitSink<WsStream, Message>;

/// Serialized write access to the current transport handle.
pub struct WriterGate {
    sink: Mutex<Option<Sink>>,
    cfg: Arc<ClientConfig>,
    processor: Arc<dyn MessageProcessor>,
    stats: Arc<Stats>,
    bus: Bus,
    audit: Option<Arc<AuditLog>>,
    watchdog: Arc<LockWatchdog>,
    history: Arc<RecoveryHistory>,
}

impl WriterGate {
    pub fn new(
        cfg: Arc<ClientConfig>,
        processor: Arc<dyn MessageProcessor>,
        stats: Arc<Stats>,
        bus: Bus,
        audit: Option<Arc<AuditLog>>,
        watchdog: Arc<LockWatchdog>,
        history: Arc<RecoveryHistory>,
    ) -> Self {
        Self {
            sink: Mutex::new(None),
            cfg,
            processor,
            stats,
            bus,
            audit,
            watchdog,
            history,
        }
    }

    /// Installs the sink half of a fresh connection.
    pub async fn install(&self, sink: Sink) {
        *self.sink.lock().await = Some(sink);
    }

    /// Removes the sink; subsequent sends fail `ConnectionLost`.
    pub async fn take(&self) -> Option<Sink> {
        self.sink.lock().await.take()
    }

    /// Sends one frame through the gate.
    pub async fn send(&self, frame: FrameKind, payload: &[u8]) -> Result<(), ConnectionError> {
        self.send_with_deadline(frame, payload, self.cfg.write_timeout)
            .await
    }

    /// Best-effort liveness probe: a control ping with a 5 s deadline.
    /// Success means the handle is currently writable, nothing more.
    pub async fn probe(&self) -> Result<(), ConnectionError> {
        self.send_with_deadline(FrameKind::Ping, b"", PROBE_DEADLINE)
            .await
    }

    async fn send_with_deadline(
        &self,
        frame: FrameKind,
        payload: &[u8],
        deadline: Duration,
    ) -> Result<(), ConnectionError> {
        if let Err(mut e) = self.processor.validate(frame, payload) {
            e.url = self.cfg.url.clone();
            self.stats.errors.record(e.kind, e.to_string());
            return Err(e);
        }

        let message = build_message(frame, payload, &self.cfg.url).map_err(|e| {
            self.stats.errors.record(e.kind, e.to_string());
            e
        })?;

        let mut guard = self.sink.lock().await;
        let _held = self.watchdog.observe("writer_gate");
        let sink = guard.as_mut().ok_or_else(|| {
            let e = ConnectionError::new(
                ErrorKind::ConnectionLost,
                Op::Send,
                &self.cfg.url,
                "not connected",
            );
            self.stats.errors.record(e.kind, e.to_string());
            e
        })?;

        match tokio::time::timeout(deadline, sink.send(message)).await {
            Err(_elapsed) => Err(self.fail(ConnectionError::new(
                ErrorKind::SendTimeout,
                Op::Send,
                &self.cfg.url,
                format!("write exceeded {deadline:?}"),
            ))),
            Ok(Err(ws_err)) => {
                let kind = classify(&ws_err);
                Err(self.fail(
                    ConnectionError::new(kind, Op::Send, &self.cfg.url, ws_err.to_string())
                        .with_source(ws_err),
                ))
            }
            Ok(Ok(())) => {
                if frame.is_data() {
                    self.stats.record_sent(payload.len());
                }
                if let Some(audit) = &self.audit {
                    audit.record(Direction::Send, frame, payload);
                }
                let kind = match frame {
                    FrameKind::Ping => EventKind::PingSent,
                    _ => EventKind::MessageSent,
                };
                self.bus
                    .publish(Event::now(kind).with_frame(frame, payload.len()));
                Ok(())
            }
        }
    }

    /// Sends the goodbye frame: normal closure, reason "client initiated".
    /// Best-effort; failures are logged and swallowed.
    pub async fn send_close(&self) {
        let mut guard = self.sink.lock().await;
        let _held = self.watchdog.observe("writer_gate");
        let Some(sink) = guard.as_mut() else {
            return;
        };

        let close = Message::Close(Some(CloseFrame {
            code: CloseCode::Normal,
            reason: "client initiated".into(),
        }));
        match tokio::time::timeout(self.cfg.write_timeout, sink.send(close)).await {
            Ok(Ok(())) => {
                if let Some(audit) = &self.audit {
                    audit.record(Direction::Send, FrameKind::Close, b"client initiated");
                }
                self.bus
                    .publish(Event::now(EventKind::CloseSent).with_frame(FrameKind::Close, 0));
                debug!("close_frame_sent");
            }
            Ok(Err(e)) => debug!(error = %e, "close_frame_failed"),
            Err(_) => debug!("close_frame_timed_out"),
        }
    }

    /// Records the failure and, when auto-recovery is on and the error is
    /// recoverable, consults the recovery selector for the log trail.
    fn fail(&self, err: ConnectionError) -> ConnectionError {
        self.stats.errors.record(err.kind, err.to_string());
        if self.cfg.auto_recover && err.retryable {
            let strategy = strategy_for(err.kind);
            let seen = self.history.observe(err.kind);
            if strategy != RecoveryStrategy::None {
                warn!(
                    kind = err.kind.as_label(),
                    strategy = strategy.as_label(),
                    occurrences = seen,
                    "send_failure_recovery"
                );
            }
        }
        err
    }
}

/// Converts a validated payload into a wire message.
fn build_message(
    frame: FrameKind,
    payload: &[u8],
    url: &str,
) -> Result<Message, ConnectionError> {
    match frame {
        FrameKind::Text => {
            let text = std::str::from_utf8(payload).map_err(|e| {
                ConnectionError::new(ErrorKind::EncodingError, Op::Send, url, e.to_string())
                    .with_source(e)
            })?;
            Ok(Message::Text(text.to_string()))
        }
        FrameKind::Binary => Ok(Message::Binary(payload.to_vec())),
        FrameKind::Ping => Ok(Message::Ping(payload.to_vec())),
        FrameKind::Pong => Ok(Message::Pong(payload.to_vec())),
        FrameKind::Close => Ok(Message::Close(None)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::DefaultProcessor;

    fn gate(cfg: ClientConfig) -> WriterGate {
        let cfg = Arc::new(cfg);
        let processor = Arc::new(DefaultProcessor::new(&cfg));
        WriterGate::new(
            Arc::clone(&cfg),
            processor,
            Arc::new(Stats::new()),
            Bus::new(16),
            None,
            Arc::new(LockWatchdog::new(Duration::from_secs(30))),
            Arc::new(RecoveryHistory::new()),
        )
    }

    #[tokio::test]
    async fn send_without_a_connection_fails_connection_lost() {
        let gate = gate(ClientConfig::new("ws://example.test"));
        let err = gate.send(FrameKind::Text, b"hello").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::ConnectionLost);
        assert_eq!(gate.stats.errors.count(ErrorKind::ConnectionLost), 1);
    }

    #[tokio::test]
    async fn oversized_send_is_rejected_with_no_wire_effect() {
        let mut cfg = ClientConfig::new("ws://example.test");
        cfg.max_message_size = 10;
        let gate = gate(cfg);

        let err = gate.send(FrameKind::Text, &[b'x'; 11]).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::MessageTooLarge);
        assert_eq!(gate.stats.bytes_sent(), 0);
        assert_eq!(gate.stats.messages_sent(), 0);
        assert_eq!(gate.stats.errors.count(ErrorKind::MessageTooLarge), 1);
    }

    #[tokio::test]
    async fn invalid_utf8_text_fails_encoding_error() {
        let gate = gate(ClientConfig::new("ws://example.test"));
        // Install nothing: the encoding check runs before the gate, so it
        // must fire even without a connection.
        let err = gate
            .send(FrameKind::Text, &[0xff, 0xfe, 0xfd])
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::EncodingError);
    }
}
