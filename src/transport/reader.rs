//! # Reader task.
//!
//! The inbound frame loop for one live connection:
//!
//! ```text
//! loop {
//!   read frame (deadline = read_timeout, re-armed by every success)
//!     ├─► data frame  → stats → audit → processor → MessageReceived event
//!     ├─► ping        → audit → processor → pong via writer gate
//!     ├─► pong        → audit → processor → PongReceived event
//!     ├─► close       → exit PeerClosed
//!     ├─► error       → content class: record, keep reading
//!     │                 network class: exit Failed(kind)
//!     └─► cancellation → exit Cancelled
//! }
//! ```
//!
//! ## Rules
//! - The reader never writes to the transport directly; pong replies go
//!   through the writer gate like every other frame.
//! - The processor sees frames exactly once, in arrival order.
//! - Close frames are logged at info while shutdown is in progress, warn
//!   otherwise.

use std::sync::Arc;

use bytes::Bytes;
use futures::stream::SplitStream;
use futures::StreamExt;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::audit::{AuditLog, Direction};
use crate::classify::classify;
use crate::config::ClientConfig;
use crate::error::ErrorKind;
use crate::events::{Bus, Event, EventKind};
use crate::processor::{FrameKind, MessageProcessor};
use crate::recovery::{strategy_for, RecoveryStrategy};
use crate::stats::Stats;
use crate::transport::{WriterGate, WsStream};

/// Why the reader returned control to the supervisor.
#[derive(Debug)]
pub enum ReaderExit {
    /// Cancellation token fired; clean shutdown.
    Cancelled,
    /// The peer closed the connection (close frame or EOF after close).
    PeerClosed,
    /// A classified failure; already recorded in the error book.
    Failed(ErrorKind),
}

/// Everything one reader run needs.
pub struct ReaderParams {
    pub stream: SplitStream<WsStream>,
    pub token: CancellationToken,
    pub cfg: Arc<ClientConfig>,
    pub stats: Arc<Stats>,
    pub processor: Arc<dyn MessageProcessor>,
    pub writer: Arc<WriterGate>,
    pub bus: Bus,
    pub audit: Option<Arc<AuditLog>>,
}

/// Runs the frame loop until close, failure, or cancellation.
pub async fn run_reader(params: ReaderParams) -> ReaderExit {
    let ReaderParams {
        mut stream,
        token,
        cfg,
        stats,
        processor,
        writer,
        bus,
        audit,
    } = params;

    // A stream erroring on every read is not going to recover; bail after a
    // streak instead of spinning.
    const MAX_CONSECUTIVE_FRAME_ERRORS: u32 = 8;
    let mut frame_error_streak: u32 = 0;

    loop {
        let next = tokio::select! {
            _ = token.cancelled() => return ReaderExit::Cancelled,
            read = tokio::time::timeout(cfg.read_timeout, stream.next()) => read,
        };

        let message = match next {
            // Deadline expired with no frame of any kind.
            Err(_elapsed) => {
                let kind = ErrorKind::ReceiveTimeout;
                stats
                    .errors
                    .record(kind, format!("no frame within {:?}", cfg.read_timeout));
                return ReaderExit::Failed(kind);
            }
            Ok(None) => {
                let kind = ErrorKind::ConnectionLost;
                stats.errors.record(kind, "stream ended (eof)");
                return ReaderExit::Failed(kind);
            }
            Ok(Some(Err(e))) => {
                let kind = classify(&e);
                if kind == ErrorKind::ConnectionLost && token.is_cancelled() {
                    return ReaderExit::Cancelled;
                }
                stats.errors.record(kind, e.to_string());
                // Content-class failures degrade the frame, not the session:
                // keep reading unless the transport itself is gone.
                frame_error_streak += 1;
                if strategy_for(kind) == RecoveryStrategy::Fallback
                    && frame_error_streak < MAX_CONSECUTIVE_FRAME_ERRORS
                {
                    warn!(kind = kind.as_label(), error = %e, "frame_dropped");
                    continue;
                }
                return ReaderExit::Failed(kind);
            }
            Ok(Some(Ok(message))) => {
                frame_error_streak = 0;
                message
            }
        };

        match message {
            Message::Text(text) => {
                handle_data(
                    FrameKind::Text,
                    text.as_bytes(),
                    &stats,
                    &processor,
                    &bus,
                    &audit,
                );
            }
            Message::Binary(data) => {
                handle_data(FrameKind::Binary, &data, &stats, &processor, &bus, &audit);
            }
            Message::Ping(data) => {
                stats.touch_read();
                if let Some(audit) = &audit {
                    audit.record(Direction::Recv, FrameKind::Ping, &data);
                }
                let _ = processor.process(FrameKind::Ping, &data);
                bus.publish(
                    Event::now(EventKind::MessageReceived).with_frame(FrameKind::Ping, data.len()),
                );
                // Answer within the same tick budget; a failed pong is not
                // fatal here; the peer's next deadline will tell.
                if let Err(e) = writer.send(FrameKind::Pong, &data).await {
                    warn!(error = %e, "pong_reply_failed");
                }
            }
            Message::Pong(data) => {
                stats.touch_read();
                if let Some(audit) = &audit {
                    audit.record(Direction::Recv, FrameKind::Pong, &data);
                }
                let _ = processor.process(FrameKind::Pong, &data);
                bus.publish(Event::now(EventKind::PongReceived).with_frame(FrameKind::Pong, data.len()));
            }
            Message::Close(frame) => {
                let detail = frame
                    .as_ref()
                    .map(|f| format!("{} {}", f.code, f.reason))
                    .unwrap_or_default();
                if let Some(audit) = &audit {
                    audit.record(Direction::Recv, FrameKind::Close, detail.as_bytes());
                }
                if token.is_cancelled() {
                    info!(detail = %detail, "close_frame_received");
                } else {
                    warn!(detail = %detail, "close_frame_received");
                }
                return ReaderExit::PeerClosed;
            }
            Message::Frame(_) => {}
        }
    }
}

/// Common path for text and binary frames.
fn handle_data(
    frame: FrameKind,
    data: &[u8],
    stats: &Arc<Stats>,
    processor: &Arc<dyn MessageProcessor>,
    bus: &Bus,
    audit: &Option<Arc<AuditLog>>,
) {
    stats.record_received(data.len());
    if let Some(audit) = audit {
        audit.record(Direction::Recv, frame, data);
    }
    if let Err(e) = processor.process(frame, data) {
        // Frame-level rejection: recorded, surfaced, and the frame is
        // withheld from user callbacks. The session lives.
        stats.errors.record(e.kind, e.to_string());
        warn!(kind = e.kind.as_label(), "inbound_frame_rejected");
        return;
    }
    bus.publish(
        Event::now(EventKind::MessageReceived)
            .with_frame(frame, data.len())
            .with_payload(Bytes::copy_from_slice(data)),
    );
}
