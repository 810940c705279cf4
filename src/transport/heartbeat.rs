//! # Heartbeat scheduler.
//!
//! Emits a control ping through the writer gate at the configured interval.
//! A failed ping is logged, not fatal: if the transport is really gone the
//! reader's deadline surfaces it within one read-timeout.
//!
//! When auto-ping is disabled this task is never spawned; the reader still
//! answers server pings and every successful read re-arms the deadline, so
//! keepalive driven by the peer keeps working.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::processor::FrameKind;
use crate::transport::WriterGate;

/// Runs the ping loop until cancelled.
pub async fn run_heartbeat(
    token: CancellationToken,
    interval: Duration,
    writer: Arc<WriterGate>,
) {
    // First tick lands one full interval after connect; the handshake just
    // proved the transport alive.
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {
                if let Err(e) = writer.send(FrameKind::Ping, b"").await {
                    warn!(error = %e, "heartbeat_ping_failed");
                }
            }
        }
    }
}
