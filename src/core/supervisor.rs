//! # Session supervisor.
//!
//! Owns the main loop of the lifecycle engine: dial pacing, handle
//! installation, child-task supervision and recovery selection. One
//! supervisor drives exactly one logical session, across however many
//! physical connections the retry policy allows.
//!
//! ## Rules
//! - The retry counter and recovery history reset on every successful
//!   Connected transition.
//! - A cancellation observed anywhere in the loop ends it without recording
//!   an error; shutdown is not a failure.
//! - Exactly one transport handle exists while state is Connected; the
//!   writer gate holds the sink, the reader owns the stream half.
//! - The reconnect counter moves when a live session drops into
//!   Reconnecting and on every repeated dial attempt.

use std::sync::Arc;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::audit::AuditLog;
use crate::config::ClientConfig;
use crate::error::{ClientError, ErrorKind, RetryError};
use crate::events::{Bus, Event, EventKind};
use crate::policies::{RetryDecision, RetryPolicy};
use crate::processor::MessageProcessor;
use crate::recovery::{strategy_for, RecoveryHistory, RecoveryStrategy};
use crate::state::{ConnectionState, StateCell};
use crate::stats::Stats;
use crate::transport::{
    run_heartbeat, run_reader, Connect, ReaderExit, ReaderParams, WriterGate, WsStream,
};

/// How one live session ended, from the loop's point of view.
enum SessionEnd {
    /// Shutdown or unrecoverable failure: leave the loop.
    Stop,
    /// Recoverable loss: go around again.
    Reconnect,
}

/// Drives the connection lifecycle until stop or give-up.
pub struct Supervisor {
    cfg: Arc<ClientConfig>,
    connector: Arc<dyn Connect>,
    state: Arc<StateCell>,
    stats: Arc<Stats>,
    bus: Bus,
    writer: Arc<WriterGate>,
    processor: Arc<dyn MessageProcessor>,
    audit: Option<Arc<AuditLog>>,
    history: Arc<RecoveryHistory>,
}

impl Supervisor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cfg: Arc<ClientConfig>,
        connector: Arc<dyn Connect>,
        state: Arc<StateCell>,
        stats: Arc<Stats>,
        bus: Bus,
        writer: Arc<WriterGate>,
        processor: Arc<dyn MessageProcessor>,
        audit: Option<Arc<AuditLog>>,
        history: Arc<RecoveryHistory>,
    ) -> Self {
        Self {
            cfg,
            connector,
            state,
            stats,
            bus,
            writer,
            processor,
            audit,
            history,
        }
    }

    /// Runs the loop until cancellation or retry exhaustion.
    pub async fn run(&self, token: CancellationToken) -> Result<(), ClientError> {
        let mut retry = RetryPolicy::from_config(&self.cfg);
        let mut last_failure: Option<String> = None;

        loop {
            if token.is_cancelled() {
                return Ok(());
            }

            let (attempt, phase, delay) = match retry.next() {
                RetryDecision::GiveUp { attempts } => {
                    let err = RetryError {
                        kind: ErrorKind::MaxRetriesExceeded,
                        attempts,
                        max_attempts: retry.max_attempts(),
                        message: last_failure
                            .take()
                            .unwrap_or_else(|| "no successful connection".to_string()),
                    };
                    self.stats
                        .errors
                        .record(ErrorKind::MaxRetriesExceeded, err.to_string());
                    self.bus.publish(
                        Event::now(EventKind::RetriesExhausted)
                            .with_attempt(attempts)
                            .with_error(err.to_string()),
                    );
                    error!(attempts, "retries_exhausted");
                    return Err(ClientError::RetriesExhausted(err));
                }
                RetryDecision::Proceed {
                    attempt,
                    phase,
                    delay,
                } => (attempt, phase, delay),
            };

            if attempt > 1 {
                self.stats.mark_reconnect();
                info!(attempt, phase = %phase, delay = ?delay, "retrying");
            }
            if !delay.is_zero() {
                self.bus.publish(
                    Event::now(EventKind::RetryScheduled)
                        .with_attempt(attempt)
                        .with_delay(delay),
                );
                tokio::select! {
                    _ = token.cancelled() => return Ok(()),
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            self.set_state(ConnectionState::Connecting);
            self.bus
                .publish(Event::now(EventKind::ConnectAttempt).with_attempt(attempt));

            match self.connector.connect(&token, &self.cfg).await {
                Err(e) => {
                    if token.is_cancelled() {
                        // Shutdown-in-progress cancellations are not errors.
                        return Ok(());
                    }
                    last_failure = Some(e.to_string());
                    self.stats.errors.record(e.kind, e.to_string());
                    self.bus.publish(
                        Event::now(EventKind::ConnectFailed)
                            .with_attempt(attempt)
                            .with_error(e.to_string()),
                    );
                    let strategy = strategy_for(e.kind);
                    self.history.observe(e.kind);
                    warn!(
                        kind = e.kind.as_label(),
                        strategy = strategy.as_label(),
                        attempt,
                        "connect_failed"
                    );
                    self.set_state(ConnectionState::Disconnected);
                }
                Ok(stream) => {
                    retry.reset();
                    self.history.reset();
                    match self.run_session(stream, &token).await {
                        SessionEnd::Stop => return Ok(()),
                        SessionEnd::Reconnect => {}
                    }
                }
            }
        }
    }

    /// Runs one live connection from handle installation to teardown.
    async fn run_session(&self, stream: WsStream, token: &CancellationToken) -> SessionEnd {
        let (sink, stream_half) = stream.split();
        self.writer.install(sink).await;

        self.stats.mark_connected();
        self.set_state(ConnectionState::Connected);
        self.bus.publish(Event::now(EventKind::Connected));
        info!(url = %self.cfg.url, "connected");

        let reader_token = token.child_token();
        let mut reader_handle = tokio::spawn(run_reader(ReaderParams {
            stream: stream_half,
            token: reader_token.clone(),
            cfg: Arc::clone(&self.cfg),
            stats: Arc::clone(&self.stats),
            processor: Arc::clone(&self.processor),
            writer: Arc::clone(&self.writer),
            bus: self.bus.clone(),
            audit: self.audit.clone(),
        }));

        let heartbeat_token = token.child_token();
        let heartbeat_handle = (!self.cfg.disable_auto_ping).then(|| {
            tokio::spawn(run_heartbeat(
                heartbeat_token.clone(),
                self.cfg.ping_interval,
                Arc::clone(&self.writer),
            ))
        });

        let early_exit = tokio::select! {
            res = &mut reader_handle => Some(res),
            _ = token.cancelled() => None,
        };

        // Teardown: stop the heartbeat, say goodbye while the sink is still
        // installed, then take the handle and join the children.
        heartbeat_token.cancel();
        self.writer.send_close().await;
        drop(self.writer.take().await);
        reader_token.cancel();

        let exit = match early_exit {
            Some(res) => res.unwrap_or(ReaderExit::Failed(ErrorKind::Unknown)),
            None => reader_handle
                .await
                .unwrap_or(ReaderExit::Failed(ErrorKind::Unknown)),
        };
        if let Some(handle) = heartbeat_handle {
            let _ = handle.await;
        }
        self.stats.mark_disconnected();

        if token.is_cancelled() {
            self.bus.publish(Event::now(EventKind::Disconnected));
            return SessionEnd::Stop;
        }

        match exit {
            ReaderExit::Cancelled => {
                self.bus.publish(Event::now(EventKind::Disconnected));
                SessionEnd::Stop
            }
            ReaderExit::PeerClosed => {
                self.bus.publish(Event::now(EventKind::Disconnected));
                info!("peer_closed_reconnecting");
                self.stats.mark_reconnect();
                self.set_state(ConnectionState::Reconnecting);
                SessionEnd::Reconnect
            }
            ReaderExit::Failed(kind) => {
                let strategy = strategy_for(kind);
                self.history.observe(kind);
                self.bus
                    .publish(Event::now(EventKind::Disconnected).with_error(kind.as_label()));
                warn!(
                    kind = kind.as_label(),
                    strategy = strategy.as_label(),
                    "session_lost"
                );
                if strategy == RecoveryStrategy::None {
                    SessionEnd::Stop
                } else {
                    self.stats.mark_reconnect();
                    self.set_state(ConnectionState::Reconnecting);
                    SessionEnd::Reconnect
                }
            }
        }
    }

    /// Applies a transition and publishes it; illegal requests (already
    /// stopping) are dropped silently.
    fn set_state(&self, to: ConnectionState) {
        if self.state.transition(to).is_ok() {
            self.bus
                .publish(Event::now(EventKind::StateChanged).with_state(to));
        }
    }
}
