//! # Client facade.
//!
//! [`WsClient`] assembles the engine: config validation, session identity,
//! audit log, telemetry servers, the event bus with its subscriber fan-out,
//! the writer gate, and the supervisor. One client manages one logical
//! session from construction until [`Stopped`](crate::ConnectionState).
//!
//! ```no_run
//! use std::sync::Arc;
//! use wsvisor::{ClientConfig, LogSubscriber, Subscribe, WsClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = ClientConfig::new("wss://echo.example/ws");
//!     let subscribers: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogSubscriber)];
//!     let client = Arc::new(WsClient::new(cfg, subscribers).await?);
//!
//!     let sender = Arc::clone(&client);
//!     tokio::spawn(async move {
//!         let _ = sender.send_text("hello").await;
//!     });
//!
//!     client.run().await?;
//!     Ok(())
//! }
//! ```

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::audit::AuditLog;
use crate::config::ClientConfig;
use crate::core::{wait_for_shutdown_signal, Supervisor};
use crate::error::ClientError;
use crate::events::{Bus, Event, EventKind};
use crate::processor::{DefaultProcessor, FrameKind, MessageProcessor};
use crate::recovery::RecoveryHistory;
use crate::session::SessionId;
use crate::state::{ConnectionState, StateCell};
use crate::stats::{Stats, StatsSnapshot};
use crate::subscribers::{Subscribe, SubscriberSet};
use crate::telemetry::{TelemetryServers, TelemetryState};
use crate::transport::{Connect, WriterGate, WsConnector};
use crate::watchdog::LockWatchdog;

/// Budget for telemetry-server shutdown during the stop sequence.
const TELEMETRY_SHUTDOWN_BUDGET: Duration = Duration::from_secs(5);
/// Budget for draining subscriber queues after the terminal event.
const SUBSCRIBER_DRAIN_BUDGET: Duration = Duration::from_secs(2);

/// Long-running WebSocket client with a supervised connection lifecycle.
pub struct WsClient {
    cfg: Arc<ClientConfig>,
    session: SessionId,
    state: Arc<StateCell>,
    stats: Arc<Stats>,
    bus: Bus,
    writer: Arc<WriterGate>,
    supervisor: Supervisor,
    token: CancellationToken,
    audit: Option<Arc<AuditLog>>,
    telemetry: Mutex<Option<TelemetryServers>>,
    telemetry_addrs: Option<(SocketAddr, SocketAddr)>,
    pump: Mutex<Option<JoinHandle<()>>>,
    watchdog_reporter: JoinHandle<()>,
    running: AtomicBool,
}

impl WsClient {
    /// Builds a client with the default connector.
    pub async fn new(
        cfg: ClientConfig,
        subscribers: Vec<Arc<dyn Subscribe>>,
    ) -> Result<Self, ClientError> {
        Self::with_connector(cfg, Arc::new(WsConnector), subscribers).await
    }

    /// Builds a client with an injected connector (tests, proxies).
    pub async fn with_connector(
        cfg: ClientConfig,
        connector: Arc<dyn Connect>,
        subscribers: Vec<Arc<dyn Subscribe>>,
    ) -> Result<Self, ClientError> {
        cfg.validate()?;
        let cfg = Arc::new(cfg);
        let session = SessionId::generate();
        let token = CancellationToken::new();

        let watchdog = Arc::new(LockWatchdog::new(cfg.lock_watchdog_threshold));
        let stats = Arc::new(Stats::new().with_watchdog(Arc::clone(&watchdog)));
        let state = Arc::new(StateCell::new());
        let bus = Bus::new(cfg.bus_capacity_clamped());

        let audit = match &cfg.log_file {
            Some(path) => {
                let root = std::env::current_dir().map_err(|e| ClientError::Config {
                    reason: format!("cannot resolve working directory: {e}"),
                })?;
                Some(Arc::new(AuditLog::create(
                    path,
                    &root,
                    session.clone(),
                    &cfg.url,
                )?))
            }
            None => None,
        };

        let processor: Arc<dyn MessageProcessor> = Arc::new(DefaultProcessor::new(&cfg));
        let history = Arc::new(RecoveryHistory::new());
        let writer = Arc::new(WriterGate::new(
            Arc::clone(&cfg),
            Arc::clone(&processor),
            Arc::clone(&stats),
            bus.clone(),
            audit.clone(),
            Arc::clone(&watchdog),
            Arc::clone(&history),
        ));

        let supervisor = Supervisor::new(
            Arc::clone(&cfg),
            connector,
            Arc::clone(&state),
            Arc::clone(&stats),
            bus.clone(),
            Arc::clone(&writer),
            Arc::clone(&processor),
            audit.clone(),
            history,
        );

        let (telemetry, telemetry_addrs) = if cfg.monitoring.enabled {
            let servers = TelemetryServers::spawn(
                &cfg.monitoring,
                TelemetryState {
                    stats: Arc::clone(&stats),
                    state: Arc::clone(&state),
                    session: session.clone(),
                },
            )
            .await?;
            let addrs = (servers.metrics_addr, servers.health_addr);
            (Some(servers), Some(addrs))
        } else {
            (None, None)
        };

        // One pump drains the bus into the per-subscriber queues; it ends
        // after forwarding the terminal Stopped event.
        let set = SubscriberSet::new(subscribers, bus.clone());
        let pump = spawn_pump(bus.subscribe(), set, bus.clone());
        let watchdog_reporter = watchdog.spawn_reporter(token.child_token());

        info!(session = %session, url = %cfg.url, "client_created");

        Ok(Self {
            cfg,
            session,
            state,
            stats,
            bus,
            writer,
            supervisor,
            token,
            audit,
            telemetry: Mutex::new(telemetry),
            telemetry_addrs,
            pump: Mutex::new(Some(pump)),
            watchdog_reporter,
            running: AtomicBool::new(false),
        })
    }

    /// Runs the session loop until stop, OS signal, or retry exhaustion,
    /// then performs the full stop sequence. Returns the loop's outcome.
    pub async fn run(&self) -> Result<(), ClientError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(ClientError::AlreadyRunning);
        }

        let supervisor_run = self.supervisor.run(self.token.clone());
        tokio::pin!(supervisor_run);

        let result = tokio::select! {
            res = &mut supervisor_run => res,
            signal = wait_for_shutdown_signal() => {
                match signal {
                    Ok(()) => self.stop(),
                    // Handler registration failed: keep running, the loop
                    // can still be stopped explicitly.
                    Err(e) => warn!(error = %e, "signal_handler_unavailable"),
                }
                supervisor_run.await
            }
        };

        self.finalize().await;
        result
    }

    /// Requests shutdown. Idempotent, callable from any thread; the running
    /// loop performs the actual teardown.
    pub fn stop(&self) {
        if self.state.transition(ConnectionState::Stopping).is_ok() {
            self.bus.publish(
                Event::now(EventKind::StateChanged).with_state(ConnectionState::Stopping),
            );
            self.bus.publish(Event::now(EventKind::ShutdownRequested));
            info!("stop_requested");
        }
        self.token.cancel();
    }

    /// Sends a text frame.
    pub async fn send_text(&self, text: &str) -> Result<(), ClientError> {
        Ok(self.writer.send(FrameKind::Text, text.as_bytes()).await?)
    }

    /// Sends a binary frame.
    pub async fn send_binary(&self, data: &[u8]) -> Result<(), ClientError> {
        Ok(self.writer.send(FrameKind::Binary, data).await?)
    }

    /// Sends a control ping with the configured write deadline.
    pub async fn send_ping(&self, data: &[u8]) -> Result<(), ClientError> {
        Ok(self.writer.send(FrameKind::Ping, data).await?)
    }

    /// Best-effort liveness probe (write-control ping, 5 s deadline).
    pub async fn probe(&self) -> Result<(), ClientError> {
        Ok(self.writer.probe().await?)
    }

    /// Current lifecycle state (lock-free read).
    pub fn state(&self) -> ConnectionState {
        self.state.load()
    }

    /// True while a live transport handle exists.
    pub fn is_connected(&self) -> bool {
        self.state.load() == ConnectionState::Connected
    }

    /// The session id, stable across reconnects.
    pub fn session_id(&self) -> &SessionId {
        &self.session
    }

    /// Live counters.
    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Point-in-time copy of all counters and the error book.
    pub fn stats_snapshot(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.cfg
    }

    /// Bound telemetry addresses `(metrics, health)` when monitoring is on.
    pub fn telemetry_addrs(&self) -> Option<(SocketAddr, SocketAddr)> {
        self.telemetry_addrs
    }

    /// The stop sequence tail: telemetry down within its budget, audit log
    /// closed with the session-end marker, terminal state published,
    /// subscriber queues drained.
    async fn finalize(&self) {
        let _ = self.state.transition(ConnectionState::Stopping);
        self.token.cancel();

        if let Some(servers) = self.telemetry.lock().await.take() {
            if let Err(e) = servers.shutdown(TELEMETRY_SHUTDOWN_BUDGET).await {
                warn!(error = %e, "telemetry_shutdown_overran");
            }
        }

        if let Some(audit) = &self.audit {
            audit.close();
        }

        let _ = self.state.transition(ConnectionState::Stopped);
        self.bus.publish(
            Event::now(EventKind::StateChanged).with_state(ConnectionState::Stopped),
        );
        self.bus.publish(Event::now(EventKind::Stopped));
        info!(session = %self.session, "stopped");

        if let Some(pump) = self.pump.lock().await.take() {
            let _ = tokio::time::timeout(SUBSCRIBER_DRAIN_BUDGET, pump).await;
        }
        self.watchdog_reporter.abort();
    }
}

/// Forwards bus events into the subscriber set until the terminal event,
/// then drains the workers.
fn spawn_pump(
    mut rx: broadcast::Receiver<Event>,
    set: SubscriberSet,
    bus: Bus,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(ev) => {
                    let terminal = ev.kind == EventKind::Stopped;
                    set.emit_arc(Arc::new(ev), &bus);
                    if terminal {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Closed) => break,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "subscriber_pump_lagged");
                }
            }
        }
        set.shutdown().await;
    })
}
