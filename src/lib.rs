//! # wsvisor
//!
//! **wsvisor** is a long-running WebSocket client built around a supervised
//! connection lifecycle: one endpoint, one live transport handle, and a
//! state machine that knows exactly what to do when the wire misbehaves.
//!
//! ## Features
//!
//! | Area               | Description                                                      | Key types / traits                          |
//! |--------------------|------------------------------------------------------------------|---------------------------------------------|
//! | **Lifecycle**      | Dial, handshake, reconnect and graceful stop under one loop.     | [`WsClient`], [`ConnectionState`]           |
//! | **Retry pacing**   | Two-phase fast/slow progression with a hard or unlimited ceiling.| [`RetryPolicy`], [`RetryDecision`]          |
//! | **Error taxonomy** | Closed error set with stable codes and a pure recovery table.    | [`ErrorKind`], [`RecoveryStrategy`]         |
//! | **Frame pipeline** | Serialized writes, ordered reads, heartbeat keepalive.           | [`MessageProcessor`], [`FrameKind`]         |
//! | **Observability**  | Event bus, user hooks, Prometheus + health HTTP surface.         | [`Subscribe`], [`Hooks`], [`Event`]         |
//! | **Audit trail**    | Optional per-frame file record with session markers.             | [`ClientConfig::log_file`]                  |
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use wsvisor::{ClientConfig, LogSubscriber, Subscribe, WsClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut cfg = ClientConfig::new("wss://echo.example/ws");
//!     cfg.monitoring.enabled = true;
//!
//!     let subscribers: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogSubscriber)];
//!     let client = Arc::new(WsClient::new(cfg, subscribers).await?);
//!
//!     let sender = Arc::clone(&client);
//!     tokio::spawn(async move {
//!         let _ = sender.send_text("hello").await;
//!     });
//!
//!     // Runs until stop(), an OS signal, or retry exhaustion.
//!     client.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ---

mod audit;
mod classify;
mod client;
mod config;
mod core;
mod error;
mod events;
mod guard;
mod policies;
mod pool;
mod processor;
mod recovery;
mod session;
mod state;
mod stats;
mod subscribers;
mod telemetry;
mod transport;
mod watchdog;

// ---- Public re-exports ----

pub use audit::{default_log_name, validate_log_path, AuditLog, Direction};
pub use classify::{classify, classify_io, classify_message};
pub use client::WsClient;
pub use config::{ClientConfig, MonitoringConfig, RateLimitConfig, TlsPolicy};
pub use error::{ClientError, ConnectionError, ErrorKind, Op, RetryError};
pub use events::{Bus, Event, EventKind};
pub use guard::{RateLimiter, SecurityChecker};
pub use policies::{RetryDecision, RetryPhase, RetryPolicy};
pub use pool::{BufferPool, PooledBuf};
pub use processor::{DefaultProcessor, FrameKind, MessageProcessor};
pub use recovery::{strategy_for, RecoveryHistory, RecoveryStrategy};
pub use session::SessionId;
pub use state::{ConnectionState, StateCell};
pub use stats::{ErrorBook, ErrorBookSnapshot, ErrorCount, ErrorTrendPoint, Stats, StatsSnapshot};
pub use subscribers::{HookSubscriber, Hooks, LogSubscriber, Subscribe, SubscriberSet};
pub use telemetry::render_metrics;
pub use transport::{Connect, WriterGate, WsConnector, WsStream};
pub use watchdog::LockWatchdog;
