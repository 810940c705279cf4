//! # Client configuration.
//!
//! Provides [`ClientConfig`]: every knob of the connection lifecycle engine
//! in one immutable-after-construction struct. The client validates it once
//! (see [`ClientConfig::validate`]) and then shares it freely.
//!
//! ## Sentinel values
//! - `max_retries = 0` → five fast retries, then unlimited slow retries
//! - `disable_auto_ping = true` → no heartbeat task; server pings are still
//!   answered and read deadlines still re-arm
//!
//! ## Field semantics
//! All fields are public for flexibility; prefer the accessors where a
//! sentinel is involved so the `0` checks stay in one place.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ClientError, ErrorKind};

/// Default number of fast retries (`max_retries = 0` also resolves to this
/// for the fast phase, followed by unlimited slow retries).
pub const DEFAULT_MAX_RETRIES: u32 = 5;
/// Default slow-retry delay.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(3);
/// Bounds for the slow-retry delay.
pub const RETRY_DELAY_MIN: Duration = Duration::from_secs(1);
pub const RETRY_DELAY_MAX: Duration = Duration::from_secs(60);
/// Default per-operation deadlines.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);
/// Default heartbeat interval.
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(30);
/// Default read/write buffer sizes.
pub const DEFAULT_BUFFER_SIZE: usize = 4096;
/// Default inbound/outbound frame ceiling.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 32 * 1024;

/// How to treat the server certificate on `wss://` endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsPolicy {
    /// Accept any certificate without logging.
    SkipVerifyQuiet,
    /// Accept any certificate, warn once per dial.
    SkipVerifyWarn,
    /// Full certificate verification.
    ForceVerify,
}

impl TlsPolicy {
    /// True when certificate verification is disabled.
    pub fn skips_verification(&self) -> bool {
        matches!(self, TlsPolicy::SkipVerifyQuiet | TlsPolicy::SkipVerifyWarn)
    }
}

/// Telemetry HTTP surface settings.
#[derive(Debug, Clone)]
pub struct MonitoringConfig {
    /// Master switch; when false no HTTP servers are spawned.
    pub enabled: bool,
    /// Port for `GET /metrics` (Prometheus text). Default 9090.
    pub metrics_port: u16,
    /// Port for `GET /health`, `/ready`, `/stats`. Default 8080.
    pub health_port: u16,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            metrics_port: 9090,
            health_port: 8080,
        }
    }
}

/// Outbound-message rate limiting (sliding window).
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum sends allowed inside one window.
    pub max_requests: usize,
    /// Window length.
    pub window: Duration,
}

impl Default for RateLimitConfig {
    /// 100 requests per minute.
    fn default() -> Self {
        Self {
            max_requests: 100,
            window: Duration::from_secs(60),
        }
    }
}

/// Immutable configuration for a [`WsClient`](crate::WsClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Target endpoint; must begin with `ws://` or `wss://`.
    pub url: String,

    /// Fast-retry count N. Attempts 1..=N reconnect without delay, attempts
    /// N+1..=2N wait `retry_delay`, then the loop gives up. `0` means five
    /// fast retries followed by unlimited slow retries.
    pub max_retries: u32,

    /// Delay between slow-phase attempts. Clamped to 1–60 s by `validate`.
    pub retry_delay: Duration,

    /// Deadline for one dial + WebSocket handshake.
    pub handshake_timeout: Duration,

    /// Deadline re-armed on every successful frame read.
    pub read_timeout: Duration,

    /// Deadline for one serialized transport write.
    pub write_timeout: Duration,

    /// Heartbeat ping period. Keep below `read_timeout` so an idle but
    /// healthy peer keeps the session alive.
    pub ping_interval: Duration,

    /// Disables the heartbeat task. Incoming pings are still answered.
    pub disable_auto_ping: bool,

    /// Transport read buffer hint.
    pub read_buffer_size: usize,

    /// Transport write buffer hint.
    pub write_buffer_size: usize,

    /// Frames larger than this fail with `MessageTooLarge`, inbound and
    /// outbound alike. A frame of exactly this size is accepted.
    pub max_message_size: usize,

    /// Certificate handling for `wss://` endpoints.
    pub tls: TlsPolicy,

    /// Audit-log path. `None` disables the per-frame audit record.
    pub log_file: Option<PathBuf>,

    /// Telemetry HTTP surface.
    pub monitoring: MonitoringConfig,

    /// Outbound rate limiting.
    pub rate_limit: RateLimitConfig,

    /// Lower-cased substrings rejected in outbound/inbound text frames.
    pub blocked_patterns: Vec<String>,

    /// Event-bus ring capacity.
    pub bus_capacity: usize,

    /// Consult the recovery selector after recoverable writer-gate failures.
    pub auto_recover: bool,

    /// A lock held longer than this is reported as a potential deadlock.
    pub lock_watchdog_threshold: Duration,
}

impl ClientConfig {
    /// Creates a configuration for `url` with the documented defaults.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            ping_interval: DEFAULT_PING_INTERVAL,
            disable_auto_ping: false,
            read_buffer_size: DEFAULT_BUFFER_SIZE,
            write_buffer_size: DEFAULT_BUFFER_SIZE,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            tls: TlsPolicy::SkipVerifyWarn,
            log_file: None,
            monitoring: MonitoringConfig::default(),
            rate_limit: RateLimitConfig::default(),
            blocked_patterns: default_blocked_patterns(),
            bus_capacity: 1024,
            auto_recover: true,
            lock_watchdog_threshold: Duration::from_secs(30),
        }
    }

    /// Checks the configuration before any dial.
    ///
    /// - URL scheme must be `ws://` or `wss://` (`invalid_url`).
    /// - `retry_delay` must lie within 1–60 s (`invalid_config`).
    /// - Buffer and message-size fields must be non-zero (`invalid_config`).
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.url.is_empty() {
            return Err(config_err(ErrorKind::MissingParameter, "url is required"));
        }
        if !self.url.starts_with("ws://") && !self.url.starts_with("wss://") {
            return Err(config_err(
                ErrorKind::InvalidUrl,
                format!("url must start with ws:// or wss://, got {:?}", self.url),
            ));
        }
        if self.retry_delay < RETRY_DELAY_MIN || self.retry_delay > RETRY_DELAY_MAX {
            return Err(config_err(
                ErrorKind::InvalidConfig,
                format!("retry_delay {:?} outside 1s..=60s", self.retry_delay),
            ));
        }
        if self.max_message_size == 0 {
            return Err(config_err(
                ErrorKind::InvalidConfig,
                "max_message_size must be non-zero",
            ));
        }
        if self.read_buffer_size == 0 || self.write_buffer_size == 0 {
            return Err(config_err(
                ErrorKind::InvalidConfig,
                "buffer sizes must be non-zero",
            ));
        }
        if self.handshake_timeout.is_zero()
            || self.read_timeout.is_zero()
            || self.write_timeout.is_zero()
        {
            return Err(config_err(
                ErrorKind::InvalidConfig,
                "timeouts must be non-zero",
            ));
        }
        Ok(())
    }

    /// Fast-retry ceiling with the `max_retries = 0` sentinel resolved.
    #[inline]
    pub fn fast_retry_limit(&self) -> u32 {
        if self.max_retries == 0 {
            DEFAULT_MAX_RETRIES
        } else {
            self.max_retries
        }
    }

    /// True when the retry loop never gives up on its own.
    #[inline]
    pub fn unlimited_retries(&self) -> bool {
        self.max_retries == 0
    }

    /// Bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

fn config_err(kind: ErrorKind, reason: impl Into<String>) -> ClientError {
    let reason = reason.into();
    match kind {
        ErrorKind::InvalidUrl => ClientError::Connection(crate::error::ConnectionError::new(
            kind,
            crate::error::Op::Connect,
            "",
            reason,
        )),
        _ => ClientError::Config { reason },
    }
}

/// The default text-frame blocklist: XSS-ish substrings the security checker
/// rejects case-insensitively.
pub fn default_blocked_patterns() -> Vec<String> {
    [
        "<script",
        "javascript:",
        "eval(",
        "document.cookie",
        "window.location",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
