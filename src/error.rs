//! # Error types used by the client runtime.
//!
//! Three layers:
//!
//! - [`ErrorKind`] the closed taxonomy every failure is mapped into. Each
//!   kind carries a stable numeric code used in telemetry labels.
//! - [`ConnectionError`] a failure on the wire or in validation, tagged with
//!   the operation and target URL.
//! - [`RetryError`] the terminal failure of the reconnect loop.
//!
//! [`ClientError`] is the top-level enum returned by the public API.
//! All types provide `as_label()` for logs/metrics, and [`ErrorKind`]
//! exposes `is_retryable()` used by the writer gate and supervisor.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Closed set of failure categories.
///
/// The numeric codes are stable and grouped by class:
/// `1xxx` connection, `2xxx` message, `3xxx` retry, `4xxx` configuration,
/// `5xxx` system, `6xxx` security.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ConnectionRefused,
    ConnectionTimeout,
    ConnectionLost,
    HandshakeFailed,
    InvalidUrl,
    TlsError,
    DnsError,
    MessageTooLarge,
    InvalidMessage,
    SendTimeout,
    ReceiveTimeout,
    EncodingError,
    MaxRetriesExceeded,
    RetryTimeout,
    InvalidConfig,
    MissingParameter,
    FileSystemError,
    MemoryError,
    SecurityViolation,
    RateLimitExceeded,
    SuspiciousActivity,
    Unknown,
}

impl ErrorKind {
    /// Stable numeric code for telemetry labels.
    pub fn code(&self) -> u16 {
        match self {
            ErrorKind::ConnectionRefused => 1001,
            ErrorKind::ConnectionTimeout => 1002,
            ErrorKind::ConnectionLost => 1003,
            ErrorKind::HandshakeFailed => 1004,
            ErrorKind::InvalidUrl => 1005,
            ErrorKind::TlsError => 1006,
            ErrorKind::DnsError => 1007,
            ErrorKind::MessageTooLarge => 2001,
            ErrorKind::InvalidMessage => 2002,
            ErrorKind::SendTimeout => 2003,
            ErrorKind::ReceiveTimeout => 2004,
            ErrorKind::EncodingError => 2005,
            ErrorKind::MaxRetriesExceeded => 3001,
            ErrorKind::RetryTimeout => 3002,
            ErrorKind::InvalidConfig => 4001,
            ErrorKind::MissingParameter => 4002,
            ErrorKind::FileSystemError => 5001,
            ErrorKind::MemoryError => 5002,
            ErrorKind::SecurityViolation => 6001,
            ErrorKind::RateLimitExceeded => 6002,
            ErrorKind::SuspiciousActivity => 6003,
            ErrorKind::Unknown => 5999,
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ErrorKind::ConnectionRefused => "connection_refused",
            ErrorKind::ConnectionTimeout => "connection_timeout",
            ErrorKind::ConnectionLost => "connection_lost",
            ErrorKind::HandshakeFailed => "handshake_failed",
            ErrorKind::InvalidUrl => "invalid_url",
            ErrorKind::TlsError => "tls_error",
            ErrorKind::DnsError => "dns_error",
            ErrorKind::MessageTooLarge => "message_too_large",
            ErrorKind::InvalidMessage => "invalid_message",
            ErrorKind::SendTimeout => "send_timeout",
            ErrorKind::ReceiveTimeout => "receive_timeout",
            ErrorKind::EncodingError => "encoding_error",
            ErrorKind::MaxRetriesExceeded => "max_retries_exceeded",
            ErrorKind::RetryTimeout => "retry_timeout",
            ErrorKind::InvalidConfig => "invalid_config",
            ErrorKind::MissingParameter => "missing_parameter",
            ErrorKind::FileSystemError => "file_system_error",
            ErrorKind::MemoryError => "memory_error",
            ErrorKind::SecurityViolation => "security_violation",
            ErrorKind::RateLimitExceeded => "rate_limit_exceeded",
            ErrorKind::SuspiciousActivity => "suspicious_activity",
            ErrorKind::Unknown => "unknown",
        }
    }

    /// Indicates whether a failure of this kind is safe to retry.
    ///
    /// Mirrors the recovery table: network and timeout classes retry,
    /// content/security/terminal classes do not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::ConnectionRefused
                | ErrorKind::ConnectionTimeout
                | ErrorKind::ConnectionLost
                | ErrorKind::HandshakeFailed
                | ErrorKind::DnsError
                | ErrorKind::TlsError
                | ErrorKind::SendTimeout
                | ErrorKind::ReceiveTimeout
                | ErrorKind::Unknown
        )
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Operation during which a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Connect,
    Send,
    Recv,
    Handshake,
    Close,
}

impl Op {
    pub fn as_label(&self) -> &'static str {
        match self {
            Op::Connect => "connect",
            Op::Send => "send",
            Op::Recv => "recv",
            Op::Handshake => "handshake",
            Op::Close => "close",
        }
    }
}

impl std::fmt::Display for Op {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_label())
    }
}

/// A failure on the wire or in pre-send validation.
///
/// Carries the classified [`ErrorKind`], the operation, the target URL, and
/// optionally the underlying cause.
#[derive(Error, Debug)]
#[error("[{}] {} [{}] {}: {}", .kind.code(), .kind, .op, .url, .message)]
pub struct ConnectionError {
    /// Classified failure category.
    pub kind: ErrorKind,
    /// Operation that failed.
    pub op: Op,
    /// Target URL at the time of failure.
    pub url: String,
    /// Human-readable detail.
    pub message: String,
    /// Whether the supervisor may retry after this failure.
    pub retryable: bool,
    /// Underlying cause, if any.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl ConnectionError {
    /// Creates an error with retryability derived from the kind.
    pub fn new(kind: ErrorKind, op: Op, url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            op,
            url: url.into(),
            message: message.into(),
            retryable: kind.is_retryable(),
            source: None,
        }
    }

    /// Attaches the underlying cause.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

/// Terminal failure of the reconnect loop.
#[derive(Error, Debug)]
#[error("{kind} after {attempts} attempt(s) (limit {max_attempts}): {message}")]
pub struct RetryError {
    /// `MaxRetriesExceeded` or `RetryTimeout`.
    pub kind: ErrorKind,
    /// Attempts performed before giving up.
    pub attempts: u32,
    /// Configured attempt ceiling (fast + slow).
    pub max_attempts: u32,
    /// Last connection failure observed, rendered.
    pub message: String,
}

/// Errors returned by the public client API.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ClientError {
    /// A wire or validation failure.
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// The reconnect loop gave up.
    #[error(transparent)]
    RetriesExhausted(#[from] RetryError),

    /// Configuration rejected before any dial.
    #[error("invalid configuration: {reason}")]
    Config {
        /// What was wrong.
        reason: String,
    },

    /// `run()` called while a session loop is already active.
    #[error("client is already running")]
    AlreadyRunning,

    /// Telemetry servers did not stop within the shutdown budget.
    #[error("telemetry shutdown exceeded {budget:?}")]
    TelemetryShutdown {
        /// The configured shutdown budget.
        budget: Duration,
    },
}

impl ClientError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ClientError::Connection(e) => e.kind.as_label(),
            ClientError::RetriesExhausted(_) => "max_retries_exceeded",
            ClientError::Config { .. } => "invalid_config",
            ClientError::AlreadyRunning => "already_running",
            ClientError::TelemetryShutdown { .. } => "telemetry_shutdown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable_and_unique() {
        let kinds = [
            ErrorKind::ConnectionRefused,
            ErrorKind::ConnectionTimeout,
            ErrorKind::ConnectionLost,
            ErrorKind::HandshakeFailed,
            ErrorKind::InvalidUrl,
            ErrorKind::TlsError,
            ErrorKind::DnsError,
            ErrorKind::MessageTooLarge,
            ErrorKind::InvalidMessage,
            ErrorKind::SendTimeout,
            ErrorKind::ReceiveTimeout,
            ErrorKind::EncodingError,
            ErrorKind::MaxRetriesExceeded,
            ErrorKind::RetryTimeout,
            ErrorKind::InvalidConfig,
            ErrorKind::MissingParameter,
            ErrorKind::FileSystemError,
            ErrorKind::MemoryError,
            ErrorKind::SecurityViolation,
            ErrorKind::RateLimitExceeded,
            ErrorKind::SuspiciousActivity,
            ErrorKind::Unknown,
        ];
        let mut codes: Vec<u16> = kinds.iter().map(|k| k.code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), kinds.len());
        assert_eq!(ErrorKind::ConnectionTimeout.code(), 1002);
        assert_eq!(ErrorKind::MessageTooLarge.code(), 2001);
        assert_eq!(ErrorKind::MaxRetriesExceeded.code(), 3001);
    }

    #[test]
    fn display_carries_code_op_and_url() {
        let err = ConnectionError::new(
            ErrorKind::ConnectionRefused,
            Op::Connect,
            "ws://localhost:9",
            "connection refused",
        );
        let rendered = err.to_string();
        assert!(rendered.contains("[1001]"));
        assert!(rendered.contains("[connect]"));
        assert!(rendered.contains("ws://localhost:9"));
        assert!(err.retryable);
    }

    #[test]
    fn security_class_is_not_retryable() {
        assert!(!ErrorKind::SuspiciousActivity.is_retryable());
        assert!(!ErrorKind::RateLimitExceeded.is_retryable());
        assert!(!ErrorKind::MessageTooLarge.is_retryable());
        assert!(ErrorKind::ConnectionLost.is_retryable());
    }
}
