//! # Message processing.
//!
//! [`MessageProcessor`] is the seam between the transport loops and message
//! policy. The reader runs `process` on every inbound frame, in exact
//! arrival order; the writer gate runs `validate` before anything touches
//! the wire.
//!
//! [`DefaultProcessor`] wires the size ceiling, the rate limiter and the
//! security checker together. Swap in your own implementation through
//! [`WsClient::builder-style construction`](crate::WsClient) if frames need
//! parsing or transformation before your hooks see them.
//!
//! ## Rules
//! - `process` is called exactly once per received frame, never reordered.
//! - `validate` rejects before any bytes are written; a rejected send has
//!   no wire effect and no counter movement.
//! - Rate limiting applies to the send path only; a chatty peer must not be
//!   able to starve our own reads.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::ClientConfig;
use crate::error::{ConnectionError, ErrorKind, Op};
use crate::guard::{RateLimiter, SecurityChecker};

/// WebSocket frame categories the engine distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Text,
    Binary,
    Ping,
    Pong,
    Close,
}

impl FrameKind {
    /// Label used in audit-log lines.
    pub fn as_label(&self) -> &'static str {
        match self {
            FrameKind::Text => "TEXT",
            FrameKind::Binary => "BINARY",
            FrameKind::Ping => "PING",
            FrameKind::Pong => "PONG",
            FrameKind::Close => "CLOSE",
        }
    }

    /// Ping, pong and close.
    pub fn is_control(&self) -> bool {
        matches!(self, FrameKind::Ping | FrameKind::Pong | FrameKind::Close)
    }

    /// Text and binary.
    pub fn is_data(&self) -> bool {
        !self.is_control()
    }
}

impl std::fmt::Display for FrameKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Frame-level policy seam.
pub trait MessageProcessor: Send + Sync {
    /// Pre-send validation. Runs inside the writer gate, before any write.
    fn validate(&self, frame: FrameKind, data: &[u8]) -> Result<(), ConnectionError>;

    /// Inbound processing and accounting. Runs in the reader, in arrival
    /// order, once per frame.
    fn process(&self, frame: FrameKind, data: &[u8]) -> Result<(), ConnectionError>;
}

/// Size + rate + content checks, with processed/validated counters.
pub struct DefaultProcessor {
    max_message_size: usize,
    rate: RateLimiter,
    security: SecurityChecker,
    processed: AtomicU64,
}

impl DefaultProcessor {
    pub fn new(cfg: &ClientConfig) -> Self {
        Self {
            max_message_size: cfg.max_message_size,
            rate: RateLimiter::new(&cfg.rate_limit),
            security: SecurityChecker::new(cfg.max_message_size, &cfg.blocked_patterns),
            processed: AtomicU64::new(0),
        }
    }

    /// Frames that went through `process` so far.
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Suspicious-content events observed so far.
    pub fn suspicious_count(&self) -> u64 {
        self.security.suspicious_count()
    }

    fn check_size(&self, data: &[u8]) -> Result<(), ConnectionError> {
        if data.len() > self.max_message_size {
            return Err(ConnectionError::new(
                ErrorKind::MessageTooLarge,
                Op::Send,
                "",
                format!(
                    "message size {} exceeds limit {}",
                    data.len(),
                    self.max_message_size
                ),
            ));
        }
        Ok(())
    }
}

impl MessageProcessor for DefaultProcessor {
    fn validate(&self, frame: FrameKind, data: &[u8]) -> Result<(), ConnectionError> {
        self.check_size(data)?;
        if !self.rate.allow() {
            let (used, max) = self.rate.usage();
            return Err(ConnectionError::new(
                ErrorKind::RateLimitExceeded,
                Op::Send,
                "",
                format!("rate limit reached ({used}/{max} in window)"),
            ));
        }
        self.security.check(frame, data)
    }

    fn process(&self, frame: FrameKind, data: &[u8]) -> Result<(), ConnectionError> {
        self.check_size(data)?;
        self.security.check(frame, data).map_err(|mut e| {
            e.op = Op::Recv;
            e
        })?;
        self.processed.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;

    fn processor(max_message_size: usize) -> DefaultProcessor {
        let mut cfg = ClientConfig::new("ws://example.test");
        cfg.max_message_size = max_message_size;
        DefaultProcessor::new(&cfg)
    }

    #[test]
    fn boundary_size_is_accepted_one_past_is_not() {
        let p = processor(10);
        assert!(p.validate(FrameKind::Text, &[b'x'; 10]).is_ok());
        let err = p.validate(FrameKind::Text, &[b'x'; 11]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MessageTooLarge);
    }

    #[test]
    fn rate_limit_applies_to_validate_only() {
        let mut cfg = ClientConfig::new("ws://example.test");
        cfg.rate_limit.max_requests = 2;
        let p = DefaultProcessor::new(&cfg);

        assert!(p.validate(FrameKind::Text, b"a").is_ok());
        assert!(p.validate(FrameKind::Text, b"b").is_ok());
        let err = p.validate(FrameKind::Text, b"c").unwrap_err();
        assert_eq!(err.kind, ErrorKind::RateLimitExceeded);

        // Inbound processing keeps flowing regardless.
        for _ in 0..10 {
            assert!(p.process(FrameKind::Text, b"inbound").is_ok());
        }
        assert_eq!(p.processed(), 10);
    }

    #[test]
    fn inbound_violations_are_tagged_as_recv() {
        let p = processor(1024);
        let err = p
            .process(FrameKind::Text, b"eval(document.cookie)")
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::SuspiciousActivity);
        assert_eq!(err.op, Op::Recv);
    }
}
