//! # Message security checks.
//!
//! Two checks on every validated frame:
//! - a size ceiling, against memory-exhaustion payloads;
//! - a lower-cased substring blocklist on text frames, against script
//!   injection attempts travelling through the socket.
//!
//! Hits bump a suspicious-activity counter that surfaces in `/stats`.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{ConnectionError, ErrorKind, Op};
use crate::processor::FrameKind;

/// Blocklist-based content checker.
#[derive(Debug)]
pub struct SecurityChecker {
    max_message_size: usize,
    /// Patterns stored lower-cased; matching is case-insensitive.
    blocked_patterns: Vec<String>,
    suspicious_count: AtomicU64,
}

impl SecurityChecker {
    pub fn new(max_message_size: usize, patterns: &[String]) -> Self {
        Self {
            max_message_size,
            blocked_patterns: patterns.iter().map(|p| p.to_ascii_lowercase()).collect(),
            suspicious_count: AtomicU64::new(0),
        }
    }

    /// Checks one frame. Oversize fails `MessageTooLarge`; a blocklist hit
    /// on a text frame fails `SuspiciousActivity`.
    pub fn check(&self, frame: FrameKind, data: &[u8]) -> Result<(), ConnectionError> {
        if data.len() > self.max_message_size {
            self.suspicious_count.fetch_add(1, Ordering::Relaxed);
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

        if frame == FrameKind::Text {
            let content = String::from_utf8_lossy(data).to_ascii_lowercase();
            for pattern in &self.blocked_patterns {
                if content.contains(pattern.as_str()) {
                    self.suspicious_count.fetch_add(1, Ordering::Relaxed);
                    return Err(ConnectionError::new(
                        ErrorKind::SuspiciousActivity,
                        Op::Send,
                        "",
                        format!("blocked content pattern: {pattern}"),
                    ));
                }
            }
        }

        Ok(())
    }

    /// Suspicious events observed so far.
    pub fn suspicious_count(&self) -> u64 {
        self.suspicious_count.load(Ordering::Relaxed)
    }
}
