//! # Recovery strategy selection.
//!
//! [`strategy_for`] is the pure `ErrorKind → RecoveryStrategy` table the
//! supervisor and writer gate consult after a classified failure:
//!
//! ```text
//! network class    (refused / timeout / lost / dns / tls)  → Reconnect
//! timeout-on-live  (send / recv timeout, handshake)        → Reset
//! content class    (too-large / invalid / encoding)        → Fallback
//! rate & security  (rate-limit / violation / suspicious)   → None
//! retry-terminal   (max-retries / retry-timeout)           → None
//! unknown                                                  → Retry
//! ```
//!
//! [`RecoveryHistory`] keeps per-kind counts of strategy consultations so
//! repeated failures of one class are visible in logs; it resets on every
//! successful connection, together with the retry counter.

use dashmap::DashMap;

use crate::error::ErrorKind;

/// The supervisor's response policy for a classified failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStrategy {
    /// Surface the error; do not retry.
    None,
    /// Try the same operation again.
    Retry,
    /// Tear down and re-establish the connection.
    Reconnect,
    /// Reset connection state, then reconnect.
    Reset,
    /// Degrade: the operation fails but the session lives.
    Fallback,
}

impl RecoveryStrategy {
    pub fn as_label(&self) -> &'static str {
        match self {
            RecoveryStrategy::None => "none",
            RecoveryStrategy::Retry => "retry",
            RecoveryStrategy::Reconnect => "reconnect",
            RecoveryStrategy::Reset => "reset",
            RecoveryStrategy::Fallback => "fallback",
        }
    }
}

impl std::fmt::Display for RecoveryStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Selects the recovery strategy for a failure kind. Pure.
pub fn strategy_for(kind: ErrorKind) -> RecoveryStrategy {
    use ErrorKind::*;
    match kind {
        ConnectionRefused | ConnectionTimeout | ConnectionLost | DnsError | TlsError => {
            RecoveryStrategy::Reconnect
        }
        SendTimeout | ReceiveTimeout | HandshakeFailed => RecoveryStrategy::Reset,
        MessageTooLarge | InvalidMessage | EncodingError => RecoveryStrategy::Fallback,
        RateLimitExceeded | SecurityViolation | SuspiciousActivity => RecoveryStrategy::None,
        MaxRetriesExceeded | RetryTimeout => RecoveryStrategy::None,
        InvalidUrl | InvalidConfig | MissingParameter | FileSystemError | MemoryError => {
            RecoveryStrategy::None
        }
        Unknown => RecoveryStrategy::Retry,
    }
}

/// Per-kind counts of recovery consultations within one connection epoch.
#[derive(Debug, Default)]
pub struct RecoveryHistory {
    counts: DashMap<ErrorKind, u64>,
}

impl RecoveryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one consultation for `kind`, returning the running count.
    pub fn observe(&self, kind: ErrorKind) -> u64 {
        let mut entry = self.counts.entry(kind).or_insert(0);
        *entry += 1;
        *entry
    }

    /// Current count for `kind`.
    pub fn count(&self, kind: ErrorKind) -> u64 {
        self.counts.get(&kind).map(|e| *e).unwrap_or(0)
    }

    /// Clears all counts. Called on every successful Connected transition.
    pub fn reset(&self) {
        self.counts.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_matches_the_design() {
        assert_eq!(
            strategy_for(ErrorKind::ConnectionRefused),
            RecoveryStrategy::Reconnect
        );
        assert_eq!(
            strategy_for(ErrorKind::DnsError),
            RecoveryStrategy::Reconnect
        );
        assert_eq!(strategy_for(ErrorKind::SendTimeout), RecoveryStrategy::Reset);
        assert_eq!(
            strategy_for(ErrorKind::MessageTooLarge),
            RecoveryStrategy::Fallback
        );
        assert_eq!(
            strategy_for(ErrorKind::SuspiciousActivity),
            RecoveryStrategy::None
        );
        assert_eq!(
            strategy_for(ErrorKind::MaxRetriesExceeded),
            RecoveryStrategy::None
        );
        assert_eq!(strategy_for(ErrorKind::Unknown), RecoveryStrategy::Retry);
    }

    #[test]
    fn selection_is_pure() {
        for kind in [
            ErrorKind::ConnectionLost,
            ErrorKind::ReceiveTimeout,
            ErrorKind::EncodingError,
            ErrorKind::Unknown,
        ] {
            let first = strategy_for(kind);
            for _ in 0..5 {
                assert_eq!(strategy_for(kind), first);
            }
        }
    }

    #[test]
    fn history_counts_and_resets() {
        let history = RecoveryHistory::new();
        assert_eq!(history.observe(ErrorKind::ConnectionLost), 1);
        assert_eq!(history.observe(ErrorKind::ConnectionLost), 2);
        assert_eq!(history.observe(ErrorKind::TlsError), 1);
        assert_eq!(history.count(ErrorKind::ConnectionLost), 2);
        history.reset();
        assert_eq!(history.count(ErrorKind::ConnectionLost), 0);
    }
}
