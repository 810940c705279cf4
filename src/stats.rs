//! # Session statistics and the error book.
//!
//! [`Stats`] holds the scalar counters as lock-free atomics: any writer,
//! any reader, never decreasing. The embedded [`ErrorBook`] is the only
//! mutex-protected piece (a kind→count map, the last-error record, and a
//! bounded trend ring) with append-only critical sections. Readers clone
//! under the lock and format after releasing it.
//!
//! ## Rules
//! - Counters are monotonic; nothing here ever decrements.
//! - The trend ring holds at most [`ERROR_TREND_CAP`] points; the oldest is
//!   evicted on overflow.
//! - `connected_at` doubles as the active-connection gauge: set on connect,
//!   cleared on disconnect.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;

use crate::error::ErrorKind;
use crate::watchdog::LockWatchdog;

/// Upper bound of the error-trend ring.
pub const ERROR_TREND_CAP: usize = 1000;

/// One point of the rolling error trend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorTrendPoint {
    pub at: DateTime<Utc>,
    pub kind: ErrorKind,
}

#[derive(Debug, Default)]
struct ErrorBookInner {
    last_error: Option<String>,
    last_error_kind: Option<ErrorKind>,
    last_error_at: Option<DateTime<Utc>>,
    by_kind: HashMap<ErrorKind, u64>,
    trend: VecDeque<ErrorTrendPoint>,
}

/// Mutable record of error counts, last error, and bounded trend.
#[derive(Debug)]
pub struct ErrorBook {
    total: AtomicU64,
    inner: Mutex<ErrorBookInner>,
    watchdog: Option<Arc<LockWatchdog>>,
}

impl ErrorBook {
    pub fn new() -> Self {
        Self {
            total: AtomicU64::new(0),
            inner: Mutex::new(ErrorBookInner::default()),
            watchdog: None,
        }
    }

    pub fn with_watchdog(mut self, watchdog: Arc<LockWatchdog>) -> Self {
        self.watchdog = Some(watchdog);
        self
    }

    /// Records one failure: bumps the total and the per-kind count, updates
    /// the last-error record, appends a trend point (evicting the oldest
    /// past the cap).
    pub fn record(&self, kind: ErrorKind, message: impl Into<String>) {
        self.total.fetch_add(1, Ordering::Relaxed);

        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let _held = self.watchdog.as_ref().map(|w| w.observe("error_book"));
        let now = Utc::now();

        *inner.by_kind.entry(kind).or_insert(0) += 1;
        inner.last_error = Some(message.into());
        inner.last_error_kind = Some(kind);
        inner.last_error_at = Some(now);
        if inner.trend.len() == ERROR_TREND_CAP {
            inner.trend.pop_front();
        }
        inner.trend.push_back(ErrorTrendPoint { at: now, kind });
    }

    /// Total errors recorded, lock-free.
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }

    /// Current count for one kind.
    pub fn count(&self, kind: ErrorKind) -> u64 {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.by_kind.get(&kind).copied().unwrap_or(0)
    }

    /// Clones the book's state and releases the lock before returning.
    pub fn snapshot(&self) -> ErrorBookSnapshot {
        let (last_error, last_error_kind, last_error_at, by_kind, trend_len) = {
            let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            let _held = self.watchdog.as_ref().map(|w| w.observe("error_book"));
            (
                inner.last_error.clone(),
                inner.last_error_kind,
                inner.last_error_at,
                inner.by_kind.clone(),
                inner.trend.len(),
            )
        };

        let mut by_kind: Vec<ErrorCount> = by_kind
            .into_iter()
            .map(|(kind, count)| ErrorCount {
                code: kind.code(),
                name: kind.as_label(),
                count,
            })
            .collect();
        by_kind.sort_by_key(|c| c.code);

        ErrorBookSnapshot {
            total_errors: self.total(),
            last_error,
            last_error_kind,
            last_error_at,
            by_kind,
            trend_len,
        }
    }

    /// Clones the full trend ring.
    pub fn trend(&self) -> Vec<ErrorTrendPoint> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.trend.iter().cloned().collect()
    }
}

impl Default for ErrorBook {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-kind count with its stable code, for snapshots and metrics labels.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorCount {
    pub code: u16,
    pub name: &'static str,
    pub count: u64,
}

/// Point-in-time copy of the error book.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBookSnapshot {
    pub total_errors: u64,
    pub last_error: Option<String>,
    pub last_error_kind: Option<ErrorKind>,
    pub last_error_at: Option<DateTime<Utc>>,
    pub by_kind: Vec<ErrorCount>,
    pub trend_len: usize,
}

/// Atomic counters for one client instance, shared by every task.
#[derive(Debug)]
pub struct Stats {
    /// Epoch millis of the current connection's establishment; 0 = none.
    connected_at_ms: AtomicI64,
    /// Epoch millis of the last successful frame read; 0 = never.
    last_message_ms: AtomicI64,
    connections_total: AtomicU64,
    reconnects_total: AtomicU64,
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
    /// Embedded error record.
    pub errors: ErrorBook,
}

impl Stats {
    pub fn new() -> Self {
        Self {
            connected_at_ms: AtomicI64::new(0),
            last_message_ms: AtomicI64::new(0),
            connections_total: AtomicU64::new(0),
            reconnects_total: AtomicU64::new(0),
            messages_sent: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            errors: ErrorBook::new(),
        }
    }

    pub fn with_watchdog(mut self, watchdog: Arc<LockWatchdog>) -> Self {
        self.errors = ErrorBook::new().with_watchdog(watchdog);
        self
    }

    /// Marks a live connection; bumps `connections_total`.
    pub fn mark_connected(&self) {
        self.connected_at_ms
            .store(Utc::now().timestamp_millis(), Ordering::Release);
        self.connections_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Clears the active-connection gauge.
    pub fn mark_disconnected(&self) {
        self.connected_at_ms.store(0, Ordering::Release);
    }

    /// Bumps the reconnect counter (entering Reconnecting).
    pub fn mark_reconnect(&self) {
        self.reconnects_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one outbound data frame.
    pub fn record_sent(&self, bytes: usize) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Records one inbound data frame.
    pub fn record_received(&self, bytes: usize) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received
            .fetch_add(bytes as u64, Ordering::Relaxed);
        self.touch_read();
    }

    /// Re-stamps `last_message`; called on every successful read, control
    /// frames included (this is what lets heartbeats keep an idle session
    /// visibly alive).
    pub fn touch_read(&self) {
        self.last_message_ms
            .store(Utc::now().timestamp_millis(), Ordering::Release);
    }

    /// `1` while a connection is live, `0` otherwise.
    pub fn connections_active(&self) -> u8 {
        u8::from(self.connected_at_ms.load(Ordering::Acquire) != 0)
    }

    pub fn connections_total(&self) -> u64 {
        self.connections_total.load(Ordering::Relaxed)
    }

    pub fn reconnects_total(&self) -> u64 {
        self.reconnects_total.load(Ordering::Relaxed)
    }

    pub fn messages_sent(&self) -> u64 {
        self.messages_sent.load(Ordering::Relaxed)
    }

    pub fn messages_received(&self) -> u64 {
        self.messages_received.load(Ordering::Relaxed)
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent.load(Ordering::Relaxed)
    }

    pub fn bytes_received(&self) -> u64 {
        self.bytes_received.load(Ordering::Relaxed)
    }

    /// Point-in-time copy of everything, for `/stats`.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            connected_at: epoch_ms_to_datetime(self.connected_at_ms.load(Ordering::Acquire)),
            last_message_at: epoch_ms_to_datetime(self.last_message_ms.load(Ordering::Acquire)),
            connections_total: self.connections_total(),
            reconnects_total: self.reconnects_total(),
            messages_sent: self.messages_sent(),
            messages_received: self.messages_received(),
            bytes_sent: self.bytes_sent(),
            bytes_received: self.bytes_received(),
            errors: self.errors.snapshot(),
        }
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

fn epoch_ms_to_datetime(ms: i64) -> Option<DateTime<Utc>> {
    (ms != 0).then(|| Utc.timestamp_millis_opt(ms).single()).flatten()
}

/// Point-in-time copy of [`Stats`].
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub connected_at: Option<DateTime<Utc>>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub connections_total: u64,
    pub reconnects_total: u64,
    pub messages_sent: u64,
    pub messages_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub errors: ErrorBookSnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let stats = Stats::new();
        stats.record_sent(5);
        stats.record_sent(7);
        stats.record_received(11);
        assert_eq!(stats.messages_sent(), 2);
        assert_eq!(stats.bytes_sent(), 12);
        assert_eq!(stats.messages_received(), 1);
        assert_eq!(stats.bytes_received(), 11);
    }

    #[test]
    fn active_gauge_follows_connect_disconnect() {
        let stats = Stats::new();
        assert_eq!(stats.connections_active(), 0);
        stats.mark_connected();
        assert_eq!(stats.connections_active(), 1);
        assert_eq!(stats.connections_total(), 1);
        stats.mark_disconnected();
        assert_eq!(stats.connections_active(), 0);
        // The cumulative counter does not move backwards.
        assert_eq!(stats.connections_total(), 1);
    }

    #[test]
    fn error_book_tracks_counts_and_last_error() {
        let book = ErrorBook::new();
        book.record(ErrorKind::ConnectionRefused, "refused once");
        book.record(ErrorKind::ConnectionRefused, "refused twice");
        book.record(ErrorKind::SendTimeout, "slow peer");

        assert_eq!(book.total(), 3);
        assert_eq!(book.count(ErrorKind::ConnectionRefused), 2);

        let snap = book.snapshot();
        assert_eq!(snap.last_error.as_deref(), Some("slow peer"));
        assert_eq!(snap.last_error_kind, Some(ErrorKind::SendTimeout));
        assert_eq!(snap.trend_len, 3);
        let refused = snap.by_kind.iter().find(|c| c.code == 1001).unwrap();
        assert_eq!(refused.count, 2);
    }

    #[test]
    fn trend_ring_never_exceeds_the_cap() {
        let book = ErrorBook::new();
        for _ in 0..(ERROR_TREND_CAP + 50) {
            book.record(ErrorKind::ConnectionLost, "lost");
        }
        let trend = book.trend();
        assert_eq!(trend.len(), ERROR_TREND_CAP);
        assert_eq!(book.total(), (ERROR_TREND_CAP + 50) as u64);
    }
}
