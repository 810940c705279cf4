//! # Lock watchdog.
//!
//! The engine admits exactly two locks in a nested pattern (writer gate,
//! then optionally the error book). [`LockWatchdog`] records acquisition
//! timestamps for named critical sections and reports any section held
//! beyond a threshold as a potential deadlock.
//!
//! ## Rules
//! - `observe(name)` returns a token; dropping the token clears the record.
//! - The reporter task samples periodically and warns once per incident; it
//!   never interferes with the lock holders.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Registry of currently held critical sections.
#[derive(Debug)]
pub struct LockWatchdog {
    threshold: Duration,
    held: DashMap<&'static str, Instant>,
}

/// Clears the acquisition record on drop.
pub struct LockToken<'a> {
    watchdog: &'a LockWatchdog,
    name: &'static str,
}

impl Drop for LockToken<'_> {
    fn drop(&mut self) {
        self.watchdog.held.remove(self.name);
    }
}

impl LockWatchdog {
    /// Creates a watchdog with the given stall threshold.
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            held: DashMap::new(),
        }
    }

    /// Records that `name` was just acquired.
    pub fn observe(&self, name: &'static str) -> LockToken<'_> {
        self.held.insert(name, Instant::now());
        LockToken {
            watchdog: self,
            name,
        }
    }

    /// Sections currently held beyond the threshold.
    pub fn stalled(&self) -> Vec<(&'static str, Duration)> {
        let now = Instant::now();
        self.held
            .iter()
            .filter_map(|entry| {
                let held_for = now.duration_since(*entry.value());
                (held_for > self.threshold).then_some((*entry.key(), held_for))
            })
            .collect()
    }

    /// Spawns the periodic reporter. Sampling interval is a quarter of the
    /// threshold, floored at one second.
    pub fn spawn_reporter(self: &Arc<Self>, token: CancellationToken) -> JoinHandle<()> {
        let watchdog = Arc::clone(self);
        let period = (self.threshold / 4).max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        for (name, held_for) in watchdog.stalled() {
                            warn!(lock = name, held_for = ?held_for, "possible_deadlock");
                        }
                    }
                }
            }
        })
    }
}
