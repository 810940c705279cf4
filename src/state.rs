//! # Connection state machine.
//!
//! [`StateCell`] holds the current [`ConnectionState`] in an atomic cell.
//! Reads are lock-free; writes publish a happens-before edge to subsequent
//! reads (release/acquire), so telemetry observers sample a consistent state
//! without touching the control plane.
//!
//! ## Legal transitions
//! ```text
//! Disconnected  → Connecting      (supervisor begins dial)
//! Connecting    → Connected       (handshake ok)
//! Connecting    → Disconnected    (handshake failed)
//! Connected     → Reconnecting    (reader/heartbeat signals loss)
//! Reconnecting  → Connecting      (next dial attempt)
//! any non-terminal → Stopping     (external stop)
//! Stopping      → Stopped         (all tasks joined)
//! ```
//!
//! ## Rules
//! - Transitions are validated against the table above; an illegal request
//!   leaves the cell untouched and returns the state that blocked it.
//! - `Stopped` is terminal: nothing leaves it, which is what makes stop
//!   idempotent at the state level.
//! - The `Connected ↔ Reconnecting` cycle is the only non-monotonic edge.

use std::sync::atomic::{AtomicU8, Ordering};

use serde::Serialize;

/// Lifecycle state of the single managed connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ConnectionState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
    Reconnecting = 3,
    Stopping = 4,
    Stopped = 5,
}

impl ConnectionState {
    fn from_u8(v: u8) -> ConnectionState {
        match v {
            0 => ConnectionState::Disconnected,
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            3 => ConnectionState::Reconnecting,
            4 => ConnectionState::Stopping,
            _ => ConnectionState::Stopped,
        }
    }

    /// Returns a short stable label (snake_case) for logs and JSON bodies.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Stopping => "stopping",
            ConnectionState::Stopped => "stopped",
        }
    }

    /// True for `Stopping` and `Stopped`.
    pub fn is_shutting_down(&self) -> bool {
        matches!(self, ConnectionState::Stopping | ConnectionState::Stopped)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Whether `from → to` is a legal edge of the lifecycle graph.
fn is_legal(from: ConnectionState, to: ConnectionState) -> bool {
    use ConnectionState::*;
    match (from, to) {
        (Disconnected, Connecting) => true,
        (Connecting, Connected) => true,
        (Connecting, Disconnected) => true,
        (Connected, Reconnecting) => true,
        (Reconnecting, Connecting) => true,
        (Stopping, Stopped) => true,
        // External stop is accepted from every non-terminal state.
        (s, Stopping) => s != Stopped && s != Stopping,
        _ => false,
    }
}

/// Atomic cell holding the current [`ConnectionState`].
#[derive(Debug)]
pub struct StateCell(AtomicU8);

impl StateCell {
    /// Creates a cell in `Disconnected`.
    pub fn new() -> Self {
        Self(AtomicU8::new(ConnectionState::Disconnected as u8))
    }

    /// Current state (lock-free, acquire ordering).
    pub fn load(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Attempts the transition `current → to`.
    ///
    /// On success returns the previous state. On an illegal edge the cell is
    /// left untouched and the blocking state is returned as the error, so
    /// callers can decide whether to log or ignore (stop is idempotent by
    /// ignoring `Err(Stopping | Stopped)`).
    pub fn transition(&self, to: ConnectionState) -> Result<ConnectionState, ConnectionState> {
        let mut current = self.0.load(Ordering::Acquire);
        loop {
            let from = ConnectionState::from_u8(current);
            if !is_legal(from, to) {
                return Err(from);
            }
            match self.0.compare_exchange_weak(
                current,
                to as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(from),
                Err(observed) => current = observed,
            }
        }
    }
}

impl Default for StateCell {
    fn default() -> Self {
        Self::new()
    }
}
