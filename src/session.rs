//! Session identity.
//!
//! A [`SessionId`] is generated once per client instance and stays stable
//! across every reconnect within the process lifetime. It shows up in the
//! audit-log markers, the health endpoint, and operational logs, which makes
//! one client's whole life greppable by a single token.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;
use serde::Serialize;

/// Unique identifier for one client instance.
///
/// Format: `ws_<unix-secs>_<micros>_<random>` where the random suffix comes
/// from a cryptographically secure generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generates a fresh id.
    pub fn generate() -> Self {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        let random: u64 = rand::rng().random();
        Self(format!(
            "ws_{}_{}_{}",
            now.as_secs(),
            now.subsec_micros() % 1_000_000,
            random % 1_000_000
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_expected_shape() {
        let id = SessionId::generate();
        let parts: Vec<&str> = id.as_str().split('_').collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], "ws");
        assert!(parts[1].parse::<u64>().is_ok());
        assert!(parts[2].parse::<u64>().is_ok());
        assert!(parts[3].parse::<u64>().is_ok());
    }

    #[test]
    fn consecutive_ids_differ() {
        // The random suffix makes collisions within one process negligible.
        let a = SessionId::generate();
        let b = SessionId::generate();
        assert_ne!(a, b);
    }
}
