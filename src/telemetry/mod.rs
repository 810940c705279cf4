//! Telemetry HTTP surface.
//!
//! - [`metrics`]  Prometheus text rendering over the stats counters
//! - [`server`]   the `/metrics` and `/health` + `/ready` + `/stats` servers

mod metrics;
mod server;

pub use metrics::render_metrics;
pub use server::{TelemetryServers, TelemetryState};
