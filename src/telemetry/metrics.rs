//! # Prometheus text rendering.
//!
//! Text exposition format v0.0.4: one counter per cumulative stat, one
//! gauge for the active connection, and a labeled counter per observed
//! error kind. Counter families keep the `websocket_` prefix so dashboards
//! can tell this client apart from whatever else the process exports.

use std::fmt::Write as _;

use crate::stats::Stats;

/// Renders the full metrics page.
pub fn render_metrics(stats: &Stats) -> String {
    let mut out = String::with_capacity(2048);

    counter(
        &mut out,
        "websocket_connections_total",
        "Total number of WebSocket connections established",
        stats.connections_total(),
    );
    gauge(
        &mut out,
        "websocket_connections_active",
        "Current active WebSocket connections (0 or 1)",
        u64::from(stats.connections_active()),
    );
    counter(
        &mut out,
        "websocket_reconnections_total",
        "Total number of reconnection attempts",
        stats.reconnects_total(),
    );
    counter(
        &mut out,
        "websocket_messages_sent_total",
        "Total number of messages sent",
        stats.messages_sent(),
    );
    counter(
        &mut out,
        "websocket_messages_received_total",
        "Total number of messages received",
        stats.messages_received(),
    );
    counter(
        &mut out,
        "websocket_bytes_sent_total",
        "Total number of bytes sent",
        stats.bytes_sent(),
    );
    counter(
        &mut out,
        "websocket_bytes_received_total",
        "Total number of bytes received",
        stats.bytes_received(),
    );
    counter(
        &mut out,
        "websocket_errors_total",
        "Total number of errors",
        stats.errors.total(),
    );

    let book = stats.errors.snapshot();
    if !book.by_kind.is_empty() {
        let _ = writeln!(
            out,
            "# HELP websocket_errors_by_code_total Errors by error code"
        );
        let _ = writeln!(out, "# TYPE websocket_errors_by_code_total counter");
        for entry in &book.by_kind {
            let _ = writeln!(
                out,
                "websocket_errors_by_code_total{{error_code=\"{}\",error_name=\"{}\"}} {}",
                entry.code, entry.name, entry.count
            );
        }
    }

    out
}

fn counter(out: &mut String, name: &str, help: &str, value: u64) {
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} counter");
    let _ = writeln!(out, "{name} {value}");
}

fn gauge(out: &mut String, name: &str, help: &str, value: u64) {
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} gauge");
    let _ = writeln!(out, "{name} {value}");
}
