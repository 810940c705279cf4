//! # Example: monitored
//!
//! Runs a client with the telemetry surface enabled and an audit log on
//! disk. While it runs:
//!
//! ```bash
//! curl -s localhost:9090/metrics   # Prometheus text
//! curl -s localhost:8080/health    # liveness
//! curl -s localhost:8080/ready     # readiness (200 only while connected)
//! curl -s localhost:8080/stats     # full JSON snapshot
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example monitored -- ws://localhost:9001
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use wsvisor::{default_log_name, ClientConfig, LogSubscriber, Subscribe, WsClient};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "ws://localhost:9001".to_string());

    let mut cfg = ClientConfig::new(url);
    cfg.monitoring.enabled = true;
    cfg.log_file = Some(PathBuf::from(default_log_name()));

    let subscribers: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogSubscriber)];
    let client = Arc::new(WsClient::new(cfg, subscribers).await?);

    if let Some((metrics, health)) = client.telemetry_addrs() {
        println!("metrics on http://{metrics}/metrics");
        println!("health  on http://{health}/health");
    }

    client.run().await?;
    Ok(())
}
