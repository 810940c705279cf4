//! # Example: custom_hooks
//!
//! Shows a raw [`Subscribe`] implementation watching the full event stream
//! (state transitions, retry pacing, traffic) next to the callback-style
//! [`Hooks`] adapter. Useful as a starting point for metrics bridges.
//!
//! ## Run
//! ```bash
//! cargo run --example custom_hooks -- ws://localhost:9001
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use wsvisor::{ClientConfig, Event, EventKind, Subscribe, WsClient};

/// Counts reconnect cycles straight off the bus.
struct ReconnectCounter(AtomicU64);

#[async_trait]
impl Subscribe for ReconnectCounter {
    async fn on_event(&self, ev: &Event) {
        match ev.kind {
            EventKind::RetryScheduled => {
                println!(
                    "[watch] retry #{:?} in {:?}",
                    ev.attempt,
                    ev.delay.unwrap_or_default()
                );
            }
            EventKind::Connected => {
                let n = self.0.fetch_add(1, Ordering::Relaxed);
                if n > 0 {
                    println!("[watch] reconnected ({n} times so far)");
                }
            }
            EventKind::StateChanged => {
                println!("[watch] state -> {:?}", ev.state);
            }
            _ => {}
        }
    }

    fn name(&self) -> &'static str {
        "reconnect-counter"
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "ws://localhost:9001".to_string());

    // Unlimited retries: five fast, then a slow attempt every two seconds.
    let mut cfg = ClientConfig::new(url);
    cfg.max_retries = 0;
    cfg.retry_delay = std::time::Duration::from_secs(2);

    let subscribers: Vec<Arc<dyn Subscribe>> =
        vec![Arc::new(ReconnectCounter(AtomicU64::new(0)))];

    let client = Arc::new(WsClient::new(cfg, subscribers).await?);
    client.run().await?;
    Ok(())
}
