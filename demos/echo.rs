//! # Example: echo
//!
//! Connects to an echo endpoint, sends a line of text once a second, and
//! prints whatever comes back through the `on_message` hook.
//!
//! ## Flow
//! ```text
//! WsClient::run()
//!   ├─► Connecting → Connected
//!   ├─► heartbeat pings every 30s (default)
//!   ├─► send_text("tick N") once a second
//!   ├─► on_message prints the echo
//!   └─► Ctrl-C → close frame → Stopped
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example echo -- wss://echo.websocket.org
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use wsvisor::{ClientConfig, FrameKind, HookSubscriber, Hooks, Subscribe, WsClient};

struct PrintEcho;

#[async_trait]
impl Hooks for PrintEcho {
    async fn on_connect(&self) {
        println!("[echo] connected");
    }

    async fn on_message(&self, frame: FrameKind, payload: Bytes) {
        println!("[echo] {} <- {}", frame, String::from_utf8_lossy(&payload));
    }

    async fn on_disconnect(&self, error: Option<&str>) {
        println!("[echo] disconnected: {error:?}");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "wss://echo.websocket.org".to_string());

    let cfg = ClientConfig::new(url);
    let subscribers: Vec<Arc<dyn Subscribe>> =
        vec![Arc::new(HookSubscriber::new(PrintEcho, false))];

    let client = Arc::new(WsClient::new(cfg, subscribers).await?);

    // Periodic sender alongside the session loop.
    let sender = Arc::clone(&client);
    tokio::spawn(async move {
        let mut n = 0u64;
        loop {
            tokio::time::sleep(Duration::from_secs(1)).await;
            n += 1;
            if sender.send_text(&format!("tick {n}")).await.is_err() {
                // Not connected yet (or anymore); the supervisor is on it.
                continue;
            }
        }
    });

    client.run().await?;
    println!("final stats: {:?}", client.stats_snapshot());
    Ok(())
}
