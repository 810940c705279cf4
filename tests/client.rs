//! End-to-end client scenarios against loopback servers.

mod common;

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use common::{spawn_echo_server, spawn_silent_server, wait_until};
use wsvisor::{
    ClientConfig, ClientError, Connect, ConnectionError, ConnectionState, ErrorKind, FrameKind,
    HookSubscriber, Hooks, Op, Subscribe, WsClient, WsConnector, WsStream,
};

/// Fails the first `failures` dials with `kind`, then delegates to the
/// real connector.
struct FlakyConnect {
    failures: AtomicU32,
    kind: ErrorKind,
}

impl FlakyConnect {
    fn new(failures: u32, kind: ErrorKind) -> Self {
        Self {
            failures: AtomicU32::new(failures),
            kind,
        }
    }
}

#[async_trait]
impl Connect for FlakyConnect {
    async fn connect(
        &self,
        token: &CancellationToken,
        cfg: &ClientConfig,
    ) -> Result<WsStream, ConnectionError> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(ConnectionError::new(
                self.kind,
                Op::Connect,
                &cfg.url,
                "injected dial failure",
            ));
        }
        WsConnector.connect(token, cfg).await
    }
}

/// Never connects; every dial fails with `kind`.
struct AlwaysFail(ErrorKind);

#[async_trait]
impl Connect for AlwaysFail {
    async fn connect(
        &self,
        _token: &CancellationToken,
        cfg: &ClientConfig,
    ) -> Result<WsStream, ConnectionError> {
        Err(ConnectionError::new(
            self.0,
            Op::Connect,
            &cfg.url,
            "injected dial failure",
        ))
    }
}

/// Collects received payloads for assertions.
#[derive(Default)]
struct Collector {
    received: std::sync::Mutex<Vec<Bytes>>,
}

#[async_trait]
impl Hooks for Collector {
    async fn on_message(&self, _frame: FrameKind, payload: Bytes) {
        self.received.lock().unwrap().push(payload);
    }
}

fn loopback_config(addr: std::net::SocketAddr) -> ClientConfig {
    ClientConfig::new(format!("ws://{addr}"))
}

#[tokio::test]
async fn happy_path_echo_roundtrip() {
    let (addr, server) = spawn_echo_server().await;
    let collector = Arc::new(Collector::default());
    let subscribers: Vec<Arc<dyn Subscribe>> = vec![Arc::new(HookSubscriber::new(
        Arc::clone(&collector),
        false,
    ))];

    let client = Arc::new(
        WsClient::new(loopback_config(addr), subscribers)
            .await
            .unwrap(),
    );
    let runner = {
        let client = Arc::clone(&client);
        tokio::spawn(async move { client.run().await })
    };

    assert!(wait_until(Duration::from_secs(5), || client.is_connected()).await);
    client.send_text("hello").await.unwrap();

    assert!(
        wait_until(Duration::from_secs(5), || {
            client.stats().messages_received() == 1
        })
        .await
    );

    let stats = client.stats();
    assert_eq!(stats.messages_sent(), 1);
    assert_eq!(stats.bytes_sent(), 5);
    assert_eq!(stats.messages_received(), 1);
    assert_eq!(stats.bytes_received(), 5);
    assert_eq!(stats.errors.total(), 0);
    assert_eq!(stats.connections_active(), 1);

    client.stop();
    assert!(runner.await.unwrap().is_ok());
    assert_eq!(client.state(), ConnectionState::Stopped);
    assert_eq!(client.stats().connections_active(), 0);

    // The echoed payload reached the user hook.
    assert!(
        wait_until(Duration::from_secs(2), || {
            collector
                .received
                .lock()
                .unwrap()
                .iter()
                .any(|p| p.as_ref() == b"hello")
        })
        .await
    );
    server.abort();
}

#[tokio::test]
async fn dial_refused_twice_then_succeeds() {
    let (addr, server) = spawn_echo_server().await;
    let connector = Arc::new(FlakyConnect::new(2, ErrorKind::ConnectionRefused));

    let client = Arc::new(
        WsClient::with_connector(loopback_config(addr), connector, Vec::new())
            .await
            .unwrap(),
    );
    let runner = {
        let client = Arc::clone(&client);
        tokio::spawn(async move { client.run().await })
    };

    assert!(wait_until(Duration::from_secs(5), || client.is_connected()).await);

    let refused: Vec<_> = client
        .stats()
        .errors
        .trend()
        .into_iter()
        .filter(|p| p.kind == ErrorKind::ConnectionRefused)
        .collect();
    assert_eq!(refused.len(), 2);
    assert!(client.stats().reconnects_total() >= 1);

    client.stop();
    assert!(runner.await.unwrap().is_ok());
    server.abort();
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_give_up_with_max_retries_exceeded() {
    let mut cfg = ClientConfig::new("ws://127.0.0.1:1");
    cfg.max_retries = 2;
    let connector = Arc::new(AlwaysFail(ErrorKind::ConnectionTimeout));

    let client = Arc::new(
        WsClient::with_connector(cfg, connector, Vec::new())
            .await
            .unwrap(),
    );

    let result = client.run().await;
    match result {
        Err(ClientError::RetriesExhausted(e)) => {
            assert_eq!(e.kind, ErrorKind::MaxRetriesExceeded);
            assert_eq!(e.attempts, 4); // two fast + two slow
        }
        other => panic!("expected retries-exhausted, got {other:?}"),
    }

    assert_eq!(client.state(), ConnectionState::Stopped);
    assert_eq!(client.stats().errors.count(ErrorKind::ConnectionTimeout), 4);
    assert_eq!(
        client.stats().errors.count(ErrorKind::MaxRetriesExceeded),
        1
    );

    // The labeled metric families carry the same numbers.
    let metrics = wsvisor::render_metrics(client.stats());
    assert!(metrics.contains(
        "websocket_errors_by_code_total{error_code=\"1002\",error_name=\"connection_timeout\"} 4"
    ));
    assert!(metrics.contains(
        "websocket_errors_by_code_total{error_code=\"3001\",error_name=\"max_retries_exceeded\"} 1"
    ));
}

#[tokio::test]
async fn oversized_send_fails_without_wire_effect() {
    let (addr, server) = spawn_echo_server().await;
    let mut cfg = loopback_config(addr);
    cfg.max_message_size = 10;

    let client = Arc::new(WsClient::new(cfg, Vec::new()).await.unwrap());
    let runner = {
        let client = Arc::clone(&client);
        tokio::spawn(async move { client.run().await })
    };
    assert!(wait_until(Duration::from_secs(5), || client.is_connected()).await);

    // Exactly the limit is fine.
    client.send_text("0123456789").await.unwrap();
    assert!(
        wait_until(Duration::from_secs(5), || {
            client.stats().messages_received() == 1
        })
        .await
    );

    // One byte over is rejected before the wire.
    let bytes_before = client.stats().bytes_sent();
    let err = client.send_text("0123456789x").await.unwrap_err();
    match err {
        ClientError::Connection(e) => assert_eq!(e.kind, ErrorKind::MessageTooLarge),
        other => panic!("expected message_too_large, got {other:?}"),
    }
    assert_eq!(client.stats().bytes_sent(), bytes_before);
    assert_eq!(client.state(), ConnectionState::Connected);
    assert_eq!(client.stats().errors.count(ErrorKind::MessageTooLarge), 1);

    client.stop();
    assert!(runner.await.unwrap().is_ok());
    server.abort();
}

#[tokio::test]
async fn graceful_stop_writes_the_audit_trail() {
    let (addr, server) = spawn_echo_server().await;
    let log_name = format!("target/wsvisor_audit_{}.log", std::process::id());
    let mut cfg = loopback_config(addr);
    cfg.log_file = Some(log_name.clone().into());

    let client = Arc::new(WsClient::new(cfg, Vec::new()).await.unwrap());
    let runner = {
        let client = Arc::clone(&client);
        tokio::spawn(async move { client.run().await })
    };
    assert!(wait_until(Duration::from_secs(5), || client.is_connected()).await);

    client.send_text("audited").await.unwrap();
    assert!(
        wait_until(Duration::from_secs(5), || {
            client.stats().messages_received() == 1
        })
        .await
    );

    client.stop();
    assert!(runner.await.unwrap().is_ok());

    let content = std::fs::read_to_string(&log_name).unwrap();
    assert!(content.contains("=== WebSocket 会话开始"));
    assert!(content.contains(client.session_id().as_str()));
    assert!(content.contains("SEND TEXT (7 bytes): audited"));
    assert!(content.contains("RECV TEXT (7 bytes): audited"));
    assert!(content.contains("SEND CLOSE"));
    assert!(content.contains("=== WebSocket 会话结束"));

    let _ = std::fs::remove_file(&log_name);
    server.abort();
}

#[tokio::test]
async fn heartbeat_keeps_an_idle_session_alive() {
    let (addr, server) = spawn_silent_server().await;
    let mut cfg = loopback_config(addr);
    cfg.ping_interval = Duration::from_millis(100);
    cfg.read_timeout = Duration::from_secs(1);

    let client = Arc::new(WsClient::new(cfg, Vec::new()).await.unwrap());
    let runner = {
        let client = Arc::clone(&client);
        tokio::spawn(async move { client.run().await })
    };
    assert!(wait_until(Duration::from_secs(5), || client.is_connected()).await);

    // Several ping intervals with zero user traffic.
    tokio::time::sleep(Duration::from_millis(600)).await;

    assert_eq!(client.state(), ConnectionState::Connected);
    assert_eq!(client.stats().errors.total(), 0);
    // Pong replies re-stamped the read clock.
    assert!(client.stats_snapshot().last_message_at.is_some());

    client.stop();
    assert!(runner.await.unwrap().is_ok());
    server.abort();
}

#[tokio::test]
async fn telemetry_endpoints_respond_over_http() {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let (addr, server) = spawn_echo_server().await;
    let mut cfg = loopback_config(addr);
    cfg.monitoring.enabled = true;
    cfg.monitoring.metrics_port = 0; // ephemeral
    cfg.monitoring.health_port = 0;

    let client = Arc::new(WsClient::new(cfg, Vec::new()).await.unwrap());
    let (metrics_addr, health_addr) = client.telemetry_addrs().unwrap();

    let runner = {
        let client = Arc::clone(&client);
        tokio::spawn(async move { client.run().await })
    };
    assert!(wait_until(Duration::from_secs(5), || client.is_connected()).await);

    async fn http_get(addr: std::net::SocketAddr, path: &str) -> String {
        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(
                format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
                    .as_bytes(),
            )
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    let health = http_get(health_addr, "/health").await;
    assert!(health.starts_with("HTTP/1.1 200"));
    assert!(health.contains("\"healthy\""));
    assert!(health.contains(client.session_id().as_str()));

    let ready = http_get(health_addr, "/ready").await;
    assert!(ready.starts_with("HTTP/1.1 200"));
    assert!(ready.contains("\"ready\":true"));

    let metrics = http_get(metrics_addr, "/metrics").await;
    assert!(metrics.contains("websocket_connections_active 1"));
    assert!(metrics.contains("websocket_connections_total 1"));

    let missing = http_get(health_addr, "/nope").await;
    assert!(missing.starts_with("HTTP/1.1 404"));

    client.stop();
    assert!(runner.await.unwrap().is_ok());

    // After the stop sequence the servers are gone.
    assert!(tokio::net::TcpStream::connect(health_addr).await.is_err());
    server.abort();
}

#[tokio::test]
async fn stop_is_idempotent() {
    let (addr, server) = spawn_echo_server().await;
    let client = Arc::new(WsClient::new(loopback_config(addr), Vec::new()).await.unwrap());
    let runner = {
        let client = Arc::clone(&client);
        tokio::spawn(async move { client.run().await })
    };
    assert!(wait_until(Duration::from_secs(5), || client.is_connected()).await);

    client.stop();
    client.stop();
    assert!(runner.await.unwrap().is_ok());
    client.stop(); // after completion: still a no-op
    assert_eq!(client.state(), ConnectionState::Stopped);

    // A second run on the same client is rejected.
    match client.run().await {
        Err(ClientError::AlreadyRunning) => {}
        other => panic!("expected already-running, got {other:?}"),
    }
    server.abort();
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_a_slow_retry_wait() {
    let mut cfg = ClientConfig::new("ws://127.0.0.1:1");
    cfg.max_retries = 1;
    cfg.retry_delay = Duration::from_secs(60);
    let connector = Arc::new(AlwaysFail(ErrorKind::ConnectionRefused));

    let client = Arc::new(
        WsClient::with_connector(cfg, connector, Vec::new())
            .await
            .unwrap(),
    );
    let runner = {
        let client = Arc::clone(&client);
        tokio::spawn(async move { client.run().await })
    };

    // Let the fast attempt fail and the slow wait begin.
    assert!(
        wait_until(Duration::from_secs(5), || {
            client.stats().errors.count(ErrorKind::ConnectionRefused) >= 1
        })
        .await
    );

    client.stop();
    let result = tokio::time::timeout(Duration::from_secs(5), runner)
        .await
        .expect("stop must interrupt the retry wait")
        .unwrap();
    assert!(result.is_ok());
    assert_eq!(client.state(), ConnectionState::Stopped);
}
