//! # Telemetry HTTP servers.
//!
//! Two small hyper/http1 servers, spawned at client construction when
//! monitoring is enabled:
//!
//! - metrics server: `GET /metrics`, Prometheus text v0.0.4
//! - health server: `GET /health`, `GET /ready`, `GET /stats`, JSON
//!
//! Both observe the engine without participating in control flow: state is
//! sampled from the atomic cell, counters from the atomics, and the error
//! book is cloned under its short lock.
//!
//! Header reads are bounded at 10 s and each connection gets a 60 s
//! overall budget. Shutdown cancels the accept loops and joins them under
//! the caller's deadline (5 s in the stop sequence).

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::{TokioIo, TokioTimer};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::MonitoringConfig;
use crate::error::ClientError;
use crate::session::SessionId;
use crate::state::{ConnectionState, StateCell};
use crate::stats::Stats;
use crate::telemetry::render_metrics;

const HEADER_READ_TIMEOUT: Duration = Duration::from_secs(10);
const CONNECTION_BUDGET: Duration = Duration::from_secs(60);

/// Read-only view the handlers sample.
#[derive(Clone)]
pub struct TelemetryState {
    pub stats: Arc<Stats>,
    pub state: Arc<StateCell>,
    pub session: SessionId,
}

/// Handles to the running servers.
pub struct TelemetryServers {
    token: CancellationToken,
    handles: Vec<JoinHandle<()>>,
    /// Bound address of the metrics server.
    pub metrics_addr: SocketAddr,
    /// Bound address of the health server.
    pub health_addr: SocketAddr,
}

impl TelemetryServers {
    /// Binds both listeners and spawns the accept loops.
    pub async fn spawn(
        cfg: &MonitoringConfig,
        state: TelemetryState,
    ) -> Result<Self, ClientError> {
        let token = CancellationToken::new();

        let metrics_listener = bind(cfg.metrics_port, "metrics").await?;
        let health_listener = bind(cfg.health_port, "health").await?;
        let metrics_addr = local_addr(&metrics_listener, "metrics")?;
        let health_addr = local_addr(&health_listener, "health")?;

        info!(%metrics_addr, %health_addr, "telemetry_listening");

        let handles = vec![
            tokio::spawn(accept_loop(
                metrics_listener,
                state.clone(),
                token.child_token(),
                route_metrics,
            )),
            tokio::spawn(accept_loop(
                health_listener,
                state,
                token.child_token(),
                route_health,
            )),
        ];

        Ok(Self {
            token,
            handles,
            metrics_addr,
            health_addr,
        })
    }

    /// Stops the accept loops and joins them within `budget`.
    pub async fn shutdown(self, budget: Duration) -> Result<(), ClientError> {
        self.token.cancel();
        let join_all = async {
            for handle in self.handles {
                let _ = handle.await;
            }
        };
        tokio::time::timeout(budget, join_all)
            .await
            .map_err(|_| ClientError::TelemetryShutdown { budget })
    }
}

async fn bind(port: u16, label: &str) -> Result<TcpListener, ClientError> {
    TcpListener::bind(("0.0.0.0", port))
        .await
        .map_err(|e| ClientError::Config {
            reason: format!("cannot bind {label} port {port}: {e}"),
        })
}

fn local_addr(listener: &TcpListener, label: &str) -> Result<SocketAddr, ClientError> {
    listener.local_addr().map_err(|e| ClientError::Config {
        reason: format!("cannot resolve {label} listener address: {e}"),
    })
}

/// Accepts connections until cancelled; each connection is served on its
/// own task under the overall budget.
async fn accept_loop(
    listener: TcpListener,
    state: TelemetryState,
    token: CancellationToken,
    route: fn(&TelemetryState, &Method, &str) -> Response<Full<Bytes>>,
) {
    loop {
        let (stream, peer) = tokio::select! {
            _ = token.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(error = %e, "telemetry_accept_failed");
                    continue;
                }
            },
        };
        debug!(%peer, "telemetry_connection");

        let state = state.clone();
        let conn_token = token.child_token();
        tokio::spawn(async move {
            let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                let response = route(&state, req.method(), req.uri().path());
                async move { Ok::<_, std::convert::Infallible>(response) }
            });

            let conn = http1::Builder::new()
                .timer(TokioTimer::new())
                .header_read_timeout(HEADER_READ_TIMEOUT)
                .serve_connection(TokioIo::new(stream), service);

            tokio::select! {
                _ = conn_token.cancelled() => {}
                res = tokio::time::timeout(CONNECTION_BUDGET, conn) => {
                    if let Ok(Err(e)) = res {
                        debug!(error = %e, "telemetry_connection_error");
                    }
                }
            }
        });
    }
}

fn route_metrics(state: &TelemetryState, method: &Method, path: &str) -> Response<Full<Bytes>> {
    match (method, path) {
        (&Method::GET, "/metrics") => text_response(
            StatusCode::OK,
            "text/plain; version=0.0.4",
            render_metrics(&state.stats),
        ),
        _ => not_found(),
    }
}

fn route_health(state: &TelemetryState, method: &Method, path: &str) -> Response<Full<Bytes>> {
    match (method, path) {
        (&Method::GET, "/health") => handle_health(state),
        (&Method::GET, "/ready") => handle_ready(state),
        (&Method::GET, "/stats") => handle_stats(state),
        _ => not_found(),
    }
}

fn handle_health(state: &TelemetryState) -> Response<Full<Bytes>> {
    let current = state.state.load();
    let healthy = !current.is_shutting_down();
    let body = json!({
        "status": if healthy { "healthy" } else { "unhealthy" },
        "state": current.as_label(),
        "session_id": state.session.as_str(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    json_response(status, &body)
}

fn handle_ready(state: &TelemetryState) -> Response<Full<Bytes>> {
    let current = state.state.load();
    let ready = current == ConnectionState::Connected;
    let body = json!({
        "ready": ready,
        "state": current.as_label(),
        "session_id": state.session.as_str(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    json_response(status, &body)
}

fn handle_stats(state: &TelemetryState) -> Response<Full<Bytes>> {
    let body = json!({
        "session_id": state.session.as_str(),
        "state": state.state.load().as_label(),
        "stats": state.stats.snapshot(),
    });
    json_response(StatusCode::OK, &body)
}

fn json_response(status: StatusCode, body: &serde_json::Value) -> Response<Full<Bytes>> {
    let rendered = serde_json::to_string(body)
        .unwrap_or_else(|_| r#"{"error":"serialization failed"}"#.to_string());
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(rendered)))
        .unwrap()
}

fn text_response(status: StatusCode, content_type: &str, body: String) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", content_type)
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}

fn not_found() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .body(Full::new(Bytes::from_static(b"not found")))
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn telemetry_state() -> TelemetryState {
        TelemetryState {
            stats: Arc::new(Stats::new()),
            state: Arc::new(StateCell::new()),
            session: SessionId::generate(),
        }
    }

    fn body_string(response: Response<Full<Bytes>>) -> String {
        use http_body_util::BodyExt;
        let collected = futures::executor::block_on(response.into_body().collect()).unwrap();
        String::from_utf8(collected.to_bytes().to_vec()).unwrap()
    }

    #[test]
    fn health_is_healthy_until_shutdown() {
        let state = telemetry_state();
        let response = handle_health(&state);
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_string(response).contains("\"healthy\""));

        state.state.transition(ConnectionState::Stopping).unwrap();
        let response = handle_health(&state);
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(body_string(response).contains("\"unhealthy\""));
    }

    #[test]
    fn ready_only_while_connected() {
        let state = telemetry_state();
        assert_eq!(
            handle_ready(&state).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );

        state.state.transition(ConnectionState::Connecting).unwrap();
        state.state.transition(ConnectionState::Connected).unwrap();
        let response = handle_ready(&state);
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_string(response).contains("\"ready\":true"));
    }

    #[test]
    fn stats_body_carries_the_snapshot() {
        let state = telemetry_state();
        state.stats.record_sent(5);
        let body = body_string(handle_stats(&state));
        assert!(body.contains("\"messages_sent\":1"));
        assert!(body.contains("\"bytes_sent\":5"));
        assert!(body.contains(state.session.as_str()));
    }

    #[test]
    fn unknown_paths_are_404() {
        let state = telemetry_state();
        let response = route_health(&state, &Method::GET, "/nope");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let response = route_metrics(&state, &Method::POST, "/metrics");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
