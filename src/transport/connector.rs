//! # Transport connector.
//!
//! One dial + WebSocket handshake, bounded by the handshake timeout, with
//! the TLS policy applied. No retry lives here: pacing is the supervisor's
//! concern; the connector's whole contract is "one attempt, typed outcome".
//!
//! [`Connect`] is the capability seam: tests and embedders can inject a
//! connector that fails deterministically or routes to a local server.

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::{connect_async_tls_with_config, Connector, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::classify::classify;
use crate::config::{ClientConfig, TlsPolicy};
use crate::error::{ConnectionError, ErrorKind, Op};

/// The concrete stream type the engine drives.
pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// One dial + handshake, returning a live stream or a typed failure.
#[async_trait]
pub trait Connect: Send + Sync {
    async fn connect(
        &self,
        token: &CancellationToken,
        cfg: &ClientConfig,
    ) -> Result<WsStream, ConnectionError>;
}

/// Default connector over `tokio-tungstenite`.
pub struct WsConnector;

#[async_trait]
impl Connect for WsConnector {
    async fn connect(
        &self,
        token: &CancellationToken,
        cfg: &ClientConfig,
    ) -> Result<WsStream, ConnectionError> {
        // Scheme check up front: a bad URL must never reach the dialer.
        if !cfg.url.starts_with("ws://") && !cfg.url.starts_with("wss://") {
            return Err(ConnectionError::new(
                ErrorKind::InvalidUrl,
                Op::Connect,
                &cfg.url,
                "url must start with ws:// or wss://",
            ));
        }
        let url = url::Url::parse(&cfg.url).map_err(|e| {
            ConnectionError::new(ErrorKind::InvalidUrl, Op::Connect, &cfg.url, e.to_string())
                .with_source(e)
        })?;

        let mut ws_cfg = WebSocketConfig::default();
        ws_cfg.max_message_size = Some(cfg.max_message_size);
        ws_cfg.max_frame_size = Some(cfg.max_message_size.max(cfg.read_buffer_size));
        ws_cfg.write_buffer_size = cfg.write_buffer_size;

        let connector = tls_connector(cfg)?;

        let handshake =
            connect_async_tls_with_config(url.as_str(), Some(ws_cfg), true, connector);

        tokio::select! {
            _ = token.cancelled() => Err(ConnectionError::new(
                ErrorKind::ConnectionLost,
                Op::Connect,
                &cfg.url,
                "dial cancelled",
            )),
            outcome = tokio::time::timeout(cfg.handshake_timeout, handshake) => match outcome {
                Err(_elapsed) => Err(ConnectionError::new(
                    ErrorKind::ConnectionTimeout,
                    Op::Handshake,
                    &cfg.url,
                    format!("handshake exceeded {:?}", cfg.handshake_timeout),
                )),
                Ok(Err(e)) => {
                    let kind = classify(&e);
                    Err(ConnectionError::new(kind, Op::Connect, &cfg.url, e.to_string())
                        .with_source(e))
                }
                Ok(Ok((stream, response))) => {
                    debug!(status = %response.status(), url = %cfg.url, "handshake_complete");
                    Ok(stream)
                }
            },
        }
    }
}

/// Builds the TLS connector for the configured policy. `ws://` endpoints
/// skip TLS entirely and get `Connector::Plain`.
fn tls_connector(cfg: &ClientConfig) -> Result<Option<Connector>, ConnectionError> {
    if !cfg.url.starts_with("wss://") {
        return Ok(Some(Connector::Plain));
    }

    let skip = cfg.tls.skips_verification();
    if skip && cfg.tls == TlsPolicy::SkipVerifyWarn {
        warn!(url = %cfg.url, "tls_verification_disabled");
    }

    let tls = native_tls::TlsConnector::builder()
        .danger_accept_invalid_certs(skip)
        .danger_accept_invalid_hostnames(skip)
        .build()
        .map_err(|e| {
            ConnectionError::new(ErrorKind::TlsError, Op::Connect, &cfg.url, e.to_string())
                .with_source(e)
        })?;
    Ok(Some(Connector::NativeTls(tls)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bad_scheme_is_rejected_before_any_dial() {
        let mut cfg = ClientConfig::new("http://example.test");
        cfg.url = "http://example.test".to_string();
        let token = CancellationToken::new();
        let err = WsConnector.connect(&token, &cfg).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidUrl);
    }

    #[tokio::test]
    async fn refused_dial_is_classified() {
        // Port 1 on loopback is essentially guaranteed closed.
        let cfg = ClientConfig::new("ws://127.0.0.1:1");
        let token = CancellationToken::new();
        let err = WsConnector.connect(&token, &cfg).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::ConnectionRefused);
        assert_eq!(err.op, Op::Connect);
    }

    #[tokio::test]
    async fn cancellation_interrupts_the_dial() {
        let cfg = ClientConfig::new("ws://10.255.255.1:81"); // non-routable
        let token = CancellationToken::new();
        token.cancel();
        let err = WsConnector.connect(&token, &cfg).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::ConnectionLost);
        assert!(err.message.contains("cancelled"));
    }
}
