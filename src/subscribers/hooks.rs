//! # Callback-style hooks.
//!
//! [`Hooks`] is the four-capability surface most applications want:
//! `on_connect`, `on_disconnect`, `on_message`, `on_error`. All methods have
//! no-op defaults, so an implementor overrides only what it needs.
//!
//! [`HookSubscriber`] adapts a `Hooks` implementation onto the event stream:
//!
//! - `on_message` fires for data frames, in receive order; control frames
//!   (ping/pong) are forwarded only when the client runs verbose.
//! - `on_error` is spawned on a short-lived task, fire-and-forget; a slow
//!   error handler cannot stall event delivery for the same subscriber.
//! - `on_connect` / `on_disconnect` follow the session, not individual
//!   dial attempts.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::events::{Event, EventKind};
use crate::processor::FrameKind;
use crate::subscribers::Subscribe;

/// Application-level connection callbacks.
#[async_trait]
pub trait Hooks: Send + Sync + 'static {
    /// A session became live (handshake completed).
    async fn on_connect(&self) {}

    /// The live session ended; `error` is `None` on a clean peer close.
    async fn on_disconnect(&self, error: Option<&str>) {
        let _ = error;
    }

    /// A frame arrived. Data frames always; ping/pong only in verbose mode.
    async fn on_message(&self, frame: FrameKind, payload: Bytes) {
        let _ = (frame, payload);
    }

    /// A failure was recorded. Runs on its own task.
    async fn on_error(&self, message: String) {
        let _ = message;
    }
}

#[async_trait]
impl<H: Hooks + ?Sized> Hooks for Arc<H> {
    async fn on_connect(&self) {
        self.as_ref().on_connect().await
    }

    async fn on_disconnect(&self, error: Option<&str>) {
        self.as_ref().on_disconnect(error).await
    }

    async fn on_message(&self, frame: FrameKind, payload: Bytes) {
        self.as_ref().on_message(frame, payload).await
    }

    async fn on_error(&self, message: String) {
        self.as_ref().on_error(message).await
    }
}

/// Adapter that routes bus events into a [`Hooks`] implementation.
pub struct HookSubscriber<H> {
    hooks: Arc<H>,
    verbose: bool,
}

impl<H: Hooks> HookSubscriber<H> {
    pub fn new(hooks: H, verbose: bool) -> Self {
        Self {
            hooks: Arc::new(hooks),
            verbose,
        }
    }
}

#[async_trait]
impl<H: Hooks> Subscribe for HookSubscriber<H> {
    async fn on_event(&self, ev: &Event) {
        match ev.kind {
            EventKind::Connected => self.hooks.on_connect().await,
            EventKind::Disconnected => self.hooks.on_disconnect(ev.error.as_deref()).await,
            EventKind::MessageReceived => {
                let frame = ev.frame.unwrap_or(FrameKind::Binary);
                if frame.is_control() && !self.verbose {
                    return;
                }
                let payload = ev.payload.clone().unwrap_or_default();
                self.hooks.on_message(frame, payload).await;
            }
            EventKind::ConnectFailed | EventKind::RetriesExhausted => {
                if let Some(message) = ev.error.clone() {
                    // Fire-and-forget so a slow handler cannot stall the
                    // subscriber queue behind it.
                    let hooks = Arc::clone(&self.hooks);
                    tokio::spawn(async move {
                        hooks.on_error(message).await;
                    });
                }
            }
            _ => {}
        }
    }

    fn name(&self) -> &'static str {
        "hooks"
    }
}
