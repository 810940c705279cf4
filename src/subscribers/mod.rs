//! Event delivery to user code.
//!
//! - [`subscribe`]  the [`Subscribe`] trait every observer implements
//! - [`set`]        non-blocking fan-out with per-subscriber queues
//! - [`hooks`]      callback-style adapter (`on_connect` / `on_message` / …)
//! - [`log`]        built-in tracing subscriber

mod hooks;
mod log;
mod set;
mod subscribe;

pub use hooks::{HookSubscriber, Hooks};
pub use log::LogSubscriber;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
