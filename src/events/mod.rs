//! Lifecycle event plane.
//!
//! - [`event`]  event vocabulary and metadata builder
//! - [`bus`]    broadcast channel the runtime publishes into

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
