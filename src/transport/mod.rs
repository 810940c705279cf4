//! Transport plane: dialing and the frame pipeline.
//!
//! - [`connector`]  one dial + handshake, TLS policy, typed failures
//! - [`writer`]     the serialized gate every outbound frame passes through
//! - [`reader`]     the inbound frame loop
//! - [`heartbeat`]  periodic pings through the writer gate

mod connector;
mod heartbeat;
mod reader;
mod writer;

pub use connector::{Connect, WsConnector, WsStream};
pub use heartbeat::run_heartbeat;
pub use reader::{run_reader, ReaderExit, ReaderParams};
pub use writer::WriterGate;
