//! Runtime core: the session loop and shutdown plumbing.
//!
//! - **supervisor.rs**: drives the lifecycle: asks the retry policy,
//!   invokes the connector, installs the handle, spawns reader + heartbeat,
//!   awaits termination, selects the recovery path, loops.
//! - **shutdown.rs**: cross-platform OS signal handling.
//!
//! ## Wiring (module-level flow)
//! ```text
//! WsClient::run()
//!   └─ Supervisor::run(root_token)
//!        loop {
//!          RetryPolicy::next() ──► GiveUp → record MaxRetriesExceeded, return
//!          │                      Proceed → (slow phase: cancellable sleep)
//!          ├─ state → Connecting, publish ConnectAttempt
//!          ├─ Connect::connect() ── Err → classify, record, state → Disconnected, loop
//!          │                        Ok  → install sink, reset retry/history
//!          ├─ state → Connected, publish Connected
//!          ├─ spawn run_reader(child) + run_heartbeat(child)
//!          ├─ await: reader exit | root cancellation
//!          ├─ teardown: cancel heartbeat, close frame, take sink, join
//!          └─ exit → strategy: None → return | else state → Reconnecting, loop
//!        }
//! ```

mod shutdown;
mod supervisor;

pub use shutdown::wait_for_shutdown_signal;
pub use supervisor::Supervisor;
