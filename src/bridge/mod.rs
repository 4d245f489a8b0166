//! Cross-runtime message bridge.
//!
//! ## Module Structure
//!
//! - `orchestrator`: the [`Bridge`] handle used by game threads
//! - `scheduler`: the dedicated thread that owns the network client
//! - `call`: blocking request/response hand-off
//! - `listeners`: per-channel listener registry and dispatch
//! - `channels`: the command queue and shutdown signal
//! - `state`: lifecycle state shared across threads
//! - `ready`: first-connection signal

pub mod call;
pub(crate) mod channels;
pub mod client;
pub mod listeners;
pub mod orchestrator;
pub mod ready;
pub(crate) mod scheduler;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

pub use call::PendingCall;
pub use client::NetworkClient;
pub use listeners::{listener_fn, DispatchReport, Listener, ListenerRegistry};
pub use orchestrator::{Bridge, BridgeSettings, StopOutcome};
pub use ready::ReadyEvent;
pub use state::LifecycleState;
