//! Conduit: a Discord message bridge for game-server plugin hosts.
//!
//! Plugin hosts run their plugins on plain synchronous threads. The
//! [`Bridge`] owns a Discord connection on its own scheduler thread and
//! lets those threads send, edit and subscribe without an async runtime of
//! their own.

pub mod bridge;
pub mod common;
pub mod config;
pub mod discord;
pub mod game;

pub use bridge::{Bridge, BridgeSettings, LifecycleState, Listener, StopOutcome};
pub use common::{BridgeError, BridgeResult, ConfigError, InboundMessage, OutboundContent, SentMessage};
