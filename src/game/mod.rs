//! Game-side chat relay.
//!
//! This module contains:
//! - Line formatting for game events and Discord messages
//! - Regex filtering of relayed lines
//! - The relay that ties a game server to its bridge channel

pub mod filter;
pub mod formatter;
pub mod relay;

pub use filter::MessageFilter;
pub use formatter::GameEvent;
pub use relay::{ChatRelay, GameSink};
