//! Discord integration.
//!
//! Everything serenity-specific lives here: the network client, prefix
//! commands and embed styling.

pub mod client;
pub mod commands;
pub mod style;

pub use client::SerenityClient;
pub use commands::{BuiltinCommands, CommandContext, CommandProcessor, ServerRoster, ServerStatus};
pub use style::EmbedStyle;
