//! Common utilities and types shared across the application.

pub mod error;
pub mod messages;
pub mod reconnect;

pub use error::{BridgeError, BridgeResult, ConfigError};
pub use messages::{
    BotIdentity, ChannelId, Embed, EmbedField, EmbedFooter, InboundMessage, MessageId,
    NetworkEvent, OutboundContent, SentMessage, UserId,
};
pub use reconnect::ReconnectPolicy;
