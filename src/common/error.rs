//! Error types for the application.

use thiserror::Error;

use crate::common::messages::{ChannelId, MessageId};

/// Errors surfaced to callers of the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    #[error("Channel unavailable: {channel_id}")]
    ChannelUnavailable { channel_id: ChannelId },

    #[error("Message {message_id} not found in channel {channel_id}")]
    MessageNotFound {
        channel_id: ChannelId,
        message_id: MessageId,
    },

    #[error("Bridge is not running")]
    BridgeNotRunning,

    #[error("Bridge has already been started")]
    AlreadyStarted,

    #[error("Blocking call issued from the scheduler thread")]
    ReentrantCall,

    #[error("Operation cancelled by bridge shutdown")]
    Cancelled,

    #[error("Timed out after {millis}ms waiting for the scheduler")]
    TimedOut { millis: u128 },

    #[error("Network error: {message}")]
    Network { message: String },
}

impl BridgeError {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {message}")]
    IoError { path: String, message: String },

    #[error("Failed to parse config: {message}")]
    ParseError { message: String },

    #[error("Config validation failed: {message}")]
    ValidationError { message: String },

    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// Result type alias for bridge operations.
pub type BridgeResult<T> = std::result::Result<T, BridgeError>;
