//! The network connection the scheduler drives.

use serenity::async_trait;
use tokio::sync::mpsc;

use crate::common::error::BridgeResult;
use crate::common::messages::{ChannelId, MessageId, NetworkEvent, OutboundContent, SentMessage};

/// A long-lived connection to the messaging network.
///
/// Every method is awaited on the scheduler thread. `run` is spawned once
/// per bridge and keeps the connection alive, reconnecting on transient
/// failures; it only returns on `close` or when it gives up. `send` and
/// `edit` may run concurrently with `run` and with each other.
#[async_trait]
pub trait NetworkClient: Send + Sync + 'static {
    /// Connect and stay connected, publishing events until closed.
    ///
    /// An `Err` means the connection is unrecoverable.
    async fn run(&self, events: mpsc::UnboundedSender<NetworkEvent>) -> anyhow::Result<()>;

    /// Post a new message.
    async fn send(&self, channel_id: ChannelId, content: OutboundContent)
        -> BridgeResult<SentMessage>;

    /// Replace the body of a message previously sent by this account.
    async fn edit(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        content: OutboundContent,
    ) -> BridgeResult<SentMessage>;

    /// Close the connection. Must be safe to call more than once.
    async fn close(&self);
}
