//! Discord network client.
//!
//! Wraps serenity behind [`NetworkClient`] so the rest of the crate never
//! sees serenity types. Gateway events are forwarded into the scheduler's
//! event channel; REST calls go through a dedicated HTTP client that stays
//! usable across gateway reconnects.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::bail;
use serenity::all::{
    ChannelId as DiscordChannelId, CreateEmbed, CreateEmbedFooter, CreateMessage, EditMessage,
    MessageId as DiscordMessageId,
};
use serenity::async_trait;
use serenity::gateway::{GatewayError, ShardManager};
use serenity::http::{Http, HttpBuilder, HttpError};
use serenity::model::channel::Message;
use serenity::model::gateway::Ready;
use serenity::prelude::*;
use serenity::Client;
use tokio::sync::{mpsc, watch, Mutex as AsyncMutex};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::bridge::client::NetworkClient;
use crate::common::error::{BridgeError, BridgeResult};
use crate::common::messages::{
    BotIdentity, ChannelId, Embed, InboundMessage, MessageId, NetworkEvent, OutboundContent,
    SentMessage,
};
use crate::common::reconnect::ReconnectPolicy;
use crate::config::types::DiscordConfig;

/// Discord JSON error codes we translate.
const UNKNOWN_CHANNEL: isize = 10003;
const UNKNOWN_MESSAGE: isize = 10008;
const MISSING_ACCESS: isize = 50001;

/// A gateway session that lasted this long resets the backoff schedule.
const HEALTHY_SESSION: Duration = Duration::from_secs(60);

struct GatewayEvents {
    events: mpsc::UnboundedSender<NetworkEvent>,
}

impl GatewayEvents {
    fn forward(&self, event: NetworkEvent) {
        if let Err(error) = self.events.send(event) {
            debug!("Dropping discord event, scheduler gone: {:?}", error.0);
        }
    }
}

#[async_trait]
impl EventHandler for GatewayEvents {
    async fn ready(&self, _context: Context, ready: Ready) {
        self.forward(NetworkEvent::Ready(BotIdentity {
            user_id: ready.user.id.get(),
            name: ready.user.name.clone(),
        }));
    }

    async fn message(&self, context: Context, message: Message) {
        let is_self = message.author.id == context.cache.current_user().id;
        self.forward(NetworkEvent::Message(inbound_message(&message, is_self)));
    }
}

fn inbound_message(message: &Message, is_self: bool) -> InboundMessage {
    let author_name = message
        .member
        .as_ref()
        .and_then(|member| member.nick.clone())
        .or_else(|| message.author.global_name.clone())
        .unwrap_or_else(|| message.author.name.clone());

    InboundMessage {
        channel_id: message.channel_id.get(),
        author_id: message.author.id.get(),
        author_name,
        content: message.content.clone(),
        message_id: message.id.get(),
        is_self,
    }
}

/// Serenity-backed [`NetworkClient`].
pub struct SerenityClient {
    token: String,
    reqwest: reqwest::Client,
    http: Arc<Http>,
    policy: ReconnectPolicy,
    shard_manager: AsyncMutex<Option<Arc<ShardManager>>>,
    shutdown_tx: watch::Sender<bool>,
}

impl SerenityClient {
    pub fn new(config: &DiscordConfig) -> anyhow::Result<Self> {
        // Build a custom reqwest client with timeout settings
        let reqwest = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        let http = HttpBuilder::new(&config.token)
            .client(reqwest.clone())
            .build();
        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            token: config.token.clone(),
            reqwest,
            http: Arc::new(http),
            policy: ReconnectPolicy::from_config(&config.reconnect),
            shard_manager: AsyncMutex::new(None),
            shutdown_tx,
        })
    }

    async fn build_client(&self, events: mpsc::UnboundedSender<NetworkEvent>) -> anyhow::Result<Client> {
        let intents = GatewayIntents::GUILDS
            | GatewayIntents::GUILD_MESSAGES
            | GatewayIntents::DIRECT_MESSAGES
            | GatewayIntents::MESSAGE_CONTENT;

        let http = HttpBuilder::new(&self.token)
            .client(self.reqwest.clone())
            .build();

        let client = serenity::client::ClientBuilder::new_with_http(http, intents)
            .event_handler(GatewayEvents { events })
            .await?;
        Ok(client)
    }
}

/// Resolve once `close` has been requested.
async fn closed(shutdown_rx: &mut watch::Receiver<bool>) {
    while !*shutdown_rx.borrow_and_update() {
        if shutdown_rx.changed().await.is_err() {
            return;
        }
    }
}

#[async_trait]
impl NetworkClient for SerenityClient {
    async fn run(&self, events: mpsc::UnboundedSender<NetworkEvent>) -> anyhow::Result<()> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut backoff = self.policy.backoff();
        let mut attempts = 0usize;

        loop {
            if *shutdown_rx.borrow() {
                return Ok(());
            }

            info!("Connecting to Discord...");
            attempts += 1;

            match self.build_client(events.clone()).await {
                Ok(mut client) => {
                    *self.shard_manager.lock().await = Some(client.shard_manager.clone());

                    // close() may have run while the client was being built.
                    if *shutdown_rx.borrow() {
                        client.shard_manager.shutdown_all().await;
                        return Ok(());
                    }

                    let connected_at = Instant::now();
                    let result = client.start().await;
                    self.shard_manager.lock().await.take();

                    if *shutdown_rx.borrow() {
                        info!("Discord client closed");
                        return Ok(());
                    }

                    match result {
                        Ok(()) => warn!("Discord client disconnected"),
                        Err(e) if is_unrecoverable(&e) => {
                            error!("Discord refused the session: {}", e);
                            bail!("unrecoverable Discord error: {}", e);
                        }
                        Err(e) => error!("Discord client error: {}", e),
                    }
                    if let Err(error) = events.send(NetworkEvent::Disconnected) {
                        debug!("Failed to publish disconnect: {}", error);
                    }

                    if connected_at.elapsed() >= HEALTHY_SESSION {
                        backoff = self.policy.backoff();
                        attempts = 1;
                    }
                }
                Err(e) => error!("Failed to build Discord client: {}", e),
            }

            let Some(delay) = backoff.next() else {
                bail!("giving up on Discord after {} connection attempts", attempts);
            };
            warn!("Reconnecting to Discord in {:.1}s...", delay.as_secs_f64());

            tokio::select! {
                _ = sleep(delay) => {}
                _ = closed(&mut shutdown_rx) => return Ok(()),
            }
        }
    }

    async fn send(&self, channel_id: ChannelId, content: OutboundContent) -> BridgeResult<SentMessage> {
        if channel_id == 0 {
            return Err(BridgeError::ChannelUnavailable { channel_id });
        }

        let builder = match content {
            OutboundContent::Text(text) => CreateMessage::new().content(text),
            OutboundContent::Embeds(embeds) => {
                CreateMessage::new().embeds(embeds.iter().map(to_create_embed).collect())
            }
        };

        let message = DiscordChannelId::new(channel_id)
            .send_message(&self.http, builder)
            .await
            .map_err(|e| map_error(e, channel_id, None))?;

        Ok(SentMessage {
            channel_id,
            message_id: message.id.get(),
        })
    }

    async fn edit(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
        content: OutboundContent,
    ) -> BridgeResult<SentMessage> {
        if channel_id == 0 {
            return Err(BridgeError::ChannelUnavailable { channel_id });
        }
        if message_id == 0 {
            return Err(BridgeError::MessageNotFound {
                channel_id,
                message_id,
            });
        }

        let builder = match content {
            OutboundContent::Text(text) => EditMessage::new().content(text).embeds(Vec::new()),
            OutboundContent::Embeds(embeds) => EditMessage::new()
                .content("")
                .embeds(embeds.iter().map(to_create_embed).collect()),
        };

        let message = DiscordChannelId::new(channel_id)
            .edit_message(&self.http, DiscordMessageId::new(message_id), builder)
            .await
            .map_err(|e| map_error(e, channel_id, Some(message_id)))?;

        Ok(SentMessage {
            channel_id,
            message_id: message.id.get(),
        })
    }

    async fn close(&self) {
        self.shutdown_tx.send_replace(true);

        let manager = self.shard_manager.lock().await.take();
        if let Some(manager) = manager {
            info!("Initiating graceful Discord shutdown...");
            manager.shutdown_all().await;
            info!("Discord shutdown complete");
        }
    }
}

fn to_create_embed(embed: &Embed) -> CreateEmbed {
    let mut builder = CreateEmbed::new();
    if let Some(ref title) = embed.title {
        builder = builder.title(title);
    }
    if let Some(ref description) = embed.description {
        builder = builder.description(description);
    }
    for field in &embed.fields {
        builder = builder.field(&field.name, &field.value, field.inline);
    }
    if let Some(color) = embed.color {
        builder = builder.colour(color);
    }
    if let Some(ref footer) = embed.footer {
        let mut create_footer = CreateEmbedFooter::new(&footer.text);
        if let Some(ref icon) = footer.icon_url {
            create_footer = create_footer.icon_url(icon);
        }
        builder = builder.footer(create_footer);
    }
    builder
}

/// Gateway rejections that no amount of reconnecting will fix.
fn is_unrecoverable(error: &serenity::Error) -> bool {
    matches!(
        error,
        serenity::Error::Gateway(
            GatewayError::InvalidAuthentication
                | GatewayError::InvalidGatewayIntents
                | GatewayError::DisallowedGatewayIntents
        )
    )
}

fn map_error(error: serenity::Error, channel_id: ChannelId, message_id: Option<MessageId>) -> BridgeError {
    if let serenity::Error::Http(HttpError::UnsuccessfulRequest(ref response)) = error {
        match (response.error.code, message_id) {
            (UNKNOWN_CHANNEL | MISSING_ACCESS, _) => {
                return BridgeError::ChannelUnavailable { channel_id };
            }
            (UNKNOWN_MESSAGE, Some(message_id)) => {
                return BridgeError::MessageNotFound {
                    channel_id,
                    message_id,
                };
            }
            _ => {}
        }
    }
    BridgeError::network(error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::messages::EmbedFooter;

    #[test]
    fn test_embed_conversion_keeps_every_part() {
        let embed = Embed {
            title: Some("ONLINE PLAYERS".to_string()),
            description: None,
            fields: Vec::new(),
            color: Some(0x5865f2),
            footer: Some(EmbedFooter {
                text: "conduit".to_string(),
                icon_url: Some("https://example.com/i.png".to_string()),
            }),
        }
        .field("Survival (2):", "alice, bob", false);

        let json = serde_json::to_value(to_create_embed(&embed)).unwrap();

        assert_eq!(json["title"], "ONLINE PLAYERS");
        assert_eq!(json["color"], 0x5865f2);
        assert_eq!(json["fields"][0]["name"], "Survival (2):");
        assert_eq!(json["fields"][0]["value"], "alice, bob");
        assert_eq!(json["footer"]["text"], "conduit");
        assert_eq!(json["footer"]["icon_url"], "https://example.com/i.png");
    }

    #[test]
    fn test_other_errors_become_network_errors() {
        let error = map_error(serenity::Error::Other("boom"), 5, None);
        assert!(matches!(error, BridgeError::Network { .. }));
    }

    #[test]
    fn test_rejected_sessions_are_not_retried() {
        assert!(is_unrecoverable(&serenity::Error::Gateway(
            GatewayError::InvalidAuthentication
        )));
        assert!(is_unrecoverable(&serenity::Error::Gateway(
            GatewayError::DisallowedGatewayIntents
        )));
        assert!(is_unrecoverable(&serenity::Error::Gateway(
            GatewayError::InvalidGatewayIntents
        )));
        assert!(!is_unrecoverable(&serenity::Error::Gateway(
            GatewayError::ExpectedHello
        )));
        assert!(!is_unrecoverable(&serenity::Error::Other("socket reset")));
    }

    #[tokio::test]
    async fn test_zero_ids_are_rejected_locally() {
        let client = SerenityClient::new(&DiscordConfig {
            token: "Bot test".to_string(),
            prefix: None,
            roles: Default::default(),
            style: Default::default(),
            reconnect: Default::default(),
        })
        .unwrap();

        assert_eq!(
            client.send(0, "x".into()).await,
            Err(BridgeError::ChannelUnavailable { channel_id: 0 })
        );
        assert_eq!(
            client.edit(5, 0, "x".into()).await,
            Err(BridgeError::MessageNotFound {
                channel_id: 5,
                message_id: 0
            })
        );
    }

    #[tokio::test]
    async fn test_close_before_run_is_idempotent() {
        let client = SerenityClient::new(&DiscordConfig {
            token: "Bot test".to_string(),
            prefix: None,
            roles: Default::default(),
            style: Default::default(),
            reconnect: Default::default(),
        })
        .unwrap();

        client.close().await;
        client.close().await;

        let (events, _rx) = mpsc::unbounded_channel();
        assert!(client.run(events).await.is_ok());
    }
}
