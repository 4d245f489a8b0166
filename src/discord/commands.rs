//! Discord bot commands (!help, !online, etc).
//!
//! Handles command parsing and execution for prefix commands seen on any
//! channel the bot can read. Runs on the scheduler after listener dispatch.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serenity::async_trait;
use tracing::{debug, info};

use crate::bridge::client::NetworkClient;
use crate::common::error::BridgeResult;
use crate::common::messages::{ChannelId, Embed, InboundMessage, OutboundContent, SentMessage};
use crate::discord::style::EmbedStyle;

/// What a command processor gets to work with.
pub struct CommandContext {
    pub client: Arc<dyn NetworkClient>,
    pub style: Arc<EmbedStyle>,
}

impl CommandContext {
    pub async fn reply(
        &self,
        channel_id: ChannelId,
        content: impl Into<OutboundContent> + Send,
    ) -> BridgeResult<SentMessage> {
        self.client.send(channel_id, content.into()).await
    }

    /// Reply with an embed carrying the configured style.
    pub async fn reply_embed(&self, channel_id: ChannelId, embed: Embed) -> BridgeResult<SentMessage> {
        self.reply(channel_id, self.style.apply(embed)).await
    }
}

/// Collaborator that reacts to inbound messages after listeners ran.
#[async_trait]
pub trait CommandProcessor: Send + Sync {
    async fn process(&self, context: &CommandContext, message: &InboundMessage) -> anyhow::Result<()>;
}

/// Player list of one game server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerStatus {
    pub name: String,
    /// `None` while the server is down.
    pub players: Option<Vec<String>>,
}

/// Source of the servers reported by `online`.
pub trait ServerRoster: Send + Sync {
    fn servers(&self) -> Vec<ServerStatus>;
}

/// The commands every bridge answers.
pub struct BuiltinCommands {
    prefix: String,
    started_at: DateTime<Utc>,
    roster: Option<Arc<dyn ServerRoster>>,
}

impl BuiltinCommands {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            started_at: Utc::now(),
            roster: None,
        }
    }

    pub fn with_roster(mut self, roster: Arc<dyn ServerRoster>) -> Self {
        self.roster = Some(roster);
        self
    }

    fn help_text(&self) -> String {
        let p = &self.prefix;
        format!(
            "**Available Commands:**\n\
             • `{p}online` - List players on every server\n\
             • `{p}uptime` - Show how long the bridge has been up\n\
             • `{p}version` - Show the bridge version\n\
             • `{p}help` - Show this help message"
        )
    }

    fn online_embed(&self) -> Embed {
        let servers = self
            .roster
            .as_ref()
            .map(|roster| roster.servers())
            .unwrap_or_default();
        online_embed(&servers)
    }
}

#[async_trait]
impl CommandProcessor for BuiltinCommands {
    async fn process(&self, context: &CommandContext, message: &InboundMessage) -> anyhow::Result<()> {
        let Some((command, args)) = parse_command(&self.prefix, &message.content) else {
            return Ok(());
        };

        debug!("Processing command: {} with args: {:?}", command, args);

        match command.as_str() {
            "help" => {
                context.reply(message.channel_id, self.help_text()).await?;
            }
            "version" => {
                let version = format!("conduit-bridge v{}", env!("CARGO_PKG_VERSION"));
                context.reply(message.channel_id, version).await?;
            }
            "uptime" => {
                let uptime = format_uptime(Utc::now() - self.started_at);
                context
                    .reply(message.channel_id, format!("Up for {}", uptime))
                    .await?;
            }
            "online" | "who" => {
                info!("{}online from {}", self.prefix, message.author_name);
                context
                    .reply_embed(message.channel_id, self.online_embed())
                    .await?;
            }
            _ => {}
        }

        Ok(())
    }
}

/// Split `<prefix><name> [args]` into a lowercase name and trimmed args.
pub fn parse_command(prefix: &str, content: &str) -> Option<(String, Option<String>)> {
    if prefix.is_empty() || content.len() > 100 {
        return None;
    }
    let rest = content.strip_prefix(prefix)?;

    let mut parts = rest.splitn(2, ' ');
    let command = parts.next()?.to_lowercase();
    if command.is_empty() {
        return None;
    }
    let args = parts
        .next()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    Some((command, args))
}

/// Build the `ONLINE PLAYERS` embed, one field per server.
pub fn online_embed(servers: &[ServerStatus]) -> Embed {
    let mut embed = Embed::new().title("ONLINE PLAYERS");

    if servers.is_empty() {
        return embed.description("No servers connected");
    }

    for server in servers {
        embed = match server.players.as_deref() {
            None => embed.field(format!("{}:", server.name), "Offline", false),
            Some([]) => embed.field(format!("{}:", server.name), "none", false),
            Some(players) => embed.field(
                format!("{} ({}):", server.name, players.len()),
                players.join(", "),
                false,
            ),
        };
    }

    embed
}

/// Render a duration as `1d 2h 3m 4s`, skipping leading zero units.
pub fn format_uptime(elapsed: chrono::Duration) -> String {
    let total = elapsed.num_seconds().max(0);
    let (days, hours, minutes, seconds) = (
        total / 86_400,
        (total % 86_400) / 3_600,
        (total % 3_600) / 60,
        total % 60,
    );

    if days > 0 {
        format!("{}d {}h {}m {}s", days, hours, minutes, seconds)
    } else if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
