//! Canonical message types for bridge communication.
//!
//! These are the only shapes that cross between the network client, the
//! scheduler and game-side callers. Serenity types never leave
//! `crate::discord`.

/// Discord channel snowflake. Zero never names a real channel.
pub type ChannelId = u64;

/// Discord message snowflake.
pub type MessageId = u64;

/// Discord user snowflake.
pub type UserId = u64;

/// A message observed on the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub channel_id: ChannelId,
    pub author_id: UserId,
    /// Display name of the author (nickname when available).
    pub author_name: String,
    pub content: String,
    pub message_id: MessageId,
    /// Set by the client when the author is the bot account itself.
    pub is_self: bool,
}

/// Handle to a message the bridge sent or edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SentMessage {
    pub channel_id: ChannelId,
    pub message_id: MessageId,
}

/// The bot account the connection is authenticated as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotIdentity {
    pub user_id: UserId,
    pub name: String,
}

/// A field inside an embed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

/// Footer line of an embed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedFooter {
    pub text: String,
    pub icon_url: Option<String>,
}

/// Rich message body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Embed {
    pub title: Option<String>,
    pub description: Option<String>,
    pub fields: Vec<EmbedField>,
    /// RGB accent colour.
    pub color: Option<u32>,
    pub footer: Option<EmbedFooter>,
}

impl Embed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        self.fields.push(EmbedField {
            name: name.into(),
            value: value.into(),
            inline,
        });
        self
    }

    pub fn color(mut self, color: u32) -> Self {
        self.color = Some(color);
        self
    }
}

/// Body of an outbound send or edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundContent {
    Text(String),
    Embeds(Vec<Embed>),
}

impl From<&str> for OutboundContent {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for OutboundContent {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Embed> for OutboundContent {
    fn from(embed: Embed) -> Self {
        Self::Embeds(vec![embed])
    }
}

/// Events emitted by a network client while it runs.
#[derive(Debug, Clone)]
pub enum NetworkEvent {
    /// Connected and authenticated.
    Ready(BotIdentity),
    /// Message received.
    Message(InboundMessage),
    /// Connection lost; the client is reconnecting on its own.
    Disconnected,
}
