//! Chat line formatting for the relay.
//!
//! Game events become single plain-text lines prefixed with the server
//! name; Discord messages become `[Discord]` lines for the game.

use crate::common::messages::InboundMessage;

/// Something that happened on the game server worth relaying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    PlayerJoin { player: String },
    PlayerLeft { player: String },
    PlayerChat { player: String, message: String },
    /// The server already renders the full death message.
    PlayerDeath { death_message: String },
    ServerStart,
    ServerStop,
}

/// Format a game event as `[server] ...`.
pub fn format_game_event(server_name: &str, event: &GameEvent) -> String {
    match event {
        GameEvent::PlayerJoin { player } => format!("[{}] <{}> joined the game", server_name, player),
        GameEvent::PlayerLeft { player } => format!("[{}] <{}> left the game", server_name, player),
        GameEvent::PlayerChat { player, message } => {
            format!("[{}] <{}> {}", server_name, player, message)
        }
        GameEvent::PlayerDeath { death_message } => format!("[{}] {}", server_name, death_message),
        GameEvent::ServerStart => format!("[{}] server started!", server_name),
        GameEvent::ServerStop => format!("[{}] stopping the server!", server_name),
    }
}

/// Format a Discord message for broadcast in game.
pub fn format_discord_line(message: &InboundMessage) -> String {
    format!("[Discord] <{}> {}", message.author_name, message.content)
}

/// Replace `:shortcode:` sequences with unicode emoji.
///
/// Unknown shortcodes and stray colons are kept as written.
pub fn resolve_emojis(message: &str) -> String {
    let mut result = String::with_capacity(message.len());
    let mut chars = message.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != ':' {
            result.push(ch);
            continue;
        }

        let mut shortcode = String::new();
        let mut closed = false;
        while let Some(&next) = chars.peek() {
            if next == ':' {
                closed = true;
                chars.next();
                break;
            } else if next.is_alphanumeric() || next == '_' || next == '-' || next == '+' {
                shortcode.push(next);
                chars.next();
            } else {
                break;
            }
        }

        if !closed {
            result.push(':');
            result.push_str(&shortcode);
            continue;
        }

        match emojis::get_by_shortcode(&shortcode.to_lowercase()) {
            Some(emoji) if !shortcode.is_empty() => result.push_str(emoji.as_str()),
            _ => {
                result.push(':');
                result.push_str(&shortcode);
                result.push(':');
            }
        }
    }

    result
}
