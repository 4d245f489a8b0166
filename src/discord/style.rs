//! Embed styling applied to outbound rich messages.
//!
//! The style is loaded once from config and never changes afterwards, so
//! it is shared freely between the scheduler and game-side callers.

use crate::common::error::ConfigError;
use crate::common::messages::{Embed, EmbedFooter};
use crate::config::types::StyleConfig;

/// Accent colour and footer stamped onto every styled embed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmbedStyle {
    pub color: Option<u32>,
    pub footer_text: Option<String>,
    pub footer_icon: Option<String>,
}

impl EmbedStyle {
    /// Build the style from config, rejecting malformed values.
    pub fn from_config(config: &StyleConfig) -> Result<Self, ConfigError> {
        let color = match config.color.as_deref() {
            Some(hex) => Some(parse_hex_color(hex).ok_or_else(|| ConfigError::InvalidValue {
                field: "discord.style.color".to_string(),
                message: format!("'{}' is not a hex colour", hex),
            })?),
            None => None,
        };

        if let Some(icon) = config.footer_icon.as_deref() {
            if !Self::is_http_url(icon) {
                return Err(ConfigError::InvalidValue {
                    field: "discord.style.footer_icon".to_string(),
                    message: format!("'{}' is not an http(s) URL", icon),
                });
            }
        }

        Ok(Self {
            color,
            footer_text: config.footer_text.clone().filter(|t| !t.is_empty()),
            footer_icon: config.footer_icon.clone(),
        })
    }

    /// Apply the style to an embed.
    ///
    /// A colour already set on the embed wins. The footer is only added when
    /// footer text is configured; an icon alone renders nothing on Discord.
    pub fn apply(&self, mut embed: Embed) -> Embed {
        if embed.color.is_none() {
            embed.color = self.color;
        }

        if let Some(ref text) = self.footer_text {
            embed.footer = Some(EmbedFooter {
                text: text.clone(),
                icon_url: self.footer_icon.clone(),
            });
        }

        embed
    }

    /// Wrap plain text in a styled embed.
    pub fn styled_text(&self, content: impl Into<String>) -> Embed {
        self.apply(Embed::new().description(content))
    }

    pub(crate) fn is_http_url(value: &str) -> bool {
        value.starts_with("https://") || value.starts_with("http://")
    }
}

/// Parse `#RRGGBB` or `RRGGBB` into an RGB value.
pub fn parse_hex_color(value: &str) -> Option<u32> {
    let hex = value.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(hex, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn style() -> EmbedStyle {
        EmbedStyle {
            color: Some(0x5865F2),
            footer_text: Some("Conduit".to_string()),
            footer_icon: Some("https://example.com/icon.png".to_string()),
        }
    }

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#5865F2"), Some(0x5865F2));
        assert_eq!(parse_hex_color("ff0000"), Some(0xFF0000));
        assert_eq!(parse_hex_color("#fff"), None);
        assert_eq!(parse_hex_color("#zzzzzz"), None);
        assert_eq!(parse_hex_color(""), None);
    }

    #[test]
    fn test_apply_sets_color_and_footer() {
        let embed = style().apply(Embed::new().title("ONLINE PLAYERS"));

        assert_eq!(embed.title.as_deref(), Some("ONLINE PLAYERS"));
        assert_eq!(embed.color, Some(0x5865F2));
        let footer = embed.footer.unwrap();
        assert_eq!(footer.text, "Conduit");
        assert_eq!(footer.icon_url.as_deref(), Some("https://example.com/icon.png"));
    }

    #[test]
    fn test_apply_keeps_existing_color() {
        let embed = style().apply(Embed::new().color(0x00FF00));
        assert_eq!(embed.color, Some(0x00FF00));
    }

    #[test]
    fn test_empty_style_is_identity() {
        let embed = Embed::new().title("t").field("a", "b", true);
        assert_eq!(EmbedStyle::default().apply(embed.clone()), embed);
    }

    #[test]
    fn test_styled_text() {
        let embed = style().styled_text("hello");
        assert_eq!(embed.description.as_deref(), Some("hello"));
        assert!(embed.footer.is_some());
    }

    #[test]
    fn test_from_config() {
        let config = StyleConfig {
            color: Some("#112233".to_string()),
            footer_text: Some(String::new()),
            footer_icon: None,
        };
        let style = EmbedStyle::from_config(&config).unwrap();
        assert_eq!(style.color, Some(0x112233));
        assert_eq!(style.footer_text, None);

        let bad = StyleConfig {
            color: Some("red".to_string()),
            ..StyleConfig::default()
        };
        assert!(EmbedStyle::from_config(&bad).is_err());
    }
}
