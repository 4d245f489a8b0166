//! Configuration validation.
//!
//! Validates configuration values and provides helpful error messages.

use fancy_regex::Regex;

use crate::common::error::ConfigError;
use crate::config::types::Config;
use crate::discord::style::{parse_hex_color, EmbedStyle};

/// Validate a configuration and return detailed errors.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    if config.discord.token.is_empty() {
        errors.push("discord.token is required".to_string());
    }
    if config.discord.token == "YOUR_DISCORD_TOKEN_HERE" {
        errors.push("discord.token has not been configured (still using placeholder)".to_string());
    }
    if let Some(ref prefix) = config.discord.prefix {
        if prefix.chars().any(char::is_whitespace) {
            errors.push(format!("discord.prefix '{}' must not contain whitespace", prefix));
        }
    }

    // Style
    if let Some(ref color) = config.discord.style.color {
        if parse_hex_color(color).is_none() {
            errors.push(format!(
                "discord.style.color '{}' is not a hex colour (use #RRGGBB)",
                color
            ));
        }
    }
    if let Some(ref icon) = config.discord.style.footer_icon {
        if !EmbedStyle::is_http_url(icon) {
            errors.push(format!("discord.style.footer_icon '{}' must be an http(s) URL", icon));
        }
    }

    // Reconnect
    let reconnect = &config.discord.reconnect;
    if reconnect.min_delay_secs == 0 {
        errors.push("discord.reconnect.min_delay_secs must be non-zero".to_string());
    }
    if reconnect.max_delay_secs < reconnect.min_delay_secs {
        errors.push(format!(
            "discord.reconnect.max_delay_secs ({}) is below min_delay_secs ({})",
            reconnect.max_delay_secs, reconnect.min_delay_secs
        ));
    }
    if reconnect.factor < 1.0 {
        errors.push("discord.reconnect.factor must be at least 1.0".to_string());
    }
    if reconnect.max_attempts == Some(0) {
        errors.push("discord.reconnect.max_attempts must be non-zero".to_string());
    }

    // Scheduler
    if config.bridge.stop_timeout_secs == 0 {
        errors.push("bridge.stop_timeout_secs must be non-zero".to_string());
    }
    if config.bridge.call_timeout_secs == Some(0) {
        errors.push("bridge.call_timeout_secs must be non-zero".to_string());
    }

    // Relay
    if let Some(ref relay) = config.relay {
        if relay.server_name.is_empty() {
            errors.push("relay.server_name is required".to_string());
        }
        for (i, pattern) in relay.message_filter.iter().enumerate() {
            if Regex::new(pattern).is_err() {
                errors.push(format!(
                    "relay.message_filter[{}] is not a valid regex: '{}'",
                    i, pattern
                ));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError {
            message: errors.join("\n"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::*;

    fn make_valid_config() -> Config {
        Config {
            discord: DiscordConfig {
                token: "valid_token_here".to_string(),
                prefix: Some("!".to_string()),
                roles: RolesConfig::default(),
                style: StyleConfig {
                    color: Some("#5865F2".to_string()),
                    footer_text: Some("Conduit".to_string()),
                    footer_icon: Some("https://example.com/icon.png".to_string()),
                },
                reconnect: ReconnectConfig::default(),
            },
            bridge: SchedulerConfig::default(),
            relay: Some(RelayConfig {
                server_name: "survival".to_string(),
                bridge_channel: 987654321,
                message_filter: vec![],
            }),
        }
    }

    #[test]
    fn test_valid_config_passes() {
        let config = make_valid_config();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_empty_token_fails() {
        let mut config = make_valid_config();
        config.discord.token = String::new();

        let result = validate_config(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("discord.token"));
    }

    #[test]
    fn test_placeholder_token_fails() {
        let mut config = make_valid_config();
        config.discord.token = "YOUR_DISCORD_TOKEN_HERE".to_string();

        let result = validate_config(&config);
        assert!(result.unwrap_err().to_string().contains("placeholder"));
    }

    #[test]
    fn test_bad_color_fails() {
        let mut config = make_valid_config();
        config.discord.style.color = Some("blurple".to_string());

        let result = validate_config(&config);
        assert!(result.unwrap_err().to_string().contains("hex colour"));
    }

    #[test]
    fn test_bad_footer_icon_fails() {
        let mut config = make_valid_config();
        config.discord.style.footer_icon = Some("icon.png".to_string());

        let result = validate_config(&config);
        assert!(result.unwrap_err().to_string().contains("footer_icon"));
    }

    #[test]
    fn test_invalid_regex_filter_fails() {
        let mut config = make_valid_config();
        if let Some(ref mut relay) = config.relay {
            relay.message_filter = vec!["[invalid".to_string()];
        }

        let result = validate_config(&config);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("not a valid regex"));
    }

    #[test]
    fn test_zero_stop_timeout_fails() {
        let mut config = make_valid_config();
        config.bridge.stop_timeout_secs = 0;

        let result = validate_config(&config);
        assert!(result.unwrap_err().to_string().contains("stop_timeout_secs"));
    }

    #[test]
    fn test_all_errors_reported_together() {
        let mut config = make_valid_config();
        config.discord.token = String::new();
        config.discord.reconnect.factor = 0.5;

        let message = validate_config(&config).unwrap_err().to_string();
        assert!(message.contains("discord.token"));
        assert!(message.contains("factor"));
    }
}
