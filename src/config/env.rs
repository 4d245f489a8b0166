//! Environment variable overrides for configuration.
//!
//! Supports overriding config values with environment variables:
//! - `CONDUIT_DISCORD_TOKEN` - Discord bot token
//! - `CONDUIT_DISCORD_PREFIX` - Command prefix
//! - `CONDUIT_RELAY_CHANNEL` - Bridge channel of the chat relay

use std::env;

use crate::config::types::Config;

/// Environment variable prefix for all config overrides.
const ENV_PREFIX: &str = "CONDUIT";

/// Apply environment variable overrides to a config.
///
/// This allows the token to be provided via the environment instead of the
/// config file.
pub fn apply_env_overrides(mut config: Config) -> Config {
    if let Some(token) = non_empty_var("DISCORD_TOKEN") {
        config.discord.token = token;
    }

    if let Some(prefix) = non_empty_var("DISCORD_PREFIX") {
        config.discord.prefix = Some(prefix);
    }

    if let Some(channel) = non_empty_var("RELAY_CHANNEL") {
        if let (Ok(id), Some(relay)) = (channel.parse::<u64>(), config.relay.as_mut()) {
            relay.bridge_channel = id;
        }
    }

    config
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(format!("{}_{}", ENV_PREFIX, name))
        .ok()
        .filter(|value| !value.is_empty())
}

/// Check if any required environment variables are set but empty.
pub fn check_empty_env_vars() -> Vec<String> {
    let vars = [format!("{}_DISCORD_TOKEN", ENV_PREFIX)];

    vars.into_iter()
        .filter(|var| env::var(var).map(|v| v.is_empty()).unwrap_or(false))
        .collect()
}

/// Get the config file path from environment or use default.
///
/// Checks `CONDUIT_CONFIG`, otherwise returns "conduit.conf".
pub fn get_config_path() -> String {
    env::var(format!("{}_CONFIG", ENV_PREFIX)).unwrap_or_else(|_| "conduit.conf".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::*;

    fn make_test_config() -> Config {
        Config {
            discord: DiscordConfig {
                token: "original_token".to_string(),
                prefix: None,
                roles: RolesConfig::default(),
                style: StyleConfig::default(),
                reconnect: ReconnectConfig::default(),
            },
            bridge: SchedulerConfig::default(),
            relay: None,
        }
    }

    #[test]
    fn test_env_prefix() {
        assert_eq!(ENV_PREFIX, "CONDUIT");
    }

    #[test]
    fn test_get_config_path_default() {
        env::remove_var("CONDUIT_CONFIG");
        assert_eq!(get_config_path(), "conduit.conf");
    }

    #[test]
    fn test_apply_env_overrides_no_vars() {
        env::remove_var("CONDUIT_DISCORD_TOKEN");
        env::remove_var("CONDUIT_DISCORD_PREFIX");

        let config = make_test_config();
        let result = apply_env_overrides(config);

        assert_eq!(result.discord.token, "original_token");
        assert!(result.discord.prefix.is_none());
    }
}
