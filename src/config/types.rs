//! Configuration type definitions.

use serde::Deserialize;

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub discord: DiscordConfig,
    #[serde(default)]
    pub bridge: SchedulerConfig,
    pub relay: Option<RelayConfig>,
}

/// Discord bot configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscordConfig {
    pub token: String,
    /// Command prefix. Unset or empty falls back to the host's default.
    pub prefix: Option<String>,
    #[serde(default)]
    pub roles: RolesConfig,
    #[serde(default)]
    pub style: StyleConfig,
    #[serde(default)]
    pub reconnect: ReconnectConfig,
}

impl DiscordConfig {
    /// The prefix to use, given the host's global command prefix.
    pub fn effective_prefix(&self, host_default: &str) -> String {
        match self.prefix.as_deref() {
            Some(prefix) if !prefix.is_empty() => prefix.to_string(),
            _ => host_default.to_string(),
        }
    }
}

/// Role tiers, consumed by host-side authorization only.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RolesConfig {
    #[serde(default)]
    pub owner: Vec<u64>,
    #[serde(default)]
    pub admin: Vec<u64>,
    #[serde(default)]
    pub helper: Vec<u64>,
    #[serde(default)]
    pub member: Vec<u64>,
    #[serde(default)]
    pub guest: Vec<u64>,
}

/// Embed styling options.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StyleConfig {
    /// Accent colour as hex, e.g. "#5865F2".
    pub color: Option<String>,
    pub footer_text: Option<String>,
    pub footer_icon: Option<String>,
}

/// Reconnection backoff for the Discord client.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default = "default_min_delay_secs")]
    pub min_delay_secs: u64,
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,
    #[serde(default = "default_factor")]
    pub factor: f32,
    /// None retries forever.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: Option<usize>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            min_delay_secs: default_min_delay_secs(),
            max_delay_secs: default_max_delay_secs(),
            factor: default_factor(),
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_min_delay_secs() -> u64 {
    5
}

fn default_max_delay_secs() -> u64 {
    300
}

fn default_factor() -> f32 {
    1.1
}

fn default_max_attempts() -> Option<usize> {
    Some(10)
}

/// Scheduler thread settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Upper bound on joining the scheduler thread during stop.
    #[serde(default = "default_stop_timeout_secs")]
    pub stop_timeout_secs: u64,
    /// Default wait for blocking send/edit calls (None = wait forever).
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: Option<u64>,
    /// How long the host waits for the first Ready event.
    #[serde(default = "default_ready_timeout_secs")]
    pub ready_timeout_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            stop_timeout_secs: default_stop_timeout_secs(),
            call_timeout_secs: default_call_timeout_secs(),
            ready_timeout_secs: default_ready_timeout_secs(),
        }
    }
}

fn default_stop_timeout_secs() -> u64 {
    5
}

fn default_call_timeout_secs() -> Option<u64> {
    Some(30)
}

fn default_ready_timeout_secs() -> u64 {
    15
}

/// Game chat relay settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// Name shown in brackets in relayed lines.
    pub server_name: String,
    /// Discord channel mirrored with game chat (0 disables Discord relay).
    #[serde(default)]
    pub bridge_channel: u64,
    /// Regex patterns; matching lines are not relayed in either direction.
    #[serde(default)]
    pub message_filter: Vec<String>,
}
