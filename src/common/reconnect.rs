//! Exponential backoff reconnection logic.

use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBuilder};

use crate::config::types::ReconnectConfig;

/// Bounded exponential backoff for re-establishing the Discord client.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    /// Initial delay before the first reconnection attempt.
    pub min_delay: Duration,
    /// Maximum delay between reconnection attempts.
    pub max_delay: Duration,
    /// Multiplier for each successive attempt.
    pub factor: f32,
    /// Maximum number of connection attempts, the first included
    /// (None = infinite).
    pub max_attempts: Option<usize>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from_config(&ReconnectConfig::default())
    }
}

impl ReconnectPolicy {
    pub fn from_config(config: &ReconnectConfig) -> Self {
        Self {
            min_delay: Duration::from_secs(config.min_delay_secs),
            max_delay: Duration::from_secs(config.max_delay_secs),
            factor: config.factor,
            max_attempts: config.max_attempts,
        }
    }

    /// Fresh delay iterator. Yields one delay between consecutive attempts
    /// and returns `None` once attempts are exhausted.
    ///
    /// Call again after a successful connection to reset the schedule.
    pub fn backoff(&self) -> impl Iterator<Item = Duration> {
        let builder = ExponentialBuilder::default()
            .with_min_delay(self.min_delay)
            .with_max_delay(self.max_delay)
            .with_factor(self.factor)
            .with_jitter();

        match self.max_attempts {
            Some(attempts) => builder.with_max_times(attempts.saturating_sub(1)).build(),
            None => builder.without_max_times().build(),
        }
    }
}
