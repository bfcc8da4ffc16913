use std::time::Duration;

use workboard_config::{ReconnectConfig, ReconnectMode};

/// What a push channel does after its transport fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconnectPolicy {
    /// Stay down until the owner reopens the channel.
    #[default]
    Manual,
    /// Reopen after `base`, doubling per consecutive failure up to `max`.
    Backoff { base: Duration, max: Duration },
}

impl ReconnectPolicy {
    pub fn from_config(config: &ReconnectConfig) -> Self {
        match config.mode {
            ReconnectMode::Manual => Self::Manual,
            ReconnectMode::Backoff => Self::Backoff {
                base: Duration::from_millis(config.base_delay_ms),
                max: Duration::from_millis(config.max_delay_ms),
            },
        }
    }

    /// Delay before reconnect attempt `attempt` (0 = first retry), or
    /// `None` when the channel should stay closed.
    pub fn delay(&self, attempt: u32) -> Option<Duration> {
        match *self {
            Self::Manual => None,
            Self::Backoff { base, max } => {
                let factor = 1u32 << attempt.min(16);
                Some(base.saturating_mul(factor).min(max))
            }
        }
    }
}
