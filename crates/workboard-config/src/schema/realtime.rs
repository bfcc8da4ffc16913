//! Push-channel configuration: the alarm event stream and the chat socket.

use serde::{Deserialize, Serialize};

/// What a push channel does after its transport fails.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReconnectMode {
    /// Stay closed until the owner reopens it.
    #[default]
    Manual,
    /// Reopen with exponential backoff.
    Backoff,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    pub mode: ReconnectMode,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            mode: ReconnectMode::Manual,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeConfig {
    /// Event-stream path for alarms.
    pub alarms_path: String,
    /// WebSocket path of the STOMP broker.
    pub chat_path: String,
    /// STOMP heart-beat interval in seconds; 0 disables heart-beats.
    pub heartbeat_secs: u32,
    /// Connect/handshake timeout in seconds (valid range: 1-120).
    pub connect_timeout_secs: u32,
    pub reconnect: ReconnectConfig,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            alarms_path: "/api/alarms/subscribe".into(),
            chat_path: "/ws-stomp".into(),
            heartbeat_secs: 10,
            connect_timeout_secs: 15,
            reconnect: ReconnectConfig::default(),
        }
    }
}
