//! Push channels for the workboard client.
//!
//! - Alarm stream over Server-Sent Events, with toast/badge fan-out
//! - Conversation chat over STOMP on a WebSocket, with per-topic history
//!
//! Every channel is owned by whoever opened it and must be closed by it;
//! nothing here reconnects unless a backoff policy asks for it.

pub mod chat;
pub mod feed;
pub mod notification;
pub mod reconnect;
pub mod sse;
pub mod state;
pub mod stomp;

pub use chat::{
    chat_endpoint, ChatChannel, ChatHistory, ChatHistoryConfig, ChatMessage, ChatOptions,
    ChatRoom, Delivery, Topic,
};
pub use feed::AlarmFeed;
pub use notification::{alarms_endpoint, NotificationChannel, RealtimeEvent, Subscription};
pub use reconnect::ReconnectPolicy;
pub use state::ChannelState;
pub use stomp::{Frame, StompError};
