//! Conversation messaging over STOMP on a WebSocket.

mod client;
mod connection;
mod history;
mod message;
mod room;


pub use client::{chat_endpoint, ChatChannel, ChatOptions};
pub use history::{ChatHistory, ChatHistoryConfig};
pub use message::{ChatMessage, Delivery, Topic};
pub use room::ChatRoom;
