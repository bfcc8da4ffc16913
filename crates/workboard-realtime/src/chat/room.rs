//! One joined conversation: history, UI fan-out, and sending.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;
use workboard_common::{ApiError, EventBus, UiEvent, UserId};

use super::client::ChatChannel;
use super::history::ChatHistory;
use super::message::{ChatMessage, Topic};

pub struct ChatRoom {
    channel: Arc<ChatChannel>,
    topic: Topic,
    me: UserId,
    subscription: String,
    history: Arc<Mutex<ChatHistory>>,
}

impl ChatRoom {
    /// Subscribe to `topic`. Every chat line received is stored in `history`
    /// and published on `events`.
    pub async fn join(
        channel: Arc<ChatChannel>,
        topic: Topic,
        me: UserId,
        history: Arc<Mutex<ChatHistory>>,
        events: EventBus,
    ) -> Result<Self, ApiError> {
        let sink = Arc::clone(&history);
        let room_topic = topic.clone();
        let subscription = channel
            .subscribe_topic(&topic, move |delivery| {
                let msg: ChatMessage = match delivery.json() {
                    Ok(msg) => msg,
                    Err(e) => {
                        debug!(destination = %delivery.destination, error = %e, "not a chat message");
                        return;
                    }
                };
                let event = UiEvent::ChatMessage {
                    topic: room_topic.to_string(),
                    from: msg.sender_id.clone(),
                    text: msg.message.clone(),
                };
                sink.lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(&room_topic, msg);
                events.publish(event);
            })
            .await?;

        Ok(Self {
            channel,
            topic,
            me,
            subscription,
            history,
        })
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    pub fn me(&self) -> &UserId {
        &self.me
    }

    /// Send a line as the signed-in user. It shows up in the room once the
    /// broker echoes it back.
    pub async fn send(&self, text: &str) -> Result<(), ApiError> {
        let destination = self.topic.publish_destination().ok_or_else(|| {
            ApiError::InvalidRequest(format!("{} does not accept messages", self.topic))
        })?;
        self.channel
            .publish(&destination, &ChatMessage::new(self.me.clone(), text))
            .await
    }

    /// Messages received so far, oldest first, each flagged when it is ours.
    pub fn messages(&self) -> Vec<(ChatMessage, bool)> {
        let history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        history
            .all(&self.topic)
            .into_iter()
            .map(|m| (m.clone(), m.is_from(&self.me)))
            .collect()
    }

    pub async fn leave(self) -> Result<(), ApiError> {
        self.channel.unsubscribe(&self.subscription).await
    }
}
