use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::id::{EntityId, UserId};

/// Application-level events fanned out to every UI surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum UiEvent {
    SessionStarted { user_id: UserId },
    SessionEnded,
    /// The credential was discarded; the UI must show the login entry point.
    NavigateToLogin,
    AlarmReceived { alarm_id: EntityId, content: String },
    UnreadCountChanged(usize),
    ChatMessage { topic: String, from: UserId, text: String },
    MutationFailed { entity_id: String, message: String },
    #[serde(other)]
    Unknown,
}

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<UiEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UiEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: UiEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_and_receive() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(UiEvent::NavigateToLogin);

        let event = rx.recv().await.unwrap();
        assert!(matches!(event, UiEvent::NavigateToLogin));
    }

    #[tokio::test]
    async fn multiple_subscribers() {
        let bus = EventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(UiEvent::UnreadCountChanged(3));

        let e1 = rx1.recv().await.unwrap();
        let e2 = rx2.recv().await.unwrap();
        assert!(matches!(e1, UiEvent::UnreadCountChanged(3)));
        assert!(matches!(e2, UiEvent::UnreadCountChanged(3)));
    }

    #[tokio::test]
    async fn cloned_bus_shares_subscribers() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let clone = bus.clone();

        clone.publish(UiEvent::ChatMessage {
            topic: "/sub/issue/4".into(),
            from: UserId::new("bob"),
            text: "hello".into(),
        });

        let event = rx.recv().await.unwrap();
        assert!(
            matches!(event, UiEvent::ChatMessage { ref from, ref text, .. } if from.as_str() == "bob" && text == "hello")
        );
    }

    #[test]
    fn publish_returns_zero_with_no_subscribers() {
        let bus = EventBus::new(16);
        assert_eq!(bus.publish(UiEvent::SessionEnded), 0);
    }

    #[test]
    fn unknown_event_deserializes() {
        let json = r#"{"type":"SomethingNew","data":null}"#;
        let event: UiEvent = serde_json::from_str(json).unwrap();
        assert!(matches!(event, UiEvent::Unknown));
    }
}
