//! Conversation topics and chat payloads.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use workboard_common::{ApiError, EntityId, UserId};

/// A conversation scope on the broker.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Chat thread of an issue.
    Issue(EntityId),
    /// Live updates of a task. Receive-only.
    Task(EntityId),
}

impl Topic {
    /// Destination to SUBSCRIBE to.
    pub fn subscribe_destination(&self) -> String {
        match self {
            Self::Issue(id) => format!("/sub/issue/{id}"),
            Self::Task(id) => format!("/sub/tasks/{id}"),
        }
    }

    /// Destination to SEND to, if the topic accepts messages.
    pub fn publish_destination(&self) -> Option<String> {
        match self {
            Self::Issue(id) => Some(format!("/pub/issue/chat/{id}")),
            Self::Task(_) => None,
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Issue(id) => write!(f, "issue:{id}"),
            Self::Task(id) => write!(f, "task:{id}"),
        }
    }
}

/// A chat line as the broker echoes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(alias = "userId")]
    pub sender_id: UserId,
    #[serde(default, alias = "name", skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
    #[serde(alias = "content")]
    pub message: String,
    #[serde(default, alias = "createdAt", skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<String>,
}

impl ChatMessage {
    pub fn new(sender_id: UserId, message: impl Into<String>) -> Self {
        Self {
            sender_id,
            sender_name: None,
            message: message.into(),
            sent_at: None,
        }
    }

    /// Whether `user` sent this message. Ids compare in canonical form, so
    /// `7` and `"7"` on the wire are the same sender.
    pub fn is_from(&self, user: &UserId) -> bool {
        &self.sender_id == user
    }
}

/// A MESSAGE frame routed to a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub subscription: String,
    pub destination: String,
    pub message_id: Option<String>,
    pub body: String,
}

impl Delivery {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_str(&self.body).map_err(|e| ApiError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn destinations() {
        let issue = Topic::Issue(EntityId::from(12));
        assert_eq!(issue.subscribe_destination(), "/sub/issue/12");
        assert_eq!(issue.publish_destination().as_deref(), Some("/pub/issue/chat/12"));
        let task = Topic::Task(EntityId::from(5));
        assert_eq!(task.subscribe_destination(), "/sub/tasks/5");
        assert_eq!(task.publish_destination(), None);
    }

    #[test]
    fn sender_match_ignores_wire_type() {
        let numeric: ChatMessage =
            serde_json::from_str(r#"{"senderId":42,"message":"hi"}"#).unwrap();
        let text: ChatMessage =
            serde_json::from_str(r#"{"userId":" 42 ","content":"hi"}"#).unwrap();
        let me = UserId::from("42");
        assert!(numeric.is_from(&me));
        assert!(text.is_from(&me));
        assert!(!numeric.is_from(&UserId::from("420")));
    }

    #[test]
    fn delivery_json_reports_parse_errors() {
        let delivery = Delivery {
            subscription: "sub-0".into(),
            destination: "/sub/issue/1".into(),
            message_id: None,
            body: "{".into(),
        };
        assert!(matches!(delivery.json::<ChatMessage>(), Err(ApiError::Parse(_))));
    }
}
