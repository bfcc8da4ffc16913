//! Received chat messages, kept per topic in a bounded ring buffer.

use std::collections::{HashMap, VecDeque};

use super::message::{ChatMessage, Topic};

#[derive(Debug, Clone)]
pub struct ChatHistoryConfig {
    /// Maximum messages retained per topic.
    pub max_messages_per_topic: usize,
}

impl Default for ChatHistoryConfig {
    fn default() -> Self {
        Self {
            max_messages_per_topic: 500,
        }
    }
}

#[derive(Debug)]
pub struct ChatHistory {
    config: ChatHistoryConfig,
    topics: HashMap<Topic, VecDeque<ChatMessage>>,
}

impl ChatHistory {
    pub fn new(config: ChatHistoryConfig) -> Self {
        Self {
            config,
            topics: HashMap::new(),
        }
    }

    /// Oldest messages are evicted once the topic is full.
    pub fn push(&mut self, topic: &Topic, msg: ChatMessage) {
        let cap = self.config.max_messages_per_topic.max(1);
        let buf = self.topics.entry(topic.clone()).or_default();
        while buf.len() >= cap {
            buf.pop_front();
        }
        buf.push_back(msg);
    }

    /// The most recent `limit` messages, oldest first.
    pub fn recent(&self, topic: &Topic, limit: usize) -> Vec<&ChatMessage> {
        match self.topics.get(topic) {
            Some(buf) => buf.iter().skip(buf.len().saturating_sub(limit)).collect(),
            None => Vec::new(),
        }
    }

    pub fn all(&self, topic: &Topic) -> Vec<&ChatMessage> {
        self.recent(topic, usize::MAX)
    }

    pub fn clear_topic(&mut self, topic: &Topic) {
        self.topics.remove(topic);
    }

    pub fn clear_all(&mut self) {
        self.topics.clear();
    }

    pub fn total_messages(&self) -> usize {
        self.topics.values().map(VecDeque::len).sum()
    }
}

impl Default for ChatHistory {
    fn default() -> Self {
        Self::new(ChatHistoryConfig::default())
    }
}
