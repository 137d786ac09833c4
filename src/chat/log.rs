use serde::Serialize;

use crate::core::message::Message;

/// Derived display statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LogStats {
    pub message_count: usize,
    /// Total content characters divided by four, rounded up.
    pub token_estimate: usize,
}

/// Ordered messages of the active session. Insertion order is display order;
/// appended messages are never modified.
#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    messages: Vec<Message>,
    content_chars: usize,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_messages(messages: Vec<Message>) -> Self {
        let content_chars = messages.iter().map(|m| m.content.chars().count()).sum();
        Self {
            messages,
            content_chars,
        }
    }

    pub fn append(&mut self, message: Message) -> LogStats {
        self.content_chars += message.content.chars().count();
        self.messages.push(message);
        self.stats()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.content_chars = 0;
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn stats(&self) -> LogStats {
        LogStats {
            message_count: self.messages.len(),
            token_estimate: self.content_chars.div_ceil(4),
        }
    }
}
