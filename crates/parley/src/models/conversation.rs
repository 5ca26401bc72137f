use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::message::{ChatMessage, Message};

/// How many characters of the first user message become the title.
const TITLE_LENGTH: usize = 50;

pub const DEFAULT_TITLE: &str = "New conversation";

/// An ordered exchange of messages. Insertion order is conversation order
/// and messages are never reordered; the only message mutated after
/// insertion is the open assistant message a stream is appending to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub title: String,
    pub messages: Vec<Message>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new() -> Self {
        Conversation {
            id: Uuid::new_v4().to_string(),
            title: DEFAULT_TITLE.to_string(),
            messages: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    pub fn add_message(&mut self, message: Message) {
        self.messages.push(message);
        self.updated_at = Utc::now();
    }

    /// Append streamed text to the open (last) assistant message.
    pub fn append_to_open(&mut self, text: &str) {
        if let Some(message) = self.messages.last_mut() {
            message.content.push_str(text);
        }
        self.updated_at = Utc::now();
    }

    /// The flat message list sent upstream.
    pub fn context(&self) -> Vec<ChatMessage> {
        self.messages.iter().map(ChatMessage::from).collect()
    }

    /// True once exactly one user/assistant exchange has happened.
    pub fn is_first_exchange(&self) -> bool {
        self.messages.len() == 2
    }

    pub fn derive_title(text: &str) -> String {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return DEFAULT_TITLE.to_string();
        }
        trimmed.chars().take(TITLE_LENGTH).collect()
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::message::Role;

    #[test]
    fn test_add_message_preserves_order() {
        let mut conversation = Conversation::new();
        conversation.add_message(Message::user().with_text("first"));
        conversation.add_message(Message::assistant().with_text("second"));
        conversation.add_message(Message::user().with_text("third"));

        let contents: Vec<&str> = conversation
            .messages
            .iter()
            .map(|m| m.content.as_str())
            .collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_append_to_open_grows_last_message() {
        let mut conversation = Conversation::new();
        conversation.add_message(Message::user().with_text("question"));
        conversation.add_message(Message::assistant());

        conversation.append_to_open("Hello");
        conversation.append_to_open(", world");

        assert_eq!(conversation.messages.last().unwrap().content, "Hello, world");
        assert_eq!(conversation.messages.first().unwrap().content, "question");
    }

    #[test]
    fn test_context_flattens_messages() {
        let mut conversation = Conversation::new();
        conversation.add_message(Message::user().with_text("hi"));
        conversation.add_message(Message::assistant().with_text("hello"));

        let context = conversation.context();
        assert_eq!(context.len(), 2);
        assert_eq!(context[0].role, Role::User);
        assert_eq!(context[1].content, "hello");
    }

    #[test]
    fn test_derive_title_truncates_on_char_boundary() {
        assert_eq!(Conversation::derive_title("Explain recursion"), "Explain recursion");
        assert_eq!(Conversation::derive_title("   "), DEFAULT_TITLE);

        let long = "é".repeat(80);
        let title = Conversation::derive_title(&long);
        assert_eq!(title.chars().count(), 50);
    }

    #[test]
    fn test_first_exchange() {
        let mut conversation = Conversation::new();
        conversation.add_message(Message::user().with_text("q"));
        assert!(!conversation.is_first_exchange());
        conversation.add_message(Message::assistant().with_text("a"));
        assert!(conversation.is_first_exchange());
        conversation.add_message(Message::user().with_text("q2"));
        assert!(!conversation.is_first_exchange());
    }
}
