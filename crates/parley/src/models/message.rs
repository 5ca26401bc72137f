use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// An image carried by a message: uploaded by the user, or produced by a
/// generation or edit operation. Stored inline as base64 so conversations
/// round-trip through the store without a separate blob sidecar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRef {
    pub data: String,
    pub mime_type: String,
}

impl AssetRef {
    pub fn new<S: Into<String>, T: Into<String>>(data: S, mime_type: T) -> Self {
        AssetRef {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }
}

/// Marks a message as the outcome of an image operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageOp {
    Generated,
    Edited,
}

/// A message to or from the assistant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub created: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset: Option<AssetRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_op: Option<ImageOp>,
}

impl Message {
    /// Create a new user message with the current timestamp
    pub fn user() -> Self {
        Self::new(Role::User)
    }

    /// Create a new assistant message with the current timestamp
    pub fn assistant() -> Self {
        Self::new(Role::Assistant)
    }

    fn new(role: Role) -> Self {
        Message {
            id: Uuid::new_v4().to_string(),
            role,
            content: String::new(),
            created: Utc::now().timestamp(),
            asset: None,
            image_op: None,
        }
    }

    pub fn with_text<S: Into<String>>(mut self, text: S) -> Self {
        self.content = text.into();
        self
    }

    pub fn with_asset(mut self, asset: AssetRef) -> Self {
        self.asset = Some(asset);
        self
    }

    pub fn with_image_op(mut self, op: ImageOp) -> Self {
        self.image_op = Some(op);
        self
    }
}

/// The flat role/content pair sent to the relay or a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new<S: Into<String>>(role: Role, content: S) -> Self {
        ChatMessage {
            role,
            content: content.into(),
        }
    }
}

impl From<&Message> for ChatMessage {
    fn from(message: &Message) -> Self {
        ChatMessage {
            role: message.role,
            content: message.content.clone(),
        }
    }
}
