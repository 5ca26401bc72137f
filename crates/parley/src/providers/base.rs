use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::TryStreamExt;
use serde_json::{json, Value};

use crate::errors::ChatError;
use crate::models::message::ChatMessage;

/// Raw streamed response body, as delivered by the transport.
pub type ByteStream = BoxStream<'static, Result<Bytes, ChatError>>;

/// How many trailing conversation messages go upstream; older ones are
/// dropped to stay inside provider token limits.
pub const MAX_CONTEXT_MESSAGES: usize = 20;

pub const TEMPERATURE: f32 = 0.7;
pub const MAX_TOKENS: i32 = 4000;

/// Fixed behavioral instruction prepended to every upstream request.
pub const SYSTEM_PROMPT: &str = "You are a concise, friendly chat assistant. \
Answer in the language the user writes in, and put code in fenced blocks.";

/// Base trait for streaming completion providers (OpenAI, Groq, etc)
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Issue the completion request and hand back the live response body.
    async fn stream_completion(&self, messages: &[ChatMessage]) -> Result<ByteStream, ChatError>;
}

/// Build the chat-completions payload shared by the OpenAI-compatible
/// providers: system instruction first, then the most recent messages.
pub fn build_chat_payload(model: &str, messages: &[ChatMessage]) -> Value {
    let start = messages.len().saturating_sub(MAX_CONTEXT_MESSAGES);
    let mut messages_array = vec![json!({
        "role": "system",
        "content": SYSTEM_PROMPT
    })];
    messages_array.extend(
        messages[start..]
            .iter()
            .map(|m| json!({"role": m.role, "content": m.content})),
    );

    json!({
        "model": model,
        "messages": messages_array,
        "stream": true,
        "temperature": TEMPERATURE,
        "max_tokens": MAX_TOKENS,
    })
}

/// Map a non-2xx response to an upstream error, surfacing the provider's
/// structured message when the body carries one.
pub async fn error_from_response(response: reqwest::Response) -> ChatError {
    let status = response.status();
    let fallback = status
        .canonical_reason()
        .unwrap_or("request failed")
        .to_string();
    let message = match response.json::<Value>().await {
        Ok(body) => body
            .pointer("/error/message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or(fallback),
        Err(_) => fallback,
    };
    ChatError::upstream(status.as_u16(), message)
}

/// Expose a successful response's body as a ByteStream.
pub fn body_stream(response: reqwest::Response) -> ByteStream {
    Box::pin(
        response
            .bytes_stream()
            .map_err(|e| ChatError::Network(e.to_string())),
    )
}
