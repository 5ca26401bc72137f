use axum::{
    extract::State,
    http,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use futures::{stream::StreamExt, Stream};
use serde_json::{json, Value};
use std::{
    convert::Infallible,
    pin::Pin,
    task::{Context, Poll},
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use parley::models::message::{ChatMessage, Role};
use parley::providers::base::ByteStream;
use parley::providers::configs::{
    GroqProviderConfig, OpenAiProviderConfig, ProviderConfig, ProviderKind,
};
use parley::providers::factory;
use parley::stream::decoder::{Frame, SseDecoder, DONE_SENTINEL};

use crate::error::RelayError;
use crate::state::AppState;

/// Streaming response body re-emitted to the caller.
pub struct SseResponse {
    rx: ReceiverStream<String>,
}

impl SseResponse {
    fn new(rx: ReceiverStream<String>) -> Self {
        Self { rx }
    }
}

impl Stream for SseResponse {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.rx)
            .poll_next(cx)
            .map(|opt| opt.map(|s| Ok(Bytes::from(s))))
    }
}

impl IntoResponse for SseResponse {
    fn into_response(self) -> axum::response::Response {
        let body = axum::body::Body::from_stream(self);

        http::Response::builder()
            .header("Content-Type", "text/event-stream")
            .header("Cache-Control", "no-cache")
            .header("Connection", "keep-alive")
            .body(body)
            .unwrap()
    }
}

/// Parse and validate the request body. `messages` must be a non-empty
/// array of role/content objects; anything else is the caller's error, not
/// something to silently default.
fn parse_request(body: &Value) -> Result<(Vec<ChatMessage>, ProviderKind), RelayError> {
    let raw = body
        .get("messages")
        .ok_or_else(|| RelayError::BadRequest("missing `messages` array".to_string()))?
        .as_array()
        .ok_or_else(|| RelayError::BadRequest("`messages` must be an array".to_string()))?;
    if raw.is_empty() {
        return Err(RelayError::BadRequest(
            "`messages` must not be empty".to_string(),
        ));
    }

    let mut messages = Vec::with_capacity(raw.len());
    for (index, entry) in raw.iter().enumerate() {
        let role = entry.get("role").and_then(Value::as_str);
        let content = entry.get("content").and_then(Value::as_str);
        let (role, content) = match (role, content) {
            (Some(role), Some(content)) => (role, content),
            _ => {
                return Err(RelayError::BadRequest(format!(
                    "message {index} must have string `role` and `content`"
                )))
            }
        };
        let role = match role {
            "user" => Role::User,
            "assistant" => Role::Assistant,
            other => {
                return Err(RelayError::BadRequest(format!(
                    "message {index} has unknown role {other:?}"
                )))
            }
        };
        messages.push(ChatMessage::new(role, content));
    }

    let provider = match body.get("provider") {
        None | Some(Value::Null) => ProviderKind::OpenAi,
        Some(value) => serde_json::from_value(value.clone())
            .map_err(|_| RelayError::BadRequest(format!("unknown provider {value}")))?,
    };

    Ok((messages, provider))
}

fn provider_config(state: &AppState, kind: ProviderKind, api_key: String) -> ProviderConfig {
    match kind {
        ProviderKind::OpenAi => ProviderConfig::OpenAi(OpenAiProviderConfig {
            host: state.upstream.openai_host.clone(),
            api_key,
            model: state.upstream.openai_model.clone(),
        }),
        ProviderKind::Groq => ProviderConfig::Groq(GroqProviderConfig {
            host: state.upstream.groq_host.clone(),
            api_key,
            model: state.upstream.groq_model.clone(),
        }),
    }
}

/// Forward upstream frames to the caller. Only frames carrying a content
/// delta are re-encoded; everything else is swallowed. The terminal marker
/// is sent exactly once, whether the upstream ended cleanly, errored, or
/// the caller went away mid-stream.
pub(crate) async fn forward_stream(mut upstream: ByteStream, tx: mpsc::Sender<String>) {
    let mut decoder = SseDecoder::new();
    'read: while let Some(chunk) = upstream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::error!("upstream read failed mid-stream: {e}");
                break;
            }
        };
        for frame in decoder.feed(&chunk) {
            match frame {
                Frame::Delta {
                    content: Some(text),
                    ..
                } if !text.is_empty() => {
                    let event = format!(
                        "data: {}\n\n",
                        json!({"choices": [{"delta": {"content": text}}]})
                    );
                    if tx.send(event).await.is_err() {
                        // Caller hung up; dropping the upstream body closes
                        // the provider connection.
                        break 'read;
                    }
                }
                Frame::Delta { .. } => {}
                Frame::Done => break 'read,
            }
        }
    }
    let _ = tx.send(format!("data: {DONE_SENTINEL}\n\n")).await;
}

async fn handler(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<SseResponse, RelayError> {
    let (messages, kind) = parse_request(&body)?;

    let api_key = state
        .keys
        .key_for(kind)
        .ok_or_else(|| RelayError::MissingCredential {
            provider: kind.name().to_string(),
            var: kind.credential_var().to_string(),
        })?
        .to_string();

    let provider = factory::get_provider(provider_config(&state, kind, api_key))?;
    let upstream = provider.stream_completion(&messages).await?;

    tracing::debug!(provider = kind.name(), messages = messages.len(), "forwarding completion stream");

    let (tx, rx) = mpsc::channel(100);
    tokio::spawn(forward_stream(upstream, tx));

    Ok(SseResponse::new(ReceiverStream::new(rx)))
}

// Configure routes for this module
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/relay/chat", post(handler))
        .with_state(state)
}
