use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde_json::json;
use std::time::Duration;

use crate::errors::ChatError;
use crate::models::message::ChatMessage;
use crate::providers::base::{body_stream, error_from_response, ByteStream, CompletionProvider};
use crate::providers::configs::{ProviderConfig, ProviderKind};
use crate::providers::factory;
use crate::stream::decoder::{Frame, SseDecoder};

/// The unit yielded to callers: a text increment, or the end-of-stream
/// marker (`done` with empty content, always the last value).
#[derive(Debug, Clone, PartialEq)]
pub struct StreamChunk {
    pub content: String,
    pub done: bool,
}

impl StreamChunk {
    pub fn content(text: impl Into<String>) -> Self {
        StreamChunk {
            content: text.into(),
            done: false,
        }
    }

    pub fn done() -> Self {
        StreamChunk {
            content: String::new(),
            done: true,
        }
    }
}

/// Where completion bytes come from: the relay, or a provider called
/// directly with a local credential. Implementations only open the
/// connection; framing and accumulation live in [`reply_stream`].
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn open(&self, messages: &[ChatMessage]) -> Result<ByteStream, ChatError>;
}

/// Calls a provider directly with a caller-supplied credential.
pub struct DirectBackend {
    provider: Box<dyn CompletionProvider>,
}

impl DirectBackend {
    pub fn new(provider: Box<dyn CompletionProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl CompletionBackend for DirectBackend {
    async fn open(&self, messages: &[ChatMessage]) -> Result<ByteStream, ChatError> {
        self.provider.stream_completion(messages).await
    }
}

/// Sends the conversation to the relay, which holds the credential.
pub struct RelayBackend {
    client: reqwest::Client,
    relay_url: String,
    provider: ProviderKind,
}

impl RelayBackend {
    pub fn new(relay_url: impl Into<String>, provider: ProviderKind) -> Result<Self, ChatError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(600))
            .build()
            .map_err(|e| ChatError::Network(e.to_string()))?;
        Ok(Self {
            client,
            relay_url: relay_url.into(),
            provider,
        })
    }
}

#[async_trait]
impl CompletionBackend for RelayBackend {
    async fn open(&self, messages: &[ChatMessage]) -> Result<ByteStream, ChatError> {
        let url = format!("{}/relay/chat", self.relay_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .json(&json!({
                "messages": messages,
                "provider": self.provider,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        Ok(body_stream(response))
    }
}

/// Pick a backend: the relay keeps the credential server-side, so it wins
/// whenever one is configured and the caller supplied no key of their own.
pub fn resolve_backend(
    relay_url: Option<String>,
    credential: Option<String>,
    kind: ProviderKind,
) -> Result<Box<dyn CompletionBackend>, ChatError> {
    match (relay_url, credential) {
        (Some(url), None) => Ok(Box::new(RelayBackend::new(url, kind)?)),
        (_, Some(key)) => Ok(Box::new(DirectBackend::new(factory::get_provider(
            ProviderConfig::for_kind(kind, key),
        )?))),
        (None, None) => Err(ChatError::MissingCredential(
            kind.credential_var().to_string(),
        )),
    }
}

/// Convenience entry point: resolve the backend and open the stream in one
/// call. Behaves identically whether the relay or a direct provider
/// answers.
pub async fn stream_chat(
    messages: &[ChatMessage],
    relay_url: Option<String>,
    credential: Option<String>,
    kind: ProviderKind,
) -> Result<BoxStream<'static, Result<StreamChunk, ChatError>>, ChatError> {
    let backend = resolve_backend(relay_url, credential, kind)?;
    reply_stream(backend.as_ref(), messages).await
}

/// Open a completion request and expose it as a lazy, single-pass,
/// non-restartable sequence of [`StreamChunk`]. There is one suspension
/// point per chunk read; a transport failure mid-stream surfaces as an
/// `Err` item, never as a silent end.
pub async fn reply_stream(
    backend: &dyn CompletionBackend,
    messages: &[ChatMessage],
) -> Result<BoxStream<'static, Result<StreamChunk, ChatError>>, ChatError> {
    let mut bytes = backend.open(messages).await?;

    Ok(Box::pin(async_stream::try_stream! {
        let mut decoder = SseDecoder::new();
        'read: while let Some(chunk) = bytes.next().await {
            let chunk = chunk?;
            for frame in decoder.feed(&chunk) {
                match frame {
                    Frame::Delta { content: Some(text), .. } if !text.is_empty() => {
                        yield StreamChunk::content(text);
                    }
                    Frame::Delta { .. } => {}
                    Frame::Done => break 'read,
                }
            }
        }
        // One terminal chunk whether the sentinel arrived or the body just
        // ended; a read error above skips this and surfaces instead.
        yield StreamChunk::done();
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures::stream;

    /// Backend that replays a fixed sequence of reads.
    struct ScriptedBackend {
        reads: Vec<Result<Vec<u8>, ChatError>>,
    }

    impl ScriptedBackend {
        fn new(reads: Vec<Result<Vec<u8>, ChatError>>) -> Self {
            Self { reads }
        }

        fn from_bytes(reads: Vec<&[u8]>) -> Self {
            Self::new(reads.into_iter().map(|r| Ok(r.to_vec())).collect())
        }
    }

    #[async_trait]
    impl CompletionBackend for ScriptedBackend {
        async fn open(&self, _messages: &[ChatMessage]) -> Result<ByteStream, ChatError> {
            let reads: Vec<Result<Bytes, ChatError>> = self
                .reads
                .iter()
                .map(|r| match r {
                    Ok(bytes) => Ok(Bytes::from(bytes.clone())),
                    Err(e) => Err(ChatError::Network(e.to_string())),
                })
                .collect();
            Ok(Box::pin(stream::iter(reads)))
        }
    }

    fn frame(text: &str) -> String {
        format!(
            "data: {{\"choices\":[{{\"delta\":{{\"content\":\"{}\"}}}}]}}\n\n",
            text
        )
    }

    async fn collect(backend: &dyn CompletionBackend) -> Vec<Result<StreamChunk, ChatError>> {
        let mut stream = reply_stream(backend, &[]).await.unwrap();
        let mut chunks = Vec::new();
        while let Some(item) = stream.next().await {
            chunks.push(item);
        }
        chunks
    }

    #[tokio::test]
    async fn test_single_write_and_many_writes_agree() {
        let body = format!("{}{}{}data: [DONE]\n\n", frame("a"), frame("b"), frame("c"));

        let whole = ScriptedBackend::from_bytes(vec![body.as_bytes()]);
        let pieces = ScriptedBackend::new(
            body.as_bytes()
                .chunks(3)
                .map(|c| Ok(c.to_vec()))
                .collect(),
        );

        let concat = |chunks: Vec<Result<StreamChunk, ChatError>>| {
            chunks
                .into_iter()
                .map(|c| c.unwrap())
                .take_while(|c| !c.done)
                .map(|c| c.content)
                .collect::<String>()
        };

        assert_eq!(concat(collect(&whole).await), "abc");
        assert_eq!(concat(collect(&pieces).await), "abc");
    }

    #[tokio::test]
    async fn test_terminal_chunk_is_last_and_empty() {
        let body = format!("{}data: [DONE]\n\n", frame("x"));
        let backend = ScriptedBackend::from_bytes(vec![body.as_bytes()]);

        let chunks: Vec<StreamChunk> = collect(&backend)
            .await
            .into_iter()
            .map(|c| c.unwrap())
            .collect();
        assert_eq!(
            chunks,
            vec![StreamChunk::content("x"), StreamChunk::done()]
        );
    }

    #[tokio::test]
    async fn test_malformed_middle_frame_skipped() {
        let body = "data: {bad\n\ndata: {\"choices\":[{\"delta\":{\"content\":\"x\"}}]}\n\ndata: [DONE]\n\n";
        let backend = ScriptedBackend::from_bytes(vec![body.as_bytes()]);

        let chunks: Vec<StreamChunk> = collect(&backend)
            .await
            .into_iter()
            .map(|c| c.unwrap())
            .collect();
        assert_eq!(
            chunks,
            vec![StreamChunk::content("x"), StreamChunk::done()]
        );
    }

    #[tokio::test]
    async fn test_read_failure_propagates() {
        let backend = ScriptedBackend::new(vec![
            Ok(frame("partial").into_bytes()),
            Err(ChatError::Network("connection reset".to_string())),
        ]);

        let chunks = collect(&backend).await;
        assert_eq!(chunks.len(), 2);
        assert_eq!(*chunks[0].as_ref().unwrap(), StreamChunk::content("partial"));
        assert!(matches!(chunks[1], Err(ChatError::Network(_))));
    }

    #[tokio::test]
    async fn test_missing_sentinel_still_terminates() {
        let backend = ScriptedBackend::from_bytes(vec![frame("only").as_bytes()]);
        let chunks: Vec<StreamChunk> = collect(&backend)
            .await
            .into_iter()
            .map(|c| c.unwrap())
            .collect();
        assert_eq!(chunks.last(), Some(&StreamChunk::done()));
    }

    #[tokio::test]
    async fn test_bytes_after_done_are_not_yielded() {
        let body = format!("data: [DONE]\n\n{}", frame("late"));
        let backend = ScriptedBackend::from_bytes(vec![body.as_bytes()]);

        let chunks: Vec<StreamChunk> = collect(&backend)
            .await
            .into_iter()
            .map(|c| c.unwrap())
            .collect();
        assert_eq!(chunks, vec![StreamChunk::done()]);
    }

    #[test]
    fn test_resolve_backend_requires_some_route() {
        let err = resolve_backend(None, None, ProviderKind::OpenAi).err().unwrap();
        assert!(matches!(err, ChatError::MissingCredential(_)));
        assert!(err.to_string().contains("PARLEY_OPENAI_API_KEY"));
    }

    #[test]
    fn test_resolve_backend_prefers_relay_without_credential() {
        // Both configured: an explicit credential bypasses the relay.
        assert!(resolve_backend(
            Some("http://localhost:3000".to_string()),
            None,
            ProviderKind::Groq
        )
        .is_ok());
        assert!(resolve_backend(
            Some("http://localhost:3000".to_string()),
            Some("sk-local".to_string()),
            ProviderKind::Groq
        )
        .is_ok());
    }
}
