use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use super::base::{build_chat_payload, body_stream, error_from_response, ByteStream, CompletionProvider};
use super::configs::GroqProviderConfig;
use crate::errors::ChatError;
use crate::models::message::ChatMessage;

/// Groq speaks the OpenAI-compatible chat-completions wire format; only the
/// endpoint and model id differ.
pub struct GroqProvider {
    client: Client,
    config: GroqProviderConfig,
}

impl GroqProvider {
    pub fn new(config: GroqProviderConfig) -> Result<Self, ChatError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600))
            .build()
            .map_err(|e| ChatError::Network(e.to_string()))?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl CompletionProvider for GroqProvider {
    async fn stream_completion(&self, messages: &[ChatMessage]) -> Result<ByteStream, ChatError> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.host.trim_end_matches('/')
        );
        let payload = build_chat_payload(&self.config.model, messages);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }
        Ok(body_stream(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::message::Role;
    use futures::StreamExt;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_uses_configured_model() {
        let server = MockServer::start().await;
        let body = "data: [DONE]\n\n";
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({"model": "llama-3.3-70b-versatile"})))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let config = GroqProviderConfig {
            host: server.uri(),
            api_key: "k".to_string(),
            model: "llama-3.3-70b-versatile".to_string(),
        };
        let provider = GroqProvider::new(config).unwrap();
        let mut stream = provider
            .stream_completion(&[ChatMessage::new(Role::User, "hi")])
            .await
            .unwrap();

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(&first[..], body.as_bytes());
    }
}
