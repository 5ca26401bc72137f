use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use super::base::{build_chat_payload, body_stream, error_from_response, ByteStream, CompletionProvider};
use super::configs::OpenAiProviderConfig;
use crate::errors::ChatError;
use crate::models::message::ChatMessage;

pub struct OpenAiProvider {
    client: Client,
    config: OpenAiProviderConfig,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiProviderConfig) -> Result<Self, ChatError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()
            .map_err(|e| ChatError::Network(e.to_string()))?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl CompletionProvider for OpenAiProvider {
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
