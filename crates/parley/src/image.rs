//! Non-streaming image side channel: synthesis and the supported edits.
//! Generation goes through the relay when one is configured (the relay
//! holds the inference token); edits run against the segmentation endpoint
//! directly, where the token is optional.
use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use crate::models::message::AssetRef;

pub const HF_INFERENCE_HOST: &str = "https://api-inference.huggingface.co";
pub const DEFAULT_IMAGE_MODEL: &str = "stabilityai/stable-diffusion-xl-base-1.0";
pub const DEFAULT_SEGMENTATION_MODEL: &str = "briaai/RMBG-1.4";

#[derive(Error, Debug)]
pub enum ImageError {
    /// The model is still loading; retry after roughly `estimated_time` seconds.
    #[error("image model is loading, retry in about {estimated_time:.0}s")]
    Loading { estimated_time: f64 },

    #[error("image request failed ({status}): {message}")]
    Upstream { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),
}

impl ImageError {
    /// Translate the failure into the message shown to the end user.
    pub fn user_message(&self) -> String {
        match self {
            ImageError::Loading { estimated_time } => format!(
                "The image model is still warming up. Try again in about {estimated_time:.0} seconds."
            ),
            ImageError::Upstream { message, .. } => {
                format!("The image service returned an error: {message}")
            }
            ImageError::Network(_) => {
                "Failed to reach the image service. Check your connection and try again."
                    .to_string()
            }
        }
    }
}

impl From<reqwest::Error> for ImageError {
    fn from(err: reqwest::Error) -> Self {
        ImageError::Network(err.to_string())
    }
}

/// The loading envelope the inference API returns with a 503.
#[derive(Debug, Deserialize)]
pub struct LoadingEnvelope {
    pub error: String,
    #[serde(default)]
    pub estimated_time: f64,
}

#[async_trait]
pub trait ImageBackend: Send + Sync {
    /// Synthesize an image from a text prompt.
    async fn generate(&self, prompt: &str) -> Result<AssetRef, ImageError>;

    /// Produce a copy of `asset` with the background removed.
    async fn remove_background(&self, asset: &AssetRef) -> Result<AssetRef, ImageError>;
}

/// Talks to the inference API directly. Used by the relay (with its own
/// token) and by relay-less clients.
pub struct HfImageClient {
    client: reqwest::Client,
    host: String,
    token: Option<String>,
    image_model: String,
    segmentation_model: String,
}

impl HfImageClient {
    pub fn new(token: Option<String>) -> Result<Self, ImageError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| ImageError::Network(e.to_string()))?;
        Ok(Self {
            client,
            host: HF_INFERENCE_HOST.to_string(),
            token,
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            segmentation_model: DEFAULT_SEGMENTATION_MODEL.to_string(),
        })
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_image_model(mut self, model: impl Into<String>) -> Self {
        self.image_model = model.into();
        self
    }

    pub fn with_segmentation_model(mut self, model: impl Into<String>) -> Self {
        self.segmentation_model = model.into();
        self
    }

    /// Run the text-to-image model and return the raw bytes plus content type.
    pub async fn generate_bytes(&self, prompt: &str) -> Result<(Vec<u8>, String), ImageError> {
        let url = format!(
            "{}/models/{}",
            self.host.trim_end_matches('/'),
            self.image_model
        );
        let mut request = self
            .client
            .post(&url)
            .json(&serde_json::json!({"inputs": prompt}));
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }
        let response = request.send().await?;
        read_image_response(response).await
    }

    async fn segment_bytes(&self, image: Vec<u8>, mime_type: &str) -> Result<(Vec<u8>, String), ImageError> {
        let url = format!(
            "{}/models/{}",
            self.host.trim_end_matches('/'),
            self.segmentation_model
        );
        let mut request = self
            .client
            .post(&url)
            .header("Content-Type", mime_type.to_string())
            .body(image);
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }
        let response = request.send().await?;
        read_image_response(response).await
    }
}

#[async_trait]
impl ImageBackend for HfImageClient {
    async fn generate(&self, prompt: &str) -> Result<AssetRef, ImageError> {
        let (bytes, mime_type) = self.generate_bytes(prompt).await?;
        Ok(encode_asset(&bytes, mime_type))
    }

    async fn remove_background(&self, asset: &AssetRef) -> Result<AssetRef, ImageError> {
        let bytes = decode_asset(asset)?;
        let (bytes, mime_type) = self.segment_bytes(bytes, &asset.mime_type).await?;
        Ok(encode_asset(&bytes, mime_type))
    }
}

/// Generation via the relay's image endpoint; edits still go direct, since
/// the segmentation endpoint works without a token.
pub struct RelayImageClient {
    client: reqwest::Client,
    relay_url: String,
    direct: HfImageClient,
}

impl RelayImageClient {
    pub fn new(relay_url: impl Into<String>) -> Result<Self, ImageError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| ImageError::Network(e.to_string()))?;
        Ok(Self {
            client,
            relay_url: relay_url.into(),
            direct: HfImageClient::new(None)?,
        })
    }
}

#[async_trait]
impl ImageBackend for RelayImageClient {
    async fn generate(&self, prompt: &str) -> Result<AssetRef, ImageError> {
        let url = format!("{}/relay/image", self.relay_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({"prompt": prompt}))
            .send()
            .await?;
        let (bytes, mime_type) = read_image_response(response).await?;
        Ok(encode_asset(&bytes, mime_type))
    }

    async fn remove_background(&self, asset: &AssetRef) -> Result<AssetRef, ImageError> {
        self.direct.remove_background(asset).await
    }
}

/// Shared success/failure handling for endpoints that answer with either
/// raw image bytes or a JSON error envelope.
async fn read_image_response(response: reqwest::Response) -> Result<(Vec<u8>, String), ImageError> {
    let status = response.status();
    if status.is_success() {
        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/png")
            .to_string();
        let bytes = response.bytes().await?;
        return Ok((bytes.to_vec(), mime_type));
    }

    let code = status.as_u16();
    let body = response.text().await.unwrap_or_default();
    if code == 503 {
        if let Ok(envelope) = serde_json::from_str::<LoadingEnvelope>(&body) {
            return Err(ImageError::Loading {
                estimated_time: envelope.estimated_time,
            });
        }
    }
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
    Err(ImageError::Upstream {
        status: code,
        message,
    })
}

fn encode_asset(bytes: &[u8], mime_type: String) -> AssetRef {
    AssetRef {
        data: base64::engine::general_purpose::STANDARD.encode(bytes),
        mime_type,
    }
}

fn decode_asset(asset: &AssetRef) -> Result<Vec<u8>, ImageError> {
    base64::engine::general_purpose::STANDARD
        .decode(&asset.data)
        .map_err(|e| ImageError::Upstream {
            status: 400,
            message: format!("attached image is not valid base64: {e}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_generate_returns_encoded_asset() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/models/{DEFAULT_IMAGE_MODEL}")))
            .and(body_json(json!({"inputs": "a fox"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(vec![1u8, 2, 3], "image/jpeg"),
            )
            .mount(&server)
            .await;

        let client = HfImageClient::new(Some("hf_token".to_string()))
            .unwrap()
            .with_host(server.uri());
        let asset = client.generate("a fox").await.unwrap();

        assert_eq!(asset.mime_type, "image/jpeg");
        assert_eq!(
            base64::engine::general_purpose::STANDARD
                .decode(asset.data)
                .unwrap(),
            vec![1, 2, 3]
        );
    }

    #[tokio::test]
    async fn test_loading_translates_to_retry_hint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_json(json!({
                "error": "Model stabilityai/stable-diffusion-xl-base-1.0 is currently loading",
                "estimated_time": 20.0
            })))
            .mount(&server)
            .await;

        let client = HfImageClient::new(None).unwrap().with_host(server.uri());
        let err = client.generate("anything").await.unwrap_err();
        match err {
            ImageError::Loading { estimated_time } => assert_eq!(estimated_time, 20.0),
            other => panic!("expected loading error, got {other:?}"),
        }
        assert!(client
            .generate("anything")
            .await
            .unwrap_err()
            .user_message()
            .contains("20 seconds"));
    }

    #[tokio::test]
    async fn test_error_envelope_surfaces_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"error": "inputs is required"})),
            )
            .mount(&server)
            .await;

        let client = HfImageClient::new(None).unwrap().with_host(server.uri());
        let err = client.generate("x").await.unwrap_err();
        match err {
            ImageError::Upstream { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "inputs is required");
            }
            other => panic!("expected upstream error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_remove_background_round_trips_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/models/{DEFAULT_SEGMENTATION_MODEL}")))
            .respond_with(ResponseTemplate::new(200).set_body_raw(vec![9u8, 9], "image/png"))
            .mount(&server)
            .await;

        let client = HfImageClient::new(None).unwrap().with_host(server.uri());
        let source = AssetRef::new(
            base64::engine::general_purpose::STANDARD.encode([5u8, 6, 7]),
            "image/jpeg",
        );
        let edited = client.remove_background(&source).await.unwrap();
        assert_eq!(edited.mime_type, "image/png");
    }

    #[tokio::test]
    async fn test_invalid_base64_is_rejected_before_network() {
        let client = HfImageClient::new(None)
            .unwrap()
            .with_host("http://127.0.0.1:1".to_string());
        let source = AssetRef::new("not base64!!!", "image/png");
        let err = client.remove_background(&source).await.unwrap_err();
        assert!(matches!(err, ImageError::Upstream { status: 400, .. }));
    }
}
