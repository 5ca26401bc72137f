use axum::{extract::State, http, response::IntoResponse, routing::post, Json, Router};
use serde_json::Value;

use parley::image::{HfImageClient, ImageError};

use crate::error::RelayError;
use crate::state::AppState;

fn parse_prompt(body: &Value) -> Result<String, RelayError> {
    let prompt = body
        .get("prompt")
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default();
    if prompt.is_empty() {
        return Err(RelayError::BadRequest(
            "`prompt` must be a non-empty string".to_string(),
        ));
    }
    Ok(prompt.to_string())
}

/// Synchronous image synthesis. On success the provider's raw bytes are
/// returned with its content type; a 503 model-loading answer becomes a
/// retry-after hint instead of a bare failure.
async fn handler(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, RelayError> {
    let prompt = parse_prompt(&body)?;

    let client = HfImageClient::new(state.keys.hf_api_token.clone())
        .map_err(|e| RelayError::Internal(e.to_string()))?
        .with_host(state.image.host.clone())
        .with_image_model(state.image.model.clone());

    tracing::debug!(model = %state.image.model, "generating image");

    match client.generate_bytes(&prompt).await {
        Ok((bytes, mime_type)) => Ok(([(http::header::CONTENT_TYPE, mime_type)], bytes)),
        Err(ImageError::Loading { estimated_time }) => Err(RelayError::ImageLoading {
            error: format!("model {} is currently loading", state.image.model),
            estimated_time,
        }),
        Err(ImageError::Upstream { status, message }) => {
            Err(RelayError::Upstream { status, message })
        }
        Err(ImageError::Network(message)) => Err(RelayError::Internal(message)),
    }
}

// Configure routes for this module
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/relay/image", post(handler))
        .with_state(state)
}
