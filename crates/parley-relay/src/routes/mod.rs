// Export route modules
pub mod chat;
pub mod image;
pub mod status;

use axum::http::{header, Method};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::state::AppState;

/// Permissive-but-credentialed CORS: the allow-origin header echoes the
/// caller's origin, so responses stay usable from credentialed browser
/// contexts. Preflight `OPTIONS` requests are answered by the layer before
/// any handler or credential is touched.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods([Method::POST, Method::OPTIONS, Method::GET])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true)
}

// Function to configure all routes
pub fn configure(state: AppState) -> Router {
    Router::new()
        .merge(chat::routes(state.clone()))
        .merge(image::routes(state))
        .merge(status::routes())
        .layer(cors_layer())
}
