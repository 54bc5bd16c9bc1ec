//! Axum router configuration

use axum::{
    http::{header, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

use super::handlers::{
    health_check, locked_list, render_image_preview, render_image_save, render_preview,
    render_save, version_check,
};
use super::media::serve_media;

/// Create the Axum router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    // Browsers need the range headers readable cross-origin to scrub video.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS, Method::HEAD])
        .allow_headers([
            header::ACCEPT,
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ORIGIN,
            header::RANGE,
        ])
        .expose_headers([
            header::CONTENT_LENGTH,
            header::CONTENT_RANGE,
            header::ACCEPT_RANGES,
        ])
        .max_age(Duration::from_secs(3600));

    let mut router = Router::new()
        // Health and version endpoints
        .route("/health", get(health_check))
        .route("/version", get(version_check))
        // Render endpoints (authenticated)
        .route("/render", post(render_save))
        .route("/render/preview", post(render_preview))
        .route("/render/image", post(render_image_save))
        .route("/render/image/preview", post(render_image_preview))
        .route("/locked/list", get(locked_list))
        // Range-aware media reads (GET also covers HEAD)
        .route("/media/{*path}", get(serve_media))
        // Middleware
        .layer(TraceLayer::new_for_http());

    if state.config.cors_enabled {
        router = router.layer(cors);
    }

    router.with_state(state)
}
