//! API router.
//!
//! Returns a composable `Router` with every endpoint under `/api/`.
//!
//! Layers (outermost → innermost):
//! 1. `Cache-Control: no-store` on every response
//! 2. Request logging
//! 3. Upload body limit

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::header::CACHE_CONTROL;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;

/// Build the API router.
///
/// `max_upload_bytes` bounds request bodies (card images are the only
/// large ones).
pub fn api_router(core: Arc<CoreState>, max_upload_bytes: usize) -> Router {
    let ctx = ApiContext::new(core);

    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let api = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/sessions", post(endpoints::sessions::create))
        .route(
            "/sessions/:id",
            get(endpoints::sessions::view).delete(endpoints::sessions::end),
        )
        .route("/sessions/:id/card", post(endpoints::card::upload))
        .route("/sessions/:id/chat", post(endpoints::chat::send))
        .with_state(ctx);

    Router::new()
        .nest("/api", api)
        .fallback(endpoints::not_found)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(axum::middleware::from_fn(middleware::logging::log_request))
        .layer(SetResponseHeaderLayer::overriding(
            CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
}
