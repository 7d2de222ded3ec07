//! API router.
//!
//! Returns a composable `Router` that can be mounted on any axum server.
//! Routes are nested under `/api/`.
//!
//! Layers (outermost → innermost):
//! 1. Cache-Control: no-store → 2. CORS → 3. Access log

use std::sync::Arc;

use axum::http::{header, HeaderValue};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::triage::TriageEngine;

/// Build the API router around a shared engine.
pub fn api_router(engine: Arc<TriageEngine>) -> Router {
    build_router(ApiContext::new(engine))
}

fn build_router(ctx: ApiContext) -> Router {
    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let routes = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/assess", post(endpoints::assess::assess))
        .route("/normalize", post(endpoints::normalize::normalize))
        .route("/history/:user_id", get(endpoints::history::get_history))
        .with_state(ctx)
        .layer(axum::middleware::from_fn(middleware::log_access));

    Router::new()
        .nest("/api", routes)
        .layer(CorsLayer::permissive())
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
}
