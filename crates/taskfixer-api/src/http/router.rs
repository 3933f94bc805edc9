//! Axum router configuration with middleware.
//!
//! API routes are under `/api/`; `/health` stays at the root.
//! Middleware: CORS, tracing.

use axum::Json;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use serde_json::{Value, json};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::http::handlers::upload::MAX_UPLOAD_BYTES;
use crate::state::AppState;

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Chat streaming
        .route("/chat", post(handlers::chat::stream_chat))
        .route("/chat/{relay_id}/cancel", post(handlers::chat::cancel_chat))
        // Export metering
        .route("/download-pdf", post(handlers::export::download_pdf))
        // Files
        .route(
            "/upload",
            post(handlers::upload::upload_files).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        // Usage
        .route("/usage", get(handlers::usage::get_usage));

    Router::new()
        .nest("/api", api_routes)
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health - Simple health check endpoint (no auth required).
async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
