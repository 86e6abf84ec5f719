//! nexcall server library logic.

pub mod api;
pub mod api_calls;
pub mod api_twiml;
pub mod background;
pub mod config;
pub mod conversation;
pub mod lifecycle;
pub mod persistence;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Extension, Json, Router,
};
use lifecycle::CallLifecycleHandler;
use nexcall_db::DbPool;
use nexcall_telephony::TelephonyProvider;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across all request handlers.
pub struct AppState {
    /// Database connection pool.
    pub pool: DbPool,
    /// Webhook state machine.
    pub lifecycle: CallLifecycleHandler,
    /// Provider REST client for the call API.
    pub telephony: Arc<dyn TelephonyProvider>,
    /// Default caller id for outbound calls.
    pub caller_id: String,
    /// Absolute webhook URL handed to the provider for outbound calls.
    pub webhook_url: String,
    /// Path the webhook routes are mounted on.
    pub webhook_path: String,
}

/// Maximum request body size (64 KiB). Webhook and API bodies are small forms
/// and JSON documents.
const MAX_REQUEST_BODY_BYTES: usize = 64 * 1024;

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    let webhook_path = state.webhook_path.trim_end_matches('/').to_string();
    let status_path = format!("{}/status", webhook_path);

    Router::new()
        .route("/health", get(health))
        .route(&webhook_path, post(api_twiml::voice_webhook_handler))
        .route(&status_path, post(api_twiml::status_callback_handler))
        .route(
            "/api/calls",
            get(api_calls::get_calls_handler)
                .post(api_calls::create_call_handler)
                .put(api_calls::update_call_handler),
        )
        .route("/api/calls/stats", get(api_calls::call_stats_handler))
        .route(
            "/api/calls/{id}/conversation",
            get(api_calls::call_conversation_handler),
        )
        .route("/api/calls/{id}/end", post(api_calls::end_call_handler))
        .route(
            "/api/calls/{id}/recording",
            post(api_calls::start_recording_handler),
        )
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(Arc::new(state)))
}
