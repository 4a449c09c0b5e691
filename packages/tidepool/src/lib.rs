//! Tidepool: a chat server with hubs, rooms, and real-time fan-out.
//!
//! The HTTP surface (accounts, hubs, rooms, history) hangs off a plain
//! axum router; the live path is one WebSocket per (client, room),
//! driven by [`ws::run_room_session`].

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, patch, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::{MakeSpan, TraceLayer};
use uuid::Uuid;

pub mod auth;
pub mod config;
pub mod db;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod repository;
pub mod ws;

use crate::auth::AuthState;
use crate::config::{AuthConfig, ChatConfig, TidepoolConfig};
use crate::db::Database;
use crate::metrics::ServerMetrics;
use crate::repository::ChatRepository;
use crate::ws::RoomRegistry;

/// Custom span maker that adds a unique request ID to each incoming request
#[derive(Clone)]
pub struct RequestIdMakeSpan;

impl<B> MakeSpan<B> for RequestIdMakeSpan {
    fn make_span(&mut self, request: &axum::http::Request<B>) -> tracing::Span {
        let request_id = Uuid::new_v4().to_string();
        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id,
        )
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<TidepoolConfig>,
    /// Authentication configuration
    pub auth_config: Arc<AuthConfig>,
    /// Chat tunables (history limits)
    pub chat_config: Arc<ChatConfig>,
    /// Server metrics for observability
    pub metrics: Arc<ServerMetrics>,
    pub db: Arc<Database>,
    pub repository: Arc<ChatRepository>,
    /// Live room registry for WebSocket fan-out
    pub registry: Arc<RoomRegistry>,
}

/// Build the full application router with middleware attached.
pub fn build_router(state: AppState) -> Router {
    let auth_state = AuthState {
        repository: state.repository.clone(),
        auth_config: state.auth_config.clone(),
    };

    Router::new()
        // Account routes
        .route("/api/users", post(handlers::signup))
        .route("/api/users/me", get(handlers::me))
        .route("/api/users/{username}", get(handlers::get_user_profile))
        .route(
            "/api/session",
            post(handlers::login).delete(handlers::logout),
        )
        // Hub routes
        .route(
            "/api/hubs",
            get(handlers::list_hubs).post(handlers::create_hub),
        )
        .route("/api/hubs/{id}", get(handlers::get_hub))
        .route("/api/hubs/{id}/join", post(handlers::join_hub))
        .route(
            "/api/hubs/{id}/rooms",
            get(handlers::get_hub_rooms).post(handlers::create_room),
        )
        // Room routes
        .route("/api/rooms/{id}/messages", get(handlers::get_room_messages))
        .route("/api/rooms/{id}/status", patch(handlers::patch_room_status))
        .route("/api/rooms/{id}/ws", get(handlers::room_websocket_handler))
        // Health endpoints
        .route("/health", get(handlers::health_handler))
        .route("/health/live", get(handlers::health_live_handler))
        .route("/health/ready", get(handlers::health_ready_handler))
        .route("/metrics", get(handlers::metrics_handler))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            auth::auth_middleware,
        ))
        .layer(TraceLayer::new_for_http().make_span_with(RequestIdMakeSpan))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
