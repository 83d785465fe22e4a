// SPDX-FileCopyrightText: 2026 Pillbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, post, put},
};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use pillbox_core::{PillboxError, ScheduleWatcher};
use pillbox_delivery::{AckHandler, PreferenceService, StatusTracker};

use crate::auth::{AuthConfig, auth_middleware};
use crate::handlers;
use crate::push::PushChannel;
use crate::registry::ConnectionRegistry;
use crate::ws;

/// Health state for unauthenticated health/metrics endpoints.
#[derive(Clone)]
pub struct HealthState {
    /// Process start time for uptime calculation.
    pub start_time: std::time::Instant,
    /// Optional Prometheus metrics render function.
    pub prometheus_render: Option<Arc<dyn Fn() -> String + Send + Sync>>,
}

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub ack: Arc<AckHandler>,
    pub preferences: Arc<PreferenceService>,
    pub tracker: Arc<StatusTracker>,
    /// Recompile hook for schedule edits.
    pub watcher: Arc<dyn ScheduleWatcher>,
    pub connections: Arc<ConnectionRegistry>,
    pub push: Arc<PushChannel>,
    pub auth: AuthConfig,
    pub health: HealthState,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// All gateway routes:
/// - `GET /health`, `GET /metrics` (public)
/// - `/v1/...` REST (bearer + `X-User-Id`)
/// - `GET /ws` (auth via query params, not middleware)
pub fn build_router(state: GatewayState) -> Router {
    let auth_state = state.auth.clone();

    let public_routes = Router::new()
        .route("/health", get(handlers::get_public_health))
        .route("/metrics", get(handlers::get_public_metrics))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/v1/notifications", get(handlers::list_history))
        .route("/v1/notifications/unread", get(handlers::list_unread))
        .route("/v1/notifications/read-all", post(handlers::mark_all_read))
        .route("/v1/notifications/{id}", delete(handlers::delete_notification))
        .route("/v1/notifications/{id}/read", post(handlers::mark_read))
        .route(
            "/v1/notifications/{id}/receipts",
            post(handlers::record_receipt),
        )
        .route(
            "/v1/preferences/medications/{medication_id}",
            put(handlers::update_medication_preference),
        )
        .route("/v1/preferences/channels", put(handlers::update_channels))
        .route(
            "/v1/medications/{medication_id}/taken",
            post(handlers::medication_taken),
        )
        .route(
            "/v1/schedules/{medication_id}/recompile",
            post(handlers::recompile_schedule),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            auth_state,
            auth_middleware,
        ))
        .with_state(state.clone());

    let ws_routes = Router::new()
        .route("/ws", get(ws::ws_handler))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .merge(ws_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Bind and serve until `shutdown` is cancelled.
pub async fn start_server(
    config: &ServerConfig,
    state: GatewayState,
    shutdown: CancellationToken,
) -> Result<(), PillboxError> {
    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| PillboxError::Channel {
            message: format!("failed to bind gateway to {addr}: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!(%addr, "gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| PillboxError::Channel {
            message: format!("gateway server error: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("gateway stopped");
    Ok(())
}
