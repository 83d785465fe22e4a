// SPDX-FileCopyrightText: 2026 Pillbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the gateway REST API.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use pillbox_core::{
    AttemptTransition, ChannelPreferences, DeliveryMethod, Notification, PillboxError, TimeSlot,
};
use pillbox_delivery::TakenReceipt;

use crate::auth::CurrentUser;
use crate::server::GatewayState;

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// `PillboxError` rendered as a JSON error with a fitting status code.
#[derive(Debug)]
pub struct ApiError(pub PillboxError);

impl From<PillboxError> for ApiError {
    fn from(e: PillboxError) -> Self {
        Self(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            PillboxError::NotFound { .. } => StatusCode::NOT_FOUND,
            PillboxError::Unauthorized(_) => StatusCode::FORBIDDEN,
            PillboxError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            PillboxError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            PillboxError::Channel { .. } => StatusCode::BAD_GATEWAY,
            PillboxError::Config(_) | PillboxError::Storage { .. } | PillboxError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NotificationList {
    pub notifications: Vec<Notification>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReadAllResponse {
    pub marked_read: u64,
}

#[derive(Debug, Deserialize)]
pub struct MedicationPreferenceRequest {
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct ChannelsRequest {
    pub channels: Vec<DeliveryMethod>,
}

#[derive(Debug, Deserialize)]
pub struct TakenRequest {
    pub time_slot: TimeSlot,
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

/// Provider receipt status. `failed` carries the provider's reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptStatus {
    Sent,
    Delivered,
    Failed,
}

#[derive(Debug, Deserialize)]
pub struct ReceiptRequest {
    pub method: DeliveryMethod,
    pub status: ReceiptStatus,
    #[serde(default)]
    pub error: Option<String>,
}

impl ReceiptRequest {
    fn transition(self) -> AttemptTransition {
        match self.status {
            ReceiptStatus::Sent => AttemptTransition::Sent,
            ReceiptStatus::Delivered => AttemptTransition::Delivered,
            ReceiptStatus::Failed => AttemptTransition::Failed {
                error: self
                    .error
                    .unwrap_or_else(|| "reported failed by provider".to_string()),
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecompileResponse {
    pub medication_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub push_connections: usize,
}

/// GET /v1/notifications
pub async fn list_history(
    State(state): State<GatewayState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<NotificationList>> {
    let notifications = state.ack.history(&user, query.limit, query.offset).await?;
    Ok(Json(NotificationList { notifications }))
}

/// GET /v1/notifications/unread
pub async fn list_unread(
    State(state): State<GatewayState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> ApiResult<Json<NotificationList>> {
    let notifications = state.ack.unread(&user).await?;
    Ok(Json(NotificationList { notifications }))
}

/// POST /v1/notifications/{id}/read
pub async fn mark_read(
    State(state): State<GatewayState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> ApiResult<Json<Notification>> {
    Ok(Json(state.ack.mark_read(&user, &id).await?))
}

/// POST /v1/notifications/read-all
pub async fn mark_all_read(
    State(state): State<GatewayState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> ApiResult<Json<ReadAllResponse>> {
    let marked_read = state.ack.mark_all_read(&user).await?;
    Ok(Json(ReadAllResponse { marked_read }))
}

/// DELETE /v1/notifications/{id}
pub async fn delete_notification(
    State(state): State<GatewayState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.ack.delete(&user, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/notifications/{id}/receipts
pub async fn record_receipt(
    State(state): State<GatewayState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(body): Json<ReceiptRequest>,
) -> ApiResult<Json<Notification>> {
    let method = body.method;
    let updated = state
        .ack
        .record_receipt(&user, &id, method, body.transition())
        .await?;
    Ok(Json(updated))
}

/// PUT /v1/preferences/medications/{medication_id}
pub async fn update_medication_preference(
    State(state): State<GatewayState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(medication_id): Path<String>,
    Json(body): Json<MedicationPreferenceRequest>,
) -> ApiResult<Json<ChannelPreferences>> {
    let prefs = state
        .preferences
        .update_medication_preference(&user, &medication_id, body.enabled)
        .await?;
    Ok(Json(prefs))
}

/// PUT /v1/preferences/channels
pub async fn update_channels(
    State(state): State<GatewayState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(body): Json<ChannelsRequest>,
) -> ApiResult<Json<ChannelPreferences>> {
    Ok(Json(
        state.preferences.update_channels(&user, &body.channels).await?,
    ))
}

/// POST /v1/medications/{medication_id}/taken
pub async fn medication_taken(
    State(state): State<GatewayState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(medication_id): Path<String>,
    Json(body): Json<TakenRequest>,
) -> ApiResult<(StatusCode, Json<TakenReceipt>)> {
    let receipt = state
        .ack
        .confirm_taken(&user, &medication_id, body.time_slot, body.date)
        .await?;
    let status = if receipt.newly_recorded {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(receipt)))
}

/// POST /v1/schedules/{medication_id}/recompile
///
/// Called by the medication service after an edit, disable or delete.
pub async fn recompile_schedule(
    State(state): State<GatewayState>,
    Path(medication_id): Path<String>,
) -> ApiResult<(StatusCode, Json<RecompileResponse>)> {
    state.watcher.schedule_changed(&medication_id).await?;
    Ok((StatusCode::ACCEPTED, Json(RecompileResponse { medication_id })))
}

/// GET /health (unauthenticated)
pub async fn get_public_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.health.start_time.elapsed().as_secs(),
        push_connections: state.connections.total_connections(),
    })
}

/// GET /metrics (unauthenticated)
pub async fn get_public_metrics(State(state): State<GatewayState>) -> Response {
    match &state.health.prometheus_render {
        Some(render) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
