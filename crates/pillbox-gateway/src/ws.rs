// SPDX-FileCopyrightText: 2026 Pillbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket session for real-time push and client acknowledgments.
//!
//! Client -> Server (JSON, `type`-tagged):
//! ```json
//! {"type": "medication_taken", "medication_id": "med-1", "time_slot": "morning"}
//! {"type": "notification_acknowledged", "notification_id": "n-1"}
//! {"type": "update_preferences", "medication_id": "med-1", "enabled": false}
//! {"type": "update_preferences", "channels": ["email", "sms"]}
//! ```
//!
//! Server -> Client (JSON):
//! ```json
//! {"type": "notification", "notification": {...}}
//! {"type": "error", "message": "..."}
//! ```

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::NaiveDate;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use pillbox_core::{DeliveryMethod, Notification, PillboxError, TimeSlot};

use crate::server::GatewayState;

/// Outbound frames buffered per connection before broadcasts report `Full`.
const CONNECTION_BUFFER: usize = 64;

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    MedicationTaken {
        medication_id: String,
        time_slot: TimeSlot,
        #[serde(default)]
        date: Option<NaiveDate>,
    },
    NotificationAcknowledged {
        notification_id: String,
    },
    UpdatePreferences {
        #[serde(default)]
        medication_id: Option<String>,
        #[serde(default)]
        enabled: Option<bool>,
        #[serde(default)]
        channels: Option<Vec<DeliveryMethod>>,
    },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    Notification { notification: Notification },
    Error { message: String },
}

impl ServerEvent {
    pub fn to_json(&self) -> Result<String, PillboxError> {
        serde_json::to_string(self)
            .map_err(|e| PillboxError::Internal(format!("failed to encode push frame: {e}")))
    }
}

#[derive(Debug, Deserialize)]
pub struct WsParams {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// `GET /ws?token=&user_id=`. Browsers cannot set headers on the upgrade,
/// so credentials travel as query parameters.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<GatewayState>,
) -> Response {
    if !state.auth.token_matches(params.token.as_deref()) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let Some(user_id) = params.user_id.filter(|u| !u.trim().is_empty()) else {
        return StatusCode::UNAUTHORIZED.into_response();
    };
    ws.on_upgrade(move |socket| handle_socket(socket, state, user_id))
}

async fn handle_socket(socket: WebSocket, state: GatewayState, user_id: String) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<String>(CONNECTION_BUFFER);

    let sender_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if ws_sender.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    let connection_id = state.connections.register(&user_id, tx.clone());
    state
        .push
        .flush_offline(&user_id, &tx, &state.tracker)
        .await;

    while let Some(Ok(msg)) = ws_receiver.next().await {
        match msg {
            Message::Text(text) => {
                let text_str: &str = &text;
                let result = match serde_json::from_str::<ClientEvent>(text_str) {
                    Ok(event) => handle_event(&state, &user_id, event).await,
                    Err(e) => Err(PillboxError::InvalidInput(format!("malformed event: {e}"))),
                };
                if let Err(e) = result {
                    debug!(user_id = %user_id, error = %e, "websocket event rejected");
                    let frame = ServerEvent::Error {
                        message: e.to_string(),
                    };
                    if let Ok(json) = frame.to_json() {
                        if tx.send(json).await.is_err() {
                            break;
                        }
                    }
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    state.connections.unregister(&user_id, connection_id);
    sender_task.abort();
}

pub async fn handle_event(
    state: &GatewayState,
    user_id: &str,
    event: ClientEvent,
) -> Result<(), PillboxError> {
    match event {
        ClientEvent::MedicationTaken {
            medication_id,
            time_slot,
            date,
        } => {
            state
                .ack
                .confirm_taken(user_id, &medication_id, time_slot, date)
                .await?;
        }
        ClientEvent::NotificationAcknowledged { notification_id } => {
            state.ack.mark_read(user_id, &notification_id).await?;
        }
        ClientEvent::UpdatePreferences {
            medication_id,
            enabled,
            channels,
        } => {
            match (medication_id, enabled) {
                (Some(medication_id), Some(enabled)) => {
                    state
                        .preferences
                        .update_medication_preference(user_id, &medication_id, enabled)
                        .await?;
                }
                (None, None) => {}
                _ => {
                    return Err(PillboxError::InvalidInput(
                        "medication_id and enabled must be given together".into(),
                    ));
                }
            }
            if let Some(channels) = channels {
                state.preferences.update_channels(user_id, &channels).await?;
            }
        }
    }
    Ok(())
}
