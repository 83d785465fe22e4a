// SPDX-FileCopyrightText: 2026 Pillbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Signed JSON webhooks.
//!
//! The body is the notification wrapped in an event envelope. When a signing
//! secret is configured, `X-Pillbox-Signature` carries the hex HMAC-SHA256 of
//! `"{timestamp}.{body}"` and `X-Pillbox-Timestamp` the unix seconds used.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use tracing::debug;

use pillbox_config::model::WebhookConfig;
use pillbox_core::{
    AdapterType, Clock, DeliveryChannel, DeliveryMethod, DeliveryOutcome, HealthStatus,
    Notification, PillboxError, PluginAdapter, Recipient,
};

pub const SIGNATURE_HEADER: &str = "X-Pillbox-Signature";
pub const TIMESTAMP_HEADER: &str = "X-Pillbox-Timestamp";

#[derive(Serialize)]
struct Envelope<'a> {
    event: &'static str,
    notification: &'a Notification,
}

/// Hex HMAC-SHA256 over `"{timestamp}.{payload}"`.
pub fn sign_payload(secret: &str, timestamp: i64, payload: &str) -> Result<String, PillboxError> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|e| PillboxError::Internal(format!("invalid webhook secret: {e}")))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

pub struct WebhookChannel {
    client: reqwest::Client,
    default_url: Option<String>,
    signing_secret: Option<String>,
    clock: Arc<dyn Clock>,
}

impl WebhookChannel {
    pub fn new(config: &WebhookConfig, clock: Arc<dyn Clock>) -> Result<Self, PillboxError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PillboxError::Channel {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self {
            client,
            default_url: config.default_url.clone().filter(|u| !u.trim().is_empty()),
            signing_secret: config.signing_secret.clone().filter(|s| !s.is_empty()),
            clock,
        })
    }
}

#[async_trait]
impl PluginAdapter for WebhookChannel {
    fn name(&self) -> &str {
        "webhook"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, PillboxError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), PillboxError> {
        Ok(())
    }
}

#[async_trait]
impl DeliveryChannel for WebhookChannel {
    fn method(&self) -> DeliveryMethod {
        DeliveryMethod::Webhook
    }

    /// A 2xx from the user's endpoint is final, so the attempt is `delivered`.
    async fn deliver(
        &self,
        notification: &Notification,
        recipient: &Recipient,
    ) -> Result<DeliveryOutcome, PillboxError> {
        let url = recipient
            .webhook_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .or(self.default_url.as_deref())
            .ok_or_else(|| PillboxError::channel("no webhook url configured"))?;

        let payload = serde_json::to_string(&Envelope {
            event: "notification",
            notification,
        })
        .map_err(|e| PillboxError::Internal(format!("failed to encode webhook body: {e}")))?;

        let mut request = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(secret) = &self.signing_secret {
            let timestamp = self.clock.now().timestamp();
            let signature = sign_payload(secret, timestamp, &payload)?;
            request = request
                .header(TIMESTAMP_HEADER, timestamp.to_string())
                .header(SIGNATURE_HEADER, signature);
        }

        let response = request
            .body(payload)
            .send()
            .await
            .map_err(|e| PillboxError::Channel {
                message: format!("webhook request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(PillboxError::channel(format!(
                "webhook returned {}",
                status.as_u16()
            )));
        }
        debug!(notification_id = %notification.id, status = status.as_u16(), "webhook delivered");
        Ok(DeliveryOutcome::Delivered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pillbox_core::{ManualClock, NotificationKind, NotificationStatus, Priority};
    use wiremock::matchers::{header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn notification() -> Notification {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap();
        Notification {
            id: "n-1".into(),
            user_id: "user-1".into(),
            medication_id: Some("med-m".into()),
            kind: NotificationKind::MedicationReminder,
            title: "Time to take Metformin".into(),
            message: "Take your morning dose.".into(),
            time_slot: None,
            scheduled_time: None,
            fire_date: None,
            status: NotificationStatus::Pending,
            priority: Priority::High,
            delivery_methods: Vec::new(),
            read_at: None,
            created_at: now,
            expires_at: now + chrono::Duration::hours(24),
        }
    }

    fn channel(default_url: Option<String>, secret: Option<&str>) -> WebhookChannel {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap(),
        ));
        WebhookChannel::new(
            &WebhookConfig {
                enabled: true,
                default_url,
                signing_secret: secret.map(String::from),
                timeout_secs: 5,
            },
            clock,
        )
        .unwrap()
    }

    #[test]
    fn signature_is_stable_hex() {
        let a = sign_payload("hush", 1_772_352_000, "{}").unwrap();
        let b = sign_payload("hush", 1_772_352_000, "{}").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, sign_payload("other", 1_772_352_000, "{}").unwrap());
    }

    #[tokio::test]
    async fn signed_post_to_recipient_url() {
        let server = MockServer::start().await;
        let ts = Utc
            .with_ymd_and_hms(2026, 3, 1, 8, 0, 0)
            .unwrap()
            .timestamp();
        Mock::given(method("POST"))
            .and(path("/hooks/pillbox"))
            .and(header(TIMESTAMP_HEADER, ts.to_string().as_str()))
            .and(header_exists(SIGNATURE_HEADER))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let recipient = Recipient {
            user_id: "user-1".into(),
            webhook_url: Some(format!("{}/hooks/pillbox", server.uri())),
            ..Recipient::default()
        };
        let outcome = channel(None, Some("hush"))
            .deliver(&notification(), &recipient)
            .await
            .unwrap();
        assert_eq!(outcome, DeliveryOutcome::Delivered);

        let requests = server.received_requests().await.unwrap();
        let body = String::from_utf8(requests[0].body.clone()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["event"], "notification");
        assert_eq!(value["notification"]["id"], "n-1");
        let sent_sig = requests[0]
            .headers
            .get(SIGNATURE_HEADER)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert_eq!(sent_sig, sign_payload("hush", ts, &body).unwrap());
    }

    #[tokio::test]
    async fn falls_back_to_default_url_and_reports_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let recipient = Recipient {
            user_id: "user-1".into(),
            ..Recipient::default()
        };
        let err = channel(Some(server.uri()), None)
            .deliver(&notification(), &recipient)
            .await
            .unwrap_err();
        assert_eq!(err.delivery_reason(), "webhook returned 502");
    }

    #[tokio::test]
    async fn no_url_anywhere_fails() {
        let recipient = Recipient {
            user_id: "user-1".into(),
            ..Recipient::default()
        };
        let err = channel(None, None)
            .deliver(&notification(), &recipient)
            .await
            .unwrap_err();
        assert_eq!(err.delivery_reason(), "no webhook url configured");
    }
}
