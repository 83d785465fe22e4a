// SPDX-FileCopyrightText: 2026 Pillbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SMS channel backed by the Twilio Messages API.
//!
//! Messages are posted as `application/x-www-form-urlencoded` with HTTP
//! basic auth (account SID + auth token). A 2xx response means Twilio
//! queued the message, which counts as `sent`; the carrier receipt arrives
//! later through the receipts endpoint.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use pillbox_config::model::SmsConfig;
use pillbox_core::{
    AdapterType, DeliveryChannel, DeliveryMethod, DeliveryOutcome, HealthStatus, Notification,
    PillboxError, PluginAdapter, Recipient,
};

/// Longest body we send; Twilio splits anything over one segment itself.
const MAX_BODY_CHARS: usize = 320;

#[derive(Serialize)]
struct SendForm<'a> {
    #[serde(rename = "To")]
    to: &'a str,
    #[serde(rename = "From")]
    from: &'a str,
    #[serde(rename = "Body")]
    body: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessageResource {
    sid: String,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
}

pub struct SmsChannel {
    client: reqwest::Client,
    account_sid: String,
    auth_token: String,
    from_number: String,
    api_base_url: String,
}

impl SmsChannel {
    pub fn new(config: &SmsConfig, timeout: Duration) -> Result<Self, PillboxError> {
        let require = |value: &Option<String>, key: &str| {
            value
                .clone()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| PillboxError::Config(format!("sms.{key} is required")))
        };
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PillboxError::Channel {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self {
            client,
            account_sid: require(&config.account_sid, "account_sid")?,
            auth_token: require(&config.auth_token, "auth_token")?,
            from_number: require(&config.from_number, "from_number")?,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.api_base_url, self.account_sid
        )
    }
}

/// Plain-text SMS body: title, then message, trimmed to a sane length.
pub fn sms_body(notification: &Notification) -> String {
    let body = format!("{}: {}", notification.title, notification.message);
    if body.chars().count() <= MAX_BODY_CHARS {
        return body;
    }
    let mut cut: String = body.chars().take(MAX_BODY_CHARS - 3).collect();
    cut.push_str("...");
    cut
}

#[async_trait]
impl PluginAdapter for SmsChannel {
    fn name(&self) -> &str {
        "twilio-sms"
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
impl DeliveryChannel for SmsChannel {
    fn method(&self) -> DeliveryMethod {
        DeliveryMethod::Sms
    }

    async fn deliver(
        &self,
        notification: &Notification,
        recipient: &Recipient,
    ) -> Result<DeliveryOutcome, PillboxError> {
        let to = recipient
            .phone
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| PillboxError::channel("recipient has no phone number"))?;

        let body = sms_body(notification);
        let form = serde_urlencoded::to_string(SendForm {
            to,
            from: &self.from_number,
            body: &body,
        })
        .map_err(|e| PillboxError::Internal(format!("failed to encode SMS form: {e}")))?;

        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(form)
            .send()
            .await
            .map_err(|e| PillboxError::Channel {
                message: format!("twilio request failed: {e}"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .json::<ApiError>()
                .await
                .ok()
                .map(|e| match (e.code, e.message) {
                    (Some(code), Some(msg)) => format!(" ({code}: {msg})"),
                    (None, Some(msg)) => format!(" ({msg})"),
                    _ => String::new(),
                })
                .unwrap_or_default();
            return Err(PillboxError::channel(format!(
                "twilio returned {}{detail}",
                status.as_u16()
            )));
        }

        match response.json::<MessageResource>().await {
            Ok(resource) => debug!(
                notification_id = %notification.id,
                message_sid = %resource.sid,
                twilio_status = resource.status.as_deref().unwrap_or("unknown"),
                "sms queued"
            ),
            Err(e) => debug!(
                notification_id = %notification.id,
                error = %e,
                "sms accepted with unreadable response body"
            ),
        }
        Ok(DeliveryOutcome::Sent)
    }
}
