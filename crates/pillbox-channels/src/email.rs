// SPDX-FileCopyrightText: 2026 Pillbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SMTP email channel.

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::debug;

use pillbox_config::model::EmailConfig;
use pillbox_core::{
    AdapterType, DeliveryChannel, DeliveryMethod, DeliveryOutcome, HealthStatus, Notification,
    PillboxError, PluginAdapter, Recipient,
};

pub struct EmailChannel {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl EmailChannel {
    /// Builds the relay transport once. STARTTLS/TLS is negotiated by lettre.
    pub fn new(config: &EmailConfig, timeout: Duration) -> Result<Self, PillboxError> {
        let host = config
            .smtp_host
            .as_deref()
            .filter(|h| !h.trim().is_empty())
            .ok_or_else(|| PillboxError::Config("email.smtp_host is required".into()))?;
        let from = config
            .from_address
            .as_deref()
            .ok_or_else(|| PillboxError::Config("email.from_address is required".into()))?
            .parse::<Mailbox>()
            .map_err(|e| PillboxError::Config(format!("email.from_address is invalid: {e}")))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(host)
            .map_err(|e| PillboxError::Config(format!("invalid SMTP host {host}: {e}")))?
            .port(config.smtp_port)
            .timeout(Some(timeout));
        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            mailer: builder.build(),
            from,
        })
    }
}

/// Plain-text reminder mail.
pub fn build_message(
    from: &Mailbox,
    to: &str,
    notification: &Notification,
) -> Result<Message, PillboxError> {
    let to = to
        .parse::<Mailbox>()
        .map_err(|e| PillboxError::channel(format!("invalid recipient address: {e}")))?;
    let body = format!(
        "{}\n\nThis reminder expires at {}.\n",
        notification.message,
        notification.expires_at.format("%Y-%m-%d %H:%M UTC")
    );
    Message::builder()
        .from(from.clone())
        .to(to)
        .subject(notification.title.clone())
        .header(ContentType::TEXT_PLAIN)
        .body(body)
        .map_err(|e| PillboxError::channel(format!("failed to build email: {e}")))
}

#[async_trait]
impl PluginAdapter for EmailChannel {
    fn name(&self) -> &str {
        "smtp-email"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Channel
    }

    async fn health_check(&self) -> Result<HealthStatus, PillboxError> {
        match self.mailer.test_connection().await {
            Ok(true) => Ok(HealthStatus::Healthy),
            Ok(false) => Ok(HealthStatus::Degraded("SMTP server refused NOOP".into())),
            Err(e) => Ok(HealthStatus::Unhealthy(format!("SMTP unreachable: {e}"))),
        }
    }

    async fn shutdown(&self) -> Result<(), PillboxError> {
        Ok(())
    }
}

#[async_trait]
impl DeliveryChannel for EmailChannel {
    fn method(&self) -> DeliveryMethod {
        DeliveryMethod::Email
    }

    /// The relay accepting the message counts as `sent`; there is no receipt.
    async fn deliver(
        &self,
        notification: &Notification,
        recipient: &Recipient,
    ) -> Result<DeliveryOutcome, PillboxError> {
        let to = recipient
            .email
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| PillboxError::channel("recipient has no email address"))?;
        let message = build_message(&self.from, to, notification)?;
        let response = self
            .mailer
            .send(message)
            .await
            .map_err(|e| PillboxError::Channel {
                message: format!("smtp send failed: {e}"),
                source: Some(Box::new(e)),
            })?;
        debug!(
            notification_id = %notification.id,
            code = %response.code(),
            "email accepted by relay"
        );
        Ok(DeliveryOutcome::Sent)
    }
}
