// SPDX-FileCopyrightText: 2026 Pillbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound delivery channels other than live push.
//!
//! Push lives in the gateway because it needs the connection registry.

pub mod email;
pub mod in_app;
pub mod sms;
pub mod webhook;

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use pillbox_config::model::PillboxConfig;
use pillbox_core::{Clock, DeliveryChannel, PillboxError};

pub use email::EmailChannel;
pub use in_app::InAppChannel;
pub use sms::SmsChannel;
pub use webhook::WebhookChannel;

/// Instantiate the in-app channel plus every transport enabled in config.
///
/// An enabled transport with incomplete settings is a startup error.
pub fn build_channels(
    config: &PillboxConfig,
    clock: Arc<dyn Clock>,
) -> Result<Vec<Arc<dyn DeliveryChannel>>, PillboxError> {
    let timeout = Duration::from_secs(config.delivery.channel_timeout_secs);
    let mut channels: Vec<Arc<dyn DeliveryChannel>> = vec![Arc::new(InAppChannel::new())];

    if config.email.enabled {
        channels.push(Arc::new(EmailChannel::new(&config.email, timeout)?));
    }
    if config.sms.enabled {
        channels.push(Arc::new(SmsChannel::new(&config.sms, timeout)?));
    }
    if config.webhook.enabled {
        channels.push(Arc::new(WebhookChannel::new(&config.webhook, clock)?));
    }

    for channel in &channels {
        info!(channel = channel.name(), method = %channel.method(), "delivery channel ready");
    }
    Ok(channels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pillbox_core::{DeliveryMethod, ManualClock};

    fn clock() -> Arc<dyn Clock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap(),
        ))
    }

    #[test]
    fn defaults_build_in_app_only() {
        let channels = build_channels(&PillboxConfig::default(), clock()).unwrap();
        let methods: Vec<_> = channels.iter().map(|c| c.method()).collect();
        assert_eq!(methods, vec![DeliveryMethod::InApp]);
    }

    #[test]
    fn enabled_webhook_is_added() {
        let mut config = PillboxConfig::default();
        config.webhook.enabled = true;
        config.webhook.default_url = Some("https://hooks.example.com/pillbox".into());
        let channels = build_channels(&config, clock()).unwrap();
        assert!(channels.iter().any(|c| c.method() == DeliveryMethod::Webhook));
    }

    #[test]
    fn enabled_sms_without_credentials_fails() {
        let mut config = PillboxConfig::default();
        config.sms.enabled = true;
        let err = build_channels(&config, clock()).err().unwrap();
        assert!(matches!(err, PillboxError::Config(_)));
    }
}
