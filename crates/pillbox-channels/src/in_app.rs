// SPDX-FileCopyrightText: 2026 Pillbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-app inbox channel.
//!
//! The notification row itself is the inbox entry, so handing it over is
//! complete once it has been persisted.

use async_trait::async_trait;

use pillbox_core::{
    AdapterType, DeliveryChannel, DeliveryMethod, DeliveryOutcome, HealthStatus, Notification,
    PillboxError, PluginAdapter, Recipient,
};

#[derive(Debug, Default)]
pub struct InAppChannel;

impl InAppChannel {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PluginAdapter for InAppChannel {
    fn name(&self) -> &str {
        "in-app"
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
impl DeliveryChannel for InAppChannel {
    fn method(&self) -> DeliveryMethod {
        DeliveryMethod::InApp
    }

    async fn deliver(
        &self,
        _notification: &Notification,
        _recipient: &Recipient,
    ) -> Result<DeliveryOutcome, PillboxError> {
        Ok(DeliveryOutcome::Delivered)
    }
}
