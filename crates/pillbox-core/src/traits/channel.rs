// SPDX-FileCopyrightText: 2026 Pillbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery channel trait for push, email, SMS, webhook and in-app transports.

use async_trait::async_trait;

use crate::error::PillboxError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{DeliveryMethod, DeliveryOutcome, Notification, Recipient};

/// One outbound transport.
///
/// `deliver` reports how far the handoff got. Any `Err` is recorded on the
/// notification's attempt for this channel and never affects other channels.
#[async_trait]
pub trait DeliveryChannel: PluginAdapter {
    /// The delivery method this channel implements.
    fn method(&self) -> DeliveryMethod;

    /// Hand a persisted notification to the transport.
    async fn deliver(
        &self,
        notification: &Notification,
        recipient: &Recipient,
    ) -> Result<DeliveryOutcome, PillboxError>;
}
