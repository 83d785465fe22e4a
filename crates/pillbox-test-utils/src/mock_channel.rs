// SPDX-FileCopyrightText: 2026 Pillbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock delivery channel for deterministic testing.
//!
//! `MockChannel` answers every handoff from a script (falling back to a
//! default outcome once the script runs dry) and captures each notification
//! and recipient it was given.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use pillbox_core::{
    AdapterType, DeliveryChannel, DeliveryMethod, DeliveryOutcome, HealthStatus, Notification,
    PillboxError, PluginAdapter, Recipient,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOutcome {
    Return(DeliveryOutcome),
    Fail(String),
    /// Never completes; exercises the dispatcher's channel timeout.
    Hang,
}

pub struct MockChannel {
    method: DeliveryMethod,
    script: Mutex<VecDeque<MockOutcome>>,
    fallback: MockOutcome,
    handed: Mutex<Vec<(Notification, Recipient)>>,
}

impl MockChannel {
    /// A channel that always succeeds with `delivered`.
    pub fn new(method: DeliveryMethod) -> Self {
        Self::always(method, MockOutcome::Return(DeliveryOutcome::Delivered))
    }

    pub fn always(method: DeliveryMethod, outcome: MockOutcome) -> Self {
        Self {
            method,
            script: Mutex::new(VecDeque::new()),
            fallback: outcome,
            handed: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(method: DeliveryMethod, reason: &str) -> Self {
        Self::always(method, MockOutcome::Fail(reason.to_string()))
    }

    /// Queue outcomes for the next handoffs, in order.
    pub async fn script(&self, outcomes: impl IntoIterator<Item = MockOutcome>) {
        self.script.lock().await.extend(outcomes);
    }

    pub async fn handed(&self) -> Vec<(Notification, Recipient)> {
        self.handed.lock().await.clone()
    }

    pub async fn handed_count(&self) -> usize {
        self.handed.lock().await.len()
    }

    pub async fn handed_ids(&self) -> Vec<String> {
        self.handed
            .lock()
            .await
            .iter()
            .map(|(n, _)| n.id.clone())
            .collect()
    }
}

#[async_trait]
impl PluginAdapter for MockChannel {
    fn name(&self) -> &str {
        "mock-channel"
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
impl DeliveryChannel for MockChannel {
    fn method(&self) -> DeliveryMethod {
        self.method
    }

    async fn deliver(
        &self,
        notification: &Notification,
        recipient: &Recipient,
    ) -> Result<DeliveryOutcome, PillboxError> {
        self.handed
            .lock()
            .await
            .push((notification.clone(), recipient.clone()));
        let next = self
            .script
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        match next {
            MockOutcome::Return(outcome) => Ok(outcome),
            MockOutcome::Fail(reason) => Err(PillboxError::channel(reason)),
            MockOutcome::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(DeliveryOutcome::Delivered)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pillbox_core::{NotificationKind, NotificationStatus, Priority};

    fn notification(id: &str) -> Notification {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap();
        Notification {
            id: id.into(),
            user_id: "user-1".into(),
            medication_id: None,
            kind: NotificationKind::MedicationReminder,
            title: "t".into(),
            message: "m".into(),
            time_slot: None,
            scheduled_time: None,
            fire_date: None,
            status: NotificationStatus::Pending,
            priority: Priority::High,
            delivery_methods: Vec::new(),
            read_at: None,
            created_at: now,
            expires_at: now,
        }
    }

    #[tokio::test]
    async fn script_runs_before_fallback() {
        let channel = MockChannel::new(DeliveryMethod::Email);
        channel
            .script([
                MockOutcome::Fail("smtp down".into()),
                MockOutcome::Return(DeliveryOutcome::Sent),
            ])
            .await;
        let r = Recipient::default();

        let first = channel.deliver(&notification("a"), &r).await;
        assert_eq!(first.unwrap_err().delivery_reason(), "smtp down");
        assert_eq!(
            channel.deliver(&notification("b"), &r).await.unwrap(),
            DeliveryOutcome::Sent
        );
        assert_eq!(
            channel.deliver(&notification("c"), &r).await.unwrap(),
            DeliveryOutcome::Delivered
        );
        assert_eq!(channel.handed_ids().await, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn failing_channel_always_fails() {
        let channel = MockChannel::failing(DeliveryMethod::Sms, "no route");
        let err = channel
            .deliver(&notification("a"), &Recipient::default())
            .await
            .unwrap_err();
        assert_eq!(err.delivery_reason(), "no route");
        assert_eq!(channel.method(), DeliveryMethod::Sms);
    }
}
