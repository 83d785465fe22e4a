// SPDX-FileCopyrightText: 2026 Pillbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Real-time push channel over the connection registry.
//!
//! With no live connection the attempt either fails with `no active session`
//! or, under the `queue` offline policy, is parked per user and flushed on
//! the next connect.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use pillbox_config::model::PushOfflinePolicy;
use pillbox_core::{
    AdapterType, DeliveryChannel, DeliveryMethod, DeliveryOutcome,
    HealthStatus, Notification, PillboxError, PluginAdapter, Recipient,
};
use pillbox_delivery::StatusTracker;

use crate::registry::{BroadcastOutcome, ConnectionRegistry};
use crate::ws::ServerEvent;

pub const NO_ACTIVE_SESSION: &str = "no active session";

#[derive(Debug, Clone)]
struct ParkedPush {
    notification_id: String,
    payload: String,
}

pub struct PushChannel {
    registry: Arc<ConnectionRegistry>,
    policy: PushOfflinePolicy,
    queue_limit: usize,
    offline: DashMap<String, VecDeque<ParkedPush>>,
}

impl PushChannel {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        policy: PushOfflinePolicy,
        queue_limit: usize,
    ) -> Self {
        Self {
            registry,
            policy,
            queue_limit: queue_limit.max(1),
            offline: DashMap::new(),
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn parked_for(&self, user_id: &str) -> usize {
        self.offline.get(user_id).map_or(0, |q| q.len())
    }

    fn park(&self, user_id: &str, notification_id: &str, payload: String) {
        let mut queue = self.offline.entry(user_id.to_string()).or_default();
        if queue.len() >= self.queue_limit {
            if let Some(dropped) = queue.pop_front() {
                warn!(
                    user_id,
                    notification_id = %dropped.notification_id,
                    "offline push queue full, dropping oldest"
                );
            }
        }
        queue.push_back(ParkedPush {
            notification_id: notification_id.to_string(),
            payload,
        });
    }

    /// Send everything parked for `user_id` to a freshly connected session
    /// and mark each push attempt delivered. Returns how many were sent.
    pub async fn flush_offline(
        &self,
        user_id: &str,
        sender: &mpsc::Sender<String>,
        tracker: &StatusTracker,
    ) -> usize {
        let Some((_, mut queue)) = self.offline.remove(user_id) else {
            return 0;
        };
        let mut sent = 0;
        while let Some(parked) = queue.pop_front() {
            if sender.send(parked.payload.clone()).await.is_err() {
                queue.push_front(parked);
                break;
            }
            sent += 1;
            if let Err(e) = tracker
                .record_outcome(
                    &parked.notification_id,
                    DeliveryMethod::Push,
                    &Ok(DeliveryOutcome::Delivered),
                )
                .await
            {
                debug!(notification_id = %parked.notification_id, error = %e, "parked push no longer tracked");
            }
        }
        if !queue.is_empty() {
            // Session closed mid-flush; keep the rest for the next connect.
            self.offline
                .entry(user_id.to_string())
                .or_default()
                .extend(queue);
        }
        debug!(user_id, sent, "offline push queue flushed");
        sent
    }
}

#[async_trait]
impl PluginAdapter for PushChannel {
    fn name(&self) -> &str {
        "websocket-push"
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
impl DeliveryChannel for PushChannel {
    fn method(&self) -> DeliveryMethod {
        DeliveryMethod::Push
    }

    async fn deliver(
        &self,
        notification: &Notification,
        _recipient: &Recipient,
    ) -> Result<DeliveryOutcome, PillboxError> {
        let payload = ServerEvent::Notification {
            notification: notification.clone(),
        }
        .to_json()?;
        let user_id = notification.user_id.as_str();

        let outcomes = self.registry.broadcast(user_id, &payload);
        let accepted = outcomes
            .iter()
            .filter(|(_, o)| *o == BroadcastOutcome::Delivered)
            .count();
        if accepted > 0 {
            debug!(notification_id = %notification.id, user_id, accepted, "pushed to live sessions");
            return Ok(DeliveryOutcome::Delivered);
        }
        if outcomes.iter().any(|(_, o)| *o == BroadcastOutcome::Full) {
            return Err(PillboxError::channel("push buffer full on every session"));
        }

        match self.policy {
            PushOfflinePolicy::Fail => Err(PillboxError::channel(NO_ACTIVE_SESSION)),
            PushOfflinePolicy::Queue => {
                self.park(user_id, &notification.id, payload);
                debug!(notification_id = %notification.id, user_id, "push parked until next connect");
                Ok(DeliveryOutcome::Deferred)
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

    fn recipient() -> Recipient {
        Recipient {
            user_id: "user-1".into(),
            ..Recipient::default()
        }
    }

    #[tokio::test]
    async fn offline_user_fails_with_no_active_session() {
        let push = PushChannel::new(
            Arc::new(ConnectionRegistry::new()),
            PushOfflinePolicy::Fail,
            10,
        );
        let err = push
            .deliver(&notification("n-1"), &recipient())
            .await
            .unwrap_err();
        assert_eq!(err.delivery_reason(), NO_ACTIVE_SESSION);
        assert_eq!(push.parked_for("user-1"), 0);
    }

    #[tokio::test]
    async fn live_session_receives_notification_event() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (tx, mut rx) = mpsc::channel(4);
        registry.register("user-1", tx);
        let push = PushChannel::new(registry, PushOfflinePolicy::Fail, 10);

        let outcome = push
            .deliver(&notification("n-1"), &recipient())
            .await
            .unwrap();
        assert_eq!(outcome, DeliveryOutcome::Delivered);
        let frame: serde_json::Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(frame["type"], "notification");
        assert_eq!(frame["notification"]["id"], "n-1");
    }

    #[tokio::test]
    async fn queue_policy_parks_and_caps() {
        let push = PushChannel::new(
            Arc::new(ConnectionRegistry::new()),
            PushOfflinePolicy::Queue,
            2,
        );
        for id in ["n-1", "n-2", "n-3"] {
            let outcome = push.deliver(&notification(id), &recipient()).await.unwrap();
            assert_eq!(outcome, DeliveryOutcome::Deferred);
        }
        assert_eq!(push.parked_for("user-1"), 2);
    }
}
