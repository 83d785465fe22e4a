// SPDX-FileCopyrightText: 2026 Pillbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reminder dispatcher.
//!
//! Turns a claimed fire into a persisted notification and fans it out to
//! every channel concurrently. The insert is the exclusive claim: when the
//! dedup key already exists the fire is dropped before any channel runs.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::{debug, error, info, warn};

use pillbox_config::model::{DeliveryConfig, RetentionConfig};
use pillbox_core::{
    ChannelPreferences, Clock, DeliveryAttempt, DeliveryChannel, DeliveryMethod, DueFire,
    DueHandler, MedicationRegistry, MedicationSchedule, Notification, NotificationKind,
    NotificationStatus, NotificationStore, PillboxError, PreferenceStore, Priority, Recipient,
};

use crate::tracker::{StatusTracker, outcome_label};

/// Dispatch settings resolved from configuration.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// Channels every reminder goes through, before user opt-ins.
    pub default_channels: Vec<DeliveryMethod>,
    pub channel_timeout: Duration,
    pub ttl: chrono::Duration,
}

impl DispatchSettings {
    pub fn from_config(
        delivery: &DeliveryConfig,
        retention: &RetentionConfig,
    ) -> Result<Self, PillboxError> {
        let mut default_channels = Vec::with_capacity(delivery.default_channels.len());
        for name in &delivery.default_channels {
            let method = DeliveryMethod::from_str(name).map_err(|_| {
                PillboxError::Config(format!("unknown delivery channel `{name}`"))
            })?;
            if !default_channels.contains(&method) {
                default_channels.push(method);
            }
        }
        Ok(Self {
            default_channels,
            channel_timeout: Duration::from_secs(delivery.channel_timeout_secs),
            ttl: chrono::Duration::hours(i64::from(retention.ttl_hours)),
        })
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            default_channels: vec![DeliveryMethod::Push, DeliveryMethod::InApp],
            channel_timeout: Duration::from_secs(10),
            ttl: chrono::Duration::hours(24),
        }
    }
}

/// The ordered channel list for one reminder.
///
/// A muted medication is still recorded, but only in-app.
pub fn resolve_channels(
    defaults: &[DeliveryMethod],
    preferences: &ChannelPreferences,
    medication_id: &str,
) -> Vec<DeliveryMethod> {
    if preferences.is_muted(medication_id) {
        return vec![DeliveryMethod::InApp];
    }
    let mut methods = defaults.to_vec();
    for method in &preferences.channels {
        if !methods.contains(method) {
            methods.push(*method);
        }
    }
    methods
}

fn reminder_text(schedule: &MedicationSchedule, fire: &DueFire) -> (String, String) {
    let time = fire.entry.scheduled_time();
    let slot = fire.entry.time_slot;
    let title = format!("Time to take {}", schedule.name);
    let message = match schedule.dosage.as_deref().map(str::trim) {
        Some(dosage) if !dosage.is_empty() => {
            format!("Take {dosage} of {} ({slot} dose, {time}).", schedule.name)
        }
        _ => format!("Take your {slot} dose of {} ({time}).", schedule.name),
    };
    (title, message)
}

pub struct Dispatcher {
    registry: Arc<dyn MedicationRegistry>,
    store: Arc<dyn NotificationStore>,
    preferences: Arc<dyn PreferenceStore>,
    channels: HashMap<DeliveryMethod, Arc<dyn DeliveryChannel>>,
    tracker: Arc<StatusTracker>,
    clock: Arc<dyn Clock>,
    settings: DispatchSettings,
}

impl Dispatcher {
    pub fn new(
        settings: DispatchSettings,
        registry: Arc<dyn MedicationRegistry>,
        store: Arc<dyn NotificationStore>,
        preferences: Arc<dyn PreferenceStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let tracker = Arc::new(StatusTracker::new(store.clone(), clock.clone()));
        Self {
            registry,
            store,
            preferences,
            channels: HashMap::new(),
            tracker,
            clock,
            settings,
        }
    }

    /// Register a channel under the method it reports. Replaces any previous one.
    pub fn with_channel(mut self, channel: Arc<dyn DeliveryChannel>) -> Self {
        self.channels.insert(channel.method(), channel);
        self
    }

    pub fn tracker(&self) -> Arc<StatusTracker> {
        Arc::clone(&self.tracker)
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    pub fn configured_channels(&self) -> Vec<DeliveryMethod> {
        let mut methods: Vec<_> = self.channels.keys().copied().collect();
        methods.sort();
        methods
    }

    /// `expires_at` for a record created now about an instant that may lie
    /// in the past or the future.
    pub fn expiry_for(&self, created_at: DateTime<Utc>, scheduled: DateTime<Utc>) -> DateTime<Utc> {
        created_at.max(scheduled) + self.settings.ttl
    }

    /// Handle one claimed fire. Returns the final record, or `None` when the
    /// fire was dropped (duplicate, or the schedule no longer applies).
    pub async fn dispatch(&self, fire: DueFire) -> Result<Option<Notification>, PillboxError> {
        let entry = &fire.entry;
        let Some(schedule) = self.registry.schedule(&entry.medication_id).await? else {
            debug!(medication_id = %entry.medication_id, "schedule gone, dropping fire");
            return Ok(None);
        };
        if !schedule.is_schedulable() || !schedule.covers(entry.fire_date) {
            debug!(
                medication_id = %entry.medication_id,
                fire_date = %entry.fire_date,
                "schedule no longer eligible, dropping fire"
            );
            return Ok(None);
        }

        let prefs = self.preferences.get_preferences(&schedule.user_id).await?;
        let methods = resolve_channels(
            &self.settings.default_channels,
            &prefs,
            &schedule.medication_id,
        );

        let now = self.clock.now();
        let (title, message) = reminder_text(&schedule, &fire);
        let notification = Notification {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: schedule.user_id.clone(),
            medication_id: Some(schedule.medication_id.clone()),
            kind: NotificationKind::MedicationReminder,
            title,
            message,
            time_slot: Some(entry.time_slot),
            scheduled_time: Some(entry.scheduled_time()),
            fire_date: Some(entry.fire_date),
            status: NotificationStatus::Pending,
            priority: if fire.late { Priority::Urgent } else { Priority::High },
            delivery_methods: methods.into_iter().map(DeliveryAttempt::pending).collect(),
            read_at: None,
            created_at: now,
            expires_at: self.expiry_for(now, entry.fire_instant),
        };

        self.deliver_new(notification).await
    }

    /// Persist a new notification and run its channels.
    ///
    /// Returns `None` without touching any channel when the dedup key is
    /// already taken.
    pub async fn deliver_new(
        &self,
        notification: Notification,
    ) -> Result<Option<Notification>, PillboxError> {
        if !self.store.insert_notification(&notification).await? {
            pillbox_prometheus::recording::record_dedup_skip();
            debug!(
                medication_id = ?notification.medication_id,
                slot = ?notification.time_slot,
                fire_date = ?notification.fire_date,
                kind = %notification.kind,
                "duplicate notification skipped"
            );
            return Ok(None);
        }
        pillbox_prometheus::recording::record_notification_created(&notification.kind.to_string());

        let recipient = match self.registry.recipient(&notification.user_id).await {
            Ok(r) => r,
            Err(e) => {
                warn!(user_id = %notification.user_id, error = %e, "recipient lookup failed");
                Recipient {
                    user_id: notification.user_id.clone(),
                    ..Recipient::default()
                }
            }
        };

        let methods: Vec<DeliveryMethod> =
            notification.delivery_methods.iter().map(|a| a.method).collect();
        join_all(
            methods
                .into_iter()
                .map(|method| self.run_channel(method, &notification, &recipient)),
        )
        .await;

        let stored = self
            .store
            .get_notification(&notification.id)
            .await?
            .unwrap_or(notification);
        info!(
            notification_id = %stored.id,
            user_id = %stored.user_id,
            kind = %stored.kind,
            status = %stored.status,
            "notification dispatched"
        );
        Ok(Some(stored))
    }

    async fn run_channel(
        &self,
        method: DeliveryMethod,
        notification: &Notification,
        recipient: &Recipient,
    ) {
        let started = Instant::now();
        let result = match self.channels.get(&method) {
            None => Err(PillboxError::channel("channel not configured")),
            Some(channel) => {
                match tokio::time::timeout(
                    self.settings.channel_timeout,
                    channel.deliver(notification, recipient),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => Err(PillboxError::Timeout {
                        duration: self.settings.channel_timeout,
                    }),
                }
            }
        };

        let label = outcome_label(&result);
        pillbox_prometheus::recording::record_attempt(
            &method.to_string(),
            label,
            started.elapsed().as_secs_f64(),
        );
        if let Err(e) = &result {
            warn!(
                notification_id = %notification.id,
                channel = %method,
                error = %e,
                "delivery attempt failed"
            );
        }

        if let Err(e) = self
            .tracker
            .record_outcome(&notification.id, method, &result)
            .await
        {
            error!(
                notification_id = %notification.id,
                channel = %method,
                error = %e,
                "could not record delivery outcome"
            );
        }
    }
}

#[async_trait]
impl DueHandler for Dispatcher {
    async fn handle_due(&self, fire: DueFire) -> Result<(), PillboxError> {
        self.dispatch(fire).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opt_ins_are_appended_once() {
        let prefs = ChannelPreferences {
            user_id: "u".into(),
            channels: vec![DeliveryMethod::Email, DeliveryMethod::Push, DeliveryMethod::Sms],
            muted_medications: Vec::new(),
        };
        let methods = resolve_channels(
            &[DeliveryMethod::Push, DeliveryMethod::InApp],
            &prefs,
            "med-1",
        );
        assert_eq!(
            methods,
            vec![
                DeliveryMethod::Push,
                DeliveryMethod::InApp,
                DeliveryMethod::Email,
                DeliveryMethod::Sms
            ]
        );
    }

    #[test]
    fn muted_medication_goes_in_app_only() {
        let prefs = ChannelPreferences {
            user_id: "u".into(),
            channels: vec![DeliveryMethod::Email],
            muted_medications: vec!["med-1".into()],
        };
        assert_eq!(
            resolve_channels(&[DeliveryMethod::Push], &prefs, "med-1"),
            vec![DeliveryMethod::InApp]
        );
    }

    #[test]
    fn settings_reject_unknown_channel() {
        let delivery = DeliveryConfig {
            default_channels: vec!["push".into(), "pager".into()],
            ..DeliveryConfig::default()
        };
        let err = DispatchSettings::from_config(&delivery, &RetentionConfig::default()).unwrap_err();
        assert!(err.to_string().contains("pager"));
    }

    #[test]
    fn settings_from_defaults() {
        let s = DispatchSettings::from_config(&DeliveryConfig::default(), &RetentionConfig::default())
            .unwrap();
        assert_eq!(s.default_channels, vec![DeliveryMethod::Push, DeliveryMethod::InApp]);
        assert_eq!(s.ttl, chrono::Duration::hours(24));
    }
}
