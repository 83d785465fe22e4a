// SPDX-FileCopyrightText: 2026 Pillbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Acknowledgments: read receipts, deletion, history queries and
//! "medication taken" confirmations.
//!
//! Every call is made on behalf of a user. Touching a notification owned by
//! someone else is `Unauthorized`; an unknown or expired id is `NotFound`.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info};

use pillbox_core::{
    AttemptTransition, Clock, Confirmation, ConfirmationStore, DeliveryAttempt, DeliveryMethod,
    MedicationRegistry, MedicationSchedule, Notification, NotificationKind, NotificationStatus,
    NotificationStore, PillboxError, Priority, TimeSlot, local_date,
};

use crate::dispatcher::Dispatcher;

pub const DEFAULT_HISTORY_LIMIT: u32 = 20;
pub const MAX_HISTORY_LIMIT: u32 = 100;

/// Result of a "medication taken" call.
#[derive(Debug, Clone, Serialize)]
pub struct TakenReceipt {
    pub confirmation: Confirmation,
    /// `false` when the same slot and day had already been confirmed.
    pub newly_recorded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub follow_up: Option<Notification>,
}

pub struct AckHandler {
    store: Arc<dyn NotificationStore>,
    confirmations: Arc<dyn ConfirmationStore>,
    registry: Arc<dyn MedicationRegistry>,
    dispatcher: Arc<Dispatcher>,
    clock: Arc<dyn Clock>,
    default_utc_offset_minutes: i32,
}

impl AckHandler {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        confirmations: Arc<dyn ConfirmationStore>,
        registry: Arc<dyn MedicationRegistry>,
        dispatcher: Arc<Dispatcher>,
        clock: Arc<dyn Clock>,
        default_utc_offset_minutes: i32,
    ) -> Self {
        Self {
            store,
            confirmations,
            registry,
            dispatcher,
            clock,
            default_utc_offset_minutes,
        }
    }

    async fn owned(&self, user_id: &str, id: &str) -> Result<Notification, PillboxError> {
        let not_found = || PillboxError::NotFound {
            entity: "notification",
            id: id.to_string(),
        };
        let notification = self.store.get_notification(id).await?.ok_or_else(not_found)?;
        if notification.is_expired(self.clock.now()) {
            return Err(not_found());
        }
        if notification.user_id != user_id {
            return Err(PillboxError::Unauthorized(format!(
                "notification {id} belongs to another user"
            )));
        }
        Ok(notification)
    }

    async fn owned_schedule(
        &self,
        user_id: &str,
        medication_id: &str,
    ) -> Result<MedicationSchedule, PillboxError> {
        let schedule = self
            .registry
            .schedule(medication_id)
            .await?
            .ok_or_else(|| PillboxError::NotFound {
                entity: "medication",
                id: medication_id.to_string(),
            })?;
        if schedule.user_id != user_id {
            return Err(PillboxError::Unauthorized(format!(
                "medication {medication_id} belongs to another user"
            )));
        }
        Ok(schedule)
    }

    /// Newest first. `limit` defaults to 20 and is capped at 100.
    pub async fn history(
        &self,
        user_id: &str,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> Result<Vec<Notification>, PillboxError> {
        let limit = limit
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
            .clamp(1, MAX_HISTORY_LIMIT);
        self.store
            .list_history(user_id, limit, offset.unwrap_or(0), self.clock.now())
            .await
    }

    pub async fn unread(&self, user_id: &str) -> Result<Vec<Notification>, PillboxError> {
        self.store.list_unread(user_id, self.clock.now()).await
    }

    /// Mark one notification read. Repeating the call is a no-op that still
    /// succeeds and keeps the first `read_at`.
    pub async fn mark_read(&self, user_id: &str, id: &str) -> Result<Notification, PillboxError> {
        let current = self.owned(user_id, id).await?;
        if current.read_at.is_some() {
            return Ok(current);
        }
        let updated = self
            .store
            .mark_read(id, self.clock.now())
            .await?
            .ok_or_else(|| PillboxError::NotFound {
                entity: "notification",
                id: id.to_string(),
            })?;
        debug!(notification_id = id, user_id, "notification read");
        Ok(updated)
    }

    /// Returns how many notifications were newly marked read.
    pub async fn mark_all_read(&self, user_id: &str) -> Result<u64, PillboxError> {
        let count = self.store.mark_all_read(user_id, self.clock.now()).await?;
        debug!(user_id, count, "all notifications read");
        Ok(count)
    }

    pub async fn delete(&self, user_id: &str, id: &str) -> Result<(), PillboxError> {
        self.owned(user_id, id).await?;
        self.store.delete_notification(id).await?;
        debug!(notification_id = id, user_id, "notification deleted");
        Ok(())
    }

    /// Apply a provider delivery receipt to one channel's attempt.
    pub async fn record_receipt(
        &self,
        user_id: &str,
        id: &str,
        method: DeliveryMethod,
        transition: AttemptTransition,
    ) -> Result<Notification, PillboxError> {
        let current = self.owned(user_id, id).await?;
        if current.attempt(method).is_none() {
            return Err(PillboxError::InvalidInput(format!(
                "notification {id} was not sent via {method}"
            )));
        }
        self.dispatcher
            .tracker()
            .transition(id, method, transition)
            .await
    }

    /// Record that a dose was taken. The first confirmation for a slot and
    /// day creates an in-app `medication_taken` follow-up; repeats only
    /// return the existing state. The reminder itself is left untouched.
    pub async fn confirm_taken(
        &self,
        user_id: &str,
        medication_id: &str,
        time_slot: TimeSlot,
        fire_date: Option<NaiveDate>,
    ) -> Result<TakenReceipt, PillboxError> {
        let schedule = self.owned_schedule(user_id, medication_id).await?;
        if schedule
            .time_slots
            .get(time_slot)
            .is_none_or(|s| s.trim().is_empty())
        {
            return Err(PillboxError::InvalidInput(format!(
                "medication {medication_id} has no {time_slot} slot"
            )));
        }

        let now = self.clock.now();
        let offset = schedule
            .utc_offset_minutes
            .unwrap_or(self.default_utc_offset_minutes);
        let fire_date = fire_date.unwrap_or_else(|| local_date(now, offset));

        let confirmation = Confirmation {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            medication_id: medication_id.to_string(),
            time_slot,
            fire_date,
            notification_id: None,
            confirmed_at: now,
        };
        let newly_recorded = self.confirmations.record_confirmation(&confirmation).await?;
        if !newly_recorded {
            debug!(medication_id, slot = %time_slot, %fire_date, "dose already confirmed");
            return Ok(TakenReceipt {
                confirmation,
                newly_recorded,
                follow_up: None,
            });
        }

        info!(user_id, medication_id, slot = %time_slot, %fire_date, "dose confirmed");
        let follow_up = Notification {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            medication_id: Some(medication_id.to_string()),
            kind: NotificationKind::MedicationTaken,
            title: format!("{} taken", schedule.name),
            message: format!("Logged your {time_slot} dose of {}.", schedule.name),
            time_slot: Some(time_slot),
            scheduled_time: schedule.time_slots.get(time_slot).map(|s| s.trim().to_string()),
            fire_date: Some(fire_date),
            status: NotificationStatus::Pending,
            priority: Priority::Low,
            delivery_methods: vec![DeliveryAttempt::pending(DeliveryMethod::InApp)],
            read_at: None,
            created_at: now,
            expires_at: self.dispatcher.expiry_for(now, now),
        };
        let follow_up = self.dispatcher.deliver_new(follow_up).await?;

        Ok(TakenReceipt {
            confirmation,
            newly_recorded,
            follow_up,
        })
    }
}
