// SPDX-FileCopyrightText: 2026 Pillbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence traits for notifications, preferences and confirmations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::PillboxError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    AttemptTransition, ChannelPreferences, Confirmation, DeliveryMethod, Notification,
};

/// Lifecycle of a storage backend.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Initializes the storage backend (migrations, pragmas).
    async fn initialize(&self) -> Result<(), PillboxError>;

    /// Closes the storage backend, flushing pending writes.
    async fn close(&self) -> Result<(), PillboxError>;
}

/// Notification records and their per-channel attempts.
#[async_trait]
pub trait NotificationStore: Send + Sync + 'static {
    /// Insert a new notification.
    ///
    /// Returns `false` without writing when a notification with the same
    /// `(medication_id, time_slot, fire_date, kind)` already exists.
    async fn insert_notification(&self, notification: &Notification)
    -> Result<bool, PillboxError>;

    async fn get_notification(&self, id: &str) -> Result<Option<Notification>, PillboxError>;

    /// Unexpired notifications for a user, newest first.
    async fn list_history(
        &self,
        user_id: &str,
        limit: u32,
        offset: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<Notification>, PillboxError>;

    /// Unexpired `sent`/`delivered` notifications with no `read_at`, newest first.
    async fn list_unread(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Notification>, PillboxError>;

    /// Move one attempt forward and re-derive the aggregate in a single write.
    ///
    /// Returns the stored state afterwards (unchanged if the transition was
    /// not allowed), or `None` if the notification does not exist.
    async fn apply_attempt_transition(
        &self,
        id: &str,
        method: DeliveryMethod,
        transition: AttemptTransition,
        at: DateTime<Utc>,
    ) -> Result<Option<Notification>, PillboxError>;

    /// Set `read_at` (first call only) and `status = read`.
    async fn mark_read(
        &self,
        id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<Notification>, PillboxError>;

    /// Mark every unread notification of a user read. Returns how many changed.
    async fn mark_all_read(&self, user_id: &str, at: DateTime<Utc>) -> Result<u64, PillboxError>;

    async fn delete_notification(&self, id: &str) -> Result<bool, PillboxError>;

    /// Delete every notification with `expires_at <= now`. Returns how many.
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, PillboxError>;
}

/// Per-user delivery preferences.
#[async_trait]
pub trait PreferenceStore: Send + Sync + 'static {
    /// Preferences for a user; defaults when none were ever written.
    async fn get_preferences(&self, user_id: &str) -> Result<ChannelPreferences, PillboxError>;

    /// Replace the user's opt-in channel list.
    async fn set_channels(
        &self,
        user_id: &str,
        channels: &[DeliveryMethod],
    ) -> Result<ChannelPreferences, PillboxError>;

    async fn set_medication_enabled(
        &self,
        user_id: &str,
        medication_id: &str,
        enabled: bool,
    ) -> Result<ChannelPreferences, PillboxError>;
}

/// "Medication taken" events.
#[async_trait]
pub trait ConfirmationStore: Send + Sync + 'static {
    /// Record a confirmation. Returns `false` if one already exists for the
    /// same `(medication_id, time_slot, fire_date)`.
    async fn record_confirmation(&self, confirmation: &Confirmation)
    -> Result<bool, PillboxError>;
}
