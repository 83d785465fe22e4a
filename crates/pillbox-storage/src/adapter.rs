// SPDX-FileCopyrightText: 2026 Pillbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the storage and registry traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::OnceCell;
use tracing::debug;

use pillbox_config::model::StorageConfig;
use pillbox_core::{
    AdapterType, AttemptTransition, ChannelPreferences, Confirmation, ConfirmationStore,
    DeliveryMethod, HealthStatus, MedicationRegistry, MedicationSchedule, Notification,
    NotificationStore, PillboxError, PluginAdapter, PreferenceStore, Recipient, StorageAdapter,
};

use crate::database::Database;
use crate::queries;

/// SQLite-backed store for notifications, preferences, confirmations and the
/// registry read model.
///
/// The database is opened on the first call to [`StorageAdapter::initialize`].
pub struct SqliteStore {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStore {
    /// Create a store. The database is not opened until `initialize`.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Create and initialize in one step.
    pub async fn open(config: StorageConfig) -> Result<Self, PillboxError> {
        let store = Self::new(config);
        store.initialize().await?;
        Ok(store)
    }

    /// Returns the underlying Database, or an error if not initialized.
    fn db(&self) -> Result<&Database, PillboxError> {
        self.db.get().ok_or_else(|| PillboxError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }

    // --- Registry mirror writes ---

    pub async fn upsert_medication(&self, schedule: &MedicationSchedule) -> Result<(), PillboxError> {
        queries::medications::upsert_medication(self.db()?, schedule, Utc::now()).await
    }

    pub async fn delete_medication(&self, medication_id: &str) -> Result<bool, PillboxError> {
        queries::medications::delete_medication(self.db()?, medication_id).await
    }

    pub async fn upsert_recipient(&self, recipient: &Recipient) -> Result<(), PillboxError> {
        queries::medications::upsert_recipient(self.db()?, recipient).await
    }
}

#[async_trait]
impl PluginAdapter for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, PillboxError> {
        let db = self.db()?;
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), PillboxError> {
        if let Some(db) = self.db.get() {
            db.close().await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStore {
    async fn initialize(&self) -> Result<(), PillboxError> {
        let db = Database::open(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| PillboxError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), PillboxError> {
        self.db()?.close().await?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}

#[async_trait]
impl NotificationStore for SqliteStore {
    async fn insert_notification(
        &self,
        notification: &Notification,
    ) -> Result<bool, PillboxError> {
        queries::notifications::insert_notification(self.db()?, notification).await
    }

    async fn get_notification(&self, id: &str) -> Result<Option<Notification>, PillboxError> {
        queries::notifications::get_notification(self.db()?, id).await
    }

    async fn list_history(
        &self,
        user_id: &str,
        limit: u32,
        offset: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<Notification>, PillboxError> {
        queries::notifications::list_history(self.db()?, user_id, limit, offset, now).await
    }

    async fn list_unread(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Notification>, PillboxError> {
        queries::notifications::list_unread(self.db()?, user_id, now).await
    }

    async fn apply_attempt_transition(
        &self,
        id: &str,
        method: DeliveryMethod,
        transition: AttemptTransition,
        at: DateTime<Utc>,
    ) -> Result<Option<Notification>, PillboxError> {
        queries::notifications::apply_attempt_transition(self.db()?, id, method, transition, at)
            .await
    }

    async fn mark_read(
        &self,
        id: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<Notification>, PillboxError> {
        queries::notifications::mark_read(self.db()?, id, at).await
    }

    async fn mark_all_read(&self, user_id: &str, at: DateTime<Utc>) -> Result<u64, PillboxError> {
        queries::notifications::mark_all_read(self.db()?, user_id, at).await
    }

    async fn delete_notification(&self, id: &str) -> Result<bool, PillboxError> {
        queries::notifications::delete_notification(self.db()?, id).await
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, PillboxError> {
        queries::notifications::delete_expired(self.db()?, now).await
    }
}

#[async_trait]
impl PreferenceStore for SqliteStore {
    async fn get_preferences(&self, user_id: &str) -> Result<ChannelPreferences, PillboxError> {
        queries::preferences::get_preferences(self.db()?, user_id).await
    }

    async fn set_channels(
        &self,
        user_id: &str,
        channels: &[DeliveryMethod],
    ) -> Result<ChannelPreferences, PillboxError> {
        queries::preferences::set_channels(self.db()?, user_id, channels, Utc::now()).await
    }

    async fn set_medication_enabled(
        &self,
        user_id: &str,
        medication_id: &str,
        enabled: bool,
    ) -> Result<ChannelPreferences, PillboxError> {
        queries::preferences::set_medication_enabled(
            self.db()?,
            user_id,
            medication_id,
            enabled,
            Utc::now(),
        )
        .await
    }
}

#[async_trait]
impl ConfirmationStore for SqliteStore {
    async fn record_confirmation(
        &self,
        confirmation: &Confirmation,
    ) -> Result<bool, PillboxError> {
        queries::confirmations::record_confirmation(self.db()?, confirmation).await
    }
}

#[async_trait]
impl MedicationRegistry for SqliteStore {
    async fn active_schedules(&self) -> Result<Vec<MedicationSchedule>, PillboxError> {
        queries::medications::list_active_medications(self.db()?).await
    }

    async fn schedule(
        &self,
        medication_id: &str,
    ) -> Result<Option<MedicationSchedule>, PillboxError> {
        queries::medications::get_medication(self.db()?, medication_id).await
    }

    async fn recipient(&self, user_id: &str) -> Result<Recipient, PillboxError> {
        queries::medications::get_recipient(self.db()?, user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn make_config(path: &str) -> StorageConfig {
        StorageConfig {
            database_path: path.to_string(),
            wal_mode: true,
        }
    }

    #[tokio::test]
    async fn sqlite_store_implements_plugin_adapter() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let store = SqliteStore::new(make_config(db_path.to_str().unwrap()));

        assert_eq!(store.name(), "sqlite");
        assert_eq!(store.version(), semver::Version::new(0, 1, 0));
        assert_eq!(store.adapter_type(), AdapterType::Storage);
    }

    #[tokio::test]
    async fn initialize_twice_returns_error() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("double_init.db");
        let store = SqliteStore::new(make_config(db_path.to_str().unwrap()));

        store.initialize().await.unwrap();
        assert!(db_path.exists(), "database file should be created");
        assert!(store.initialize().await.is_err(), "second initialize should fail");
    }

    #[tokio::test]
    async fn health_check_requires_initialize() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("health.db");
        let store = SqliteStore::new(make_config(db_path.to_str().unwrap()));

        assert!(store.health_check().await.is_err());
        store.initialize().await.unwrap();
        assert_eq!(store.health_check().await.unwrap(), HealthStatus::Healthy);
        store.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn queries_fail_cleanly_before_initialize() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::new(make_config(dir.path().join("x.db").to_str().unwrap()));
        let err = store.get_notification("n1").await.unwrap_err();
        assert!(err.to_string().contains("not initialized"));
    }
}
