// SPDX-FileCopyrightText: 2026 Pillbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles the reminder engine around a temp SQLite
//! database and a [`ManualClock`]: registry, dispatcher with the channels
//! you register, ack handler, preference service and reminder service.
//! Tests move time with [`TestHarness::advance`] and drive the loop with
//! [`TestHarness::tick`].

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};

use pillbox_config::model::{
    DeliveryConfig, PillboxConfig, RetentionConfig, SchedulerConfig, StorageConfig,
};
use pillbox_core::{
    DeliveryChannel, ManualClock, MedicationSchedule, Notification, NotificationStore,
    PillboxError, Recipient, TimeSlots,
};
use pillbox_delivery::{AckHandler, DispatchSettings, Dispatcher, PreferenceService};
use pillbox_scheduler::ReminderService;
use pillbox_storage::SqliteStore;

/// `2026-03-{day} {hour}:{minute}:00 UTC`.
pub fn utc(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, day, hour, minute, 0)
        .single()
        .unwrap_or_default()
}

/// A schedule active March 1 to 8, 2026, with the given slot times.
pub fn medication(
    medication_id: &str,
    user_id: &str,
    name: &str,
    morning: Option<&str>,
    afternoon: Option<&str>,
    evening: Option<&str>,
) -> MedicationSchedule {
    MedicationSchedule {
        medication_id: medication_id.to_string(),
        user_id: user_id.to_string(),
        name: name.to_string(),
        dosage: None,
        time_slots: TimeSlots {
            morning: morning.map(String::from),
            afternoon: afternoon.map(String::from),
            evening: evening.map(String::from),
        },
        start_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap_or_default(),
        end_date: NaiveDate::from_ymd_opt(2026, 3, 8).unwrap_or_default(),
        reminder_enabled: true,
        is_active: true,
        utc_offset_minutes: None,
    }
}

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    start: DateTime<Utc>,
    config: PillboxConfig,
    channels: Vec<Arc<dyn DeliveryChannel>>,
    medications: Vec<MedicationSchedule>,
    recipients: Vec<Recipient>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        let mut config = PillboxConfig::default();
        config.delivery.channel_timeout_secs = 1;
        Self {
            start: utc(1, 7, 0),
            config,
            channels: Vec::new(),
            medications: Vec::new(),
            recipients: Vec::new(),
        }
    }

    /// Initial clock reading.
    pub fn starting_at(mut self, start: DateTime<Utc>) -> Self {
        self.start = start;
        self
    }

    pub fn with_scheduler(mut self, scheduler: SchedulerConfig) -> Self {
        self.config.scheduler = scheduler;
        self
    }

    pub fn with_retention(mut self, retention: RetentionConfig) -> Self {
        self.config.retention = retention;
        self
    }

    pub fn with_delivery(mut self, delivery: DeliveryConfig) -> Self {
        self.config.delivery = delivery;
        self
    }

    pub fn with_channel(mut self, channel: Arc<dyn DeliveryChannel>) -> Self {
        self.channels.push(channel);
        self
    }

    pub fn with_medication(mut self, schedule: MedicationSchedule) -> Self {
        self.medications.push(schedule);
        self
    }

    pub fn with_recipient(mut self, recipient: Recipient) -> Self {
        self.recipients.push(recipient);
        self
    }

    /// Build the test harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, PillboxError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| PillboxError::Storage { source: e.into() })?;
        let storage_config = StorageConfig {
            database_path: temp_dir
                .path()
                .join("test.db")
                .to_string_lossy()
                .into_owned(),
            wal_mode: true,
        };
        let store = Arc::new(SqliteStore::open(storage_config.clone()).await?);
        for schedule in &self.medications {
            store.upsert_medication(schedule).await?;
        }
        for recipient in &self.recipients {
            store.upsert_recipient(recipient).await?;
        }

        let clock = Arc::new(ManualClock::new(self.start));
        let settings = DispatchSettings::from_config(&self.config.delivery, &self.config.retention)?;

        let mut dispatcher = Dispatcher::new(
            settings,
            store.clone(),
            store.clone(),
            store.clone(),
            clock.clone(),
        );
        for channel in self.channels {
            dispatcher = dispatcher.with_channel(channel);
        }
        let dispatcher = Arc::new(dispatcher);

        let ack = Arc::new(AckHandler::new(
            store.clone(),
            store.clone(),
            store.clone(),
            dispatcher.clone(),
            clock.clone(),
            self.config.scheduler.default_utc_offset_minutes,
        ));
        let preferences = Arc::new(PreferenceService::new(store.clone(), store.clone()));
        let service = Arc::new(ReminderService::new(
            &self.config.scheduler,
            &self.config.retention,
            store.clone(),
            dispatcher.clone(),
            store.clone(),
            clock.clone(),
        ));

        let mut config = self.config;
        config.storage = storage_config;

        Ok(TestHarness {
            store,
            clock,
            dispatcher,
            ack,
            preferences,
            service,
            config,
            _temp_dir: temp_dir,
        })
    }
}

/// A complete test environment with mock channels and temp storage.
pub struct TestHarness {
    /// Registry, notification, preference and confirmation store in one.
    pub store: Arc<SqliteStore>,
    pub clock: Arc<ManualClock>,
    pub dispatcher: Arc<Dispatcher>,
    pub ack: Arc<AckHandler>,
    pub preferences: Arc<PreferenceService>,
    pub service: Arc<ReminderService>,
    /// Effective configuration, with `storage` pointing at the temp database.
    pub config: PillboxConfig,
    /// Temp directory kept alive for cleanup on drop.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    /// Create a new builder for configuring the test harness.
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    pub fn now(&self) -> DateTime<Utc> {
        use pillbox_core::Clock;
        self.clock.now()
    }

    pub fn set_time(&self, to: DateTime<Utc>) {
        self.clock.set(to);
    }

    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }

    /// One loop iteration, waiting for every dispatch it spawned.
    /// Returns how many fires were claimed.
    pub async fn tick(&self) -> usize {
        let fired = self.service.tick_once().await;
        self.service.flush().await;
        fired
    }

    /// Stored record by id. Panics when missing; for assertions only.
    pub async fn notification(&self, id: &str) -> Notification {
        match self.store.get_notification(id).await {
            Ok(Some(n)) => n,
            other => panic!("notification {id} not stored: {other:?}"),
        }
    }

    /// Set the clock to `at` and tick.
    pub async fn tick_at(&self, at: DateTime<Utc>) -> usize {
        self.set_time(at);
        self.tick().await
    }
}
