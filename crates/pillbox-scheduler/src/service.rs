// SPDX-FileCopyrightText: 2026 Pillbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The reminder service: owns the pending set and runs the tick and sweep
//! loops until stopped.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use pillbox_config::model::{RetentionConfig, SchedulerConfig};
use pillbox_core::{
    Clock, DueHandler, MedicationRegistry, NotificationStore, PillboxError, ScheduleWatcher,
    ScheduledFireEntry,
};

use crate::compiler::{self, CompileOptions};
use crate::pending::PendingSet;
use crate::reaper::ExpiryReaper;
use crate::trigger::TriggerClock;

/// Wires the compiler, trigger clock and reaper around one pending set.
///
/// Everything time-dependent reads the injected [`Clock`], so tests can drive
/// the service with `tick_once`/`sweep_once` instead of real intervals.
pub struct ReminderService {
    registry: Arc<dyn MedicationRegistry>,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
    sweep_interval: StdDuration,
    pending: Arc<PendingSet>,
    trigger: TriggerClock,
    reaper: ExpiryReaper,
    last_recompile: Mutex<Option<DateTime<Utc>>>,
    started: AtomicBool,
    cancel: CancellationToken,
    tasks: TaskTracker,
}

impl ReminderService {
    pub fn new(
        scheduler: &SchedulerConfig,
        retention: &RetentionConfig,
        registry: Arc<dyn MedicationRegistry>,
        handler: Arc<dyn DueHandler>,
        store: Arc<dyn NotificationStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let pending = Arc::new(PendingSet::new());
        let tolerance = Duration::seconds(scheduler.tolerance_secs as i64);
        let trigger = TriggerClock::new(pending.clone(), handler, clock.clone(), tolerance);
        let reaper = ExpiryReaper::new(store, clock.clone());
        Self {
            registry,
            clock,
            config: scheduler.clone(),
            sweep_interval: StdDuration::from_secs(retention.sweep_interval_secs),
            pending,
            trigger,
            reaper,
            last_recompile: Mutex::new(None),
            started: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            tasks: TaskTracker::new(),
        }
    }

    fn compile_options(&self) -> CompileOptions {
        CompileOptions {
            grace: Duration::seconds(self.config.tolerance_secs as i64),
            default_utc_offset_minutes: self.config.default_utc_offset_minutes,
        }
    }

    /// Compile every active schedule and replace the pending set.
    pub async fn recompile_all(&self) -> Result<usize, PillboxError> {
        let now = self.clock.now();
        let schedules = self.registry.active_schedules().await?;
        let out = compiler::compile(&schedules, now, self.compile_options());
        let skipped = out.skipped.len();
        let pending = self.pending.replace_all(out.entries).await;
        *self.last_recompile.lock().await = Some(now);

        pillbox_prometheus::recording::set_pending_entries(pending);
        info!(
            schedules = schedules.len(),
            pending,
            skipped,
            "reminder schedules compiled"
        );
        Ok(pending)
    }

    /// Recompile one medication. A missing or disabled schedule leaves no
    /// pending entries behind. Returns the medication's entry count.
    pub async fn recompile_medication(&self, medication_id: &str) -> Result<usize, PillboxError> {
        let now = self.clock.now();
        let entries = match self.registry.schedule(medication_id).await? {
            Some(schedule) => {
                compiler::compile_schedule(&schedule, now, self.compile_options()).entries
            }
            None => Vec::new(),
        };
        let count = entries.len();
        let total = self.pending.replace_for_medication(medication_id, entries).await;
        pillbox_prometheus::recording::set_pending_entries(total);
        debug!(medication_id, entries = count, "medication schedule recompiled");
        Ok(count)
    }

    /// One tick: claim due entries, then recompile if the interval elapsed.
    ///
    /// The claim runs first so a recompile can never roll a due slot to
    /// tomorrow before it fires.
    pub async fn tick_once(&self) -> usize {
        let claimed = self.trigger.tick().await;

        let now = self.clock.now();
        let due = match *self.last_recompile.lock().await {
            None => true,
            Some(last) => {
                now - last >= Duration::seconds(self.config.recompile_interval_secs as i64)
            }
        };
        if due {
            if let Err(e) = self.recompile_all().await {
                warn!(error = %e, "periodic recompile failed, keeping previous entries");
            }
        }
        claimed
    }

    /// One expiry sweep.
    pub async fn sweep_once(&self) -> Result<u64, PillboxError> {
        self.reaper.sweep().await
    }

    /// Wait for every dispatch spawned by earlier ticks.
    pub async fn flush(&self) {
        self.trigger.flush().await;
    }

    pub async fn pending_entries(&self) -> Vec<ScheduledFireEntry> {
        self.pending.snapshot().await
    }

    /// Compile once and spawn the tick and sweep loops.
    pub async fn start(self: &Arc<Self>) -> Result<(), PillboxError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(PillboxError::Internal(
                "reminder service already started".into(),
            ));
        }

        if let Err(e) = self.recompile_all().await {
            warn!(error = %e, "initial compile failed, retrying on first tick");
        }

        let service = Arc::clone(self);
        let cancel = self.cancel.clone();
        let tick_every = StdDuration::from_secs(self.config.tick_interval_secs);
        self.tasks.spawn(async move {
            let mut interval = tokio::time::interval(tick_every);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        service.tick_once().await;
                    }
                    _ = cancel.cancelled() => {
                        debug!("tick loop shutting down");
                        break;
                    }
                }
            }
        });

        let service = Arc::clone(self);
        let cancel = self.cancel.clone();
        let sweep_every = self.sweep_interval;
        self.tasks.spawn(async move {
            let mut interval = tokio::time::interval(sweep_every);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = service.sweep_once().await {
                            warn!(error = %e, "expiry sweep failed (non-fatal)");
                        }
                    }
                    _ = cancel.cancelled() => {
                        debug!("sweep loop shutting down");
                        break;
                    }
                }
            }
        });

        info!(
            tick_secs = self.config.tick_interval_secs,
            tolerance_secs = self.config.tolerance_secs,
            sweep_secs = self.sweep_interval.as_secs(),
            "reminder service started"
        );
        Ok(())
    }

    /// Cancel both loops and wait for them and any in-flight dispatch.
    pub async fn stop(&self) {
        self.cancel.cancel();
        self.tasks.close();
        self.tasks.wait().await;
        self.trigger.flush().await;
        info!("reminder service stopped");
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

#[async_trait]
impl ScheduleWatcher for ReminderService {
    async fn schedule_changed(&self, medication_id: &str) -> Result<(), PillboxError> {
        self.recompile_medication(medication_id).await.map(|_| ())
    }
}
