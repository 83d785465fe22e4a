// SPDX-FileCopyrightText: 2026 Pillbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trigger clock: one claim pass per tick, dispatch off the tick path.

use std::sync::Arc;

use chrono::Duration;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, warn};

use pillbox_core::{Clock, DueHandler};

use crate::pending::PendingSet;

pub struct TriggerClock {
    pending: Arc<PendingSet>,
    handler: Arc<dyn DueHandler>,
    clock: Arc<dyn Clock>,
    tolerance: Duration,
    tracker: TaskTracker,
}

impl TriggerClock {
    pub fn new(
        pending: Arc<PendingSet>,
        handler: Arc<dyn DueHandler>,
        clock: Arc<dyn Clock>,
        tolerance: Duration,
    ) -> Self {
        Self {
            pending,
            handler,
            clock,
            tolerance,
            tracker: TaskTracker::new(),
        }
    }

    /// Claim every due entry and hand each to the handler on its own task.
    ///
    /// Returns how many entries were claimed. Handler failures are logged
    /// per entry and never surface here.
    pub async fn tick(&self) -> usize {
        let now = self.clock.now();
        let fires = self.pending.claim_due(now, self.tolerance).await;
        let claimed = fires.len();

        for fire in fires {
            pillbox_prometheus::recording::record_fire(fire.late);
            if fire.late {
                warn!(
                    medication_id = %fire.entry.medication_id,
                    slot = %fire.entry.time_slot,
                    fire_instant = %fire.entry.fire_instant,
                    "reminder fired late"
                );
            } else {
                debug!(
                    medication_id = %fire.entry.medication_id,
                    slot = %fire.entry.time_slot,
                    "reminder due"
                );
            }

            let handler = Arc::clone(&self.handler);
            self.tracker.spawn(async move {
                let medication_id = fire.entry.medication_id.clone();
                let slot = fire.entry.time_slot;
                if let Err(e) = handler.handle_due(fire).await {
                    error!(
                        medication_id = %medication_id,
                        slot = %slot,
                        error = %e,
                        "reminder dispatch failed"
                    );
                }
            });
        }

        pillbox_prometheus::recording::set_pending_entries(self.pending.len().await);
        claimed
    }

    /// Wait for every dispatch spawned so far.
    pub async fn flush(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
    use pillbox_core::{DueFire, ManualClock, PillboxError, ScheduledFireEntry, TimeSlot};
    use tokio::sync::Mutex;
    use tracing_test::traced_test;

    #[derive(Default)]
    struct Recorder {
        fires: Mutex<Vec<DueFire>>,
        fail_for: Option<String>,
    }

    #[async_trait]
    impl DueHandler for Recorder {
        async fn handle_due(&self, fire: DueFire) -> Result<(), PillboxError> {
            if self.fail_for.as_deref() == Some(fire.entry.medication_id.as_str()) {
                return Err(PillboxError::Internal("registry offline".into()));
            }
            self.fires.lock().await.push(fire);
            Ok(())
        }
    }

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, h, m, s).unwrap()
    }

    fn entry(med: &str, hour: u32) -> ScheduledFireEntry {
        ScheduledFireEntry {
            medication_id: med.into(),
            user_id: "user-1".into(),
            time_slot: TimeSlot::Morning,
            slot_time: NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
            fire_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            fire_instant: at(hour, 0, 0),
            end_date: NaiveDate::from_ymd_opt(2026, 3, 8).unwrap(),
            utc_offset_minutes: 0,
        }
    }

    async fn setup(
        recorder: Arc<Recorder>,
        entries: Vec<ScheduledFireEntry>,
        start: DateTime<Utc>,
    ) -> (TriggerClock, Arc<ManualClock>) {
        let pending = Arc::new(PendingSet::new());
        pending.replace_all(entries).await;
        let clock = Arc::new(ManualClock::new(start));
        let trigger = TriggerClock::new(pending, recorder, clock.clone(), Duration::seconds(60));
        (trigger, clock)
    }

    #[tokio::test]
    async fn ticks_around_instant_dispatch_once() {
        let recorder = Arc::new(Recorder::default());
        let (trigger, clock) = setup(recorder.clone(), vec![entry("m", 8)], at(7, 59, 30)).await;

        let mut claimed = 0;
        for _ in 0..4 {
            claimed += trigger.tick().await;
            clock.advance(Duration::seconds(30));
        }
        trigger.flush().await;

        assert_eq!(claimed, 1);
        let fires = recorder.fires.lock().await;
        assert_eq!(fires.len(), 1);
        assert!(!fires[0].late);
    }

    #[traced_test]
    #[tokio::test]
    async fn handler_error_does_not_block_other_entries() {
        let recorder = Arc::new(Recorder {
            fail_for: Some("broken".into()),
            ..Recorder::default()
        });
        let (trigger, _clock) = setup(
            recorder.clone(),
            vec![entry("broken", 8), entry("ok", 8)],
            at(8, 0, 0),
        )
        .await;

        assert_eq!(trigger.tick().await, 2);
        trigger.flush().await;

        let fires = recorder.fires.lock().await;
        assert_eq!(fires.len(), 1);
        assert_eq!(fires[0].entry.medication_id, "ok");
        assert!(logs_contain("reminder dispatch failed"));
    }

    #[tokio::test]
    async fn late_tick_flags_fire_late() {
        let recorder = Arc::new(Recorder::default());
        let (trigger, _clock) = setup(recorder.clone(), vec![entry("m", 8)], at(8, 6, 0)).await;
        trigger.tick().await;
        trigger.flush().await;
        assert!(recorder.fires.lock().await[0].late);
    }

    #[tokio::test]
    async fn flush_allows_further_ticks() {
        let recorder = Arc::new(Recorder::default());
        let (trigger, clock) =
            setup(recorder.clone(), vec![entry("a", 8), entry("b", 9)], at(8, 0, 0)).await;
        trigger.tick().await;
        trigger.flush().await;
        clock.set(at(9, 0, 0));
        trigger.tick().await;
        trigger.flush().await;
        assert_eq!(recorder.fires.lock().await.len(), 2);
        assert_eq!(trigger.in_flight(), 0);
    }
}
