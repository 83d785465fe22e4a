// SPDX-FileCopyrightText: 2026 Pillbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Schedule compiler: turns medication schedules into the next concrete
//! fire instant per configured slot.
//!
//! Compilation is pure. It reads `now` and the schedules it is given and
//! never touches the registry, so the same input always yields the same
//! entries.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use tracing::warn;

use pillbox_core::types::{
    MedicationSchedule, ScheduledFireEntry, TimeSlot, local_date, local_instant,
};
use pillbox_core::PillboxError;

/// Knobs applied to every schedule in one compile pass.
#[derive(Debug, Clone, Copy)]
pub struct CompileOptions {
    /// How far in the past today's instant may be and still count as today.
    /// Matches the trigger clock's tolerance so a just-passed slot is not
    /// skipped to tomorrow before the next tick can claim it.
    pub grace: Duration,
    /// Offset used when a schedule does not carry its own.
    pub default_utc_offset_minutes: i32,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            grace: Duration::seconds(60),
            default_utc_offset_minutes: 0,
        }
    }
}

/// A slot left out of compilation because its value could not be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedSlot {
    pub medication_id: String,
    pub time_slot: TimeSlot,
    pub value: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileOutput {
    pub entries: Vec<ScheduledFireEntry>,
    pub skipped: Vec<SkippedSlot>,
}

/// Parse a strict 24-hour `"HH:MM"` slot value.
pub fn parse_slot_time(raw: &str) -> Result<NaiveTime, PillboxError> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map_err(|e| PillboxError::InvalidInput(format!("`{raw}` is not HH:MM: {e}")))
}

/// Compile every schedule. A malformed slot only drops that slot.
pub fn compile(
    schedules: &[MedicationSchedule],
    now: DateTime<Utc>,
    options: CompileOptions,
) -> CompileOutput {
    let mut out = CompileOutput::default();
    for schedule in schedules {
        compile_into(schedule, now, options, &mut out);
    }
    out
}

/// Compile a single schedule.
pub fn compile_schedule(
    schedule: &MedicationSchedule,
    now: DateTime<Utc>,
    options: CompileOptions,
) -> CompileOutput {
    let mut out = CompileOutput::default();
    compile_into(schedule, now, options, &mut out);
    out
}

fn compile_into(
    schedule: &MedicationSchedule,
    now: DateTime<Utc>,
    options: CompileOptions,
    out: &mut CompileOutput,
) {
    if !schedule.is_schedulable() {
        return;
    }
    let offset = schedule
        .utc_offset_minutes
        .unwrap_or(options.default_utc_offset_minutes);
    let today = local_date(now, offset);
    let Some(tomorrow) = today.succ_opt() else {
        return;
    };
    if !schedule.covers(today) && !schedule.covers(tomorrow) {
        return;
    }

    for (slot, raw) in schedule.time_slots.configured() {
        let slot_time = match parse_slot_time(raw) {
            Ok(t) => t,
            Err(e) => {
                warn!(
                    medication_id = %schedule.medication_id,
                    slot = %slot,
                    value = raw,
                    error = %e,
                    "skipping malformed reminder slot"
                );
                out.skipped.push(SkippedSlot {
                    medication_id: schedule.medication_id.clone(),
                    time_slot: slot,
                    value: raw.to_string(),
                    reason: e.to_string(),
                });
                continue;
            }
        };

        match next_fire(schedule, slot, slot_time, today, offset, now, options.grace) {
            Some(entry) => out.entries.push(entry),
            None => {
                if local_instant(today, slot_time, offset).is_none() {
                    warn!(
                        medication_id = %schedule.medication_id,
                        utc_offset_minutes = offset,
                        "skipping schedule with out-of-range UTC offset"
                    );
                }
            }
        }
    }
}

/// The first of today and tomorrow that lies inside the schedule's range and
/// whose instant is not older than `now - grace`.
fn next_fire(
    schedule: &MedicationSchedule,
    slot: TimeSlot,
    slot_time: NaiveTime,
    today: NaiveDate,
    offset: i32,
    now: DateTime<Utc>,
    grace: Duration,
) -> Option<ScheduledFireEntry> {
    let (fire_date, fire_instant) = [Some(today), today.succ_opt()]
        .into_iter()
        .flatten()
        .filter(|date| schedule.covers(*date))
        .filter_map(|date| Some((date, local_instant(date, slot_time, offset)?)))
        .find(|(_, instant)| *instant >= now - grace)?;
    Some(ScheduledFireEntry {
        medication_id: schedule.medication_id.clone(),
        user_id: schedule.user_id.clone(),
        time_slot: slot,
        slot_time,
        fire_date,
        fire_instant,
        end_date: schedule.end_date,
        utc_offset_minutes: offset,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pillbox_core::TimeSlots;
    use tracing_test::traced_test;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, h, m, s).unwrap()
    }

    fn schedule(morning: &str, evening: &str) -> MedicationSchedule {
        MedicationSchedule {
            medication_id: "med-m".into(),
            user_id: "user-1".into(),
            name: "Metformin".into(),
            dosage: Some("500mg".into()),
            time_slots: TimeSlots {
                morning: Some(morning.into()),
                afternoon: None,
                evening: Some(evening.into()),
            },
            start_date: date(2026, 3, 1),
            end_date: date(2026, 3, 8),
            reminder_enabled: true,
            is_active: true,
            utc_offset_minutes: None,
        }
    }

    #[test]
    fn future_slots_fire_today() {
        let out = compile(&[schedule("08:00", "20:00")], at(7, 0, 0), CompileOptions::default());
        assert!(out.skipped.is_empty());
        assert_eq!(out.entries.len(), 2);
        assert_eq!(out.entries[0].time_slot, TimeSlot::Morning);
        assert_eq!(out.entries[0].fire_instant, at(8, 0, 0));
        assert_eq!(out.entries[1].fire_instant, at(20, 0, 0));
    }

    #[test]
    fn passed_slot_rolls_to_tomorrow() {
        let out = compile(&[schedule("08:00", "20:00")], at(9, 0, 0), CompileOptions::default());
        let morning = &out.entries[0];
        assert_eq!(morning.fire_date, date(2026, 3, 2));
        assert_eq!(
            morning.fire_instant,
            Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap()
        );
        assert_eq!(out.entries[1].fire_date, date(2026, 3, 1));
    }

    #[test]
    fn slot_inside_grace_stays_today() {
        let out = compile(&[schedule("08:00", "20:00")], at(8, 0, 45), CompileOptions::default());
        assert_eq!(out.entries[0].fire_date, date(2026, 3, 1));
    }

    #[test]
    fn no_entry_after_last_day() {
        let mut s = schedule("08:00", "20:00");
        s.end_date = date(2026, 3, 1);
        let out = compile(&[s], at(21, 0, 0), CompileOptions::default());
        assert!(out.entries.is_empty());
    }

    #[test]
    fn ineligible_schedules_produce_nothing() {
        let mut disabled = schedule("08:00", "20:00");
        disabled.reminder_enabled = false;
        let mut inactive = schedule("08:00", "20:00");
        inactive.is_active = false;
        let mut future = schedule("08:00", "20:00");
        future.start_date = date(2026, 3, 3);
        let out = compile(&[disabled, inactive, future], at(7, 0, 0), CompileOptions::default());
        assert!(out.entries.is_empty());
    }

    #[test]
    fn schedule_starting_tomorrow_fires_just_after_midnight() {
        let mut s = schedule("00:01", "20:00");
        s.start_date = date(2026, 3, 2);
        let out = compile(&[s], at(23, 58, 0), CompileOptions::default());
        assert_eq!(out.entries.len(), 2);
        assert_eq!(out.entries[0].fire_date, date(2026, 3, 2));
        assert_eq!(
            out.entries[0].fire_instant,
            Utc.with_ymd_and_hms(2026, 3, 2, 0, 1, 0).unwrap()
        );
        assert_eq!(out.entries[1].fire_date, date(2026, 3, 2));
    }

    #[test]
    fn schedule_starting_tomorrow_skips_todays_slots() {
        // 20:00 today is before the range; tomorrow's 20:00 is the first fire.
        let mut s = schedule("08:00", "20:00");
        s.start_date = date(2026, 3, 2);
        let out = compile(&[s], at(7, 0, 0), CompileOptions::default());
        assert!(out.entries.iter().all(|e| e.fire_date == date(2026, 3, 2)));
        assert_eq!(out.entries.len(), 2);
    }

    #[traced_test]
    #[test]
    fn malformed_slot_is_skipped_without_aborting() {
        let mut bad = schedule("8am", "20:00");
        bad.medication_id = "med-bad".into();
        let good = schedule("08:00", "20:00");
        let out = compile(&[bad, good], at(7, 0, 0), CompileOptions::default());

        assert_eq!(out.skipped.len(), 1);
        assert_eq!(out.skipped[0].medication_id, "med-bad");
        assert_eq!(out.skipped[0].time_slot, TimeSlot::Morning);
        assert_eq!(out.entries.len(), 3);
        assert!(logs_contain("skipping malformed reminder slot"));
    }

    #[test]
    fn rejects_out_of_range_times() {
        assert!(parse_slot_time("24:00").is_err());
        assert!(parse_slot_time("12:60").is_err());
        assert_eq!(
            parse_slot_time(" 07:05 ").unwrap(),
            NaiveTime::from_hms_opt(7, 5, 0).unwrap()
        );
    }

    #[test]
    fn local_offset_shifts_today_and_instant() {
        // 23:30 UTC on Mar 1 is already Mar 2 at UTC+1.
        let mut s = schedule("08:00", "20:00");
        s.utc_offset_minutes = Some(60);
        s.start_date = date(2026, 3, 2);
        let out = compile(&[s], at(23, 30, 0), CompileOptions::default());
        assert_eq!(out.entries.len(), 2);
        assert_eq!(out.entries[0].fire_date, date(2026, 3, 2));
        assert_eq!(
            out.entries[0].fire_instant,
            Utc.with_ymd_and_hms(2026, 3, 2, 7, 0, 0).unwrap()
        );
    }

    #[test]
    fn default_offset_applies_when_schedule_has_none() {
        let options = CompileOptions {
            default_utc_offset_minutes: -300,
            ..CompileOptions::default()
        };
        let out = compile(&[schedule("08:00", "20:00")], at(12, 0, 0), options);
        assert_eq!(out.entries[0].fire_instant, at(13, 0, 0));
        assert_eq!(out.entries[0].utc_offset_minutes, -300);
    }
}
