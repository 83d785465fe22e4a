// SPDX-FileCopyrightText: 2026 Pillbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Row encoding for the domain types in `pillbox-core`.
//!
//! Timestamps are stored as RFC 3339 UTC strings with millisecond precision
//! and a `Z` suffix so that string comparison in SQL is chronological.
//! Calendar days are `YYYY-MM-DD`; enums use their snake_case names.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::Row;
use rusqlite::types::Type;

use pillbox_core::types::{DeliveryAttempt, MedicationSchedule, Notification, TimeSlots};

/// Column list matching [`notification_from_row`].
pub(crate) const NOTIFICATION_COLUMNS: &str = "id, user_id, medication_id, kind, title, message, \
     time_slot, scheduled_time, fire_date, status, priority, delivery_methods, read_at, \
     created_at, expires_at";

/// Column list matching [`schedule_from_row`].
pub(crate) const MEDICATION_COLUMNS: &str = "medication_id, user_id, name, dosage, morning, \
     afternoon, evening, start_date, end_date, reminder_enabled, is_active, utc_offset_minutes";

pub fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn format_date(date: &NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn conversion_err(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

/// Wrap a serialization failure so it can leave a `call` closure.
pub(crate) fn json_err(err: serde_json::Error) -> rusqlite::Error {
    rusqlite::Error::ToSqlConversionFailure(Box::new(err))
}

pub(crate) fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_err(idx, e))
}

pub(crate) fn parse_date(idx: usize, raw: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| conversion_err(idx, e))
}

pub(crate) fn parse_enum<T>(idx: usize, raw: &str) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    T::from_str(raw).map_err(|e| conversion_err(idx, e))
}

fn opt<T>(
    idx: usize,
    raw: Option<String>,
    parse: impl Fn(usize, &str) -> rusqlite::Result<T>,
) -> rusqlite::Result<Option<T>> {
    raw.map(|s| parse(idx, &s)).transpose()
}

pub(crate) fn notification_from_row(row: &Row<'_>) -> rusqlite::Result<Notification> {
    let attempts_json: String = row.get(11)?;
    let delivery_methods: Vec<DeliveryAttempt> =
        serde_json::from_str(&attempts_json).map_err(|e| conversion_err(11, e))?;
    Ok(Notification {
        id: row.get(0)?,
        user_id: row.get(1)?,
        medication_id: row.get(2)?,
        kind: parse_enum(3, &row.get::<_, String>(3)?)?,
        title: row.get(4)?,
        message: row.get(5)?,
        time_slot: opt(6, row.get(6)?, parse_enum)?,
        scheduled_time: row.get(7)?,
        fire_date: opt(8, row.get(8)?, parse_date)?,
        status: parse_enum(9, &row.get::<_, String>(9)?)?,
        priority: parse_enum(10, &row.get::<_, String>(10)?)?,
        delivery_methods,
        read_at: opt(12, row.get(12)?, parse_ts)?,
        created_at: parse_ts(13, &row.get::<_, String>(13)?)?,
        expires_at: parse_ts(14, &row.get::<_, String>(14)?)?,
    })
}

pub(crate) fn schedule_from_row(row: &Row<'_>) -> rusqlite::Result<MedicationSchedule> {
    Ok(MedicationSchedule {
        medication_id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        dosage: row.get(3)?,
        time_slots: TimeSlots {
            morning: row.get(4)?,
            afternoon: row.get(5)?,
            evening: row.get(6)?,
        },
        start_date: parse_date(7, &row.get::<_, String>(7)?)?,
        end_date: parse_date(8, &row.get::<_, String>(8)?)?,
        reminder_enabled: row.get(9)?,
        is_active: row.get(10)?,
        utc_offset_minutes: row.get(11)?,
    })
}
