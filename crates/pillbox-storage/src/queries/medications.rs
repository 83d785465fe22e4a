// SPDX-FileCopyrightText: 2026 Pillbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Registry read model: medication schedules and recipient contact details.
//!
//! The wider application owns these records. Writes here exist so a
//! deployment (or a test) can mirror them into the engine's database.

use chrono::{DateTime, Utc};
use pillbox_core::{MedicationSchedule, PillboxError, Recipient};
use rusqlite::{OptionalExtension, params};

use crate::database::Database;
use crate::models::{MEDICATION_COLUMNS, format_date, format_ts, schedule_from_row};

/// Insert or replace a medication schedule.
pub async fn upsert_medication(
    db: &Database,
    schedule: &MedicationSchedule,
    updated_at: DateTime<Utc>,
) -> Result<(), PillboxError> {
    let s = schedule.clone();
    let updated_at = format_ts(&updated_at);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO medications (medication_id, user_id, name, dosage, morning,
                     afternoon, evening, start_date, end_date, reminder_enabled, is_active,
                     utc_offset_minutes, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                 ON CONFLICT (medication_id) DO UPDATE SET
                     user_id = excluded.user_id,
                     name = excluded.name,
                     dosage = excluded.dosage,
                     morning = excluded.morning,
                     afternoon = excluded.afternoon,
                     evening = excluded.evening,
                     start_date = excluded.start_date,
                     end_date = excluded.end_date,
                     reminder_enabled = excluded.reminder_enabled,
                     is_active = excluded.is_active,
                     utc_offset_minutes = excluded.utc_offset_minutes,
                     updated_at = excluded.updated_at",
                params![
                    s.medication_id,
                    s.user_id,
                    s.name,
                    s.dosage,
                    s.time_slots.morning,
                    s.time_slots.afternoon,
                    s.time_slots.evening,
                    format_date(&s.start_date),
                    format_date(&s.end_date),
                    s.reminder_enabled,
                    s.is_active,
                    s.utc_offset_minutes,
                    updated_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn get_medication(
    db: &Database,
    medication_id: &str,
) -> Result<Option<MedicationSchedule>, PillboxError> {
    let medication_id = medication_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {MEDICATION_COLUMNS} FROM medications WHERE medication_id = ?1"),
                params![medication_id],
                schedule_from_row,
            )
            .optional()
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Schedules with `is_active` set, ordered by id for stable compilation.
pub async fn list_active_medications(
    db: &Database,
) -> Result<Vec<MedicationSchedule>, PillboxError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MEDICATION_COLUMNS} FROM medications
                 WHERE is_active = 1 ORDER BY medication_id"
            ))?;
            let rows = stmt
                .query_map([], schedule_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn delete_medication(db: &Database, medication_id: &str) -> Result<bool, PillboxError> {
    let medication_id = medication_id.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "DELETE FROM medications WHERE medication_id = ?1",
                params![medication_id],
            )?;
            Ok(changed > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn upsert_recipient(db: &Database, recipient: &Recipient) -> Result<(), PillboxError> {
    let r = recipient.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO recipients (user_id, email, phone, webhook_url)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (user_id) DO UPDATE SET
                     email = excluded.email,
                     phone = excluded.phone,
                     webhook_url = excluded.webhook_url",
                params![r.user_id, r.email, r.phone, r.webhook_url],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Contact details for a user; an empty profile when none is stored.
pub async fn get_recipient(db: &Database, user_id: &str) -> Result<Recipient, PillboxError> {
    let user_id = user_id.to_string();
    db.connection()
        .call(move |conn| {
            let found = conn
                .query_row(
                    "SELECT email, phone, webhook_url FROM recipients WHERE user_id = ?1",
                    params![user_id],
                    |row| {
                        Ok(Recipient {
                            user_id: user_id.clone(),
                            email: row.get(0)?,
                            phone: row.get(1)?,
                            webhook_url: row.get(2)?,
                        })
                    },
                )
                .optional()?;
            Ok(found.unwrap_or(Recipient {
                user_id,
                ..Recipient::default()
            }))
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use pillbox_core::TimeSlots;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap(), true).await.unwrap();
        (db, dir)
    }

    fn schedule(id: &str, active: bool) -> MedicationSchedule {
        MedicationSchedule {
            medication_id: id.to_string(),
            user_id: "user-1".to_string(),
            name: "Aspirin".to_string(),
            dosage: Some("100mg".to_string()),
            time_slots: TimeSlots {
                morning: Some("08:00".to_string()),
                afternoon: None,
                evening: Some("20:00".to_string()),
            },
            start_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2026, 3, 8).unwrap(),
            reminder_enabled: true,
            is_active: active,
            utc_offset_minutes: Some(-300),
        }
    }

    #[tokio::test]
    async fn upsert_replaces_and_lists_only_active() {
        let (db, _dir) = setup_db().await;
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        upsert_medication(&db, &schedule("m1", true), now).await.unwrap();
        upsert_medication(&db, &schedule("m2", false), now).await.unwrap();

        let mut edited = schedule("m1", true);
        edited.reminder_enabled = false;
        upsert_medication(&db, &edited, now).await.unwrap();

        let active = list_active_medications(&db).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0], edited);
        assert_eq!(get_medication(&db, "m2").await.unwrap(), Some(schedule("m2", false)));

        assert!(delete_medication(&db, "m1").await.unwrap());
        assert!(get_medication(&db, "m1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unknown_recipient_is_empty_profile() {
        let (db, _dir) = setup_db().await;
        let r = get_recipient(&db, "nobody").await.unwrap();
        assert_eq!(r.user_id, "nobody");
        assert!(r.email.is_none());

        let stored = Recipient {
            user_id: "user-1".into(),
            email: Some("a@example.com".into()),
            phone: Some("+15551234567".into()),
            webhook_url: None,
        };
        upsert_recipient(&db, &stored).await.unwrap();
        assert_eq!(get_recipient(&db, "user-1").await.unwrap(), stored);
    }
}
