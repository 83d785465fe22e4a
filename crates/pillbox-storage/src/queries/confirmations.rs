// SPDX-FileCopyrightText: 2026 Pillbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! "Medication taken" confirmations.

use pillbox_core::{Confirmation, PillboxError};
use rusqlite::params;

use crate::database::Database;
use crate::models::{format_date, format_ts};

/// Record a confirmation. Returns `false` when the slot was already confirmed.
pub async fn record_confirmation(
    db: &Database,
    confirmation: &Confirmation,
) -> Result<bool, PillboxError> {
    let c = confirmation.clone();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "INSERT INTO confirmations (id, user_id, medication_id, time_slot, fire_date,
                     notification_id, confirmed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT (medication_id, time_slot, fire_date) DO NOTHING",
                params![
                    c.id,
                    c.user_id,
                    c.medication_id,
                    c.time_slot.to_string(),
                    format_date(&c.fire_date),
                    c.notification_id,
                    format_ts(&c.confirmed_at),
                ],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};
    use pillbox_core::TimeSlot;
    use tempfile::tempdir;

    #[tokio::test]
    async fn second_confirmation_for_slot_is_ignored() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("c.db").to_str().unwrap(), true)
            .await
            .unwrap();
        let confirmation = Confirmation {
            id: "c1".into(),
            user_id: "user-1".into(),
            medication_id: "med-1".into(),
            time_slot: TimeSlot::Morning,
            fire_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            notification_id: None,
            confirmed_at: Utc.with_ymd_and_hms(2026, 3, 1, 8, 5, 0).unwrap(),
        };
        assert!(record_confirmation(&db, &confirmation).await.unwrap());
        let again = Confirmation {
            id: "c2".into(),
            ..confirmation.clone()
        };
        assert!(!record_confirmation(&db, &again).await.unwrap());

        let evening = Confirmation {
            id: "c3".into(),
            time_slot: TimeSlot::Evening,
            ..confirmation
        };
        assert!(record_confirmation(&db, &evening).await.unwrap());
    }
}
