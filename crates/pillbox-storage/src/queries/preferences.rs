// SPDX-FileCopyrightText: 2026 Pillbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-user channel opt-ins and per-medication reminder toggles.

use chrono::{DateTime, Utc};
use pillbox_core::{ChannelPreferences, DeliveryMethod, PillboxError};
use rusqlite::{OptionalExtension, params};

use crate::database::Database;
use crate::models::{format_ts, json_err, parse_enum};

fn load(conn: &rusqlite::Connection, user_id: &str) -> rusqlite::Result<ChannelPreferences> {
    let channels_json: Option<String> = conn
        .query_row(
            "SELECT channels FROM channel_preferences WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )
        .optional()?;
    let names: Vec<String> = match channels_json {
        Some(raw) => serde_json::from_str(&raw).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })?,
        None => Vec::new(),
    };
    let channels = names
        .iter()
        .map(|name| parse_enum::<DeliveryMethod>(0, name))
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut stmt = conn.prepare(
        "SELECT medication_id FROM medication_preferences
         WHERE user_id = ?1 AND enabled = 0 ORDER BY medication_id",
    )?;
    let muted_medications = stmt
        .query_map(params![user_id], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ChannelPreferences {
        user_id: user_id.to_string(),
        channels,
        muted_medications,
    })
}

pub async fn get_preferences(
    db: &Database,
    user_id: &str,
) -> Result<ChannelPreferences, PillboxError> {
    let user_id = user_id.to_string();
    db.connection()
        .call(move |conn| load(conn, &user_id))
        .await
        .map_err(crate::database::map_tr_err)
}

/// Replace the opt-in channel list. Duplicates are collapsed, order kept.
pub async fn set_channels(
    db: &Database,
    user_id: &str,
    channels: &[DeliveryMethod],
    at: DateTime<Utc>,
) -> Result<ChannelPreferences, PillboxError> {
    let user_id = user_id.to_string();
    let mut names: Vec<String> = Vec::new();
    for method in channels {
        let name = method.to_string();
        if !names.contains(&name) {
            names.push(name);
        }
    }
    let at = format_ts(&at);
    db.connection()
        .call(move |conn| {
            let json = serde_json::to_string(&names).map_err(json_err)?;
            conn.execute(
                "INSERT INTO channel_preferences (user_id, channels, updated_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT (user_id) DO UPDATE SET
                     channels = excluded.channels,
                     updated_at = excluded.updated_at",
                params![user_id, json, at],
            )?;
            load(conn, &user_id)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn set_medication_enabled(
    db: &Database,
    user_id: &str,
    medication_id: &str,
    enabled: bool,
    at: DateTime<Utc>,
) -> Result<ChannelPreferences, PillboxError> {
    let user_id = user_id.to_string();
    let medication_id = medication_id.to_string();
    let at = format_ts(&at);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO medication_preferences (user_id, medication_id, enabled, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (user_id, medication_id) DO UPDATE SET
                     enabled = excluded.enabled,
                     updated_at = excluded.updated_at",
                params![user_id, medication_id, enabled, at],
            )?;
            load(conn, &user_id)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap(), true).await.unwrap();
        (db, dir)
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn defaults_when_nothing_stored() {
        let (db, _dir) = setup_db().await;
        let prefs = get_preferences(&db, "user-1").await.unwrap();
        assert_eq!(prefs.user_id, "user-1");
        assert!(prefs.channels.is_empty());
        assert!(prefs.muted_medications.is_empty());
    }

    #[tokio::test]
    async fn channels_are_replaced_not_merged() {
        let (db, _dir) = setup_db().await;
        set_channels(
            &db,
            "user-1",
            &[DeliveryMethod::Email, DeliveryMethod::Sms, DeliveryMethod::Email],
            now(),
        )
        .await
        .unwrap();
        let prefs = set_channels(&db, "user-1", &[DeliveryMethod::Webhook], now())
            .await
            .unwrap();
        assert_eq!(prefs.channels, vec![DeliveryMethod::Webhook]);
    }

    #[tokio::test]
    async fn medication_toggle_round_trips() {
        let (db, _dir) = setup_db().await;
        let prefs = set_medication_enabled(&db, "user-1", "med-1", false, now())
            .await
            .unwrap();
        assert!(prefs.is_muted("med-1"));
        let prefs = set_medication_enabled(&db, "user-1", "med-1", true, now())
            .await
            .unwrap();
        assert!(!prefs.is_muted("med-1"));
    }
}
