// SPDX-FileCopyrightText: 2026 Pillbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Notification persistence: insert with dedup, history, status transitions
//! and expiry.

use chrono::{DateTime, Utc};
use pillbox_core::{AttemptTransition, DeliveryMethod, Notification, PillboxError};
use rusqlite::{OptionalExtension, params};

use crate::database::Database;
use crate::models::{
    NOTIFICATION_COLUMNS, format_date, format_ts, json_err, notification_from_row,
};

/// Insert a notification. Returns `false` if the dedup key already exists.
pub async fn insert_notification(
    db: &Database,
    notification: &Notification,
) -> Result<bool, PillboxError> {
    let n = notification.clone();
    db.connection()
        .call(move |conn| {
            let attempts = serde_json::to_string(&n.delivery_methods).map_err(json_err)?;
            let changed = conn.execute(
                "INSERT INTO notifications (id, user_id, medication_id, kind, title, message,
                     time_slot, scheduled_time, fire_date, status, priority, delivery_methods,
                     read_at, created_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
                 ON CONFLICT (medication_id, time_slot, fire_date, kind) DO NOTHING",
                params![
                    n.id,
                    n.user_id,
                    n.medication_id,
                    n.kind.to_string(),
                    n.title,
                    n.message,
                    n.time_slot.map(|s| s.to_string()),
                    n.scheduled_time,
                    n.fire_date.as_ref().map(format_date),
                    n.status.to_string(),
                    n.priority.to_string(),
                    attempts,
                    n.read_at.as_ref().map(format_ts),
                    format_ts(&n.created_at),
                    format_ts(&n.expires_at),
                ],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

fn select_by_id(
    conn: &rusqlite::Connection,
    id: &str,
) -> rusqlite::Result<Option<Notification>> {
    conn.query_row(
        &format!("SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = ?1"),
        params![id],
        notification_from_row,
    )
    .optional()
}

pub async fn get_notification(
    db: &Database,
    id: &str,
) -> Result<Option<Notification>, PillboxError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| select_by_id(conn, &id))
        .await
        .map_err(crate::database::map_tr_err)
}

/// Unexpired notifications for a user, newest first.
pub async fn list_history(
    db: &Database,
    user_id: &str,
    limit: u32,
    offset: u32,
    now: DateTime<Utc>,
) -> Result<Vec<Notification>, PillboxError> {
    let user_id = user_id.to_string();
    let now = format_ts(&now);
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {NOTIFICATION_COLUMNS} FROM notifications
                 WHERE user_id = ?1 AND expires_at > ?2
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?3 OFFSET ?4"
            ))?;
            let rows = stmt
                .query_map(params![user_id, now, limit, offset], notification_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Unexpired, unread notifications that reached the user (`sent` or `delivered`).
pub async fn list_unread(
    db: &Database,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<Vec<Notification>, PillboxError> {
    let user_id = user_id.to_string();
    let now = format_ts(&now);
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {NOTIFICATION_COLUMNS} FROM notifications
                 WHERE user_id = ?1 AND expires_at > ?2 AND read_at IS NULL
                   AND status IN ('sent', 'delivered')
                 ORDER BY created_at DESC, id DESC"
            ))?;
            let rows = stmt
                .query_map(params![user_id, now], notification_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Read-modify-write of one attempt inside a transaction.
///
/// The aggregate status is re-derived in the same write, so readers never
/// see an attempt change without its status.
pub async fn apply_attempt_transition(
    db: &Database,
    id: &str,
    method: DeliveryMethod,
    transition: AttemptTransition,
    at: DateTime<Utc>,
) -> Result<Option<Notification>, PillboxError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let Some(mut n) = select_by_id(&tx, &id)? else {
                return Ok(None);
            };
            if n.apply_attempt_transition(method, &transition, at) {
                let attempts = serde_json::to_string(&n.delivery_methods).map_err(json_err)?;
                tx.execute(
                    "UPDATE notifications SET status = ?2, delivery_methods = ?3 WHERE id = ?1",
                    params![n.id, n.status.to_string(), attempts],
                )?;
            }
            tx.commit()?;
            Ok(Some(n))
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Set `read_at` on first call. Later calls return the stored record untouched.
pub async fn mark_read(
    db: &Database,
    id: &str,
    at: DateTime<Utc>,
) -> Result<Option<Notification>, PillboxError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let Some(mut n) = select_by_id(&tx, &id)? else {
                return Ok(None);
            };
            if n.mark_read(at) {
                tx.execute(
                    "UPDATE notifications SET status = 'read', read_at = ?2
                     WHERE id = ?1 AND read_at IS NULL",
                    params![n.id, format_ts(&at)],
                )?;
            }
            tx.commit()?;
            Ok(Some(n))
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Mark every unexpired unread notification of a user. Returns the count.
pub async fn mark_all_read(
    db: &Database,
    user_id: &str,
    at: DateTime<Utc>,
) -> Result<u64, PillboxError> {
    let user_id = user_id.to_string();
    let at = format_ts(&at);
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE notifications SET status = 'read', read_at = ?2
                 WHERE user_id = ?1 AND read_at IS NULL AND expires_at > ?2",
                params![user_id, at],
            )?;
            Ok(changed as u64)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

pub async fn delete_notification(db: &Database, id: &str) -> Result<bool, PillboxError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute("DELETE FROM notifications WHERE id = ?1", params![id])?;
            Ok(changed > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Delete every notification with `expires_at <= now`, whatever its status.
pub async fn delete_expired(db: &Database, now: DateTime<Utc>) -> Result<u64, PillboxError> {
    let now = format_ts(&now);
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "DELETE FROM notifications WHERE expires_at <= ?1",
                params![now],
            )?;
            Ok(changed as u64)
        })
        .await
        .map_err(crate::database::map_tr_err)
}
