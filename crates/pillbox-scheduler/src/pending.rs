// SPDX-FileCopyrightText: 2026 Pillbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The pending set: compiled fire entries waiting for their instant.
//!
//! A single `tokio::sync::Mutex` guards the map, so replacing a medication's
//! entries and claiming due entries can never interleave.

use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tokio::sync::Mutex;

use pillbox_core::types::{DueFire, ScheduledFireEntry, SlotKey};

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<SlotKey, ScheduledFireEntry>,
    /// Latest fire date claimed per slot. A recompile never re-adds a day
    /// at or before it.
    claimed: HashMap<SlotKey, NaiveDate>,
}

impl Inner {
    fn insert_compiled(&mut self, entry: ScheduledFireEntry) {
        let key = entry.key();
        let mut candidate = Some(entry);
        if let Some(last) = self.claimed.get(&key) {
            while let Some(e) = candidate.as_ref() {
                if e.fire_date > *last {
                    break;
                }
                candidate = e.next_day();
            }
        }
        if let Some(e) = candidate {
            self.entries.insert(key, e);
        }
    }
}

/// One pending entry per `(medication, slot)`.
#[derive(Debug, Default)]
pub struct PendingSet {
    inner: Mutex<Inner>,
}

impl PendingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole set with a fresh compile.
    pub async fn replace_all(&self, entries: Vec<ScheduledFireEntry>) -> usize {
        let mut inner = self.inner.lock().await;
        inner.entries.clear();
        let keys: Vec<SlotKey> = entries.iter().map(ScheduledFireEntry::key).collect();
        inner.claimed.retain(|k, _| keys.contains(k));
        for entry in entries {
            inner.insert_compiled(entry);
        }
        inner.entries.len()
    }

    /// Drop every entry of one medication and insert its fresh compile.
    pub async fn replace_for_medication(
        &self,
        medication_id: &str,
        entries: Vec<ScheduledFireEntry>,
    ) -> usize {
        let mut inner = self.inner.lock().await;
        inner.entries.retain(|key, _| key.medication_id != medication_id);
        for entry in entries {
            debug_assert_eq!(entry.medication_id, medication_id);
            inner.insert_compiled(entry);
        }
        inner.entries.len()
    }

    /// Remove and return every entry due at `now`, with successors re-inserted.
    ///
    /// Due means `fire_instant <= now + tolerance`. A fire is late when
    /// `fire_instant < now - tolerance`. Each claimed entry is replaced by the
    /// same slot on the next day that has not already passed, unless the
    /// schedule's range has ended.
    pub async fn claim_due(&self, now: DateTime<Utc>, tolerance: Duration) -> Vec<DueFire> {
        let horizon = now + tolerance;
        let late_before = now - tolerance;

        let mut inner = self.inner.lock().await;
        let due_keys: Vec<SlotKey> = inner
            .entries
            .iter()
            .filter(|(_, e)| e.fire_instant <= horizon)
            .map(|(k, _)| k.clone())
            .collect();

        let mut fires = Vec::with_capacity(due_keys.len());
        for key in due_keys {
            let Some(entry) = inner.entries.remove(&key) else {
                continue;
            };
            inner.claimed.insert(key.clone(), entry.fire_date);

            let mut successor = entry.next_day();
            while let Some(next) = successor.as_ref() {
                if next.fire_instant >= late_before {
                    break;
                }
                successor = next.next_day();
            }
            if let Some(next) = successor {
                inner.entries.insert(key, next);
            }

            fires.push(DueFire {
                late: entry.fire_instant < late_before,
                entry,
                claimed_at: now,
            });
        }
        fires.sort_by(|a, b| a.entry.fire_instant.cmp(&b.entry.fire_instant));
        fires
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.entries.is_empty()
    }

    /// Entries in fire order.
    pub async fn snapshot(&self) -> Vec<ScheduledFireEntry> {
        let inner = self.inner.lock().await;
        let mut entries: Vec<_> = inner.entries.values().cloned().collect();
        entries.sort_by(|a, b| {
            a.fire_instant
                .cmp(&b.fire_instant)
                .then_with(|| a.medication_id.cmp(&b.medication_id))
        });
        entries
    }

    pub async fn get(&self, key: &SlotKey) -> Option<ScheduledFireEntry> {
        self.inner.lock().await.entries.get(key).cloned()
    }
}
