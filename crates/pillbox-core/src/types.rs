// SPDX-FileCopyrightText: 2026 Pillbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the scheduler, delivery, storage and gateway crates.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter behind a trait object.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Channel,
    Storage,
    Registry,
    Observability,
}

// --- Schedule input ---

/// Named time-of-day reminder point within a medication's schedule.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TimeSlot {
    Morning,
    Afternoon,
    Evening,
}

impl TimeSlot {
    pub const ALL: [TimeSlot; 3] = [TimeSlot::Morning, TimeSlot::Afternoon, TimeSlot::Evening];
}

/// Configured `"HH:MM"` strings per slot, as the medication registry stores them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlots {
    #[serde(default)]
    pub morning: Option<String>,
    #[serde(default)]
    pub afternoon: Option<String>,
    #[serde(default)]
    pub evening: Option<String>,
}

impl TimeSlots {
    /// Raw configured value for a slot, if any.
    pub fn get(&self, slot: TimeSlot) -> Option<&str> {
        match slot {
            TimeSlot::Morning => self.morning.as_deref(),
            TimeSlot::Afternoon => self.afternoon.as_deref(),
            TimeSlot::Evening => self.evening.as_deref(),
        }
    }

    /// Non-empty configured slots in morning, afternoon, evening order.
    pub fn configured(&self) -> impl Iterator<Item = (TimeSlot, &str)> {
        TimeSlot::ALL.into_iter().filter_map(|slot| {
            self.get(slot)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| (slot, s))
        })
    }
}

/// A medication's reminder schedule, owned by the external medication registry.
///
/// Read-only here. The scheduler re-reads it on every compile cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicationSchedule {
    pub medication_id: String,
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub dosage: Option<String>,
    #[serde(default)]
    pub time_slots: TimeSlots,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reminder_enabled: bool,
    pub is_active: bool,
    /// Offset of the user's locale from UTC, in minutes. `None` uses the
    /// deployment default.
    #[serde(default)]
    pub utc_offset_minutes: Option<i32>,
}

impl MedicationSchedule {
    /// Whether reminders may be compiled for this schedule at all.
    pub fn is_schedulable(&self) -> bool {
        self.reminder_enabled && self.is_active
    }

    /// Whether `date` falls inside the inclusive active range.
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

/// Resolve a local calendar day and time-of-day to a UTC instant.
///
/// Returns `None` when the offset is out of range.
pub fn local_instant(date: NaiveDate, time: NaiveTime, utc_offset_minutes: i32) -> Option<DateTime<Utc>> {
    let offset = FixedOffset::east_opt(utc_offset_minutes.checked_mul(60)?)?;
    offset
        .from_local_datetime(&date.and_time(time))
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// The calendar day `instant` falls on in a locale `utc_offset_minutes` from UTC.
pub fn local_date(instant: DateTime<Utc>, utc_offset_minutes: i32) -> NaiveDate {
    match FixedOffset::east_opt(utc_offset_minutes.saturating_mul(60)) {
        Some(offset) => instant.with_timezone(&offset).date_naive(),
        None => instant.date_naive(),
    }
}

// --- Scheduler entries ---

/// Identity of a pending slot: one entry per `(medication, slot)` at a time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotKey {
    pub medication_id: String,
    pub time_slot: TimeSlot,
}

/// A compiled "next fire" for one slot. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledFireEntry {
    pub medication_id: String,
    pub user_id: String,
    pub time_slot: TimeSlot,
    pub slot_time: NaiveTime,
    pub fire_date: NaiveDate,
    pub fire_instant: DateTime<Utc>,
    pub end_date: NaiveDate,
    pub utc_offset_minutes: i32,
}

impl ScheduledFireEntry {
    pub fn key(&self) -> SlotKey {
        SlotKey {
            medication_id: self.medication_id.clone(),
            time_slot: self.time_slot,
        }
    }

    /// The slot's configured time as `"HH:MM"`.
    pub fn scheduled_time(&self) -> String {
        self.slot_time.format("%H:%M").to_string()
    }

    /// The same slot on the following calendar day, or `None` once the
    /// schedule's range has elapsed.
    pub fn next_day(&self) -> Option<Self> {
        let fire_date = self.fire_date.succ_opt()?;
        if fire_date > self.end_date {
            return None;
        }
        let fire_instant = local_instant(fire_date, self.slot_time, self.utc_offset_minutes)?;
        Some(Self {
            fire_date,
            fire_instant,
            ..self.clone()
        })
    }
}

/// A claimed entry handed from the trigger clock to the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueFire {
    pub entry: ScheduledFireEntry,
    /// The tick ran after the tolerance window had closed.
    pub late: bool,
    pub claimed_at: DateTime<Utc>,
}

// --- Notifications ---

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    MedicationReminder,
    MedicationMissed,
    MedicationTaken,
    GoalAchieved,
    General,
}

/// Aggregate notification status. `Read` is an override set by the ack handler.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    Pending,
    Sent,
    Delivered,
    Failed,
    Read,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

/// The closed set of delivery transports.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMethod {
    Email,
    Sms,
    Push,
    InApp,
    Webhook,
}

impl DeliveryMethod {
    /// Channels a user opts into; push and in-app are always on.
    pub fn is_opt_in(self) -> bool {
        matches!(self, Self::Email | Self::Sms | Self::Webhook)
    }
}

/// Per-channel delivery state. Moves forward only.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Pending,
    Sent,
    Delivered,
    Failed,
}

impl AttemptStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Failed)
    }
}

/// One channel's attempt to deliver a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryAttempt {
    pub method: DeliveryMethod,
    pub status: AttemptStatus,
    #[serde(default)]
    pub sent_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub delivered_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error: Option<String>,
}

impl DeliveryAttempt {
    pub fn pending(method: DeliveryMethod) -> Self {
        Self {
            method,
            status: AttemptStatus::Pending,
            sent_at: None,
            delivered_at: None,
            error: None,
        }
    }
}

/// A persisted reminder (or follow-up) and its per-channel delivery record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub medication_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub time_slot: Option<TimeSlot>,
    /// `"HH:MM"` in the user's locale.
    #[serde(default)]
    pub scheduled_time: Option<String>,
    #[serde(default)]
    pub fire_date: Option<NaiveDate>,
    pub status: NotificationStatus,
    pub priority: Priority,
    pub delivery_methods: Vec<DeliveryAttempt>,
    #[serde(default)]
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Notification {
    pub fn attempt(&self, method: DeliveryMethod) -> Option<&DeliveryAttempt> {
        self.delivery_methods.iter().find(|a| a.method == method)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Shown in the unread list: handed off or delivered, not yet read.
    pub fn is_unread(&self) -> bool {
        self.read_at.is_none()
            && matches!(
                self.status,
                NotificationStatus::Sent | NotificationStatus::Delivered
            )
    }
}

// --- Delivery plumbing ---

/// What a channel reports after a successful handoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Accepted by the transport; receipt may follow.
    Sent,
    /// Reached the user's device or history.
    Delivered,
    /// Parked for later delivery; the attempt stays pending.
    Deferred,
}

/// A forward move of one `DeliveryAttempt`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AttemptTransition {
    Sent,
    Delivered,
    Failed { error: String },
}

/// Contact details for a user, provided by the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub webhook_url: Option<String>,
}

/// A user's delivery preferences, read at dispatch time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelPreferences {
    pub user_id: String,
    /// Opt-in channels on top of the deployment's base set.
    #[serde(default)]
    pub channels: Vec<DeliveryMethod>,
    /// Medications whose outbound reminders the user switched off.
    #[serde(default)]
    pub muted_medications: Vec<String>,
}

impl ChannelPreferences {
    pub fn is_muted(&self, medication_id: &str) -> bool {
        self.muted_medications.iter().any(|m| m == medication_id)
    }
}

/// A recorded "medication taken" event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    pub id: String,
    pub user_id: String,
    pub medication_id: String,
    pub time_slot: TimeSlot,
    pub fire_date: NaiveDate,
    #[serde(default)]
    pub notification_id: Option<String>,
    pub confirmed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn time_slot_display_and_parse() {
        for slot in TimeSlot::ALL {
            let s = slot.to_string();
            assert_eq!(TimeSlot::from_str(&s).unwrap(), slot);
        }
        assert_eq!(TimeSlot::Morning.to_string(), "morning");
    }

    #[test]
    fn delivery_method_serializes_snake_case() {
        let json = serde_json::to_string(&DeliveryMethod::InApp).unwrap();
        assert_eq!(json, "\"in_app\"");
        assert_eq!(DeliveryMethod::InApp.to_string(), "in_app");
        assert_eq!(DeliveryMethod::from_str("webhook").unwrap(), DeliveryMethod::Webhook);
    }

    #[test]
    fn configured_slots_skip_blank_values() {
        let slots = TimeSlots {
            morning: Some("08:00".into()),
            afternoon: Some("  ".into()),
            evening: Some("20:00".into()),
        };
        let configured: Vec<_> = slots.configured().collect();
        assert_eq!(
            configured,
            vec![(TimeSlot::Morning, "08:00"), (TimeSlot::Evening, "20:00")]
        );
    }

    #[test]
    fn local_instant_applies_offset() {
        let t = NaiveTime::from_hms_opt(8, 0, 0).unwrap();
        let utc = local_instant(date(2026, 3, 1), t, 120).unwrap();
        assert_eq!(utc.to_rfc3339(), "2026-03-01T06:00:00+00:00");
        assert!(local_instant(date(2026, 3, 1), t, 24 * 60).is_none());
    }

    #[test]
    fn local_date_crosses_midnight() {
        let instant = Utc.with_ymd_and_hms(2026, 3, 1, 23, 30, 0).unwrap();
        assert_eq!(local_date(instant, 60), date(2026, 3, 2));
        assert_eq!(local_date(instant, 0), date(2026, 3, 1));
    }

    #[test]
    fn next_day_stops_at_end_date() {
        let entry = ScheduledFireEntry {
            medication_id: "m".into(),
            user_id: "u".into(),
            time_slot: TimeSlot::Evening,
            slot_time: NaiveTime::from_hms_opt(20, 0, 0).unwrap(),
            fire_date: date(2026, 3, 1),
            fire_instant: Utc.with_ymd_and_hms(2026, 3, 1, 20, 0, 0).unwrap(),
            end_date: date(2026, 3, 2),
            utc_offset_minutes: 0,
        };
        let next = entry.next_day().unwrap();
        assert_eq!(next.fire_date, date(2026, 3, 2));
        assert_eq!(
            next.fire_instant,
            Utc.with_ymd_and_hms(2026, 3, 2, 20, 0, 0).unwrap()
        );
        assert!(next.next_day().is_none());
        assert_eq!(entry.scheduled_time(), "20:00");
    }

    #[test]
    fn notification_serializes_kind_as_type() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap();
        let n = Notification {
            id: "n1".into(),
            user_id: "u1".into(),
            medication_id: Some("m1".into()),
            kind: NotificationKind::MedicationReminder,
            title: "t".into(),
            message: "m".into(),
            time_slot: Some(TimeSlot::Morning),
            scheduled_time: Some("08:00".into()),
            fire_date: Some(date(2026, 3, 1)),
            status: NotificationStatus::Pending,
            priority: Priority::High,
            delivery_methods: vec![DeliveryAttempt::pending(DeliveryMethod::Push)],
            read_at: None,
            created_at: now,
            expires_at: now + chrono::Duration::hours(24),
        };
        let value = serde_json::to_value(&n).unwrap();
        assert_eq!(value["type"], "medication_reminder");
        assert_eq!(value["delivery_methods"][0]["method"], "push");
        assert_eq!(value["priority"], "high");
        assert!(!n.is_unread());
        assert!(!n.is_expired(now));
    }
}
