// SPDX-FileCopyrightText: 2026 Pillbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade. Without an installed recorder every helper
//! is a no-op, so library crates call them unconditionally.

use metrics::{describe_counter, describe_gauge, describe_histogram};

/// Register all Pillbox metric descriptions.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_counter!(
        "pillbox_fires_total",
        "Reminder slots claimed by the trigger clock"
    );
    describe_counter!(
        "pillbox_dedup_skips_total",
        "Fires dropped because a notification already existed for the slot"
    );
    describe_counter!(
        "pillbox_notifications_created_total",
        "Notifications persisted"
    );
    describe_counter!(
        "pillbox_delivery_attempts_total",
        "Channel handoffs by outcome"
    );
    describe_counter!(
        "pillbox_reaped_total",
        "Expired notifications deleted by the reaper"
    );
    describe_gauge!("pillbox_pending_entries", "Compiled fire entries awaiting their instant");
    describe_gauge!("pillbox_push_connections", "Live real-time push connections");
    describe_gauge!("pillbox_memory_heap_bytes", "Bytes allocated by the application");
    describe_gauge!(
        "pillbox_memory_resident_bytes",
        "Bytes in physically resident allocator pages"
    );
    describe_histogram!(
        "pillbox_channel_latency_seconds",
        "Time spent in a single channel handoff"
    );
}

/// A slot was claimed. `late` marks fires past the tolerance window.
pub fn record_fire(late: bool) {
    let timing = if late { "late" } else { "on_time" };
    metrics::counter!("pillbox_fires_total", "timing" => timing).increment(1);
}

pub fn record_dedup_skip() {
    metrics::counter!("pillbox_dedup_skips_total").increment(1);
}

pub fn record_notification_created(kind: &str) {
    metrics::counter!("pillbox_notifications_created_total", "kind" => kind.to_string())
        .increment(1);
}

/// Record one channel handoff. `outcome` is `sent`, `delivered`, `deferred` or `failed`.
pub fn record_attempt(channel: &str, outcome: &'static str, seconds: f64) {
    metrics::counter!(
        "pillbox_delivery_attempts_total",
        "channel" => channel.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    metrics::histogram!("pillbox_channel_latency_seconds", "channel" => channel.to_string())
        .record(seconds);
}

pub fn record_reaped(count: u64) {
    metrics::counter!("pillbox_reaped_total").increment(count);
}

pub fn set_pending_entries(count: usize) {
    metrics::gauge!("pillbox_pending_entries").set(count as f64);
}

pub fn set_push_connections(count: usize) {
    metrics::gauge!("pillbox_push_connections").set(count as f64);
}

pub fn set_memory(heap_bytes: usize, resident_bytes: usize) {
    metrics::gauge!("pillbox_memory_heap_bytes").set(heap_bytes as f64);
    metrics::gauge!("pillbox_memory_resident_bytes").set(resident_bytes as f64);
}
