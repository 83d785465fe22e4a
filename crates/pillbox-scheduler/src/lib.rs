// SPDX-FileCopyrightText: 2026 Pillbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reminder scheduling for Pillbox.
//!
//! [`compiler`] turns medication schedules into concrete fire instants,
//! [`pending`] holds them, [`trigger`] claims due entries each tick and
//! [`reaper`] removes expired notifications. [`ReminderService`] runs the
//! loops.

pub mod compiler;
pub mod pending;
pub mod reaper;
pub mod service;
pub mod trigger;

pub use compiler::{CompileOptions, CompileOutput, SkippedSlot, compile, compile_schedule};
pub use pending::PendingSet;
pub use reaper::ExpiryReaper;
pub use service::ReminderService;
pub use trigger::TriggerClock;
