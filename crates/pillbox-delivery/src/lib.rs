// SPDX-FileCopyrightText: 2026 Pillbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery side of the reminder engine.
//!
//! - [`Dispatcher`] persists a reminder for each claimed fire and fans it out
//! - [`StatusTracker`] moves per-channel attempts forward
//! - [`AckHandler`] serves read receipts, history and dose confirmations
//! - [`PreferenceService`] updates what the dispatcher reads at fire time

pub mod ack;
pub mod dispatcher;
pub mod preferences;
pub mod tracker;

pub use ack::{AckHandler, DEFAULT_HISTORY_LIMIT, MAX_HISTORY_LIMIT, TakenReceipt};
pub use dispatcher::{DispatchSettings, Dispatcher, resolve_channels};
pub use preferences::PreferenceService;
pub use tracker::StatusTracker;
