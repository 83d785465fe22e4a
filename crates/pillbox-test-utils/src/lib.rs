// SPDX-FileCopyrightText: 2026 Pillbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Pillbox integration tests.
//!
//! Provides mock adapters and test harness infrastructure for fast,
//! deterministic, CI-runnable tests without external services.
//!
//! # Components
//!
//! - [`MockChannel`] - scripted delivery channel that captures what it was handed
//! - [`TestHarness`] - temp SQLite store, manual clock, dispatcher, ack handler
//!   and reminder service wired together

pub mod harness;
pub mod mock_channel;

pub use harness::{TestHarness, TestHarnessBuilder, medication, utc};
pub use mock_channel::{MockChannel, MockOutcome};
