// SPDX-FileCopyrightText: 2026 Pillbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules, one per table family. Every function takes `&Database`
//! and runs on the single writer thread.

pub mod confirmations;
pub mod medications;
pub mod notifications;
pub mod preferences;
