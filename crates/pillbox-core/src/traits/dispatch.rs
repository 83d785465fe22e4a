// SPDX-FileCopyrightText: 2026 Pillbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Seams between the scheduler and the rest of the engine.

use async_trait::async_trait;

use crate::error::PillboxError;
use crate::types::DueFire;

/// Receives fires claimed by the trigger clock.
#[async_trait]
pub trait DueHandler: Send + Sync + 'static {
    async fn handle_due(&self, fire: DueFire) -> Result<(), PillboxError>;
}

/// Notified when a medication's schedule was edited, disabled or deleted.
#[async_trait]
pub trait ScheduleWatcher: Send + Sync + 'static {
    async fn schedule_changed(&self, medication_id: &str) -> Result<(), PillboxError>;
}
