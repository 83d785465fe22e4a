// SPDX-FileCopyrightText: 2026 Pillbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read-only view of the medication registry owned by the wider application.

use async_trait::async_trait;

use crate::error::PillboxError;
use crate::types::{MedicationSchedule, Recipient};

#[async_trait]
pub trait MedicationRegistry: Send + Sync + 'static {
    /// Every active schedule. The compiler applies the remaining eligibility rules.
    async fn active_schedules(&self) -> Result<Vec<MedicationSchedule>, PillboxError>;

    async fn schedule(
        &self,
        medication_id: &str,
    ) -> Result<Option<MedicationSchedule>, PillboxError>;

    /// Contact details for a user. Unknown users get an empty profile.
    async fn recipient(&self, user_id: &str) -> Result<Recipient, PillboxError>;
}
