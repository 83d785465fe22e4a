// SPDX-FileCopyrightText: 2026 Pillbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! User delivery preferences. Read by the dispatcher at fire time, so a
//! change only affects reminders that fire afterwards.

use std::sync::Arc;

use tracing::debug;

use pillbox_core::{
    ChannelPreferences, DeliveryMethod, MedicationRegistry, PillboxError, PreferenceStore,
};

pub struct PreferenceService {
    store: Arc<dyn PreferenceStore>,
    registry: Arc<dyn MedicationRegistry>,
}

impl PreferenceService {
    pub fn new(store: Arc<dyn PreferenceStore>, registry: Arc<dyn MedicationRegistry>) -> Self {
        Self { store, registry }
    }

    pub async fn get(&self, user_id: &str) -> Result<ChannelPreferences, PillboxError> {
        self.store.get_preferences(user_id).await
    }

    /// Turn outbound reminders for one of the user's medications on or off.
    pub async fn update_medication_preference(
        &self,
        user_id: &str,
        medication_id: &str,
        enabled: bool,
    ) -> Result<ChannelPreferences, PillboxError> {
        let schedule = self
            .registry
            .schedule(medication_id)
            .await?
            .ok_or_else(|| PillboxError::NotFound {
                entity: "medication",
                id: medication_id.to_string(),
            })?;
        if schedule.user_id != user_id {
            return Err(PillboxError::Unauthorized(format!(
                "medication {medication_id} belongs to another user"
            )));
        }
        debug!(user_id, medication_id, enabled, "medication reminders toggled");
        self.store
            .set_medication_enabled(user_id, medication_id, enabled)
            .await
    }

    /// Replace the user's opt-in channels. Push and in-app are always on and
    /// are dropped from the stored list.
    pub async fn update_channels(
        &self,
        user_id: &str,
        channels: &[DeliveryMethod],
    ) -> Result<ChannelPreferences, PillboxError> {
        let opt_in: Vec<DeliveryMethod> =
            channels.iter().copied().filter(|m| m.is_opt_in()).collect();
        debug!(user_id, channels = ?opt_in, "opt-in channels updated");
        self.store.set_channels(user_id, &opt_in).await
    }
}
