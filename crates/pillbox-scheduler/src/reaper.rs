// SPDX-FileCopyrightText: 2026 Pillbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Expiry reaper.

use std::sync::Arc;

use tracing::{debug, info};

use pillbox_core::{Clock, NotificationStore, PillboxError};

/// Deletes notifications whose `expires_at` has passed, whatever their status.
pub struct ExpiryReaper {
    store: Arc<dyn NotificationStore>,
    clock: Arc<dyn Clock>,
}

impl ExpiryReaper {
    pub fn new(store: Arc<dyn NotificationStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// One sweep. Returns how many records were removed.
    pub async fn sweep(&self) -> Result<u64, PillboxError> {
        let now = self.clock.now();
        let removed = self.store.delete_expired(now).await?;
        pillbox_prometheus::recording::record_reaped(removed);
        if removed > 0 {
            info!(removed, "expired notifications reaped");
        } else {
            debug!("expiry sweep found nothing");
        }
        Ok(removed)
    }
}
