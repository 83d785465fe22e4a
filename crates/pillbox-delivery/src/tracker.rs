// SPDX-FileCopyrightText: 2026 Pillbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery status tracker.
//!
//! Every per-channel result, provider receipt and queued push flush goes
//! through here, so attempts only ever move forward and the aggregate is
//! re-derived in the same store write.

use std::sync::Arc;

use tracing::debug;

use pillbox_core::{
    AttemptTransition, Clock, DeliveryMethod, DeliveryOutcome, Notification, NotificationStore,
    PillboxError,
};

pub struct StatusTracker {
    store: Arc<dyn NotificationStore>,
    clock: Arc<dyn Clock>,
}

/// Short label for metrics and logs.
pub fn outcome_label(result: &Result<DeliveryOutcome, PillboxError>) -> &'static str {
    match result {
        Ok(DeliveryOutcome::Sent) => "sent",
        Ok(DeliveryOutcome::Delivered) => "delivered",
        Ok(DeliveryOutcome::Deferred) => "deferred",
        Err(_) => "failed",
    }
}

/// The attempt transitions a channel result maps to, in order. A delivered
/// handoff passes through `sent`; `Deferred` leaves the attempt pending.
pub fn transitions_for(result: &Result<DeliveryOutcome, PillboxError>) -> Vec<AttemptTransition> {
    match result {
        Ok(DeliveryOutcome::Sent) => vec![AttemptTransition::Sent],
        Ok(DeliveryOutcome::Delivered) => {
            vec![AttemptTransition::Sent, AttemptTransition::Delivered]
        }
        Ok(DeliveryOutcome::Deferred) => Vec::new(),
        Err(e) => vec![AttemptTransition::Failed {
            error: e.delivery_reason(),
        }],
    }
}

impl StatusTracker {
    pub fn new(store: Arc<dyn NotificationStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Apply one transition. Disallowed moves leave the record as stored.
    pub async fn transition(
        &self,
        notification_id: &str,
        method: DeliveryMethod,
        transition: AttemptTransition,
    ) -> Result<Notification, PillboxError> {
        let at = self.clock.now();
        let updated = self
            .store
            .apply_attempt_transition(notification_id, method, transition.clone(), at)
            .await?
            .ok_or_else(|| PillboxError::NotFound {
                entity: "notification",
                id: notification_id.to_string(),
            })?;
        debug!(
            notification_id,
            channel = %method,
            transition = ?transition,
            status = %updated.status,
            "delivery attempt updated"
        );
        Ok(updated)
    }

    /// Record what a channel returned. Returns `None` for deferred handoffs.
    pub async fn record_outcome(
        &self,
        notification_id: &str,
        method: DeliveryMethod,
        result: &Result<DeliveryOutcome, PillboxError>,
    ) -> Result<Option<Notification>, PillboxError> {
        let mut latest = None;
        for transition in transitions_for(result) {
            latest = Some(self.transition(notification_id, method, transition).await?);
        }
        Ok(latest)
    }
}
