// SPDX-FileCopyrightText: 2026 Pillbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery status rules.
//!
//! Attempts only move forward (`pending -> sent -> delivered`, or
//! `pending|sent -> failed`). The notification's aggregate status is
//! derived from its attempts after every change, except that `read`
//! overrides everything once set.

use chrono::{DateTime, Utc};

use crate::types::{
    AttemptStatus, AttemptTransition, DeliveryAttempt, Notification, NotificationStatus,
};

/// Derive the aggregate status from per-channel attempts.
///
/// Any delivered wins, then any sent; all-failed is failed; otherwise pending.
pub fn aggregate_status(attempts: &[DeliveryAttempt]) -> NotificationStatus {
    if attempts
        .iter()
        .any(|a| a.status == AttemptStatus::Delivered)
    {
        NotificationStatus::Delivered
    } else if attempts.iter().any(|a| a.status == AttemptStatus::Sent) {
        NotificationStatus::Sent
    } else if !attempts.is_empty() && attempts.iter().all(|a| a.status == AttemptStatus::Failed) {
        NotificationStatus::Failed
    } else {
        NotificationStatus::Pending
    }
}

/// Apply a transition to one attempt. Returns `false` when the move would go
/// backwards or leave a terminal state, in which case nothing changes.
pub fn apply_transition(
    attempt: &mut DeliveryAttempt,
    transition: &AttemptTransition,
    at: DateTime<Utc>,
) -> bool {
    match (attempt.status, transition) {
        (AttemptStatus::Pending, AttemptTransition::Sent) => {
            attempt.status = AttemptStatus::Sent;
            attempt.sent_at = Some(at);
            true
        }
        (AttemptStatus::Pending | AttemptStatus::Sent, AttemptTransition::Delivered) => {
            attempt.status = AttemptStatus::Delivered;
            attempt.sent_at.get_or_insert(at);
            attempt.delivered_at = Some(at);
            true
        }
        (AttemptStatus::Pending | AttemptStatus::Sent, AttemptTransition::Failed { error }) => {
            attempt.status = AttemptStatus::Failed;
            attempt.error = Some(error.clone());
            true
        }
        _ => false,
    }
}

impl Notification {
    /// Move the attempt for `method` forward and re-derive the aggregate.
    ///
    /// Returns `false` if the notification has no attempt for that channel or
    /// the transition is not allowed.
    pub fn apply_attempt_transition(
        &mut self,
        method: crate::types::DeliveryMethod,
        transition: &AttemptTransition,
        at: DateTime<Utc>,
    ) -> bool {
        let Some(attempt) = self.delivery_methods.iter_mut().find(|a| a.method == method) else {
            return false;
        };
        if !apply_transition(attempt, transition, at) {
            return false;
        }
        self.refresh_status();
        true
    }

    /// Recompute `status` from attempts unless the notification was read.
    pub fn refresh_status(&mut self) {
        if self.read_at.is_some() {
            self.status = NotificationStatus::Read;
        } else {
            self.status = aggregate_status(&self.delivery_methods);
        }
    }

    /// Mark as read. `read_at` is set once; later calls keep the first time.
    pub fn mark_read(&mut self, at: DateTime<Utc>) -> bool {
        if self.read_at.is_some() {
            return false;
        }
        self.read_at = Some(at);
        self.status = NotificationStatus::Read;
        true
    }
}
