// SPDX-FileCopyrightText: 2026 Pillbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Live connection registry for real-time push.
//!
//! Each WebSocket session registers a bounded `mpsc` sender under its user
//! id. Broadcasting never awaits: a full buffer or a closed receiver only
//! affects that one connection, and closed connections are pruned on the way.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::debug;

use pillbox_prometheus::set_push_connections;

pub type ConnectionId = u64;

/// Per-connection result of a broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastOutcome {
    Delivered,
    /// Buffer full; the payload was dropped for this connection.
    Full,
    /// Receiver gone; the connection has been removed.
    Closed,
}

#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<String, Vec<(ConnectionId, mpsc::Sender<String>)>>,
    next_id: AtomicU64,
    total: AtomicUsize,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, user_id: &str, sender: mpsc::Sender<String>) -> ConnectionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        // Counted before the sender becomes visible to a pruning broadcast.
        let total = self.total.fetch_add(1, Ordering::AcqRel) + 1;
        self.connections
            .entry(user_id.to_string())
            .or_default()
            .push((id, sender));
        set_push_connections(total);
        debug!(user_id, connection_id = id, total, "push connection registered");
        id
    }

    /// Returns `false` if the connection was already gone.
    pub fn unregister(&self, user_id: &str, id: ConnectionId) -> bool {
        let removed = match self.connections.get_mut(user_id) {
            Some(mut entry) => {
                let before = entry.len();
                entry.retain(|(cid, _)| *cid != id);
                before - entry.len()
            }
            None => 0,
        };
        self.connections.remove_if(user_id, |_, v| v.is_empty());
        if removed > 0 {
            self.release(removed);
            debug!(user_id, connection_id = id, "push connection unregistered");
        }
        removed > 0
    }

    /// Offer `payload` to every live connection of `user_id`.
    pub fn broadcast(&self, user_id: &str, payload: &str) -> Vec<(ConnectionId, BroadcastOutcome)> {
        let mut outcomes = Vec::new();
        let mut pruned = 0;
        if let Some(mut entry) = self.connections.get_mut(user_id) {
            entry.retain(|(id, sender)| {
                let outcome = match sender.try_send(payload.to_string()) {
                    Ok(()) => BroadcastOutcome::Delivered,
                    Err(mpsc::error::TrySendError::Full(_)) => BroadcastOutcome::Full,
                    Err(mpsc::error::TrySendError::Closed(_)) => BroadcastOutcome::Closed,
                };
                outcomes.push((*id, outcome));
                if outcome == BroadcastOutcome::Closed {
                    pruned += 1;
                    false
                } else {
                    true
                }
            });
        }
        if pruned > 0 {
            self.connections.remove_if(user_id, |_, v| v.is_empty());
            self.release(pruned);
        }
        outcomes
    }

    pub fn connection_count(&self, user_id: &str) -> usize {
        self.connections.get(user_id).map_or(0, |e| e.len())
    }

    pub fn total_connections(&self) -> usize {
        self.total.load(Ordering::Acquire)
    }

    fn release(&self, count: usize) {
        let previous = self
            .total
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                Some(n.saturating_sub(count))
            })
            .unwrap_or_default();
        set_push_connections(previous.saturating_sub(count));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broadcast_reaches_every_connection_of_the_user() {
        let registry = ConnectionRegistry::new();
        let (tx1, mut rx1) = mpsc::channel(4);
        let (tx2, mut rx2) = mpsc::channel(4);
        let (tx3, mut rx3) = mpsc::channel(4);
        registry.register("user-1", tx1);
        registry.register("user-1", tx2);
        registry.register("user-2", tx3);

        let outcomes = registry.broadcast("user-1", "hello");
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|(_, o)| *o == BroadcastOutcome::Delivered));
        assert_eq!(rx1.try_recv().unwrap(), "hello");
        assert_eq!(rx2.try_recv().unwrap(), "hello");
        assert!(rx3.try_recv().is_err());
    }

    #[test]
    fn closed_connection_is_pruned_without_affecting_others() {
        let registry = ConnectionRegistry::new();
        let (tx1, rx1) = mpsc::channel(4);
        let (tx2, mut rx2) = mpsc::channel(4);
        let closed = registry.register("user-1", tx1);
        let open = registry.register("user-1", tx2);
        drop(rx1);

        let outcomes = registry.broadcast("user-1", "ping");
        assert!(outcomes.contains(&(closed, BroadcastOutcome::Closed)));
        assert!(outcomes.contains(&(open, BroadcastOutcome::Delivered)));
        assert_eq!(rx2.try_recv().unwrap(), "ping");
        assert_eq!(registry.connection_count("user-1"), 1);
        assert_eq!(registry.total_connections(), 1);
    }

    #[test]
    fn full_buffer_drops_for_that_connection_only() {
        let registry = ConnectionRegistry::new();
        let (tx, mut rx) = mpsc::channel(1);
        let id = registry.register("user-1", tx);
        assert_eq!(registry.broadcast("user-1", "a"), vec![(id, BroadcastOutcome::Delivered)]);
        assert_eq!(registry.broadcast("user-1", "b"), vec![(id, BroadcastOutcome::Full)]);
        assert_eq!(rx.try_recv().unwrap(), "a");
        assert_eq!(registry.connection_count("user-1"), 1);
    }

    #[test]
    fn release_never_wraps_below_zero() {
        let registry = ConnectionRegistry::new();
        registry.release(3);
        assert_eq!(registry.total_connections(), 0);
    }

    #[test]
    fn concurrent_connect_and_prune_balance_out() {
        let registry = ConnectionRegistry::new();
        std::thread::scope(|scope| {
            for worker in 0..4 {
                let registry = &registry;
                scope.spawn(move || {
                    for _ in 0..200 {
                        let (tx, rx) = mpsc::channel(1);
                        registry.register("user-1", tx);
                        drop(rx);
                        registry.broadcast("user-1", "x");
                        assert!(registry.total_connections() <= 4 * 200, "worker {worker}");
                    }
                });
            }
        });
        registry.broadcast("user-1", "x");
        assert_eq!(registry.connection_count("user-1"), 0);
        assert_eq!(registry.total_connections(), 0);
    }

    #[test]
    fn unregister_removes_once() {
        let registry = ConnectionRegistry::new();
        let (tx, _rx) = mpsc::channel(1);
        let id = registry.register("user-1", tx);
        assert!(registry.unregister("user-1", id));
        assert!(!registry.unregister("user-1", id));
        assert_eq!(registry.total_connections(), 0);
        assert!(registry.broadcast("user-1", "x").is_empty());
    }
}
