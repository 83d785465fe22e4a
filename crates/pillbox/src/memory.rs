// SPDX-FileCopyrightText: 2026 Pillbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Periodic jemalloc heap sampling exported as Prometheus gauges.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

const SAMPLE_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemorySample {
    pub allocated: usize,
    pub resident: usize,
}

/// Read fresh allocator statistics. `None` if jemalloc refuses the read.
pub fn sample() -> Option<MemorySample> {
    // Stats are cached until the epoch moves.
    tikv_jemalloc_ctl::epoch::advance().ok()?;
    Some(MemorySample {
        allocated: tikv_jemalloc_ctl::stats::allocated::read().ok()?,
        resident: tikv_jemalloc_ctl::stats::resident::read().ok()?,
    })
}

/// Publish a sample every few seconds until `cancel` fires.
pub async fn monitor(cancel: CancellationToken) {
    let mut interval = tokio::time::interval(SAMPLE_INTERVAL);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Some(s) = sample() {
                    pillbox_prometheus::set_memory(s.allocated, s.resident);
                    debug!(allocated = s.allocated, resident = s.resident, "memory sampled");
                }
            }
            _ = cancel.cancelled() => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jemalloc_reports_live_allocations() {
        let held = vec![0u8; 1 << 20];
        let s = sample().expect("jemalloc stats");
        assert!(s.allocated >= held.len());
        assert!(s.resident > 0);
    }

    #[tokio::test]
    async fn monitor_stops_on_cancel() {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(monitor(cancel.clone()));
        cancel.cancel();
        task.await.unwrap();
    }
}
