// SPDX-FileCopyrightText: 2026 Pillbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prometheus metrics for Pillbox.
//!
//! Uses the metrics-rs facade with the Prometheus exporter. The rendered
//! text is served by the gateway's `/metrics` endpoint.

pub mod recording;

use async_trait::async_trait;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use pillbox_core::{AdapterType, HealthStatus, PillboxError, PluginAdapter};

pub use recording::{
    record_attempt, record_dedup_skip, record_fire, record_notification_created, record_reaped,
    set_memory, set_pending_entries, set_push_connections,
};

/// Installs the global Prometheus recorder and renders its snapshot.
pub struct PrometheusAdapter {
    handle: PrometheusHandle,
}

impl PrometheusAdapter {
    /// Install the recorder globally. Only one recorder can exist per
    /// process; a second call returns an error.
    pub fn new() -> Result<Self, PillboxError> {
        let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
            PillboxError::Internal(format!("failed to install Prometheus recorder: {e}"))
        })?;

        recording::register_metrics();

        tracing::info!("prometheus metrics recorder installed");

        Ok(Self { handle })
    }

    pub fn handle(&self) -> &PrometheusHandle {
        &self.handle
    }

    /// Render all collected metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

#[async_trait]
impl PluginAdapter for PrometheusAdapter {
    fn name(&self) -> &str {
        "prometheus"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Observability
    }

    async fn health_check(&self) -> Result<HealthStatus, PillboxError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), PillboxError> {
        Ok(())
    }
}
