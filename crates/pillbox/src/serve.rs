// SPDX-FileCopyrightText: 2026 Pillbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `pillbox serve` command implementation.
//!
//! Opens SQLite storage, builds the dispatcher with push plus every
//! configured channel, starts the reminder service (tick loop, periodic
//! recompile, expiry sweeps) and, when enabled, the HTTP/WebSocket gateway.
//! Runs until SIGINT/SIGTERM.

use std::sync::Arc;

use tracing::{info, warn};

use pillbox_config::PillboxConfig;
use pillbox_core::{Clock, PillboxError, StorageAdapter, SystemClock};
use pillbox_delivery::{AckHandler, DispatchSettings, Dispatcher, PreferenceService};
use pillbox_gateway::{
    AuthConfig, ConnectionRegistry, GatewayState, HealthState, PushChannel, ServerConfig,
};
use pillbox_prometheus::PrometheusAdapter;
use pillbox_scheduler::ReminderService;
use pillbox_storage::SqliteStore;

use crate::shutdown;

pub async fn run_serve(config: PillboxConfig) -> Result<(), PillboxError> {
    init_tracing(&config.service.log_level);
    info!(service = %config.service.name, "starting pillbox serve");

    let prometheus = if config.metrics.enabled {
        match PrometheusAdapter::new() {
            Ok(adapter) => Some(Arc::new(adapter)),
            Err(e) => {
                warn!(error = %e, "prometheus initialization failed, continuing without metrics");
                None
            }
        }
    } else {
        None
    };

    let store = Arc::new(SqliteStore::open(config.storage.clone()).await?);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let connections = Arc::new(ConnectionRegistry::new());
    let push = Arc::new(PushChannel::new(
        connections.clone(),
        config.delivery.push_offline_policy,
        config.delivery.push_offline_queue_limit,
    ));

    let settings = DispatchSettings::from_config(&config.delivery, &config.retention)?;
    let mut dispatcher = Dispatcher::new(
        settings,
        store.clone(),
        store.clone(),
        store.clone(),
        clock.clone(),
    )
    .with_channel(push.clone());
    for channel in pillbox_channels::build_channels(&config, clock.clone())? {
        dispatcher = dispatcher.with_channel(channel);
    }
    let configured = dispatcher.configured_channels();
    for method in &dispatcher.settings().default_channels {
        if !configured.contains(method) {
            warn!(channel = %method, "default channel is not enabled; its attempts will fail");
        }
    }
    let dispatcher = Arc::new(dispatcher);

    let ack = Arc::new(AckHandler::new(
        store.clone(),
        store.clone(),
        store.clone(),
        dispatcher.clone(),
        clock.clone(),
        config.scheduler.default_utc_offset_minutes,
    ));
    let preferences = Arc::new(PreferenceService::new(store.clone(), store.clone()));
    let service = Arc::new(ReminderService::new(
        &config.scheduler,
        &config.retention,
        store.clone(),
        dispatcher.clone(),
        store.clone(),
        clock,
    ));

    let cancel = shutdown::install_signal_handler();
    service.start().await?;

    #[cfg(not(target_env = "msvc"))]
    let memory = prometheus
        .is_some()
        .then(|| tokio::spawn(crate::memory::monitor(cancel.clone())));

    let gateway = if config.gateway.enabled {
        let state = GatewayState {
            ack,
            preferences,
            tracker: dispatcher.tracker(),
            watcher: service.clone(),
            connections,
            push,
            auth: AuthConfig {
                bearer_token: config.gateway.bearer_token.clone(),
            },
            health: HealthState {
                start_time: std::time::Instant::now(),
                prometheus_render: prometheus.map(|p| {
                    Arc::new(move || p.render()) as Arc<dyn Fn() -> String + Send + Sync>
                }),
            },
        };
        let server_config = ServerConfig {
            host: config.gateway.host.clone(),
            port: config.gateway.port,
        };
        let server_cancel = cancel.clone();
        Some(tokio::spawn(async move {
            let result =
                pillbox_gateway::start_server(&server_config, state, server_cancel.clone()).await;
            if let Err(e) = &result {
                tracing::error!(error = %e, "gateway server error");
                server_cancel.cancel();
            }
            result
        }))
    } else {
        info!("gateway disabled; running scheduler only");
        None
    };

    cancel.cancelled().await;
    info!("shutting down");

    service.stop().await;
    #[cfg(not(target_env = "msvc"))]
    if let Some(handle) = memory {
        let _ = handle.await;
    }
    if let Some(handle) = gateway {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "gateway exited with error"),
            Err(e) => warn!(error = %e, "gateway task panicked"),
        }
    }
    store.close().await?;

    info!("pillbox serve shutdown complete");
    Ok(())
}

/// `pillbox={level},warn` unless `RUST_LOG` is set.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("pillbox={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}
