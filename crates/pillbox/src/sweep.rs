// SPDX-FileCopyrightText: 2026 Pillbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `pillbox sweep`: one expiry pass against the configured database.

use std::sync::Arc;

use pillbox_config::PillboxConfig;
use pillbox_core::{PillboxError, StorageAdapter, SystemClock};
use pillbox_scheduler::ExpiryReaper;
use pillbox_storage::SqliteStore;

pub async fn run_sweep(config: PillboxConfig) -> Result<(), PillboxError> {
    let store = Arc::new(SqliteStore::open(config.storage.clone()).await?);
    let removed = ExpiryReaper::new(store.clone(), Arc::new(SystemClock))
        .sweep()
        .await?;
    store.close().await?;
    println!("pillbox: removed {removed} expired notification(s)");
    Ok(())
}
