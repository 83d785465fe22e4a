// SPDX-FileCopyrightText: 2026 Pillbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter and service traits.
//!
//! Channels and storage extend [`PluginAdapter`]. Every trait uses
//! `#[async_trait]` so implementations can sit behind `Arc<dyn _>`.

pub mod adapter;
pub mod channel;
pub mod dispatch;
pub mod registry;
pub mod storage;

pub use adapter::PluginAdapter;
pub use channel::DeliveryChannel;
pub use dispatch::{DueHandler, ScheduleWatcher};
pub use registry::MedicationRegistry;
pub use storage::{ConfirmationStore, NotificationStore, PreferenceStore, StorageAdapter};
