// SPDX-FileCopyrightText: 2026 Pillbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Pillbox medication reminder engine.
//!
//! Holds the shared data model, the error enum, the delivery status rules,
//! the injectable clock, and the traits every backend implements.

pub mod clock;
pub mod error;
pub mod status;
pub mod traits;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::PillboxError;
pub use status::{aggregate_status, apply_transition};
pub use types::*;

pub use traits::{
    ConfirmationStore, DeliveryChannel, DueHandler, MedicationRegistry, NotificationStore,
    PluginAdapter, PreferenceStore, ScheduleWatcher, StorageAdapter,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapter_type_round_trips_through_strum() {
        use std::str::FromStr;
        for variant in [
            AdapterType::Channel,
            AdapterType::Storage,
            AdapterType::Registry,
            AdapterType::Observability,
        ] {
            let parsed = AdapterType::from_str(&variant.to_string()).expect("should parse back");
            assert_eq!(variant, parsed);
        }
    }

    #[test]
    fn health_status_variants() {
        assert_eq!(HealthStatus::Healthy, HealthStatus::Healthy);
        assert_ne!(HealthStatus::Degraded("slow".into()), HealthStatus::Healthy);
    }

    #[test]
    fn all_traits_are_exported() {
        fn _assert_channel<T: DeliveryChannel>() {}
        fn _assert_store<T: NotificationStore + PreferenceStore + ConfirmationStore>() {}
        fn _assert_storage<T: StorageAdapter>() {}
        fn _assert_registry<T: MedicationRegistry>() {}
        fn _assert_due<T: DueHandler>() {}
        fn _assert_watcher<T: ScheduleWatcher>() {}
    }
}
