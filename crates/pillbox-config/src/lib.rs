// SPDX-FileCopyrightText: 2026 Pillbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the Pillbox reminder engine.
//!
//! TOML parsing with strict `deny_unknown_fields`, XDG file lookup,
//! `PILLBOX_*` environment overrides, and miette diagnostics that point at
//! the offending line for both parse errors and rule violations.
//!
//! # Usage
//!
//! ```no_run
//! use pillbox_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("tick every {}s", config.scheduler.tick_interval_secs);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

use std::path::Path;

use diagnostic::ConfigSource;

pub use diagnostic::{ConfigError, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::{PillboxConfig, PushOfflinePolicy};

/// Load configuration from the XDG hierarchy and validate it.
pub fn load_and_validate() -> Result<PillboxConfig, Vec<ConfigError>> {
    finish(loader::load_config(), || {
        loader::config_paths()
            .iter()
            .filter_map(|path| ConfigSource::read(path))
            .collect()
    })
}

/// Load configuration from an explicit file (plus env overrides) and validate it.
pub fn load_and_validate_path(path: &Path) -> Result<PillboxConfig, Vec<ConfigError>> {
    finish(loader::load_config_from_path(path), || {
        ConfigSource::read(path).into_iter().collect()
    })
}

/// Load configuration from a TOML string and validate it.
pub fn load_and_validate_str(toml_content: &str) -> Result<PillboxConfig, Vec<ConfigError>> {
    finish(loader::load_config_from_str(toml_content), || {
        vec![ConfigSource::new("<inline>", toml_content)]
    })
}

/// Validate a loaded config; sources are only read when there is something
/// to point at.
fn finish(
    loaded: Result<PillboxConfig, figment::Error>,
    sources: impl FnOnce() -> Vec<ConfigSource>,
) -> Result<PillboxConfig, Vec<ConfigError>> {
    match loaded {
        Ok(config) => match validation::validate_config(&config) {
            Ok(()) => Ok(config),
            Err(errors) => Err(diagnostic::attach_spans(errors, &sources())),
        },
        Err(err) => Err(diagnostic::from_figment(err, &sources())),
    }
}
