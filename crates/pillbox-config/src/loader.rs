// SPDX-FileCopyrightText: 2026 Pillbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Lookup order: `./pillbox.toml` > `~/.config/pillbox/pillbox.toml` >
//! `/etc/pillbox/pillbox.toml`, with `PILLBOX_` environment overrides on top.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::{PillboxConfig, SECTION_KEYS};

const SYSTEM_CONFIG: &str = "/etc/pillbox/pillbox.toml";
const LOCAL_CONFIG: &str = "pillbox.toml";

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/pillbox/pillbox.toml`
/// 3. `~/.config/pillbox/pillbox.toml`
/// 4. `./pillbox.toml`
/// 5. `PILLBOX_*` environment variables
pub fn load_config() -> Result<PillboxConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<PillboxConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PillboxConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<PillboxConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PillboxConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Config files in merge order, lowest precedence first. Missing files are
/// skipped by figment.
pub fn config_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(SYSTEM_CONFIG)];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("pillbox").join(LOCAL_CONFIG));
    }
    paths.push(PathBuf::from(LOCAL_CONFIG));
    paths
}

/// The full layered Figment, before extraction.
pub fn build_figment() -> Figment {
    config_paths()
        .into_iter()
        .fold(
            Figment::new().merge(Serialized::defaults(PillboxConfig::default())),
            |figment, path| figment.merge(Toml::file(path)),
        )
        .merge(env_provider())
}

/// Environment provider mapping `PILLBOX_SECTION_KEY` to `section.key`.
///
/// Uses `Env::map()` rather than `Env::split("_")`: keys contain underscores,
/// so `PILLBOX_SCHEDULER_TICK_INTERVAL_SECS` must become
/// `scheduler.tick_interval_secs`.
pub(crate) fn env_provider() -> Env {
    Env::prefixed("PILLBOX_").map(|key| map_env_key(key.as_str()).into())
}

fn map_env_key(key: &str) -> String {
    for (section, _) in SECTION_KEYS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|r| r.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
