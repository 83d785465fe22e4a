// SPDX-FileCopyrightText: 2026 Pillbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks constraints serde cannot express. All errors are collected; the
//! first failure does not stop the scan.

use std::str::FromStr;

use pillbox_core::DeliveryMethod;

use crate::diagnostic::ConfigError;
use crate::model::{PillboxConfig, PushOfflinePolicy};

/// Largest real-world UTC offset magnitude, in minutes.
const MAX_UTC_OFFSET_MINUTES: i32 = 14 * 60;

pub fn validate_config(config: &PillboxConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let scheduler = &config.scheduler;
    if scheduler.tick_interval_secs == 0 {
        errors.push(ConfigError::validation(
            "scheduler.tick_interval_secs",
            "must be greater than 0",
        ));
    }
    // A slot must land inside [instant - tol, instant + tol] of at least one tick.
    if scheduler.tick_interval_secs > 0 && scheduler.tolerance_secs * 2 < scheduler.tick_interval_secs
    {
        errors.push(
            ConfigError::validation(
                "scheduler.tolerance_secs",
                format!(
                    "{}s is less than half of tick_interval_secs ({}s); slots between ticks would never fire",
                    scheduler.tolerance_secs, scheduler.tick_interval_secs
                ),
            )
            .paired_with("scheduler.tick_interval_secs")
            .with_help(format!(
                "set tolerance_secs to at least {} or tick_interval_secs to at most {}",
                scheduler.tick_interval_secs.div_ceil(2),
                scheduler.tolerance_secs * 2
            )),
        );
    }
    if scheduler.recompile_interval_secs == 0 {
        errors.push(ConfigError::validation(
            "scheduler.recompile_interval_secs",
            "must be greater than 0",
        ));
    }
    if scheduler.default_utc_offset_minutes.abs() > MAX_UTC_OFFSET_MINUTES {
        errors.push(ConfigError::validation(
            "scheduler.default_utc_offset_minutes",
            format!(
                "must be within ±{MAX_UTC_OFFSET_MINUTES}, got {}",
                scheduler.default_utc_offset_minutes
            ),
        ));
    }

    if config.retention.ttl_hours < 1 {
        errors.push(ConfigError::validation(
            "retention.ttl_hours",
            "must be at least 1",
        ));
    }
    if config.retention.sweep_interval_secs == 0 {
        errors.push(ConfigError::validation(
            "retention.sweep_interval_secs",
            "must be greater than 0",
        ));
    }

    let delivery = &config.delivery;
    for name in &delivery.default_channels {
        if DeliveryMethod::from_str(name).is_err() {
            errors.push(
                ConfigError::validation(
                    "delivery.default_channels",
                    format!("unknown channel `{name}`"),
                )
                .with_help("channels are push, in_app, email, sms, webhook"),
            );
        }
    }
    if delivery.channel_timeout_secs == 0 {
        errors.push(ConfigError::validation(
            "delivery.channel_timeout_secs",
            "must be greater than 0",
        ));
    }
    if delivery.push_offline_policy == PushOfflinePolicy::Queue
        && delivery.push_offline_queue_limit == 0
    {
        errors.push(
            ConfigError::validation(
                "delivery.push_offline_queue_limit",
                "must be greater than 0 when queueing",
            )
            .paired_with("delivery.push_offline_policy")
            .with_help("raise the limit or set push_offline_policy = \"fail\""),
        );
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::validation(
            "storage.database_path",
            "must not be empty",
        ));
    }

    if config.gateway.enabled {
        let token_missing = config
            .gateway
            .bearer_token
            .as_deref()
            .is_none_or(|t| t.trim().is_empty());
        if token_missing {
            errors.push(
                ConfigError::validation("gateway.bearer_token", "required when the gateway is enabled")
                    .paired_with("gateway.enabled"),
            );
        }
        if config.gateway.host.trim().is_empty() {
            errors.push(ConfigError::validation("gateway.host", "must not be empty"));
        }
    }

    let required = [
        (config.email.enabled, "email.smtp_host", config.email.smtp_host.is_none()),
        (config.email.enabled, "email.from_address", config.email.from_address.is_none()),
        (config.sms.enabled, "sms.account_sid", config.sms.account_sid.is_none()),
        (config.sms.enabled, "sms.auth_token", config.sms.auth_token.is_none()),
        (config.sms.enabled, "sms.from_number", config.sms.from_number.is_none()),
    ];
    for (enabled, key, missing) in required {
        if enabled && missing {
            let section = key.split('.').next().unwrap_or_default();
            errors.push(
                ConfigError::validation(key, format!("required when {section} is enabled"))
                    .paired_with(&format!("{section}.enabled")),
            );
        }
    }

    if config.webhook.enabled && config.webhook.timeout_secs == 0 {
        errors.push(ConfigError::validation(
            "webhook.timeout_secs",
            "must be greater than 0",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
