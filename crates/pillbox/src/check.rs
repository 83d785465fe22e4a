// SPDX-FileCopyrightText: 2026 Pillbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `pillbox check`: print what a validated configuration resolves to.

use pillbox_config::PillboxConfig;

pub fn summary(config: &PillboxConfig) -> Vec<String> {
    let mut channels = vec!["in_app", "push"];
    if config.email.enabled {
        channels.push("email");
    }
    if config.sms.enabled {
        channels.push("sms");
    }
    if config.webhook.enabled {
        channels.push("webhook");
    }

    let gateway = if config.gateway.enabled {
        format!("{}:{}", config.gateway.host, config.gateway.port)
    } else {
        "disabled".to_string()
    };

    vec![
        format!("service:          {}", config.service.name),
        format!("database:         {}", config.storage.database_path),
        format!(
            "tick:             every {}s, tolerance {}s, recompile every {}s",
            config.scheduler.tick_interval_secs,
            config.scheduler.tolerance_secs,
            config.scheduler.recompile_interval_secs
        ),
        format!(
            "retention:        {}h, sweep every {}s",
            config.retention.ttl_hours, config.retention.sweep_interval_secs
        ),
        format!(
            "default channels: {}",
            config.delivery.default_channels.join(", ")
        ),
        format!("configured:       {}", channels.join(", ")),
        format!(
            "push offline:     {:?} (queue limit {})",
            config.delivery.push_offline_policy, config.delivery.push_offline_queue_limit
        ),
        format!("gateway:          {gateway}"),
        format!(
            "metrics:          {}",
            if config.metrics.enabled { "enabled" } else { "disabled" }
        ),
    ]
}

pub fn run_check(config: &PillboxConfig) {
    println!("pillbox: configuration OK");
    for line in summary(config) {
        println!("  {line}");
    }
}
