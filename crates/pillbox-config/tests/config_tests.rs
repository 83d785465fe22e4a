// SPDX-FileCopyrightText: 2026 Pillbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Pillbox configuration system.

use miette::Diagnostic;
use pillbox_config::diagnostic::{ConfigError, KeyHint};
use pillbox_config::model::{PillboxConfig, PushOfflinePolicy};
use pillbox_config::{load_and_validate_str, load_config_from_str};

/// Valid TOML with every section deserializes.
#[test]
fn valid_toml_deserializes_into_pillbox_config() {
    let toml = r#"
[service]
name = "pillbox-eu"
log_level = "debug"

[scheduler]
tick_interval_secs = 15
tolerance_secs = 30
recompile_interval_secs = 120
default_utc_offset_minutes = 60

[retention]
ttl_hours = 48
sweep_interval_secs = 60

[delivery]
default_channels = ["push", "in_app", "email"]
channel_timeout_secs = 5
push_offline_policy = "queue"
push_offline_queue_limit = 10

[storage]
database_path = "/tmp/pillbox-test.db"
wal_mode = false

[gateway]
enabled = true
host = "0.0.0.0"
port = 8080
bearer_token = "secret"

[email]
enabled = true
smtp_host = "smtp.example.com"
from_address = "reminders@example.com"

[sms]
enabled = true
account_sid = "AC123"
auth_token = "tok"
from_number = "+15550000000"

[webhook]
enabled = true
signing_secret = "hush"

[metrics]
enabled = false
"#;

    let config = load_and_validate_str(toml).expect("valid TOML should validate");
    assert_eq!(config.service.name, "pillbox-eu");
    assert_eq!(config.scheduler.tick_interval_secs, 15);
    assert_eq!(config.scheduler.default_utc_offset_minutes, 60);
    assert_eq!(config.retention.ttl_hours, 48);
    assert_eq!(config.delivery.default_channels.len(), 3);
    assert_eq!(config.delivery.push_offline_policy, PushOfflinePolicy::Queue);
    assert!(!config.storage.wal_mode);
    assert_eq!(config.gateway.port, 8080);
    assert_eq!(config.email.smtp_port, 587);
    assert_eq!(config.sms.api_base_url, "https://api.twilio.com");
    assert_eq!(config.webhook.timeout_secs, 10);
    assert!(!config.metrics.enabled);
}

#[test]
fn empty_toml_uses_defaults() {
    let config = load_config_from_str("").expect("empty TOML should use defaults");
    assert_eq!(config.service.name, "pillbox");
    assert_eq!(config.service.log_level, "info");
    assert_eq!(config.scheduler.recompile_interval_secs, 300);
    assert_eq!(config.retention.sweep_interval_secs, 300);
    assert_eq!(config.delivery.channel_timeout_secs, 10);
    assert!(config.metrics.enabled);
}

#[test]
fn dotted_override_sets_nested_key() {
    use figment::{Figment, providers::Serialized};

    let config: PillboxConfig = Figment::new()
        .merge(Serialized::defaults(PillboxConfig::default()))
        .merge(("scheduler.tick_interval_secs", 10))
        .extract()
        .expect("should set via dot notation");
    assert_eq!(config.scheduler.tick_interval_secs, 10);
}

#[test]
fn unknown_top_level_section_is_rejected() {
    let err = load_config_from_str("[logging]\nlevel = \"debug\"\n")
        .expect_err("unknown top-level section should be rejected");
    let err_str = format!("{err}");
    assert!(
        err_str.contains("unknown field") || err_str.contains("logging"),
        "got: {err_str}"
    );
}

#[test]
fn unknown_key_is_scoped_to_its_section() {
    let toml = r#"
[scheduler]
tick_intreval_secs = 10
"#;
    let errors = load_and_validate_str(toml).expect_err("should produce errors");
    let found = errors.iter().any(|e| {
        matches!(e, ConfigError::UnknownKey { section, key, hint, valid_keys, span, .. } if {
            section.as_deref() == Some("scheduler")
                && key == "tick_intreval_secs"
                && *hint == Some(KeyHint::Typo("tick_interval_secs".into()))
                && valid_keys.contains("tolerance_secs")
                && !valid_keys.contains("ttl_hours")
                && span.is_some()
        })
    });
    assert!(found, "got: {errors:?}");
}

#[test]
fn key_in_the_wrong_section_names_its_home() {
    let toml = r#"
[scheduler]
ttl_hours = 12
"#;
    let errors = load_and_validate_str(toml).expect_err("should produce errors");
    let help = errors
        .iter()
        .find(|e| e.key() == Some("ttl_hours"))
        .and_then(|e| e.help())
        .map(|h| h.to_string())
        .expect("help for misplaced key");
    assert_eq!(help, "`ttl_hours` belongs under [retention]; move it there");
}

#[test]
fn invalid_type_points_at_the_value() {
    let toml = r#"
[retention]
ttl_hours = "a day"
"#;
    let errors = load_and_validate_str(toml).expect_err("should reject invalid type");
    let span = errors
        .iter()
        .find_map(|e| match e {
            ConfigError::InvalidValue { key, span, .. } if key == "retention.ttl_hours" => *span,
            _ => None,
        })
        .unwrap_or_else(|| panic!("got: {errors:?}"));
    assert_eq!(&toml[span.offset()..span.offset() + span.len()], "\"a day\"");
}

#[test]
fn unknown_offline_policy_lists_the_choices() {
    let toml = r#"
[delivery]
push_offline_policy = "retry"
"#;
    let errors = load_and_validate_str(toml).expect_err("should reject policy");
    let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
    assert!(
        messages
            .iter()
            .any(|m| m.contains("`retry` is not one of: fail, queue")),
        "got: {messages:?}"
    );
}

#[test]
fn validation_errors_surface_through_loader() {
    let toml = r#"
[retention]
ttl_hours = 0

[delivery]
default_channels = ["push", "fax"]
"#;
    let errors = load_and_validate_str(toml).expect_err("should fail validation");
    let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
    assert!(messages.iter().any(|m| m.contains("ttl_hours")));
    assert!(messages.iter().any(|m| m.contains("`fax`")));
}

#[test]
fn tolerance_rule_labels_both_scheduler_keys() {
    let toml = "[scheduler]\ntick_interval_secs = 120\ntolerance_secs = 30\n";
    let errors = load_and_validate_str(toml).expect_err("should fail validation");
    let [
        ConfigError::Validation {
            key,
            help,
            span: Some(span),
            paired_span: Some(paired_span),
            src: Some(_),
            ..
        },
    ] = errors.as_slice()
    else {
        panic!("got: {errors:?}");
    };
    assert_eq!(key, "scheduler.tolerance_secs");
    assert_eq!(&toml[span.offset()..span.offset() + span.len()], "30");
    assert_eq!(
        &toml[paired_span.offset()..paired_span.offset() + paired_span.len()],
        "120"
    );
    assert!(help.as_deref().is_some_and(|h| h.contains("at least 60")));
}

#[test]
fn config_error_renders_with_miette() {
    use miette::GraphicalReportHandler;

    let toml = "[scheduler]\ntick_interval_secs = 120\ntolerance_secs = 30\n";
    let errors = load_and_validate_str(toml).expect_err("should fail validation");

    let mut buf = String::new();
    GraphicalReportHandler::new()
        .render_report(&mut buf, &errors[0])
        .expect("should render without error");
    assert!(buf.contains("scheduler.tolerance_secs"));
    assert!(buf.contains("checked against this"));
    assert!(buf.contains("<inline>"));
}
