// SPDX-FileCopyrightText: 2026 Pillbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Pillbox reminder engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Every section and the keys it accepts, in file order.
///
/// Drives `PILLBOX_<SECTION>_<KEY>` mapping and misplaced-key hints.
pub const SECTION_KEYS: &[(&str, &[&str])] = &[
    ("service", &["name", "log_level"]),
    (
        "scheduler",
        &[
            "tick_interval_secs",
            "tolerance_secs",
            "recompile_interval_secs",
            "default_utc_offset_minutes",
        ],
    ),
    ("retention", &["ttl_hours", "sweep_interval_secs"]),
    (
        "delivery",
        &[
            "default_channels",
            "channel_timeout_secs",
            "push_offline_policy",
            "push_offline_queue_limit",
        ],
    ),
    ("storage", &["database_path", "wal_mode"]),
    ("gateway", &["enabled", "host", "port", "bearer_token"]),
    (
        "email",
        &["enabled", "smtp_host", "smtp_port", "username", "password", "from_address"],
    ),
    (
        "sms",
        &["enabled", "account_sid", "auth_token", "from_number", "api_base_url"],
    ),
    ("webhook", &["enabled", "default_url", "signing_secret", "timeout_secs"]),
    ("metrics", &["enabled"]),
];

/// Keys accepted by `section`, or `None` for an unknown section.
pub fn section_keys(section: &str) -> Option<&'static [&'static str]> {
    SECTION_KEYS
        .iter()
        .find(|(name, _)| *name == section)
        .map(|(_, keys)| *keys)
}

/// Top-level Pillbox configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PillboxConfig {
    #[serde(default)]
    pub service: ServiceConfig,

    /// Tick loop and schedule compilation.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Notification lifetime and reaper cadence.
    #[serde(default)]
    pub retention: RetentionConfig,

    /// Channel fan-out behaviour.
    #[serde(default)]
    pub delivery: DeliveryConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    /// HTTP/WebSocket gateway.
    #[serde(default)]
    pub gateway: GatewayConfig,

    #[serde(default)]
    pub email: EmailConfig,

    #[serde(default)]
    pub sms: SmsConfig,

    #[serde(default)]
    pub webhook: WebhookConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Process identity and logging.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "pillbox".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Trigger clock and compiler settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Seconds between due-detection ticks.
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,

    /// Half-width of the on-time band around a fire instant, in seconds.
    #[serde(default = "default_tolerance_secs")]
    pub tolerance_secs: u64,

    /// Seconds between full recompiles from the medication registry.
    #[serde(default = "default_recompile_interval_secs")]
    pub recompile_interval_secs: u64,

    /// UTC offset applied to schedules that do not carry their own.
    #[serde(default)]
    pub default_utc_offset_minutes: i32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval_secs(),
            tolerance_secs: default_tolerance_secs(),
            recompile_interval_secs: default_recompile_interval_secs(),
            default_utc_offset_minutes: 0,
        }
    }
}

fn default_tick_interval_secs() -> u64 {
    30
}

fn default_tolerance_secs() -> u64 {
    60
}

fn default_recompile_interval_secs() -> u64 {
    300
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RetentionConfig {
    /// Hours a notification lives past its fire instant.
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: u32,

    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            ttl_hours: default_ttl_hours(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

fn default_ttl_hours() -> u32 {
    24
}

fn default_sweep_interval_secs() -> u64 {
    300
}

/// What the push channel does when a user has no live connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PushOfflinePolicy {
    /// Fail the attempt with `no active session`.
    #[default]
    Fail,
    /// Park the payload and deliver it on the next connect.
    Queue,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DeliveryConfig {
    /// Channels every reminder is attempted on, before user opt-ins.
    /// Names: `push`, `in_app`, `email`, `sms`, `webhook`.
    #[serde(default = "default_channels")]
    pub default_channels: Vec<String>,

    /// Upper bound on a single channel handoff.
    #[serde(default = "default_channel_timeout_secs")]
    pub channel_timeout_secs: u64,

    #[serde(default)]
    pub push_offline_policy: PushOfflinePolicy,

    /// Per-user cap on parked push payloads under the `queue` policy.
    #[serde(default = "default_push_offline_queue_limit")]
    pub push_offline_queue_limit: usize,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            default_channels: default_channels(),
            channel_timeout_secs: default_channel_timeout_secs(),
            push_offline_policy: PushOfflinePolicy::default(),
            push_offline_queue_limit: default_push_offline_queue_limit(),
        }
    }
}

fn default_channels() -> Vec<String> {
    vec!["push".to_string(), "in_app".to_string()]
}

fn default_channel_timeout_secs() -> u64 {
    10
}

fn default_push_offline_queue_limit() -> usize {
    50
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_local_dir()
        .map(|d| d.join("pillbox").join("pillbox.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("pillbox.db"))
        .display()
        .to_string()
}

fn default_wal_mode() -> bool {
    true
}

/// HTTP/WebSocket gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_gateway_host")]
    pub host: String,

    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bearer token shared with the upstream authenticating proxy.
    #[serde(default)]
    pub bearer_token: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_gateway_host(),
            port: default_gateway_port(),
            bearer_token: None,
        }
    }
}

fn default_gateway_host() -> String {
    "127.0.0.1".to_string()
}

fn default_gateway_port() -> u16 {
    3000
}

/// SMTP email channel.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EmailConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub smtp_host: Option<String>,

    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// `From:` address on reminder mail.
    #[serde(default)]
    pub from_address: Option<String>,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_host: None,
            smtp_port: default_smtp_port(),
            username: None,
            password: None,
            from_address: None,
        }
    }
}

fn default_smtp_port() -> u16 {
    587
}

/// Twilio SMS channel.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SmsConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub account_sid: Option<String>,

    #[serde(default)]
    pub auth_token: Option<String>,

    /// Sender number in E.164 format.
    #[serde(default)]
    pub from_number: Option<String>,

    /// Override of the Twilio API base URL.
    #[serde(default = "default_sms_api_base_url")]
    pub api_base_url: String,
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            account_sid: None,
            auth_token: None,
            from_number: None,
            api_base_url: default_sms_api_base_url(),
        }
    }
}

fn default_sms_api_base_url() -> String {
    "https://api.twilio.com".to_string()
}

/// Outbound webhook channel.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WebhookConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Used when the recipient has no webhook URL of their own.
    #[serde(default)]
    pub default_url: Option<String>,

    /// HMAC-SHA256 key for `X-Pillbox-Signature`. Unsigned when absent.
    #[serde(default)]
    pub signing_secret: Option<String>,

    #[serde(default = "default_webhook_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            default_url: None,
            signing_secret: None,
            timeout_secs: default_webhook_timeout_secs(),
        }
    }
}

fn default_webhook_timeout_secs() -> u64 {
    10
}

/// Prometheus metrics configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
        }
    }
}

fn default_metrics_enabled() -> bool {
    true
}
