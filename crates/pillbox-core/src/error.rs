// SPDX-FileCopyrightText: 2026 Pillbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Pillbox reminder engine.

use thiserror::Error;

/// The primary error type used across all Pillbox crates.
#[derive(Debug, Error)]
pub enum PillboxError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Delivery channel errors (transport unreachable, provider rejection, no session).
    #[error("channel error: {message}")]
    Channel {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A referenced record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The caller does not own the record it tried to touch.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Caller supplied a value that cannot be processed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl PillboxError {
    /// Shorthand for a channel error without an underlying source.
    pub fn channel(message: impl Into<String>) -> Self {
        Self::Channel {
            message: message.into(),
            source: None,
        }
    }

    /// Shorthand for a storage error wrapping any displayable failure.
    pub fn storage(err: impl std::fmt::Display) -> Self {
        Self::Storage {
            source: err.to_string().into(),
        }
    }

    /// Text recorded in `DeliveryAttempt::error` when a channel fails.
    ///
    /// Channel errors keep their bare message (e.g. `no active session`);
    /// everything else uses the full display form.
    pub fn delivery_reason(&self) -> String {
        match self {
            Self::Channel { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}
