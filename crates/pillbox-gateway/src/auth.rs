// SPDX-FileCopyrightText: 2026 Pillbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Authentication middleware for the gateway.
//!
//! Session issuance happens upstream. The authenticating proxy presents the
//! shared bearer token and names the end user in `X-User-Id`; the middleware
//! checks both and exposes the user as a [`CurrentUser`] extension.
//!
//! When no token is configured, all requests are rejected (fail-closed).

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};

pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Clone)]
pub struct AuthConfig {
    /// Expected bearer token. `None` rejects everything.
    pub bearer_token: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field(
                "bearer_token",
                &self.bearer_token.as_ref().map(|_| "[redacted]"),
            )
            .finish()
    }
}

impl AuthConfig {
    pub fn token_matches(&self, presented: Option<&str>) -> bool {
        match (self.bearer_token.as_deref(), presented) {
            (Some(expected), Some(token)) => constant_time_eq(expected.as_bytes(), token.as_bytes()),
            _ => false,
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// The end user a request acts for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser(pub String);

pub async fn auth_middleware(
    State(auth): State<AuthConfig>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if auth.bearer_token.is_none() {
        tracing::error!("gateway has no bearer token configured -- rejecting request");
        return Err(StatusCode::UNAUTHORIZED);
    }

    let token = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    if !auth.token_matches(token) {
        return Err(StatusCode::UNAUTHORIZED);
    }

    let user_id = request
        .headers()
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    request.extensions_mut().insert(CurrentUser(user_id));
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_must_match_exactly() {
        let config = AuthConfig {
            bearer_token: Some("secret-token".to_string()),
        };
        assert!(config.token_matches(Some("secret-token")));
        assert!(!config.token_matches(Some("secret-tokem")));
        assert!(!config.token_matches(Some("secret")));
        assert!(!config.token_matches(None));
    }

    #[test]
    fn no_configured_token_matches_nothing() {
        let config = AuthConfig { bearer_token: None };
        assert!(!config.token_matches(Some("")));
    }

    #[test]
    fn debug_redacts_token() {
        let config = AuthConfig {
            bearer_token: Some("secret-token".to_string()),
        };
        let debug_output = format!("{:?}", config);
        assert!(!debug_output.contains("secret-token"));
        assert!(debug_output.contains("[redacted]"));
    }
}
