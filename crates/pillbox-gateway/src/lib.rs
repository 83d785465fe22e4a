// SPDX-FileCopyrightText: 2026 Pillbox Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP/WebSocket gateway for the reminder engine.
//!
//! Hosts the REST surface over the acknowledgment handler and preference
//! service, the `/ws` real-time session, and the push channel that the
//! dispatcher fans out to.

pub mod auth;
pub mod handlers;
pub mod push;
pub mod registry;
pub mod server;
pub mod ws;

pub use auth::{AuthConfig, CurrentUser};
pub use push::{NO_ACTIVE_SESSION, PushChannel};
pub use registry::{BroadcastOutcome, ConnectionId, ConnectionRegistry};
pub use server::{GatewayState, HealthState, ServerConfig, build_router, start_server};
pub use ws::{ClientEvent, ServerEvent};
