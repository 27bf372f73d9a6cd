//! Assistant Relay
//!
//! A backend relay between a chat client and a hosted assistant runtime,
//! extended with local tools that look up lab/course content.
//!
//! # Architecture
//!
//! - **Server**: Axum-based HTTP server with CORS and rate limiting
//! - **Run Orchestration**: thread/run lifecycle with polling, tool calls and cancellation
//! - **Tools**: name-keyed registry of lab lookups, dispatched concurrently per batch
//! - **Content**: client for the lab platform's content API
//!
//! # Modules
//!
//! - [`assistant`]: runtime types, HTTP client, orchestrator and reply extraction
//! - [`tools`]: tool trait, registry, dispatcher and lab tools
//! - [`content`]: lab hierarchy model and lookup client
//! - [`server`]: router, handlers and service wiring

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::implicit_hasher)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]
#![allow(clippy::unused_async)]

pub mod assistant;
pub mod config;
pub mod content;
pub mod error;
pub mod security;
pub mod server;
pub mod telemetry;
pub mod tools;

use crate::assistant::RunOrchestrator;
use crate::config::AppConfig;
use crate::security::rate_limit::AppRateLimiter;

use std::sync::Arc;

/// Application state shared across all handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Run orchestrator for relayed messages.
    pub orchestrator: Arc<RunOrchestrator>,
    /// Global Rate Limiter
    pub rate_limiter: Arc<AppRateLimiter>,
    /// Global Configuration
    pub config: Arc<AppConfig>,
}
