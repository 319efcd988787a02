//! Webhook Engine REST API
//!
//! This crate exposes the webhook engine over HTTP: webhook management,
//! event publishing, delivery history and manual deliveries, plus health
//! and Prometheus metrics endpoints.
//!
//! # Architecture
//!
//! This crate is the HTTP layer and handles:
//! - HTTP request/response translation
//! - Error mapping from engine errors to HTTP
//! - Routing and server configuration
//!
//! The dependency flows HTTP API → engine, never the reverse.

use std::sync::Arc;

use webhook_core::{EventPublisher, WebhookEngine, WebhookRegistry};

pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod server;
pub mod translation;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{AppConfig, ConfigError, LogFormat, ServerConfig};
pub use errors::{ApiError, ErrorResponse};
pub use models::{request, response};
pub use server::{ApiConfig, ApiServer};

/// API version
pub const API_VERSION: &str = "v1";

/// Default API port
pub const DEFAULT_PORT: u16 = 8080;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<WebhookRegistry>,
    pub publisher: Arc<EventPublisher>,
    /// Registry the engine metrics are registered on, served at `/metrics`
    pub metrics: prometheus::Registry,
}

impl AppState {
    pub fn new(
        registry: Arc<WebhookRegistry>,
        publisher: Arc<EventPublisher>,
        metrics: prometheus::Registry,
    ) -> Self {
        Self {
            registry,
            publisher,
            metrics,
        }
    }

    /// State backed by a running engine.
    pub fn from_engine(engine: &WebhookEngine, metrics: prometheus::Registry) -> Self {
        Self::new(engine.registry(), engine.publisher(), metrics)
    }
}
