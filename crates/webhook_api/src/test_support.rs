//! Shared fixtures for API tests.

use std::sync::Arc;

use webhook_core::{
    EngineConfig, InMemoryStore, PrometheusEventMetrics, SchedulerConfig, SystemClock,
    WebhookEngine,
};

use crate::AppState;

/// A running engine on an in-memory store and the state wrapping it.
///
/// The scheduler interval is long so tests drive deliveries explicitly.
pub(crate) fn engine_state() -> (AppState, WebhookEngine) {
    let registry = prometheus::Registry::new();
    let metrics = PrometheusEventMetrics::new(&registry).unwrap();
    let config = EngineConfig {
        scheduler: SchedulerConfig {
            interval_secs: 3600,
            ..Default::default()
        },
        ..Default::default()
    };

    let engine = WebhookEngine::start(
        &config,
        Arc::new(InMemoryStore::new()),
        Arc::new(SystemClock),
        Arc::new(metrics),
    )
    .unwrap();

    (AppState::from_engine(&engine, registry), engine)
}
