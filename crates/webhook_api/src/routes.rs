//! HTTP routing configuration
//!
//! # Route Structure
//!
//! All routes are prefixed with `/api/v1`:
//!
//! - POST   /orgs/:org/events - Publish an event
//! - POST   /orgs/:org/webhooks - Register a webhook
//! - GET    /orgs/:org/webhooks - List webhooks
//! - GET    /orgs/:org/webhooks/:id - Get a webhook
//! - PATCH  /orgs/:org/webhooks/:id - Update a webhook
//! - DELETE /orgs/:org/webhooks/:id - Delete a webhook and its deliveries
//! - POST   /orgs/:org/webhooks/:id/disable - Disable a webhook
//! - POST   /orgs/:org/webhooks/:id/rotate-secret - Rotate the signing secret
//! - POST   /orgs/:org/webhooks/:id/test - Send a test delivery
//! - GET    /orgs/:org/webhooks/:id/deliveries - Delivery history
//! - GET    /orgs/:org/deliveries/:delivery_id - Get a delivery
//! - POST   /orgs/:org/deliveries/:delivery_id/deliver - Retry a delivery now
//! - GET    /health - Health check
//! - GET    /metrics - Prometheus metrics

use axum::{
    http::{header, Method},
    middleware,
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower_http::{
    cors::CorsLayer,
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

use crate::{handlers, middleware as api_middleware, AppState};

#[cfg(test)]
#[path = "routes_tests.rs"]
mod tests;

/// Upper bound for a single API request. Test deliveries wait for the
/// subscriber, so this stays above the outbound request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Create the complete API router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(false)
        .max_age(Duration::from_secs(3600));

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new())
        .on_response(DefaultOnResponse::new());

    let api_v1 = Router::new()
        .nest("/orgs/:org", organization_routes())
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics))
        .layer(middleware::from_fn(api_middleware::tracing_middleware))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(trace_layer)
        .layer(cors)
        .with_state(state);

    Router::new().nest("/api/v1", api_v1)
}

/// Organization-scoped routes (nested under /orgs/:org)
fn organization_routes() -> Router<AppState> {
    Router::new()
        .route("/events", post(handlers::publish_event))
        .route(
            "/webhooks",
            post(handlers::create_webhook).get(handlers::list_webhooks),
        )
        .route(
            "/webhooks/:id",
            get(handlers::get_webhook)
                .patch(handlers::update_webhook)
                .delete(handlers::delete_webhook),
        )
        .route("/webhooks/:id/disable", post(handlers::disable_webhook))
        .route("/webhooks/:id/rotate-secret", post(handlers::rotate_secret))
        .route("/webhooks/:id/test", post(handlers::test_webhook))
        .route("/webhooks/:id/deliveries", get(handlers::list_deliveries))
        .route("/deliveries/:delivery_id", get(handlers::get_delivery))
        .route(
            "/deliveries/:delivery_id/deliver",
            post(handlers::deliver_now),
        )
}
