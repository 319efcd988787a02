//! HTTP request handlers
//!
//! Each handler:
//! 1. Extracts path params, query params and body
//! 2. Translates HTTP types to engine types
//! 3. Calls the registry or publisher
//! 4. Translates the result to a response model

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use prometheus::{Encoder, TextEncoder};
use webhook_core::{DeliveryId, EventType, NewWebhook, OrganizationId, WebhookId, WebhookUpdate};

use crate::{
    errors::ApiError,
    models::{request::*, response::*},
    AppState,
};

#[cfg(test)]
#[path = "handlers_tests.rs"]
mod tests;

/// Page size used when `limit` is not given.
const DEFAULT_DELIVERY_PAGE: usize = 50;

/// POST /api/v1/orgs/:org/events
pub async fn publish_event(
    State(state): State<AppState>,
    Path(org): Path<OrganizationId>,
    Json(request): Json<PublishEventRequest>,
) -> Result<(StatusCode, Json<PublishEventResponse>), ApiError> {
    let event_type: EventType = request.event_type.trim().parse()?;
    let delivery_ids = state
        .publisher
        .publish(event_type, org, request.data)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(PublishEventResponse {
            event_type,
            delivery_ids,
        }),
    ))
}

/// POST /api/v1/orgs/:org/webhooks
pub async fn create_webhook(
    State(state): State<AppState>,
    Path(org): Path<OrganizationId>,
    Json(request): Json<CreateWebhookRequest>,
) -> Result<(StatusCode, Json<CreateWebhookResponse>), ApiError> {
    let new_webhook = NewWebhook::try_from(request)?;
    let created = state.registry.create(org, new_webhook).await?;
    Ok((StatusCode::CREATED, Json(created.into())))
}

/// GET /api/v1/orgs/:org/webhooks
pub async fn list_webhooks(
    State(state): State<AppState>,
    Path(org): Path<OrganizationId>,
) -> Result<Json<ListWebhooksResponse>, ApiError> {
    let webhooks = state.registry.list(org).await?;
    Ok(Json(ListWebhooksResponse {
        webhooks: webhooks.iter().map(WebhookResponse::from).collect(),
    }))
}

/// GET /api/v1/orgs/:org/webhooks/:id
pub async fn get_webhook(
    State(state): State<AppState>,
    Path((org, id)): Path<(OrganizationId, WebhookId)>,
) -> Result<Json<WebhookResponse>, ApiError> {
    let webhook = state.registry.get(org, id).await?;
    Ok(Json(WebhookResponse::from(&webhook)))
}

/// PATCH /api/v1/orgs/:org/webhooks/:id
pub async fn update_webhook(
    State(state): State<AppState>,
    Path((org, id)): Path<(OrganizationId, WebhookId)>,
    Json(request): Json<UpdateWebhookRequest>,
) -> Result<Json<WebhookResponse>, ApiError> {
    let update = WebhookUpdate::try_from(request)?;
    let webhook = state.registry.update(org, id, update).await?;
    Ok(Json(WebhookResponse::from(&webhook)))
}

/// DELETE /api/v1/orgs/:org/webhooks/:id
pub async fn delete_webhook(
    State(state): State<AppState>,
    Path((org, id)): Path<(OrganizationId, WebhookId)>,
) -> Result<StatusCode, ApiError> {
    state.registry.delete(org, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/orgs/:org/webhooks/:id/disable
pub async fn disable_webhook(
    State(state): State<AppState>,
    Path((org, id)): Path<(OrganizationId, WebhookId)>,
) -> Result<Json<WebhookResponse>, ApiError> {
    let webhook = state.registry.disable(org, id).await?;
    Ok(Json(WebhookResponse::from(&webhook)))
}

/// POST /api/v1/orgs/:org/webhooks/:id/rotate-secret
pub async fn rotate_secret(
    State(state): State<AppState>,
    Path((org, id)): Path<(OrganizationId, WebhookId)>,
) -> Result<Json<RotateSecretResponse>, ApiError> {
    let secret = state.registry.rotate_secret(org, id).await?;
    Ok(Json(RotateSecretResponse::new(id, &secret)))
}

/// POST /api/v1/orgs/:org/webhooks/:id/test
///
/// The body is optional. Without one the default test payload is sent.
pub async fn test_webhook(
    State(state): State<AppState>,
    Path((org, id)): Path<(OrganizationId, WebhookId)>,
    body: Option<Json<TestDeliveryRequest>>,
) -> Result<Json<DeliveryOutcomeResponse>, ApiError> {
    let data = body.and_then(|Json(request)| request.data);
    let outcome = state.registry.test_delivery(org, id, data).await?;
    Ok(Json(outcome.into()))
}

/// GET /api/v1/orgs/:org/webhooks/:id/deliveries?limit=
pub async fn list_deliveries(
    State(state): State<AppState>,
    Path((org, id)): Path<(OrganizationId, WebhookId)>,
    Query(query): Query<ListDeliveriesQuery>,
) -> Result<Json<ListDeliveriesResponse>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_DELIVERY_PAGE);
    let deliveries = state.registry.list_deliveries(org, id, limit).await?;
    Ok(Json(ListDeliveriesResponse {
        deliveries: deliveries.iter().map(DeliveryResponse::from).collect(),
    }))
}

/// GET /api/v1/orgs/:org/deliveries/:delivery_id
pub async fn get_delivery(
    State(state): State<AppState>,
    Path((org, delivery_id)): Path<(OrganizationId, DeliveryId)>,
) -> Result<Json<DeliveryResponse>, ApiError> {
    let delivery = state.registry.get_delivery(org, delivery_id).await?;
    Ok(Json(DeliveryResponse::from(&delivery)))
}

/// POST /api/v1/orgs/:org/deliveries/:delivery_id/deliver
///
/// Runs the next attempt now. 409 if the delivery is terminal or in flight.
pub async fn deliver_now(
    State(state): State<AppState>,
    Path((org, delivery_id)): Path<(OrganizationId, DeliveryId)>,
) -> Result<Json<DeliveryOutcomeResponse>, ApiError> {
    let outcome = state.registry.deliver(org, delivery_id).await?;
    Ok(Json(outcome.into()))
}

/// GET /api/v1/health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// GET /api/v1/metrics
///
/// Prometheus text exposition of the engine metrics.
pub async fn metrics(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&state.metrics.gather(), &mut buffer)
        .map_err(|e| ApiError::internal(format!("Failed to encode metrics: {e}")))?;
    let body = String::from_utf8(buffer)
        .map_err(|e| ApiError::internal(format!("Metrics are not valid UTF-8: {e}")))?;

    Ok(([(header::CONTENT_TYPE, encoder.format_type().to_string())], body))
}
