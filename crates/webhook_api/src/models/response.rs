//! HTTP response type definitions
//!
//! Response types are built from engine types via `From` and serialize as
//! camelCase JSON. Webhook secrets appear only in [`CreateWebhookResponse`]
//! and [`RotateSecretResponse`].

use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use webhook_core::{
    CreatedWebhook, DeliveryId, DeliveryOutcome, DeliveryStatus, EventEnvelope, EventId,
    EventType, OrganizationId, Webhook, WebhookDelivery, WebhookId, WebhookSecret, WebhookStatus,
};

#[cfg(test)]
#[path = "response_tests.rs"]
mod tests;

/// Webhook configuration as returned by the API. Never includes the secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookResponse {
    pub id: WebhookId,
    pub organization_id: OrganizationId,
    pub url: String,
    pub events: Vec<EventType>,
    pub headers: BTreeMap<String, String>,
    pub max_retries: u32,
    pub retry_delay: u32,
    pub status: WebhookStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub success_count: u64,
    pub failure_count: u64,
    pub last_triggered_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Webhook> for WebhookResponse {
    fn from(webhook: &Webhook) -> Self {
        Self {
            id: webhook.id,
            organization_id: webhook.organization_id,
            url: webhook.url.clone(),
            events: webhook.events.iter().copied().collect(),
            headers: webhook.headers.clone(),
            max_retries: webhook.max_retries,
            retry_delay: webhook.retry_delay,
            status: webhook.status,
            description: webhook.description.clone(),
            success_count: webhook.success_count,
            failure_count: webhook.failure_count,
            last_triggered_at: webhook.last_triggered_at,
            last_success_at: webhook.last_success_at,
            last_failure_at: webhook.last_failure_at,
            created_at: webhook.created_at,
            updated_at: webhook.updated_at,
        }
    }
}

/// Response to webhook registration. The only time the secret is shown,
/// apart from rotation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWebhookResponse {
    pub webhook: WebhookResponse,
    pub secret: String,
}

impl From<CreatedWebhook> for CreateWebhookResponse {
    fn from(created: CreatedWebhook) -> Self {
        Self {
            webhook: WebhookResponse::from(&created.webhook),
            secret: created.secret.expose_secret().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RotateSecretResponse {
    pub webhook_id: WebhookId,
    pub secret: String,
}

impl RotateSecretResponse {
    pub fn new(webhook_id: WebhookId, secret: &WebhookSecret) -> Self {
        Self {
            webhook_id,
            secret: secret.expose_secret().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListWebhooksResponse {
    pub webhooks: Vec<WebhookResponse>,
}

/// Response to a publish call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishEventResponse {
    pub event_type: EventType,
    pub delivery_ids: Vec<DeliveryId>,
}

/// Full delivery record, including the archived response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryResponse {
    pub id: DeliveryId,
    pub webhook_id: WebhookId,
    pub event_type: EventType,
    pub event_id: EventId,
    pub payload: EventEnvelope,
    pub status: DeliveryStatus,
    pub attempt_count: u32,
    pub max_attempts: u32,
    pub response_status: Option<u16>,
    pub response_body: Option<String>,
    pub response_headers: Option<BTreeMap<String, String>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub first_attempted_at: Option<DateTime<Utc>>,
    pub last_attempted_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub next_retry_at: Option<DateTime<Utc>>,
}

impl From<&WebhookDelivery> for DeliveryResponse {
    fn from(delivery: &WebhookDelivery) -> Self {
        Self {
            id: delivery.id,
            webhook_id: delivery.webhook_id,
            event_type: delivery.event_type,
            event_id: delivery.event_id,
            payload: delivery.payload.clone(),
            status: delivery.status,
            attempt_count: delivery.attempt_count,
            max_attempts: delivery.max_attempts,
            response_status: delivery.response_status,
            response_body: delivery.response_body.clone(),
            response_headers: delivery.response_headers.clone(),
            error_message: delivery.error_message.clone(),
            created_at: delivery.created_at,
            first_attempted_at: delivery.first_attempted_at,
            last_attempted_at: delivery.last_attempted_at,
            completed_at: delivery.completed_at,
            next_retry_at: delivery.next_retry_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDeliveriesResponse {
    pub deliveries: Vec<DeliveryResponse>,
}

/// Result of one executed attempt (test delivery or manual retry).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryOutcomeResponse {
    pub delivery_id: DeliveryId,
    pub status: DeliveryStatus,
    pub attempt_count: u32,
    pub response_status: Option<u16>,
    pub error_message: Option<String>,
    pub next_retry_at: Option<DateTime<Utc>>,
}

impl From<DeliveryOutcome> for DeliveryOutcomeResponse {
    fn from(outcome: DeliveryOutcome) -> Self {
        Self {
            delivery_id: outcome.delivery_id,
            status: outcome.status,
            attempt_count: outcome.attempt_count,
            response_status: outcome.response_status,
            error_message: outcome.error_message,
            next_retry_at: outcome.next_retry_at,
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// "healthy" or "unhealthy"
    pub status: String,

    pub version: String,

    /// ISO 8601
    pub timestamp: String,
}
