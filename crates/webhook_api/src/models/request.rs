//! HTTP request type definitions
//!
//! Request types accept plain strings for event types and statuses. They are
//! translated to engine types, with validation, in [`crate::translation`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;

/// HTTP request to publish an event.
///
/// # Example
///
/// ```json
/// {
///   "eventType": "content.published",
///   "data": { "contentId": "c-42" }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct PublishEventRequest {
    pub event_type: String,

    #[serde(default)]
    pub data: Map<String, Value>,
}

/// HTTP request to register a webhook.
///
/// Omitted retry settings fall back to the server defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct CreateWebhookRequest {
    pub url: String,

    /// Subscribed event type names, e.g. `content.published`
    pub events: Vec<String>,

    /// Custom headers sent with every delivery
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,

    /// Base retry delay in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_delay: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// HTTP request to change a webhook. Omitted fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct UpdateWebhookRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub events: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_delay: Option<u32>,

    /// `active`, `paused` or `disabled`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Optional body of a test delivery.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct TestDeliveryRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Map<String, Value>>,
}

/// Query parameters for delivery history.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListDeliveriesQuery {
    pub limit: Option<usize>,
}
