//! Webhook subscriber configuration
//!
//! A [`Webhook`] is an organization's subscription: where to send events,
//! which events, how to sign them and how hard to retry.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::ValidationError;
use crate::event::EventType;
use crate::ids::{OrganizationId, WebhookId};
use crate::secrets::WebhookSecret;
use crate::signer;

#[cfg(test)]
#[path = "webhook_tests.rs"]
mod tests;

/// Upper bound on `max_retries`.
pub const MAX_RETRIES_LIMIT: u32 = 20;

/// Lower bound on the base retry delay, in seconds.
pub const MIN_RETRY_DELAY_SECS: u32 = 1;

/// Upper bound on the base retry delay, in seconds (one day).
pub const MAX_RETRY_DELAY_SECS: u32 = 86_400;

/// Lifecycle status of a webhook. Only `Active` webhooks receive deliveries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebhookStatus {
    Active,
    Paused,
    Disabled,
}

impl WebhookStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookStatus::Active => "active",
            WebhookStatus::Paused => "paused",
            WebhookStatus::Disabled => "disabled",
        }
    }
}

impl std::fmt::Display for WebhookStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered webhook.
#[derive(Debug, Clone)]
pub struct Webhook {
    pub id: WebhookId,
    pub organization_id: OrganizationId,
    pub url: String,
    pub secret: WebhookSecret,
    pub events: BTreeSet<EventType>,
    pub headers: BTreeMap<String, String>,
    pub max_retries: u32,
    /// Base delay in seconds; doubles with each failed attempt.
    pub retry_delay: u32,
    pub status: WebhookStatus,
    pub description: Option<String>,
    pub success_count: u64,
    pub failure_count: u64,
    pub last_triggered_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Webhook {
    /// Whether this webhook should receive an event of the given type.
    pub fn accepts_event(&self, event_type: EventType) -> bool {
        self.status == WebhookStatus::Active && self.events.contains(&event_type)
    }

    /// Attempts allowed for a delivery created now: the initial try plus retries.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }
}

/// Input for registering a webhook.
#[derive(Debug, Clone, Default)]
pub struct NewWebhook {
    pub url: String,
    pub events: Vec<EventType>,
    pub headers: BTreeMap<String, String>,
    /// Falls back to the registry default when `None`.
    pub max_retries: Option<u32>,
    /// Falls back to the registry default when `None`.
    pub retry_delay: Option<u32>,
    pub description: Option<String>,
}

/// Partial update of a webhook's configuration. `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct WebhookUpdate {
    pub url: Option<String>,
    pub events: Option<Vec<EventType>>,
    pub headers: Option<BTreeMap<String, String>>,
    pub max_retries: Option<u32>,
    pub retry_delay: Option<u32>,
    pub status: Option<WebhookStatus>,
    pub description: Option<String>,
}

/// Validates a target URL: absolute, http(s), with a host.
pub fn validate_url(raw: &str, require_https: bool) -> Result<(), ValidationError> {
    if raw.trim().is_empty() {
        return Err(ValidationError::empty_field("url"));
    }

    let url = Url::parse(raw)
        .map_err(|e| ValidationError::invalid_format("url", format!("not an absolute URL: {e}")))?;

    match url.scheme() {
        "https" => {}
        "http" if !require_https => {}
        "http" => {
            return Err(ValidationError::invalid_format(
                "url",
                "only https URLs are allowed",
            ))
        }
        other => {
            return Err(ValidationError::invalid_format(
                "url",
                format!("unsupported scheme '{other}'"),
            ))
        }
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(ValidationError::invalid_format("url", "missing host"));
    }

    Ok(())
}

/// Validates the subscribed event set and returns it deduplicated.
pub fn validate_events(events: &[EventType]) -> Result<BTreeSet<EventType>, ValidationError> {
    if events.is_empty() {
        return Err(ValidationError::empty_field("events"));
    }

    if let Some(event_type) = events.iter().find(|e| !e.is_subscribable()) {
        return Err(ValidationError::EventTypeNotAllowed {
            value: event_type.to_string(),
        });
    }

    Ok(events.iter().copied().collect())
}

/// Validates custom header names and values.
pub fn validate_headers(headers: &BTreeMap<String, String>) -> Result<(), ValidationError> {
    for (name, value) in headers {
        if signer::is_reserved_header(name) {
            return Err(ValidationError::ReservedHeader { name: name.clone() });
        }
        if HeaderName::from_bytes(name.as_bytes()).is_err() {
            return Err(ValidationError::invalid_format(
                "headers",
                format!("invalid header name '{name}'"),
            ));
        }
        if HeaderValue::from_str(value).is_err() {
            return Err(ValidationError::invalid_format(
                "headers",
                format!("invalid value for header '{name}'"),
            ));
        }
    }
    Ok(())
}

/// Validates the retry policy bounds.
pub fn validate_retry_policy(max_retries: u32, retry_delay: u32) -> Result<(), ValidationError> {
    if max_retries > MAX_RETRIES_LIMIT {
        return Err(ValidationError::out_of_range(
            "max_retries",
            i64::from(max_retries),
            0,
            i64::from(MAX_RETRIES_LIMIT),
        ));
    }

    if !(MIN_RETRY_DELAY_SECS..=MAX_RETRY_DELAY_SECS).contains(&retry_delay) {
        return Err(ValidationError::out_of_range(
            "retry_delay",
            i64::from(retry_delay),
            i64::from(MIN_RETRY_DELAY_SECS),
            i64::from(MAX_RETRY_DELAY_SECS),
        ));
    }

    Ok(())
}
