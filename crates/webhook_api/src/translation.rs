//! Translation between HTTP types and engine types
//!
//! Event type and status names arrive as strings and are parsed here, so an
//! unknown name becomes a `ValidationError` (400) rather than an opaque
//! deserialization rejection.

use webhook_core::{
    EventType, NewWebhook, ValidationError, WebhookStatus, WebhookUpdate,
};

use crate::models::request::{CreateWebhookRequest, UpdateWebhookRequest};

#[cfg(test)]
#[path = "translation_tests.rs"]
mod tests;

/// Parse event type names. Duplicates are kept; the registry collapses them.
pub fn parse_event_types(names: &[String]) -> Result<Vec<EventType>, ValidationError> {
    names.iter().map(|name| name.trim().parse()).collect()
}

pub fn parse_status(name: &str) -> Result<WebhookStatus, ValidationError> {
    match name.trim() {
        "active" => Ok(WebhookStatus::Active),
        "paused" => Ok(WebhookStatus::Paused),
        "disabled" => Ok(WebhookStatus::Disabled),
        other => Err(ValidationError::invalid_format(
            "status",
            format!("'{other}' is not one of active, paused, disabled"),
        )),
    }
}

impl TryFrom<CreateWebhookRequest> for NewWebhook {
    type Error = ValidationError;

    fn try_from(request: CreateWebhookRequest) -> Result<Self, Self::Error> {
        Ok(NewWebhook {
            url: request.url,
            events: parse_event_types(&request.events)?,
            headers: request.headers,
            max_retries: request.max_retries,
            retry_delay: request.retry_delay,
            description: request.description,
        })
    }
}

impl TryFrom<UpdateWebhookRequest> for WebhookUpdate {
    type Error = ValidationError;

    fn try_from(request: UpdateWebhookRequest) -> Result<Self, Self::Error> {
        Ok(WebhookUpdate {
            url: request.url,
            events: request
                .events
                .as_deref()
                .map(parse_event_types)
                .transpose()?,
            headers: request.headers,
            max_retries: request.max_retries,
            retry_delay: request.retry_delay,
            status: request.status.as_deref().map(parse_status).transpose()?,
            description: request.description,
        })
    }
}
