//! Event types and the event envelope sent to subscribers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;
use crate::ids::{EventId, OrganizationId};

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;

/// The fixed set of domain events a webhook can subscribe to.
///
/// The wire form is the dotted name, e.g. `content.published`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "content.created")]
    ContentCreated,
    #[serde(rename = "content.updated")]
    ContentUpdated,
    #[serde(rename = "content.published")]
    ContentPublished,
    #[serde(rename = "content.unpublished")]
    ContentUnpublished,
    #[serde(rename = "content.deleted")]
    ContentDeleted,
    #[serde(rename = "media.uploaded")]
    MediaUploaded,
    #[serde(rename = "media.updated")]
    MediaUpdated,
    #[serde(rename = "media.deleted")]
    MediaDeleted,
    #[serde(rename = "user.created")]
    UserCreated,
    #[serde(rename = "user.updated")]
    UserUpdated,
    #[serde(rename = "user.deleted")]
    UserDeleted,
    /// Synthetic event used by manual test deliveries. Not subscribable.
    #[serde(rename = "webhook.test")]
    WebhookTest,
}

impl EventType {
    /// Every event type, including the synthetic test event.
    pub const ALL: [EventType; 12] = [
        EventType::ContentCreated,
        EventType::ContentUpdated,
        EventType::ContentPublished,
        EventType::ContentUnpublished,
        EventType::ContentDeleted,
        EventType::MediaUploaded,
        EventType::MediaUpdated,
        EventType::MediaDeleted,
        EventType::UserCreated,
        EventType::UserUpdated,
        EventType::UserDeleted,
        EventType::WebhookTest,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::ContentCreated => "content.created",
            EventType::ContentUpdated => "content.updated",
            EventType::ContentPublished => "content.published",
            EventType::ContentUnpublished => "content.unpublished",
            EventType::ContentDeleted => "content.deleted",
            EventType::MediaUploaded => "media.uploaded",
            EventType::MediaUpdated => "media.updated",
            EventType::MediaDeleted => "media.deleted",
            EventType::UserCreated => "user.created",
            EventType::UserUpdated => "user.updated",
            EventType::UserDeleted => "user.deleted",
            EventType::WebhookTest => "webhook.test",
        }
    }

    /// Whether webhooks may subscribe to this event and callers may publish it.
    pub fn is_subscribable(&self) -> bool {
        !matches!(self, EventType::WebhookTest)
    }

    /// All event types a webhook can subscribe to.
    pub fn subscribable() -> impl Iterator<Item = EventType> {
        Self::ALL.into_iter().filter(EventType::is_subscribable)
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|event_type| event_type.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownEventType {
                value: s.to_string(),
            })
    }
}

/// The canonical JSON object sent to every subscriber of one publish call.
///
/// Field order is fixed by declaration order and keys inside `data` are kept
/// sorted by `serde_json::Map`, so [`EventEnvelope::canonical_bytes`] is
/// stable for a given envelope. Receivers verify the signature over exactly
/// these bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_id: EventId,
    pub event_type: EventType,
    /// RFC 3339, UTC
    pub timestamp: DateTime<Utc>,
    pub organization_id: OrganizationId,
    pub data: serde_json::Map<String, serde_json::Value>,
}

impl EventEnvelope {
    /// Build an envelope with a fresh event ID.
    pub fn new(
        event_type: EventType,
        organization_id: OrganizationId,
        timestamp: DateTime<Utc>,
        data: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            event_id: EventId::new(),
            event_type,
            timestamp,
            organization_id,
            data,
        }
    }

    /// Compact JSON serialization used as the request body and signing input.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
