//! Error types for the webhook engine
//!
//! Three layers:
//! - [`ValidationError`] for rejected caller input (registry and publisher)
//! - [`StoreError`] for failures reported by a store implementation
//! - [`EngineError`], the error returned by every engine operation
//!
//! Failures of the subscriber endpoint itself are not errors here. They are
//! delivery outcomes recorded on the delivery record.

use thiserror::Error;

use crate::delivery::DeliveryStatus;
use crate::ids::{DeliveryId, WebhookId};

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;

/// Input that failed validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Field '{field}' cannot be empty")]
    EmptyField { field: String },

    #[error("Field '{field}' has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    #[error("Field '{field}' is out of range: {value} (allowed: {min}..={max})")]
    OutOfRange {
        field: String,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("Unknown event type: {value}")]
    UnknownEventType { value: String },

    #[error("Event type '{value}' cannot be used here")]
    EventTypeNotAllowed { value: String },

    #[error("Header '{name}' is reserved and cannot be set as a custom header")]
    ReservedHeader { name: String },
}

impl ValidationError {
    pub fn empty_field(field: impl Into<String>) -> Self {
        Self::EmptyField {
            field: field.into(),
        }
    }

    pub fn invalid_format(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn out_of_range(field: impl Into<String>, value: i64, min: i64, max: i64) -> Self {
        Self::OutOfRange {
            field: field.into(),
            value,
            min,
            max,
        }
    }

    /// Name of the offending field, when the error refers to one.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::EmptyField { field }
            | Self::InvalidFormat { field, .. }
            | Self::OutOfRange { field, .. } => Some(field),
            Self::UnknownEventType { .. } | Self::EventTypeNotAllowed { .. } => Some("events"),
            Self::ReservedHeader { .. } => Some("headers"),
        }
    }
}

/// Failure reported by a store implementation.
///
/// Security note: never carries payloads or secrets.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Webhook not found in store: {0}")]
    WebhookNotFound(WebhookId),

    #[error("Delivery not found in store: {0}")]
    DeliveryNotFound(DeliveryId),

    #[error("Store unavailable: {message}")]
    Unavailable { message: String },
}

impl StoreError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
}

/// Error returned by engine operations.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Store operation failed: {0}")]
    Store(#[from] StoreError),

    #[error("Webhook not found: {id}")]
    WebhookNotFound { id: WebhookId },

    #[error("Delivery not found: {id}")]
    DeliveryNotFound { id: DeliveryId },

    /// The delivery is owned by another execution or already terminal.
    #[error("Delivery {id} cannot be executed in status '{status}'")]
    DeliveryNotClaimable { id: DeliveryId, status: DeliveryStatus },

    #[error("Failed to serialize event envelope: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

impl EngineError {
    /// True for store outages, which callers may retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Store(StoreError::Unavailable { .. }))
    }
}

/// Result alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
