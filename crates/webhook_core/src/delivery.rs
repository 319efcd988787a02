//! Delivery records and their state machine
//!
//! ```text
//! pending ──claim──▶ delivering ──2xx──▶ success
//!                        │  ▲
//!                        │  └──lease expired, reclaim
//!                        │
//!                        ├──failure, attempts left──▶ retrying ──claim──▶ delivering
//!                        │
//!                        └──failure, exhausted / webhook inactive──▶ failed
//! ```
//!
//! All transitions go through the methods on [`WebhookDelivery`], which keep
//! these invariants:
//! - `attempt_count <= max_attempts`
//! - `completed_at` is set iff the status is terminal
//! - `next_retry_at` is set iff the status is `retrying`
//! - `claim_expires_at` is set iff the status is `delivering`
//!
//! A claim is a lease. An execution that dies before recording its outcome
//! leaves the record `delivering`; once the lease runs out the record can be
//! claimed again.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::event::{EventEnvelope, EventType};
use crate::ids::{DeliveryId, EventId, OrganizationId, WebhookId};
use crate::webhook::{Webhook, MAX_RETRIES_LIMIT};

#[cfg(test)]
#[path = "delivery_tests.rs"]
mod tests;

/// Default cap on archived response bodies, in characters.
pub const DEFAULT_MAX_RESPONSE_BODY_CHARS: usize = 5000;

/// Error message recorded when the owning webhook is missing or not active.
pub const WEBHOOK_INACTIVE_MESSAGE: &str = "webhook inactive or not found";

/// Error message recorded when a reclaimed record has no attempts left.
pub const ATTEMPT_INTERRUPTED_MESSAGE: &str =
    "last attempt was interrupted before its outcome was recorded";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Delivering,
    Success,
    Retrying,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Delivering => "delivering",
            DeliveryStatus::Success => "success",
            DeliveryStatus::Retrying => "retrying",
            DeliveryStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DeliveryStatus::Success | DeliveryStatus::Failed)
    }

    /// Whether an execution may take ownership of a record in this status
    /// without waiting for a lease to expire.
    pub fn is_claimable(&self) -> bool {
        matches!(self, DeliveryStatus::Pending | DeliveryStatus::Retrying)
    }
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the subscriber sent back on one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseSnapshot {
    pub status: u16,
    /// Already truncated by the executor.
    pub body: String,
    pub headers: BTreeMap<String, String>,
}

impl ResponseSnapshot {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Why an attempt did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptFailure {
    /// A response outside [200, 300).
    Response(ResponseSnapshot),
    /// No response within the request timeout.
    Timeout { timeout_secs: u64 },
    /// The connection could not be established or was reset.
    Connection(String),
    /// Any other request or runtime error.
    Unexpected(String),
}

impl AttemptFailure {
    pub fn error_message(&self) -> String {
        match self {
            AttemptFailure::Response(response) => format!("HTTP {}", response.status),
            AttemptFailure::Timeout { timeout_secs } => {
                format!("Request timed out after {timeout_secs}s")
            }
            AttemptFailure::Connection(detail) => format!("Connection failed: {detail}"),
            AttemptFailure::Unexpected(detail) => format!("Request error: {detail}"),
        }
    }
}

/// One delivery of one event to one webhook, mutated in place across attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookDelivery {
    pub id: DeliveryId,
    pub webhook_id: WebhookId,
    pub organization_id: OrganizationId,
    pub event_type: EventType,
    pub event_id: EventId,
    /// Snapshot taken at publish time. Never recomputed.
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
    /// End of the current execution's lease while `delivering`.
    pub claim_expires_at: Option<DateTime<Utc>>,
}

impl WebhookDelivery {
    /// A fresh `pending` delivery of `payload` to `webhook`.
    pub fn new(webhook: &Webhook, payload: EventEnvelope, now: DateTime<Utc>) -> Self {
        Self {
            id: DeliveryId::new(),
            webhook_id: webhook.id,
            organization_id: webhook.organization_id,
            event_type: payload.event_type,
            event_id: payload.event_id,
            payload,
            status: DeliveryStatus::Pending,
            attempt_count: 0,
            max_attempts: webhook.max_attempts(),
            response_status: None,
            response_body: None,
            response_headers: None,
            error_message: None,
            created_at: now,
            first_attempted_at: None,
            last_attempted_at: None,
            completed_at: None,
            next_retry_at: None,
            claim_expires_at: None,
        }
    }

    /// Take ownership for one execution: `pending`/`retrying` → `delivering`,
    /// with a lease ending `lease` after `now`.
    ///
    /// A `delivering` record whose lease ended at or before `now` can be
    /// claimed again.
    ///
    /// Stores must call this under the same lock or conditional update that
    /// reads the status, so that only one caller can win.
    ///
    /// # Errors
    /// Returns the current status when the record is not claimable.
    pub fn claim(&mut self, now: DateTime<Utc>, lease: Duration) -> Result<(), DeliveryStatus> {
        if !self.is_claimable_at(now) {
            return Err(self.status);
        }
        self.status = DeliveryStatus::Delivering;
        self.next_retry_at = None;
        self.claim_expires_at = Some(
            now.checked_add_signed(lease)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        );
        Ok(())
    }

    pub fn is_claimable_at(&self, now: DateTime<Utc>) -> bool {
        self.status.is_claimable() || self.claim_expired(now)
    }

    /// Whether this is a `delivering` record whose owner ran out of lease.
    pub fn claim_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == DeliveryStatus::Delivering
            && self.claim_expires_at.map_or(true, |expires| expires <= now)
    }

    pub fn attempts_exhausted(&self) -> bool {
        self.attempt_count >= self.max_attempts
    }

    /// Terminal failure of a reclaimed record whose last counted attempt
    /// never recorded an outcome.
    pub fn fail_interrupted(&mut self, now: DateTime<Utc>) {
        self.status = DeliveryStatus::Failed;
        self.error_message = Some(ATTEMPT_INTERRUPTED_MESSAGE.to_string());
        self.set_response(None);
        self.completed_at = Some(now);
        self.next_retry_at = None;
        self.claim_expires_at = None;
    }

    /// Terminal failure because the webhook is gone or not active.
    ///
    /// Does not count as an attempt.
    pub fn fail_inactive(&mut self, now: DateTime<Utc>) {
        self.status = DeliveryStatus::Failed;
        self.error_message = Some(WEBHOOK_INACTIVE_MESSAGE.to_string());
        self.completed_at = Some(now);
        self.next_retry_at = None;
        self.claim_expires_at = None;
    }

    /// Start a counted attempt. Returns the attempt number.
    pub fn begin_attempt(&mut self, now: DateTime<Utc>) -> u32 {
        debug_assert!(self.attempt_count < self.max_attempts);
        self.attempt_count = (self.attempt_count + 1).min(self.max_attempts);
        if self.first_attempted_at.is_none() {
            self.first_attempted_at = Some(now);
        }
        self.last_attempted_at = Some(now);
        self.status = DeliveryStatus::Delivering;
        self.attempt_count
    }

    /// Terminal success.
    pub fn record_success(&mut self, response: ResponseSnapshot, now: DateTime<Utc>) {
        self.set_response(Some(response));
        self.status = DeliveryStatus::Success;
        self.completed_at = Some(now);
        self.next_retry_at = None;
        self.claim_expires_at = None;
    }

    /// Record a failed attempt and move to `retrying` or `failed`.
    ///
    /// The retry time is measured from the start of the attempt that just
    /// failed: `last_attempted_at + retry_delay * 2^(attempt_count - 1)`.
    pub fn record_failure(
        &mut self,
        failure: AttemptFailure,
        retry_delay: u32,
        now: DateTime<Utc>,
    ) -> DeliveryStatus {
        self.error_message = Some(failure.error_message());
        self.claim_expires_at = None;
        match failure {
            AttemptFailure::Response(response) => self.set_response(Some(response)),
            _ => self.set_response(None),
        }

        if self.attempt_count < self.max_attempts {
            let base = self.last_attempted_at.unwrap_or(now);
            let delay = backoff_delay(retry_delay, self.attempt_count);
            self.status = DeliveryStatus::Retrying;
            self.next_retry_at = Some(
                base.checked_add_signed(delay)
                    .unwrap_or(DateTime::<Utc>::MAX_UTC),
            );
            self.completed_at = None;
        } else {
            self.status = DeliveryStatus::Failed;
            self.completed_at = Some(now);
            self.next_retry_at = None;
        }
        self.status
    }

    fn set_response(&mut self, response: Option<ResponseSnapshot>) {
        match response {
            Some(response) => {
                self.response_status = Some(response.status);
                self.response_body = Some(response.body);
                self.response_headers = Some(response.headers);
            }
            None => {
                self.response_status = None;
                self.response_body = None;
                self.response_headers = None;
            }
        }
    }
}

/// `retry_delay * 2^(attempt_count - 1)` seconds.
///
/// The exponent is capped at [`MAX_RETRIES_LIMIT`], the largest value a
/// validated webhook can reach.
pub fn backoff_delay(retry_delay: u32, attempt_count: u32) -> Duration {
    let exponent = attempt_count.saturating_sub(1).min(MAX_RETRIES_LIMIT);
    Duration::seconds(i64::from(retry_delay) << exponent)
}

/// Truncate to at most `max_chars` characters on a char boundary.
pub fn truncate_body(body: &str, max_chars: usize) -> String {
    body.chars().take(max_chars).collect()
}
