//! Delivery execution
//!
//! [`DeliveryExecutor::execute`] runs one attempt of one delivery: claim the
//! record, resolve its webhook, sign and POST the stored payload, then
//! record the outcome on the delivery and the webhook.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use reqwest::{redirect, Client, Response};
use secrecy::ExposeSecret;
use tracing::{debug, info, instrument, warn};

use crate::clock::Clock;
use crate::config::DeliveryConfig;
use crate::delivery::{
    truncate_body, AttemptFailure, DeliveryStatus, ResponseSnapshot, WebhookDelivery,
};
use crate::errors::{EngineError, EngineResult};
use crate::ids::DeliveryId;
use crate::metrics::EventMetrics;
use crate::signer::{build_signed_headers, AttemptIdentity};
use crate::store::{Claim, Store};
use crate::webhook::{Webhook, WebhookStatus};

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;

/// State of a delivery after one execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub delivery_id: DeliveryId,
    pub status: DeliveryStatus,
    pub attempt_count: u32,
    pub response_status: Option<u16>,
    pub error_message: Option<String>,
    pub next_retry_at: Option<DateTime<Utc>>,
}

impl From<&WebhookDelivery> for DeliveryOutcome {
    fn from(delivery: &WebhookDelivery) -> Self {
        Self {
            delivery_id: delivery.id,
            status: delivery.status,
            attempt_count: delivery.attempt_count,
            response_status: delivery.response_status,
            error_message: delivery.error_message.clone(),
            next_retry_at: delivery.next_retry_at,
        }
    }
}

/// Executes delivery attempts against subscriber endpoints.
///
/// Owns its HTTP client. Cheap to share behind an `Arc`.
pub struct DeliveryExecutor {
    client: Client,
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    metrics: Arc<dyn EventMetrics>,
    request_timeout_secs: u64,
    max_response_body_chars: usize,
    claim_lease: chrono::Duration,
}

impl DeliveryExecutor {
    /// # Errors
    /// `EngineError::HttpClient` if the HTTP client cannot be built.
    pub fn new(
        config: &DeliveryConfig,
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        metrics: Arc<dyn EventMetrics>,
    ) -> EngineResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(config.user_agent.as_str())
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|e| EngineError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            store,
            clock,
            metrics,
            request_timeout_secs: config.request_timeout_secs,
            max_response_body_chars: config.max_response_body_chars,
            claim_lease: config.claim_lease(),
        })
    }

    /// Run one attempt of a delivery.
    ///
    /// Subscriber failures are outcomes, not errors: they come back as
    /// `Ok` with status `retrying` or `failed`.
    ///
    /// # Errors
    /// - `DeliveryNotFound` for an unknown id
    /// - `DeliveryNotClaimable` if the record is terminal or another
    ///   execution holds a live claim on it
    /// - `Store` if the store fails; the claim then lapses after its lease
    #[instrument(skip_all, fields(delivery_id = %delivery_id))]
    pub async fn execute(&self, delivery_id: DeliveryId) -> EngineResult<DeliveryOutcome> {
        let claimed = self
            .store
            .claim_delivery(delivery_id, self.clock.now(), self.claim_lease)
            .await?;
        let mut delivery = match claimed {
            Claim::Claimed(delivery) => *delivery,
            Claim::NotClaimable(status) => {
                debug!(status = %status, "Delivery is not claimable");
                return Err(EngineError::DeliveryNotClaimable {
                    id: delivery_id,
                    status,
                });
            }
            Claim::NotFound => return Err(EngineError::DeliveryNotFound { id: delivery_id }),
        };

        if delivery.attempts_exhausted() {
            let now = self.clock.now();
            warn!(
                webhook_id = %delivery.webhook_id,
                attempt_count = delivery.attempt_count,
                "Reclaimed delivery has no attempts left, failing it"
            );
            delivery.fail_interrupted(now);
            self.store.save_delivery(&delivery).await?;
            if let Err(e) = self.store.record_webhook_failure(delivery.webhook_id, now).await {
                warn!(webhook_id = %delivery.webhook_id, error = %e, "Failed to update webhook failure counters");
            }
            return Ok(DeliveryOutcome::from(&delivery));
        }

        let webhook = match self.store.get_webhook(delivery.webhook_id).await? {
            Some(webhook) if webhook.status == WebhookStatus::Active => webhook,
            other => {
                warn!(
                    webhook_id = %delivery.webhook_id,
                    webhook_status = other.as_ref().map(|w| w.status.as_str()).unwrap_or("missing"),
                    "Webhook inactive or not found, failing delivery"
                );
                delivery.fail_inactive(self.clock.now());
                self.store.save_delivery(&delivery).await?;
                return Ok(DeliveryOutcome::from(&delivery));
            }
        };

        let body = delivery.payload.canonical_bytes()?;
        let attempt = delivery.begin_attempt(self.clock.now());
        self.store.save_delivery(&delivery).await?;

        let identity = AttemptIdentity {
            webhook_id: webhook.id,
            delivery_id: delivery.id,
            event_id: delivery.event_id,
            event_type: delivery.event_type,
            attempt,
        };

        debug!(
            webhook_id = %webhook.id,
            event_type = %delivery.event_type,
            attempt,
            max_attempts = delivery.max_attempts,
            "Sending webhook request"
        );

        let started = Instant::now();
        self.metrics.increment_active_tasks();
        let result = self.send(&webhook, &identity, body).await;
        self.metrics.decrement_active_tasks();
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let now = self.clock.now();
        match result {
            Ok(response) => {
                self.metrics
                    .record_delivery_success(&webhook.url, duration_ms);
                let status = response.status;
                delivery.record_success(response, now);
                self.store.save_delivery(&delivery).await?;
                if let Err(e) = self.store.record_webhook_success(webhook.id, now).await {
                    warn!(webhook_id = %webhook.id, error = %e, "Failed to update webhook success counters");
                }
                info!(
                    webhook_id = %webhook.id,
                    attempt,
                    status_code = status,
                    duration_ms,
                    "Webhook delivered"
                );
            }
            Err(failure) => {
                match &failure {
                    AttemptFailure::Response(response) => self
                        .metrics
                        .record_delivery_failure(&webhook.url, response.status),
                    _ => self.metrics.record_delivery_error(&webhook.url),
                }

                let status = delivery.record_failure(failure, webhook.retry_delay, now);
                self.store.save_delivery(&delivery).await?;

                if status == DeliveryStatus::Failed {
                    if let Err(e) = self.store.record_webhook_failure(webhook.id, now).await {
                        warn!(webhook_id = %webhook.id, error = %e, "Failed to update webhook failure counters");
                    }
                    warn!(
                        webhook_id = %webhook.id,
                        attempt,
                        error = delivery.error_message.as_deref().unwrap_or_default(),
                        "Webhook delivery failed permanently"
                    );
                } else {
                    info!(
                        webhook_id = %webhook.id,
                        attempt,
                        error = delivery.error_message.as_deref().unwrap_or_default(),
                        next_retry_at = ?delivery.next_retry_at,
                        "Webhook delivery failed, retry scheduled"
                    );
                }
            }
        }

        Ok(DeliveryOutcome::from(&delivery))
    }

    /// POST the body and classify the result.
    async fn send(
        &self,
        webhook: &Webhook,
        identity: &AttemptIdentity,
        body: Vec<u8>,
    ) -> Result<ResponseSnapshot, AttemptFailure> {
        let headers = build_signed_headers(
            &body,
            webhook.secret.expose_secret(),
            identity,
            &webhook.headers,
        )
        .map_err(|e| AttemptFailure::Unexpected(format!("invalid header value: {e}")))?;

        let response = self
            .client
            .post(&webhook.url)
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|e| self.classify(&e))?;

        let snapshot = self.snapshot(response).await;
        if snapshot.is_success() {
            Ok(snapshot)
        } else {
            Err(AttemptFailure::Response(snapshot))
        }
    }

    fn classify(&self, error: &reqwest::Error) -> AttemptFailure {
        if error.is_timeout() {
            AttemptFailure::Timeout {
                timeout_secs: self.request_timeout_secs,
            }
        } else if error.is_connect() {
            AttemptFailure::Connection(error.to_string())
        } else {
            AttemptFailure::Unexpected(error.to_string())
        }
    }

    async fn snapshot(&self, response: Response) -> ResponseSnapshot {
        let status = response.status().as_u16();
        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.text().await.unwrap_or_default();

        ResponseSnapshot {
            status,
            body: truncate_body(&body, self.max_response_body_chars),
            headers,
        }
    }
}
