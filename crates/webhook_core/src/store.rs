//! Persistence of webhooks and delivery records
//!
//! The engine talks to storage only through [`WebhookStore`] and
//! [`DeliveryStore`]. Two operations carry atomicity requirements that an
//! implementation must honour:
//!
//! - [`DeliveryStore::create_deliveries`] writes the records of one publish
//!   call and the matching `last_triggered_at` updates as one unit. Records
//!   whose webhook was deleted in the meantime are skipped.
//! - [`DeliveryStore::claim_delivery`] is a conditional update: at most one
//!   caller can move a given record into `delivering` while its lease holds.
//!
//! [`InMemoryStore`] implements both under a single lock.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

use crate::delivery::{DeliveryStatus, WebhookDelivery};
use crate::errors::StoreError;
use crate::ids::{DeliveryId, OrganizationId, WebhookId};
use crate::webhook::{Webhook, WebhookStatus};

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;

/// Result of [`DeliveryStore::claim_delivery`].
#[derive(Debug, Clone, PartialEq)]
pub enum Claim {
    /// The caller now owns the record, which is in `delivering`.
    Claimed(Box<WebhookDelivery>),
    /// The record exists but is not in a claimable status.
    NotClaimable(DeliveryStatus),
    NotFound,
}

#[async_trait]
pub trait WebhookStore: Send + Sync {
    async fn insert_webhook(&self, webhook: Webhook) -> Result<(), StoreError>;

    /// Replace a stored webhook.
    ///
    /// # Errors
    /// `StoreError::WebhookNotFound` if it does not exist.
    async fn update_webhook(&self, webhook: Webhook) -> Result<(), StoreError>;

    async fn get_webhook(&self, id: WebhookId) -> Result<Option<Webhook>, StoreError>;

    /// All webhooks of an organization, oldest first.
    async fn list_webhooks(&self, organization_id: OrganizationId)
        -> Result<Vec<Webhook>, StoreError>;

    /// Webhooks of an organization with status `active`, oldest first.
    async fn list_active_webhooks(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<Webhook>, StoreError>;

    /// Remove a webhook and every delivery that belongs to it.
    ///
    /// Returns `false` if there was nothing to delete.
    async fn delete_webhook(&self, id: WebhookId) -> Result<bool, StoreError>;

    /// `success_count += 1`, `last_success_at = at`.
    async fn record_webhook_success(
        &self,
        id: WebhookId,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// `failure_count += 1`, `last_failure_at = at`.
    async fn record_webhook_failure(
        &self,
        id: WebhookId,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}

#[async_trait]
pub trait DeliveryStore: Send + Sync {
    /// Atomically insert `deliveries` and set `last_triggered_at` on each
    /// owning webhook.
    ///
    /// Records whose webhook no longer exists are dropped. Returns the ids
    /// that were written, in input order.
    async fn create_deliveries(
        &self,
        deliveries: Vec<WebhookDelivery>,
        triggered_at: DateTime<Utc>,
    ) -> Result<Vec<DeliveryId>, StoreError>;

    async fn get_delivery(&self, id: DeliveryId) -> Result<Option<WebhookDelivery>, StoreError>;

    /// Deliveries of one webhook, newest first.
    async fn list_deliveries_for_webhook(
        &self,
        webhook_id: WebhookId,
        limit: usize,
    ) -> Result<Vec<WebhookDelivery>, StoreError>;

    /// Move a `pending` or `retrying` record, or a `delivering` record whose
    /// lease has expired, to `delivering` with a lease of `lease` from `now`.
    async fn claim_delivery(
        &self,
        id: DeliveryId,
        now: DateTime<Utc>,
        lease: Duration,
    ) -> Result<Claim, StoreError>;

    /// Persist the record as given.
    ///
    /// # Errors
    /// `StoreError::DeliveryNotFound` if it was deleted in the meantime.
    async fn save_delivery(&self, delivery: &WebhookDelivery) -> Result<(), StoreError>;

    /// `retrying` records with `next_retry_at <= now`, oldest due first.
    async fn due_for_retry(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<DeliveryId>, StoreError>;

    /// `pending` records created before `created_before`, oldest first.
    async fn stale_pending(
        &self,
        created_before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<DeliveryId>, StoreError>;

    /// `delivering` records whose lease ended at or before `now`, oldest
    /// expiry first.
    async fn expired_claims(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<DeliveryId>, StoreError>;
}

/// Combined store used by the engine components.
pub trait Store: WebhookStore + DeliveryStore {}

impl<T: WebhookStore + DeliveryStore + ?Sized> Store for T {}

#[derive(Debug, Default)]
struct Collections {
    webhooks: HashMap<WebhookId, Webhook>,
    deliveries: HashMap<DeliveryId, WebhookDelivery>,
}

/// Process-local store. Every operation holds one lock for its duration.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: Mutex<Collections>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn sorted_webhooks<'a>(webhooks: impl Iterator<Item = &'a Webhook>) -> Vec<Webhook> {
    let mut result: Vec<Webhook> = webhooks.cloned().collect();
    result.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    result
}

#[async_trait]
impl WebhookStore for InMemoryStore {
    async fn insert_webhook(&self, webhook: Webhook) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner.webhooks.insert(webhook.id, webhook);
        Ok(())
    }

    async fn update_webhook(&self, webhook: Webhook) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        match inner.webhooks.get_mut(&webhook.id) {
            Some(existing) => {
                *existing = webhook;
                Ok(())
            }
            None => Err(StoreError::WebhookNotFound(webhook.id)),
        }
    }

    async fn get_webhook(&self, id: WebhookId) -> Result<Option<Webhook>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.webhooks.get(&id).cloned())
    }

    async fn list_webhooks(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<Webhook>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(sorted_webhooks(
            inner
                .webhooks
                .values()
                .filter(|w| w.organization_id == organization_id),
        ))
    }

    async fn list_active_webhooks(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<Webhook>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(sorted_webhooks(inner.webhooks.values().filter(|w| {
            w.organization_id == organization_id && w.status == WebhookStatus::Active
        })))
    }

    async fn delete_webhook(&self, id: WebhookId) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.webhooks.remove(&id).is_none() {
            return Ok(false);
        }
        inner.deliveries.retain(|_, d| d.webhook_id != id);
        Ok(true)
    }

    async fn record_webhook_success(
        &self,
        id: WebhookId,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let webhook = inner
            .webhooks
            .get_mut(&id)
            .ok_or(StoreError::WebhookNotFound(id))?;
        webhook.success_count += 1;
        webhook.last_success_at = Some(at);
        Ok(())
    }

    async fn record_webhook_failure(
        &self,
        id: WebhookId,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let webhook = inner
            .webhooks
            .get_mut(&id)
            .ok_or(StoreError::WebhookNotFound(id))?;
        webhook.failure_count += 1;
        webhook.last_failure_at = Some(at);
        Ok(())
    }
}

#[async_trait]
impl DeliveryStore for InMemoryStore {
    async fn create_deliveries(
        &self,
        deliveries: Vec<WebhookDelivery>,
        triggered_at: DateTime<Utc>,
    ) -> Result<Vec<DeliveryId>, StoreError> {
        let mut inner = self.inner.lock().await;

        let mut written = Vec::with_capacity(deliveries.len());
        for delivery in deliveries {
            let Some(webhook) = inner.webhooks.get_mut(&delivery.webhook_id) else {
                continue;
            };
            webhook.last_triggered_at = Some(triggered_at);
            written.push(delivery.id);
            inner.deliveries.insert(delivery.id, delivery);
        }
        Ok(written)
    }

    async fn get_delivery(&self, id: DeliveryId) -> Result<Option<WebhookDelivery>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.deliveries.get(&id).cloned())
    }

    async fn list_deliveries_for_webhook(
        &self,
        webhook_id: WebhookId,
        limit: usize,
    ) -> Result<Vec<WebhookDelivery>, StoreError> {
        let inner = self.inner.lock().await;
        let mut result: Vec<WebhookDelivery> = inner
            .deliveries
            .values()
            .filter(|d| d.webhook_id == webhook_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        result.truncate(limit);
        Ok(result)
    }

    async fn claim_delivery(
        &self,
        id: DeliveryId,
        now: DateTime<Utc>,
        lease: Duration,
    ) -> Result<Claim, StoreError> {
        let mut inner = self.inner.lock().await;
        let Some(delivery) = inner.deliveries.get_mut(&id) else {
            return Ok(Claim::NotFound);
        };
        match delivery.claim(now, lease) {
            Ok(()) => Ok(Claim::Claimed(Box::new(delivery.clone()))),
            Err(status) => Ok(Claim::NotClaimable(status)),
        }
    }

    async fn save_delivery(&self, delivery: &WebhookDelivery) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        match inner.deliveries.get_mut(&delivery.id) {
            Some(existing) => {
                *existing = delivery.clone();
                Ok(())
            }
            None => Err(StoreError::DeliveryNotFound(delivery.id)),
        }
    }

    async fn due_for_retry(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<DeliveryId>, StoreError> {
        let inner = self.inner.lock().await;
        let mut due: Vec<(DateTime<Utc>, DeliveryId)> = inner
            .deliveries
            .values()
            .filter(|d| d.status == DeliveryStatus::Retrying)
            .filter_map(|d| d.next_retry_at.map(|at| (at, d.id)))
            .filter(|(at, _)| *at <= now)
            .collect();
        due.sort();
        Ok(due.into_iter().take(limit).map(|(_, id)| id).collect())
    }

    async fn stale_pending(
        &self,
        created_before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<DeliveryId>, StoreError> {
        let inner = self.inner.lock().await;
        let mut stale: Vec<(DateTime<Utc>, DeliveryId)> = inner
            .deliveries
            .values()
            .filter(|d| d.status == DeliveryStatus::Pending && d.created_at < created_before)
            .map(|d| (d.created_at, d.id))
            .collect();
        stale.sort();
        Ok(stale.into_iter().take(limit).map(|(_, id)| id).collect())
    }

    async fn expired_claims(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<DeliveryId>, StoreError> {
        let inner = self.inner.lock().await;
        let mut expired: Vec<(DateTime<Utc>, DeliveryId)> = inner
            .deliveries
            .values()
            .filter(|d| d.claim_expired(now))
            .map(|d| (d.claim_expires_at.unwrap_or(DateTime::<Utc>::MIN_UTC), d.id))
            .collect();
        expired.sort();
        Ok(expired.into_iter().take(limit).map(|(_, id)| id).collect())
    }
}
