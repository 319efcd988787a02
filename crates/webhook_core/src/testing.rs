//! Shared fixtures for unit tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::clock::ManualClock;
use crate::delivery::WebhookDelivery;
use crate::errors::StoreError;
use crate::event::{EventEnvelope, EventType};
use crate::ids::{DeliveryId, OrganizationId, WebhookId};
use crate::metrics::EventMetrics;
use crate::secrets::WebhookSecret;
use crate::store::{Claim, DeliveryStore, InMemoryStore, WebhookStore};
use crate::webhook::{Webhook, WebhookStatus};

pub(crate) fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
}

pub(crate) fn manual_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(t0()))
}

/// An active webhook subscribed to `events`, with `max_retries = 2` and
/// `retry_delay = 60`.
pub(crate) fn webhook_for(
    organization_id: OrganizationId,
    url: &str,
    events: &[EventType],
) -> Webhook {
    Webhook {
        id: WebhookId::new(),
        organization_id,
        url: url.to_string(),
        secret: WebhookSecret::generate(),
        events: events.iter().copied().collect(),
        headers: BTreeMap::new(),
        max_retries: 2,
        retry_delay: 60,
        status: WebhookStatus::Active,
        description: None,
        success_count: 0,
        failure_count: 0,
        last_triggered_at: None,
        last_success_at: None,
        last_failure_at: None,
        created_at: t0(),
        updated_at: t0(),
    }
}

pub(crate) fn pending_delivery(webhook: &Webhook, created_at: DateTime<Utc>) -> WebhookDelivery {
    let mut data = serde_json::Map::new();
    data.insert("content_id".to_string(), serde_json::json!("c-1"));
    let envelope = EventEnvelope::new(
        EventType::ContentPublished,
        webhook.organization_id,
        created_at,
        data,
    );
    WebhookDelivery::new(webhook, envelope, created_at)
}

/// Seed a webhook and one pending delivery for it.
pub(crate) async fn seed_pending(
    store: &InMemoryStore,
    webhook: &Webhook,
) -> WebhookDelivery {
    store.insert_webhook(webhook.clone()).await.unwrap();
    let delivery = pending_delivery(webhook, t0());
    store
        .create_deliveries(vec![delivery.clone()], t0())
        .await
        .unwrap();
    delivery
}

/// Wraps an [`InMemoryStore`] and fails selected operations on demand.
#[derive(Default)]
pub(crate) struct FailingStore {
    pub inner: InMemoryStore,
    pub fail_create_deliveries: AtomicBool,
    pub fail_claims: AtomicBool,
    /// When non-zero, the N-th `save_delivery` call and every later one fail.
    pub fail_saves_from: AtomicUsize,
    saves: AtomicUsize,
}

impl FailingStore {
    fn check(flag: &AtomicBool) -> Result<(), StoreError> {
        if flag.load(Ordering::SeqCst) {
            Err(StoreError::unavailable("injected failure"))
        } else {
            Ok(())
        }
    }

    fn check_save(&self) -> Result<(), StoreError> {
        let call = self.saves.fetch_add(1, Ordering::SeqCst) + 1;
        let from = self.fail_saves_from.load(Ordering::SeqCst);
        if from != 0 && call >= from {
            Err(StoreError::unavailable("injected save failure"))
        } else {
            Ok(())
        }
    }

    /// Stop injecting save failures.
    pub fn heal_saves(&self) {
        self.fail_saves_from.store(0, Ordering::SeqCst);
    }
}

#[async_trait]
impl WebhookStore for FailingStore {
    async fn insert_webhook(&self, webhook: Webhook) -> Result<(), StoreError> {
        self.inner.insert_webhook(webhook).await
    }

    async fn update_webhook(&self, webhook: Webhook) -> Result<(), StoreError> {
        self.inner.update_webhook(webhook).await
    }

    async fn get_webhook(&self, id: WebhookId) -> Result<Option<Webhook>, StoreError> {
        self.inner.get_webhook(id).await
    }

    async fn list_webhooks(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<Webhook>, StoreError> {
        self.inner.list_webhooks(organization_id).await
    }

    async fn list_active_webhooks(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<Webhook>, StoreError> {
        self.inner.list_active_webhooks(organization_id).await
    }

    async fn delete_webhook(&self, id: WebhookId) -> Result<bool, StoreError> {
        self.inner.delete_webhook(id).await
    }

    async fn record_webhook_success(
        &self,
        id: WebhookId,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.inner.record_webhook_success(id, at).await
    }

    async fn record_webhook_failure(
        &self,
        id: WebhookId,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.inner.record_webhook_failure(id, at).await
    }
}

#[async_trait]
impl DeliveryStore for FailingStore {
    async fn create_deliveries(
        &self,
        deliveries: Vec<WebhookDelivery>,
        triggered_at: DateTime<Utc>,
    ) -> Result<Vec<DeliveryId>, StoreError> {
        Self::check(&self.fail_create_deliveries)?;
        self.inner.create_deliveries(deliveries, triggered_at).await
    }

    async fn get_delivery(&self, id: DeliveryId) -> Result<Option<WebhookDelivery>, StoreError> {
        self.inner.get_delivery(id).await
    }

    async fn list_deliveries_for_webhook(
        &self,
        webhook_id: WebhookId,
        limit: usize,
    ) -> Result<Vec<WebhookDelivery>, StoreError> {
        self.inner
            .list_deliveries_for_webhook(webhook_id, limit)
            .await
    }

    async fn claim_delivery(
        &self,
        id: DeliveryId,
        now: DateTime<Utc>,
        lease: Duration,
    ) -> Result<Claim, StoreError> {
        Self::check(&self.fail_claims)?;
        self.inner.claim_delivery(id, now, lease).await
    }

    async fn save_delivery(&self, delivery: &WebhookDelivery) -> Result<(), StoreError> {
        self.check_save()?;
        self.inner.save_delivery(delivery).await
    }

    async fn due_for_retry(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<DeliveryId>, StoreError> {
        self.inner.due_for_retry(now, limit).await
    }

    async fn stale_pending(
        &self,
        created_before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<DeliveryId>, StoreError> {
        self.inner.stale_pending(created_before, limit).await
    }

    async fn expired_claims(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<DeliveryId>, StoreError> {
        self.inner.expired_claims(now, limit).await
    }
}

/// Counts metric calls so tests can assert on them.
#[derive(Default)]
pub(crate) struct RecordingMetrics {
    pub successes: AtomicU64,
    pub failures: AtomicU64,
    pub errors: AtomicU64,
    pub active_tasks: AtomicI64,
}

impl RecordingMetrics {
    pub fn success_count(&self) -> u64 {
        self.successes.load(Ordering::Relaxed)
    }

    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn error_count(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    pub fn active_task_count(&self) -> i64 {
        self.active_tasks.load(Ordering::Relaxed)
    }
}

impl EventMetrics for RecordingMetrics {
    fn record_delivery_success(&self, _endpoint_url: &str, _duration_ms: u64) {
        self.successes.fetch_add(1, Ordering::Relaxed);
    }

    fn record_delivery_failure(&self, _endpoint_url: &str, _status_code: u16) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    fn record_delivery_error(&self, _endpoint_url: &str) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    fn increment_active_tasks(&self) {
        self.active_tasks.fetch_add(1, Ordering::Relaxed);
    }

    fn decrement_active_tasks(&self) {
        self.active_tasks.fetch_sub(1, Ordering::Relaxed);
    }
}
