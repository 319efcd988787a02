//! Webhook registration and management
//!
//! This module provides the [`WebhookRegistry`] component: owner-facing CRUD
//! over webhooks plus the manual delivery operations (test delivery and
//! manual retry). Every operation is scoped by organization. A webhook or
//! delivery owned by another organization is reported as not found.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{info, instrument};

use crate::clock::Clock;
use crate::config::RegistryConfig;
use crate::delivery::WebhookDelivery;
use crate::errors::{EngineError, EngineResult};
use crate::event::{EventEnvelope, EventType};
use crate::executor::{DeliveryExecutor, DeliveryOutcome};
use crate::ids::{DeliveryId, OrganizationId, WebhookId};
use crate::publisher::EventPublisher;
use crate::secrets::WebhookSecret;
use crate::store::Store;
use crate::webhook::{
    validate_events, validate_headers, validate_retry_policy, validate_url, NewWebhook, Webhook,
    WebhookStatus, WebhookUpdate,
};

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;

/// Largest page returned by [`WebhookRegistry::list_deliveries`].
pub const MAX_DELIVERY_PAGE: usize = 100;

/// A newly registered webhook together with its secret.
///
/// This is one of the two places the secret is handed out; the other is
/// [`WebhookRegistry::rotate_secret`].
#[derive(Debug, Clone)]
pub struct CreatedWebhook {
    pub webhook: Webhook,
    pub secret: WebhookSecret,
}

/// Manages webhook configuration and manual deliveries.
pub struct WebhookRegistry {
    store: Arc<dyn Store>,
    publisher: Arc<EventPublisher>,
    executor: Arc<DeliveryExecutor>,
    clock: Arc<dyn Clock>,
    config: RegistryConfig,
}

impl WebhookRegistry {
    pub fn new(
        store: Arc<dyn Store>,
        publisher: Arc<EventPublisher>,
        executor: Arc<DeliveryExecutor>,
        clock: Arc<dyn Clock>,
        config: RegistryConfig,
    ) -> Self {
        Self {
            store,
            publisher,
            executor,
            clock,
            config,
        }
    }

    /// Registers a webhook with a freshly generated secret.
    ///
    /// Retry policy fields left unset fall back to the registry defaults.
    ///
    /// # Errors
    ///
    /// * `EngineError::Validation` - URL, events, headers or retry policy are invalid
    /// * `EngineError::Store` - The store rejected the write
    #[instrument(skip_all, fields(organization_id = %organization_id))]
    pub async fn create(
        &self,
        organization_id: OrganizationId,
        request: NewWebhook,
    ) -> EngineResult<CreatedWebhook> {
        let url = request.url.trim().to_string();
        validate_url(&url, self.config.require_https)?;
        let events = validate_events(&request.events)?;
        validate_headers(&request.headers)?;

        let max_retries = request
            .max_retries
            .unwrap_or(self.config.default_max_retries);
        let retry_delay = request
            .retry_delay
            .unwrap_or(self.config.default_retry_delay_secs);
        validate_retry_policy(max_retries, retry_delay)?;

        let now = self.clock.now();
        let secret = WebhookSecret::generate();
        let webhook = Webhook {
            id: WebhookId::new(),
            organization_id,
            url,
            secret: secret.clone(),
            events,
            headers: request.headers,
            max_retries,
            retry_delay,
            status: WebhookStatus::Active,
            description: normalize_description(request.description),
            success_count: 0,
            failure_count: 0,
            last_triggered_at: None,
            last_success_at: None,
            last_failure_at: None,
            created_at: now,
            updated_at: now,
        };

        self.store.insert_webhook(webhook.clone()).await?;
        info!(webhook_id = %webhook.id, events = webhook.events.len(), "Webhook registered");

        Ok(CreatedWebhook { webhook, secret })
    }

    /// # Errors
    /// `EngineError::WebhookNotFound` if the webhook does not exist in this
    /// organization.
    pub async fn get(
        &self,
        organization_id: OrganizationId,
        id: WebhookId,
    ) -> EngineResult<Webhook> {
        match self.store.get_webhook(id).await? {
            Some(webhook) if webhook.organization_id == organization_id => Ok(webhook),
            _ => Err(EngineError::WebhookNotFound { id }),
        }
    }

    /// All webhooks of the organization, oldest first.
    pub async fn list(&self, organization_id: OrganizationId) -> EngineResult<Vec<Webhook>> {
        Ok(self.store.list_webhooks(organization_id).await?)
    }

    /// Applies a partial update. Unset fields are left unchanged.
    ///
    /// Retry policy changes only affect deliveries created afterwards, except
    /// `retry_delay`, which is read again at every failure.
    ///
    /// # Errors
    ///
    /// * `EngineError::WebhookNotFound` - No such webhook in this organization
    /// * `EngineError::Validation` - A changed field is invalid
    #[instrument(skip_all, fields(organization_id = %organization_id, webhook_id = %id))]
    pub async fn update(
        &self,
        organization_id: OrganizationId,
        id: WebhookId,
        update: WebhookUpdate,
    ) -> EngineResult<Webhook> {
        let mut webhook = self.get(organization_id, id).await?;

        if let Some(url) = update.url {
            let url = url.trim().to_string();
            validate_url(&url, self.config.require_https)?;
            webhook.url = url;
        }
        if let Some(events) = update.events {
            webhook.events = validate_events(&events)?;
        }
        if let Some(headers) = update.headers {
            validate_headers(&headers)?;
            webhook.headers = headers;
        }

        let max_retries = update.max_retries.unwrap_or(webhook.max_retries);
        let retry_delay = update.retry_delay.unwrap_or(webhook.retry_delay);
        validate_retry_policy(max_retries, retry_delay)?;
        webhook.max_retries = max_retries;
        webhook.retry_delay = retry_delay;

        if let Some(status) = update.status {
            webhook.status = status;
        }
        if update.description.is_some() {
            webhook.description = normalize_description(update.description);
        }
        webhook.updated_at = self.clock.now();

        self.store.update_webhook(webhook.clone()).await?;
        info!(status = %webhook.status, "Webhook updated");
        Ok(webhook)
    }

    /// Sets the status to `disabled`. Pending deliveries fail when executed.
    pub async fn disable(
        &self,
        organization_id: OrganizationId,
        id: WebhookId,
    ) -> EngineResult<Webhook> {
        self.update(
            organization_id,
            id,
            WebhookUpdate {
                status: Some(WebhookStatus::Disabled),
                ..Default::default()
            },
        )
        .await
    }

    /// Deletes the webhook and all of its deliveries.
    pub async fn delete(&self, organization_id: OrganizationId, id: WebhookId) -> EngineResult<()> {
        self.get(organization_id, id).await?;
        if !self.store.delete_webhook(id).await? {
            return Err(EngineError::WebhookNotFound { id });
        }
        info!(organization_id = %organization_id, webhook_id = %id, "Webhook deleted");
        Ok(())
    }

    /// Replaces the secret immediately. The old secret stops working for
    /// every later attempt, including retries of older deliveries.
    pub async fn rotate_secret(
        &self,
        organization_id: OrganizationId,
        id: WebhookId,
    ) -> EngineResult<WebhookSecret> {
        let mut webhook = self.get(organization_id, id).await?;
        let secret = WebhookSecret::generate();
        webhook.secret = secret.clone();
        webhook.updated_at = self.clock.now();

        self.store.update_webhook(webhook).await?;
        info!(organization_id = %organization_id, webhook_id = %id, "Webhook secret rotated");
        Ok(secret)
    }

    /// Sends a `webhook.test` event to one webhook and waits for the outcome.
    ///
    /// The delivery is recorded like any other and follows the same retry
    /// rules afterwards; only the first attempt runs inline.
    #[instrument(skip_all, fields(organization_id = %organization_id, webhook_id = %id))]
    pub async fn test_delivery(
        &self,
        organization_id: OrganizationId,
        id: WebhookId,
        data: Option<Map<String, Value>>,
    ) -> EngineResult<DeliveryOutcome> {
        let webhook = self.get(organization_id, id).await?;
        let data = data.unwrap_or_else(|| default_test_data(&webhook));

        let now = self.publisher.now();
        let envelope = EventEnvelope::new(EventType::WebhookTest, organization_id, now, data);
        let ids = self
            .publisher
            .create_deliveries(&envelope, std::slice::from_ref(&webhook), now)
            .await?;

        let Some(delivery_id) = ids.first().copied() else {
            return Err(EngineError::WebhookNotFound { id });
        };
        info!(delivery_id = %delivery_id, "Test delivery created");
        self.executor.execute(delivery_id).await
    }

    /// Delivery history of one webhook, newest first. `limit` is capped at
    /// [`MAX_DELIVERY_PAGE`].
    pub async fn list_deliveries(
        &self,
        organization_id: OrganizationId,
        id: WebhookId,
        limit: usize,
    ) -> EngineResult<Vec<WebhookDelivery>> {
        self.get(organization_id, id).await?;
        Ok(self
            .store
            .list_deliveries_for_webhook(id, limit.min(MAX_DELIVERY_PAGE))
            .await?)
    }

    /// # Errors
    /// `EngineError::DeliveryNotFound` if the delivery does not exist in this
    /// organization.
    pub async fn get_delivery(
        &self,
        organization_id: OrganizationId,
        delivery_id: DeliveryId,
    ) -> EngineResult<WebhookDelivery> {
        match self.store.get_delivery(delivery_id).await? {
            Some(delivery) if delivery.organization_id == organization_id => Ok(delivery),
            _ => Err(EngineError::DeliveryNotFound { id: delivery_id }),
        }
    }

    /// Runs the next attempt of a `pending` or `retrying` delivery now,
    /// regardless of `next_retry_at`.
    ///
    /// # Errors
    ///
    /// * `EngineError::DeliveryNotFound` - No such delivery in this organization
    /// * `EngineError::DeliveryNotClaimable` - The delivery is terminal or in flight
    pub async fn deliver(
        &self,
        organization_id: OrganizationId,
        delivery_id: DeliveryId,
    ) -> EngineResult<DeliveryOutcome> {
        self.get_delivery(organization_id, delivery_id).await?;
        info!(organization_id = %organization_id, delivery_id = %delivery_id, "Manual delivery requested");
        self.executor.execute(delivery_id).await
    }
}

fn normalize_description(description: Option<String>) -> Option<String> {
    description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
}

fn default_test_data(webhook: &Webhook) -> Map<String, Value> {
    let mut data = Map::new();
    data.insert(
        "message".to_string(),
        Value::from("This is a test delivery"),
    );
    data.insert("webhook_id".to_string(), Value::from(webhook.id.to_string()));
    data
}
