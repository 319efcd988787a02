//! Event publishing
//!
//! [`EventPublisher::publish`] fans one domain event out to every matching
//! webhook of an organization. The delivery records are written in a single
//! store call before anything is dispatched, so a publish either creates all
//! of its deliveries or none. A subscriber deleted between selection and
//! that call is skipped.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use crate::clock::Clock;
use crate::delivery::WebhookDelivery;
use crate::dispatcher::DispatchQueue;
use crate::errors::{EngineResult, ValidationError};
use crate::event::{EventEnvelope, EventType};
use crate::ids::{DeliveryId, OrganizationId};
use crate::store::Store;
use crate::webhook::Webhook;

#[cfg(test)]
#[path = "publisher_tests.rs"]
mod tests;

pub struct EventPublisher {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    queue: DispatchQueue,
}

impl EventPublisher {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, queue: DispatchQueue) -> Self {
        Self {
            store,
            clock,
            queue,
        }
    }

    /// Publish an event to the organization's subscribers.
    ///
    /// Returns the ids of the created deliveries, which is empty when no
    /// active webhook subscribes to `event_type`. Returns once the records
    /// are stored; delivery happens on the worker pool.
    ///
    /// # Errors
    /// - `Validation` for the non-publishable `webhook.test` type
    /// - `Store` if the store fails; no records are created in that case
    #[instrument(skip_all, fields(event_type = %event_type, organization_id = %organization_id))]
    pub async fn publish(
        &self,
        event_type: EventType,
        organization_id: OrganizationId,
        data: Map<String, Value>,
    ) -> EngineResult<Vec<DeliveryId>> {
        if !event_type.is_subscribable() {
            return Err(ValidationError::EventTypeNotAllowed {
                value: event_type.to_string(),
            }
            .into());
        }

        let subscribers: Vec<Webhook> = self
            .store
            .list_active_webhooks(organization_id)
            .await?
            .into_iter()
            .filter(|webhook| webhook.accepts_event(event_type))
            .collect();

        if subscribers.is_empty() {
            debug!("No active webhooks subscribe to event");
            return Ok(Vec::new());
        }

        let now = self.clock.now();
        let envelope = EventEnvelope::new(event_type, organization_id, now, data);
        let ids = self.create_deliveries(&envelope, &subscribers, now).await?;

        let mut queued = 0usize;
        for id in &ids {
            match self.queue.try_enqueue(*id) {
                Ok(()) => queued += 1,
                Err(e) => warn!(delivery_id = %id, error = %e, "Delivery not queued, left for recovery"),
            }
        }

        info!(
            event_id = %envelope.event_id,
            deliveries = ids.len(),
            queued,
            "Event published"
        );
        Ok(ids)
    }

    /// Create one `pending` delivery of `envelope` per webhook in a single
    /// atomic store call. Nothing is dispatched.
    ///
    /// Returns the ids the store wrote, which leaves out webhooks deleted
    /// since they were read.
    pub(crate) async fn create_deliveries(
        &self,
        envelope: &EventEnvelope,
        webhooks: &[Webhook],
        now: DateTime<Utc>,
    ) -> EngineResult<Vec<DeliveryId>> {
        let deliveries: Vec<WebhookDelivery> = webhooks
            .iter()
            .map(|webhook| WebhookDelivery::new(webhook, envelope.clone(), now))
            .collect();
        let requested = deliveries.len();

        let ids = self.store.create_deliveries(deliveries, now).await?;
        if ids.len() < requested {
            debug!(
                skipped = requested - ids.len(),
                "Webhooks deleted during publish, deliveries skipped"
            );
        }
        Ok(ids)
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}
