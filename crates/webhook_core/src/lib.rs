//! # Webhook Engine Core
//!
//! This crate publishes domain events to subscriber webhooks and delivers
//! them as signed HTTP POST requests with bounded retries.
//!
//! ## Overview
//!
//! An event flows through the engine like this:
//! 1. [`EventPublisher::publish`] records one delivery per matching webhook in a
//!    single atomic store operation
//! 2. The delivery ids are queued for the worker pool
//! 3. [`DeliveryExecutor::execute`] claims a delivery, signs the payload with
//!    the webhook secret and POSTs it
//! 4. Failures are scheduled for retry with exponential backoff
//! 5. [`RetryScheduler`] periodically re-executes due retries and recovers
//!    deliveries that never reached a worker
//!
//! Webhook configuration, secret rotation and manual deliveries live in
//! [`WebhookRegistry`]. [`WebhookEngine`] assembles all of the above around a
//! [`Store`] implementation.
//!
//! Subscribers verify a payload by recomputing the signature over the raw
//! request body, see [`signer::verify_signature`].

pub mod clock;
pub mod config;
pub mod delivery;
pub mod dispatcher;
pub mod engine;
pub mod errors;
pub mod event;
pub mod executor;
pub mod ids;
pub mod metrics;
pub mod publisher;
pub mod registry;
pub mod scheduler;
pub mod secrets;
pub mod signer;
pub mod store;
pub mod webhook;

#[cfg(test)]
pub(crate) mod testing;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{DeliveryConfig, EngineConfig, RegistryConfig, SchedulerConfig};
pub use delivery::{DeliveryStatus, WebhookDelivery};
pub use engine::WebhookEngine;
pub use errors::{EngineError, EngineResult, StoreError, ValidationError};
pub use event::{EventEnvelope, EventType};
pub use executor::{DeliveryExecutor, DeliveryOutcome};
pub use ids::{DeliveryId, EventId, OrganizationId, WebhookId};
pub use metrics::{EventMetrics, NoOpEventMetrics, PrometheusEventMetrics};
pub use publisher::EventPublisher;
pub use registry::{CreatedWebhook, WebhookRegistry, MAX_DELIVERY_PAGE};
pub use scheduler::RetryScheduler;
pub use secrets::WebhookSecret;
pub use store::{DeliveryStore, InMemoryStore, Store, WebhookStore};
pub use webhook::{NewWebhook, Webhook, WebhookStatus, WebhookUpdate};
