//! HTTP request and response models
//!
//! These types exist only in the HTTP layer and are distinct from the engine
//! types they are translated from and to.

pub mod request;
pub mod response;

pub use request::{
    CreateWebhookRequest, ListDeliveriesQuery, PublishEventRequest, TestDeliveryRequest,
    UpdateWebhookRequest,
};
pub use response::{
    CreateWebhookResponse, DeliveryOutcomeResponse, DeliveryResponse, HealthResponse,
    ListDeliveriesResponse, ListWebhooksResponse, PublishEventResponse, RotateSecretResponse,
    WebhookResponse,
};
