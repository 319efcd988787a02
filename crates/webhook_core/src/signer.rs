//! Request signing
//!
//! Subscribers authenticate a delivery by recomputing HMAC-SHA256 over the
//! raw request body with their copy of the webhook secret and comparing the
//! result with the `X-Webhook-Signature` header.

use std::collections::BTreeMap;

use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, InvalidHeaderValue, CONTENT_TYPE};
use sha2::Sha256;

use crate::event::EventType;
use crate::ids::{DeliveryId, EventId, WebhookId};

#[cfg(test)]
#[path = "signer_tests.rs"]
mod tests;

type HmacSha256 = Hmac<Sha256>;

/// Prefix of the signature header value.
pub const SIGNATURE_PREFIX: &str = "sha256=";

pub const SIGNATURE_HEADER: HeaderName = HeaderName::from_static("x-webhook-signature");
pub const WEBHOOK_ID_HEADER: HeaderName = HeaderName::from_static("x-webhook-id");
pub const EVENT_TYPE_HEADER: HeaderName = HeaderName::from_static("x-event-type");
pub const EVENT_ID_HEADER: HeaderName = HeaderName::from_static("x-event-id");
pub const DELIVERY_ID_HEADER: HeaderName = HeaderName::from_static("x-delivery-id");
pub const DELIVERY_ATTEMPT_HEADER: HeaderName = HeaderName::from_static("x-delivery-attempt");

/// Headers set by the engine. Custom headers can never replace these.
const RESERVED_HEADERS: [&str; 7] = [
    "content-type",
    "x-webhook-signature",
    "x-webhook-id",
    "x-event-type",
    "x-event-id",
    "x-delivery-id",
    "x-delivery-attempt",
];

/// Computes the hex-encoded HMAC-SHA256 of `payload` keyed with `secret`.
pub fn sign(payload: &[u8], secret: &str) -> String {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Computes the signature header value: `"sha256=<hex-encoded-signature>"`.
pub fn compute_hmac_sha256(payload: &[u8], secret: &str) -> String {
    format!("{SIGNATURE_PREFIX}{}", sign(payload, secret))
}

/// Verifies a received signature in constant time.
///
/// Accepts the header value with or without the `sha256=` prefix.
pub fn verify_signature(payload: &[u8], secret: &str, signature: &str) -> bool {
    let hex_digest = signature
        .strip_prefix(SIGNATURE_PREFIX)
        .unwrap_or(signature);

    let Ok(expected) = hex::decode(hex_digest) else {
        return false;
    };

    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(payload);
    mac.verify_slice(&expected).is_ok()
}

/// Whether `name` is one of the engine-controlled headers (case-insensitive).
pub fn is_reserved_header(name: &str) -> bool {
    RESERVED_HEADERS
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(name))
}

/// Identity of one delivery attempt, carried in the outbound headers.
#[derive(Debug, Clone, Copy)]
pub struct AttemptIdentity {
    pub webhook_id: WebhookId,
    pub delivery_id: DeliveryId,
    pub event_id: EventId,
    pub event_type: EventType,
    pub attempt: u32,
}

/// Builds the outbound header map for one attempt.
///
/// Custom headers are applied first and skipped when reserved or invalid;
/// the signature and identity headers are then set on top.
///
/// # Errors
/// Returns `InvalidHeaderValue` only if an engine-generated value is not a
/// valid header value, which UUIDs and dotted event names never are.
pub fn build_signed_headers(
    payload: &[u8],
    secret: &str,
    identity: &AttemptIdentity,
    custom_headers: &BTreeMap<String, String>,
) -> Result<HeaderMap, InvalidHeaderValue> {
    let mut headers = HeaderMap::new();

    for (name, value) in custom_headers {
        if is_reserved_header(name) {
            tracing::debug!(header = %name, "Skipping custom header that shadows a reserved header");
            continue;
        }
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => {
                tracing::warn!(header = %name, "Skipping invalid custom header");
            }
        }
    }

    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(
        SIGNATURE_HEADER,
        HeaderValue::from_str(&compute_hmac_sha256(payload, secret))?,
    );
    headers.insert(
        WEBHOOK_ID_HEADER,
        HeaderValue::from_str(&identity.webhook_id.to_string())?,
    );
    headers.insert(
        EVENT_TYPE_HEADER,
        HeaderValue::from_static(identity.event_type.as_str()),
    );
    headers.insert(
        EVENT_ID_HEADER,
        HeaderValue::from_str(&identity.event_id.to_string())?,
    );
    headers.insert(
        DELIVERY_ID_HEADER,
        HeaderValue::from_str(&identity.delivery_id.to_string())?,
    );
    headers.insert(DELIVERY_ATTEMPT_HEADER, HeaderValue::from(identity.attempt));

    Ok(headers)
}
