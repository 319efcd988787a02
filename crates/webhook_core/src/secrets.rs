//! Webhook signing secrets
//!
//! Secrets are generated once at registration and can only be replaced, never
//! re-derived.
//!
//! # Security
//! - Secret values MUST NOT be logged
//! - Secret values MUST NOT be included in error messages
//!
//! The value lives in a [`SecretString`], so `Debug` output is redacted and
//! there is no `Display`. Call [`ExposeSecret::expose_secret`] at the single
//! point where the key is needed.

use rand::rngs::OsRng;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};

#[cfg(test)]
#[path = "secrets_tests.rs"]
mod tests;

/// Prefix that makes secrets recognisable in receiver configuration.
pub const SECRET_PREFIX: &str = "whsec_";

/// Number of random bytes in a generated secret.
const SECRET_BYTES: usize = 32;

/// Opaque signing key of one webhook.
#[derive(Debug, Clone)]
pub struct WebhookSecret(SecretString);

impl WebhookSecret {
    /// Generate a new secret from the operating system's CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; SECRET_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self::from_string(format!("{SECRET_PREFIX}{}", hex::encode(bytes)))
    }

    /// Wrap an existing secret value, e.g. one loaded from a store.
    pub fn from_string(value: impl Into<String>) -> Self {
        Self(SecretString::from(value.into()))
    }
}

impl ExposeSecret<str> for WebhookSecret {
    /// The raw secret value. Callers must not log it.
    fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }
}
