//! Identifier types
//!
//! Strongly typed UUID wrappers for the entities the engine tracks. Each ID is
//! a distinct type so a delivery ID can never be passed where a webhook ID is
//! expected.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(test)]
#[path = "ids_tests.rs"]
mod tests;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Create a new random identifier
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Create an identifier from an existing UUID
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the UUID
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self::from_uuid(uuid)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

uuid_id!(
    /// Identifier of a webhook subscriber configuration
    WebhookId
);

uuid_id!(
    /// Identifier of a single delivery record
    DeliveryId
);

uuid_id!(
    /// Identifier shared by every delivery spawned from one publish call
    ///
    /// Used for tracing and receiver-side idempotency. The engine never
    /// deduplicates on it.
    EventId
);

uuid_id!(
    /// Identifier of the organization that owns a webhook
    OrganizationId
);
