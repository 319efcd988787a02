//! Tests for webhook management and manual deliveries.

use super::*;
use crate::clock::ManualClock;
use crate::config::DeliveryConfig;
use crate::delivery::DeliveryStatus;
use crate::dispatcher::{dispatch_channel, DispatchReceiver};
use crate::errors::ValidationError;
use crate::metrics::NoOpEventMetrics;
use crate::secrets::SECRET_PREFIX;
use crate::signer::verify_signature;
use crate::store::{DeliveryStore, InMemoryStore};
use crate::testing::{manual_clock, t0};
use chrono::Duration;
use secrecy::ExposeSecret;
use std::collections::BTreeMap;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

const URL: &str = "https://hooks.example.com/in";

struct Harness {
    store: Arc<InMemoryStore>,
    clock: Arc<ManualClock>,
    publisher: Arc<EventPublisher>,
    registry: WebhookRegistry,
    _receiver: DispatchReceiver,
}

fn harness_with(config: RegistryConfig) -> Harness {
    let store = Arc::new(InMemoryStore::new());
    let clock = manual_clock();
    let executor = Arc::new(
        DeliveryExecutor::new(
            &DeliveryConfig::default(),
            store.clone(),
            clock.clone(),
            Arc::new(NoOpEventMetrics::new()),
        )
        .unwrap(),
    );
    let (queue, receiver) = dispatch_channel(64);
    let publisher = Arc::new(EventPublisher::new(store.clone(), clock.clone(), queue));
    let registry = WebhookRegistry::new(
        store.clone(),
        publisher.clone(),
        executor,
        clock.clone(),
        config,
    );
    Harness {
        store,
        clock,
        publisher,
        registry,
        _receiver: receiver,
    }
}

fn harness() -> Harness {
    harness_with(RegistryConfig::default())
}

fn new_webhook(url: &str) -> NewWebhook {
    NewWebhook {
        url: url.to_string(),
        events: vec![EventType::ContentPublished, EventType::MediaUploaded],
        ..Default::default()
    }
}

mod create_tests {
    use super::*;

    #[tokio::test]
    async fn test_create_generates_secret_and_defaults() {
        let h = harness();
        let org = OrganizationId::new();

        let created = h.registry.create(org, new_webhook(URL)).await.unwrap();

        assert!(created.secret.expose_secret().starts_with(SECRET_PREFIX));
        assert_eq!(created.secret.expose_secret().len(), SECRET_PREFIX.len() + 64);
        assert_eq!(
            created.webhook.secret.expose_secret(),
            created.secret.expose_secret()
        );
        assert_eq!(created.webhook.status, WebhookStatus::Active);
        assert_eq!(created.webhook.max_retries, 3);
        assert_eq!(created.webhook.retry_delay, 60);
        assert_eq!(created.webhook.organization_id, org);
        assert_eq!(created.webhook.created_at, t0());

        let stored = h.registry.get(org, created.webhook.id).await.unwrap();
        assert_eq!(stored.url, URL);
    }

    #[tokio::test]
    async fn test_secrets_are_unique() {
        let h = harness();
        let org = OrganizationId::new();
        let a = h.registry.create(org, new_webhook(URL)).await.unwrap();
        let b = h.registry.create(org, new_webhook(URL)).await.unwrap();
        assert_ne!(a.secret.expose_secret(), b.secret.expose_secret());
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_input() {
        let h = harness();
        let org = OrganizationId::new();

        let cases = [
            NewWebhook {
                url: "not a url".to_string(),
                ..new_webhook(URL)
            },
            NewWebhook {
                events: vec![],
                ..new_webhook(URL)
            },
            NewWebhook {
                events: vec![EventType::WebhookTest],
                ..new_webhook(URL)
            },
            NewWebhook {
                max_retries: Some(21),
                ..new_webhook(URL)
            },
            NewWebhook {
                retry_delay: Some(0),
                ..new_webhook(URL)
            },
            NewWebhook {
                headers: BTreeMap::from([(
                    "X-Webhook-Signature".to_string(),
                    "forged".to_string(),
                )]),
                ..new_webhook(URL)
            },
        ];

        for request in cases {
            let err = h.registry.create(org, request).await.unwrap_err();
            assert!(matches!(err, EngineError::Validation(_)), "{err}");
        }
        assert!(h.registry.list(org).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_require_https() {
        let h = harness_with(RegistryConfig {
            require_https: true,
            ..Default::default()
        });
        let err = h
            .registry
            .create(OrganizationId::new(), new_webhook("http://hooks.example.com"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::InvalidFormat { .. })
        ));
    }

    #[tokio::test]
    async fn test_blank_description_is_dropped() {
        let h = harness();
        let created = h
            .registry
            .create(
                OrganizationId::new(),
                NewWebhook {
                    description: Some("   ".to_string()),
                    ..new_webhook(URL)
                },
            )
            .await
            .unwrap();
        assert_eq!(created.webhook.description, None);
    }
}

mod management_tests {
    use super::*;

    #[tokio::test]
    async fn test_cross_org_access_is_not_found() {
        let h = harness();
        let owner = OrganizationId::new();
        let other = OrganizationId::new();
        let id = h.registry.create(owner, new_webhook(URL)).await.unwrap().webhook.id;

        assert!(matches!(
            h.registry.get(other, id).await.unwrap_err(),
            EngineError::WebhookNotFound { .. }
        ));
        assert!(h.registry.delete(other, id).await.is_err());
        assert!(h.registry.rotate_secret(other, id).await.is_err());
        assert!(h.registry.list(other).await.unwrap().is_empty());
        assert!(h.registry.get(owner, id).await.is_ok());
    }

    #[tokio::test]
    async fn test_update_changes_only_given_fields() {
        let h = harness();
        let org = OrganizationId::new();
        let created = h.registry.create(org, new_webhook(URL)).await.unwrap();

        h.clock.advance(Duration::minutes(5));
        let updated = h
            .registry
            .update(
                org,
                created.webhook.id,
                WebhookUpdate {
                    events: Some(vec![EventType::UserDeleted]),
                    retry_delay: Some(5),
                    status: Some(WebhookStatus::Paused),
                    description: Some("CRM sync".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.url, URL);
        assert_eq!(
            updated.events.iter().copied().collect::<Vec<_>>(),
            vec![EventType::UserDeleted]
        );
        assert_eq!(updated.retry_delay, 5);
        assert_eq!(updated.max_retries, 3);
        assert_eq!(updated.status, WebhookStatus::Paused);
        assert_eq!(updated.description.as_deref(), Some("CRM sync"));
        assert_eq!(updated.updated_at, t0() + Duration::minutes(5));
        assert_eq!(updated.secret.expose_secret(), created.secret.expose_secret());
    }

    #[tokio::test]
    async fn test_invalid_update_leaves_webhook_unchanged() {
        let h = harness();
        let org = OrganizationId::new();
        let created = h.registry.create(org, new_webhook(URL)).await.unwrap();

        let err = h
            .registry
            .update(
                org,
                created.webhook.id,
                WebhookUpdate {
                    url: Some("ftp://example.com".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));

        let stored = h.registry.get(org, created.webhook.id).await.unwrap();
        assert_eq!(stored.url, URL);
    }

    #[tokio::test]
    async fn test_disable_sets_status() {
        let h = harness();
        let org = OrganizationId::new();
        let id = h.registry.create(org, new_webhook(URL)).await.unwrap().webhook.id;

        let disabled = h.registry.disable(org, id).await.unwrap();
        assert_eq!(disabled.status, WebhookStatus::Disabled);
        assert_eq!(
            h.registry.get(org, id).await.unwrap().status,
            WebhookStatus::Disabled
        );
    }

    #[tokio::test]
    async fn test_rotate_secret_replaces_secret() {
        let h = harness();
        let org = OrganizationId::new();
        let created = h.registry.create(org, new_webhook(URL)).await.unwrap();

        let rotated = h.registry.rotate_secret(org, created.webhook.id).await.unwrap();

        assert_ne!(rotated.expose_secret(), created.secret.expose_secret());
        let stored = h.registry.get(org, created.webhook.id).await.unwrap();
        assert_eq!(stored.secret.expose_secret(), rotated.expose_secret());
    }

    #[tokio::test]
    async fn test_delete_cascades_to_deliveries() {
        let h = harness();
        let org = OrganizationId::new();
        let id = h.registry.create(org, new_webhook(URL)).await.unwrap().webhook.id;
        let ids = h
            .publisher
            .publish(EventType::ContentPublished, org, Map::new())
            .await
            .unwrap();
        assert_eq!(ids.len(), 1);

        h.registry.delete(org, id).await.unwrap();

        assert!(h.store.get_delivery(ids[0]).await.unwrap().is_none());
        assert!(matches!(
            h.registry.delete(org, id).await.unwrap_err(),
            EngineError::WebhookNotFound { .. }
        ));
    }
}

mod delivery_tests {
    use super::*;

    async fn subscriber(status: u16) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_test_delivery_runs_inline_with_test_event() {
        let server = subscriber(200).await;
        let h = harness();
        let org = OrganizationId::new();
        let created = h
            .registry
            .create(org, new_webhook(&format!("{}/hook", server.uri())))
            .await
            .unwrap();

        let outcome = h
            .registry
            .test_delivery(org, created.webhook.id, None)
            .await
            .unwrap();

        assert_eq!(outcome.status, DeliveryStatus::Success);
        assert_eq!(outcome.attempt_count, 1);

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(
            request.headers.get("x-event-type").unwrap(),
            "webhook.test"
        );
        let signature = request.headers.get("x-webhook-signature").unwrap();
        assert!(verify_signature(
            &request.body,
            created.secret.expose_secret(),
            signature.to_str().unwrap()
        ));

        let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
        assert_eq!(
            body["data"]["webhook_id"],
            serde_json::json!(created.webhook.id.to_string())
        );

        let history = h
            .registry
            .list_deliveries(org, created.webhook.id, 10)
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].event_type, EventType::WebhookTest);
    }

    #[tokio::test]
    async fn test_test_delivery_uses_caller_data() {
        let server = subscriber(200).await;
        let h = harness();
        let org = OrganizationId::new();
        let id = h
            .registry
            .create(org, new_webhook(&format!("{}/hook", server.uri())))
            .await
            .unwrap()
            .webhook
            .id;

        let mut data = Map::new();
        data.insert("ping".to_string(), Value::from(true));
        h.registry.test_delivery(org, id, Some(data)).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["data"], serde_json::json!({ "ping": true }));
    }

    #[tokio::test]
    async fn test_deliver_retries_now_and_rejects_terminal() {
        let server = subscriber(500).await;
        let h = harness();
        let org = OrganizationId::new();
        let id = h
            .registry
            .create(
                org,
                NewWebhook {
                    max_retries: Some(1),
                    ..new_webhook(&format!("{}/hook", server.uri()))
                },
            )
            .await
            .unwrap()
            .webhook
            .id;

        let first = h.registry.test_delivery(org, id, None).await.unwrap();
        assert_eq!(first.status, DeliveryStatus::Retrying);

        let second = h.registry.deliver(org, first.delivery_id).await.unwrap();
        assert_eq!(second.status, DeliveryStatus::Failed);
        assert_eq!(second.attempt_count, 2);

        let err = h
            .registry
            .deliver(org, first.delivery_id)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::DeliveryNotClaimable {
                status: DeliveryStatus::Failed,
                ..
            }
        ));
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_delivery_lookup_is_org_scoped() {
        let h = harness();
        let org = OrganizationId::new();
        h.registry.create(org, new_webhook(URL)).await.unwrap();
        let ids = h
            .publisher
            .publish(EventType::MediaUploaded, org, Map::new())
            .await
            .unwrap();

        assert!(h.registry.get_delivery(org, ids[0]).await.is_ok());
        assert!(matches!(
            h.registry
                .get_delivery(OrganizationId::new(), ids[0])
                .await
                .unwrap_err(),
            EngineError::DeliveryNotFound { .. }
        ));
        assert!(matches!(
            h.registry
                .deliver(OrganizationId::new(), ids[0])
                .await
                .unwrap_err(),
            EngineError::DeliveryNotFound { .. }
        ));
    }

    #[tokio::test]
    async fn test_list_deliveries_caps_page_size() {
        let h = harness();
        let org = OrganizationId::new();
        let id = h.registry.create(org, new_webhook(URL)).await.unwrap().webhook.id;
        for _ in 0..3 {
            h.publisher
                .publish(EventType::ContentPublished, org, Map::new())
                .await
                .unwrap();
        }

        assert_eq!(h.registry.list_deliveries(org, id, 2).await.unwrap().len(), 2);
        assert_eq!(
            h.registry
                .list_deliveries(org, id, usize::MAX)
                .await
                .unwrap()
                .len(),
            3
        );
    }
}
