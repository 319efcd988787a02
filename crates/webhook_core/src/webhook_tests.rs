//! Tests for webhook configuration and validation.

use super::*;

fn sample_webhook(status: WebhookStatus) -> Webhook {
    let now = Utc::now();
    Webhook {
        id: WebhookId::new(),
        organization_id: OrganizationId::new(),
        url: "https://hooks.example.com/in".to_string(),
        secret: WebhookSecret::generate(),
        events: [EventType::ContentPublished, EventType::UserCreated]
            .into_iter()
            .collect(),
        headers: BTreeMap::new(),
        max_retries: 2,
        retry_delay: 60,
        status,
        description: None,
        success_count: 0,
        failure_count: 0,
        last_triggered_at: None,
        last_success_at: None,
        last_failure_at: None,
        created_at: now,
        updated_at: now,
    }
}

mod webhook_tests {
    use super::*;

    #[test]
    fn test_active_webhook_accepts_subscribed_events_only() {
        let webhook = sample_webhook(WebhookStatus::Active);
        assert!(webhook.accepts_event(EventType::ContentPublished));
        assert!(!webhook.accepts_event(EventType::MediaUploaded));
    }

    #[test]
    fn test_paused_and_disabled_webhooks_accept_nothing() {
        for status in [WebhookStatus::Paused, WebhookStatus::Disabled] {
            let webhook = sample_webhook(status);
            assert!(!webhook.accepts_event(EventType::ContentPublished));
        }
    }

    #[test]
    fn test_max_attempts_is_retries_plus_one() {
        let mut webhook = sample_webhook(WebhookStatus::Active);
        assert_eq!(webhook.max_attempts(), 3);

        webhook.max_retries = 0;
        assert_eq!(webhook.max_attempts(), 1);
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(WebhookStatus::Paused).unwrap(),
            serde_json::json!("paused")
        );
    }
}

mod validation_tests {
    use super::*;

    #[test]
    fn test_validate_url_accepts_http_and_https() {
        assert!(validate_url("https://example.com/hook", false).is_ok());
        assert!(validate_url("http://localhost:8080/hook", false).is_ok());
    }

    #[test]
    fn test_validate_url_enforces_https_when_required() {
        let err = validate_url("http://example.com/hook", true).unwrap_err();
        assert_eq!(err.field(), Some("url"));
        assert!(validate_url("https://example.com/hook", true).is_ok());
    }

    #[test]
    fn test_validate_url_rejects_bad_input() {
        assert_eq!(
            validate_url("  ", false).unwrap_err(),
            ValidationError::empty_field("url")
        );
        assert!(validate_url("/relative/path", false).is_err());
        assert!(validate_url("ftp://example.com/file", false).is_err());
        assert!(validate_url("mailto:ops@example.com", false).is_err());
    }

    #[test]
    fn test_validate_events_requires_non_empty_subscribable_set() {
        assert_eq!(
            validate_events(&[]).unwrap_err(),
            ValidationError::empty_field("events")
        );
        assert!(matches!(
            validate_events(&[EventType::WebhookTest]).unwrap_err(),
            ValidationError::EventTypeNotAllowed { .. }
        ));
    }

    #[test]
    fn test_validate_events_deduplicates() {
        let events = validate_events(&[
            EventType::UserCreated,
            EventType::UserCreated,
            EventType::MediaDeleted,
        ])
        .unwrap();
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_validate_headers_rejects_reserved_and_invalid() {
        let mut headers = BTreeMap::new();
        headers.insert("x-event-id".to_string(), "spoof".to_string());
        assert!(matches!(
            validate_headers(&headers).unwrap_err(),
            ValidationError::ReservedHeader { .. }
        ));

        let mut headers = BTreeMap::new();
        headers.insert("has space".to_string(), "v".to_string());
        assert!(validate_headers(&headers).is_err());

        let mut headers = BTreeMap::new();
        headers.insert("X-Team".to_string(), "platform".to_string());
        assert!(validate_headers(&headers).is_ok());
    }

    #[test]
    fn test_validate_retry_policy_bounds() {
        assert!(validate_retry_policy(0, 1).is_ok());
        assert!(validate_retry_policy(MAX_RETRIES_LIMIT, MAX_RETRY_DELAY_SECS).is_ok());
        assert!(validate_retry_policy(MAX_RETRIES_LIMIT + 1, 60).is_err());
        assert!(validate_retry_policy(3, 0).is_err());
        assert!(validate_retry_policy(3, MAX_RETRY_DELAY_SECS + 1).is_err());
    }
}
