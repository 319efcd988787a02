use super::*;
use std::collections::HashMap;

#[test]
fn test_empty_toml_gives_defaults() {
    let config = AppConfig::from_toml("").unwrap();
    assert_eq!(config, AppConfig::default());
    assert_eq!(config.server.port, DEFAULT_PORT);
    assert_eq!(config.log_format, LogFormat::Text);
    assert_eq!(config.engine.scheduler.batch_limit, 100);
}

#[test]
fn test_engine_sections_at_top_level() {
    let config = AppConfig::from_toml(
        r#"
        log_format = "json"

        [server]
        port = 9000

        [delivery]
        workers = 8
        request_timeout_secs = 5

        [registry]
        require_https = true
        "#,
    )
    .unwrap();

    assert_eq!(config.log_format, LogFormat::Json);
    assert_eq!(config.server.port, 9000);
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.engine.delivery.workers, 8);
    assert_eq!(config.engine.delivery.request_timeout_secs, 5);
    assert_eq!(config.engine.delivery.queue_capacity, 1024);
    assert!(config.engine.registry.require_https);
}

#[test]
fn test_invalid_toml_is_parse_error() {
    let result = AppConfig::from_toml("[server]\nport = \"not a number\"");
    assert!(matches!(result, Err(ConfigError::Parse(_))));
}

#[test]
fn test_missing_file_is_read_error() {
    let result = AppConfig::load(Path::new("/nonexistent/webhook-engine.toml"));
    assert!(matches!(result, Err(ConfigError::Read { .. })));
}

#[test]
fn test_env_overrides() {
    let env = HashMap::from([
        ("API_HOST", "127.0.0.1".to_string()),
        ("API_PORT", "8181".to_string()),
    ]);
    let mut config = AppConfig::default();

    config
        .apply_env_overrides(|name| env.get(name).cloned())
        .unwrap();

    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 8181);
}

#[test]
fn test_invalid_port_override() {
    let mut config = AppConfig::default();
    let result = config.apply_env_overrides(|name| {
        (name == "API_PORT").then(|| "eighty".to_string())
    });

    assert!(matches!(result, Err(ConfigError::InvalidEnv { .. })));
    assert_eq!(config.server.port, DEFAULT_PORT);
}
