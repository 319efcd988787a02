//! Tests for server module

use super::*;
use crate::test_support::engine_state;

#[test]
fn test_default_config() {
    let config = ApiConfig::default();
    assert_eq!(config.port, DEFAULT_PORT);
    assert_eq!(config.host, "0.0.0.0");
}

#[test]
fn test_config_from_server_section() {
    let server = ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 9100,
    };
    let config = ApiConfig::from(&server);
    assert_eq!(config.host, "127.0.0.1");
    assert_eq!(config.port, 9100);
}

#[tokio::test]
async fn test_server_creation() {
    let (state, _engine) = engine_state();
    let server = ApiServer::new(ApiConfig::default(), state);
    let _router = server.router();
}

#[tokio::test]
async fn test_serve_rejects_invalid_host() {
    let (state, _engine) = engine_state();
    let config = ApiConfig {
        host: "not-an-ip".to_string(),
        port: 0,
    };

    let result = ApiServer::new(config, state).serve().await;
    assert!(result.is_err());
}
