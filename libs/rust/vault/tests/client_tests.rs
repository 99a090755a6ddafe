//! Integration tests for the HTTP layer of the Vault client: status
//! mapping, headers, retries, circuit breaking and automatic re-login.

use secrecy::SecretString;
use serde_json::json;
use std::time::Duration;
use test_utils::{MockVault, fixtures};
use vault_client::{CredentialSource, UserpassAuth, VaultClient, VaultConfig, VaultError};
use wiremock::{
    Mock, ResponseTemplate,
    matchers::{header, method, path, query_param},
};

fn client(mock: &MockVault, token: &str) -> VaultClient {
    VaultClient::new(VaultConfig::new(mock.uri()).with_token(token).with_max_retries(0)).unwrap()
}

#[tokio::test]
async fn test_logical_read_sends_token_and_namespace() {
    let mock = MockVault::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/secret/data/app"))
        .and(header("X-Vault-Token", "root"))
        .and(header("X-Vault-Namespace", "team-a"))
        .respond_with(ResponseTemplate::new(200).set_body_json(fixtures::kv2_read_response(&json!({"k": "v"}), 1)))
        .mount(mock.server())
        .await;

    let client = VaultClient::new(
        VaultConfig::new(mock.uri())
            .with_token("root")
            .with_namespace("team-a")
            .with_max_retries(0),
    )
    .unwrap();

    let secret = client.logical().read("secret/data/app").await.unwrap().unwrap();
    assert_eq!(secret.data["data"]["k"], "v");
}

#[tokio::test]
async fn test_logical_read_not_found_is_none() {
    let mock = MockVault::start().await;
    mock.mock_error("GET", "secret/data/missing", 404, &[]).await;

    let result = client(&mock, "root").logical().read("secret/data/missing").await.unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn test_permission_denied_carries_vault_errors() {
    let mock = MockVault::start().await;
    mock.mock_error("GET", "secret/data/locked", 403, &["permission denied"])
        .await;

    let err = client(&mock, "root")
        .logical()
        .read("secret/data/locked")
        .await
        .unwrap_err();
    match err {
        VaultError::PermissionDenied(detail) => assert!(detail.contains("permission denied")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_bad_request_maps_to_api_error() {
    let mock = MockVault::start().await;
    mock.mock_error("POST", "secret/data/app", 400, &["check-and-set parameter did not match"])
        .await;

    let err = client(&mock, "root")
        .logical()
        .write("secret/data/app", json!({"data": {}}))
        .await
        .unwrap_err();
    match err {
        VaultError::Api { status, errors } => {
            assert_eq!(status, 400);
            assert_eq!(errors, vec!["check-and-set parameter did not match"]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_list_adds_list_query() {
    let mock = MockVault::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/secret/metadata/apps"))
        .and(query_param("list", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"keys": ["a", "b/"]}})))
        .mount(mock.server())
        .await;

    let secret = client(&mock, "root")
        .logical()
        .list("secret/metadata/apps")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(secret.data["keys"], json!(["a", "b/"]));
}

#[tokio::test]
async fn test_empty_response_is_none() {
    let mock = MockVault::start().await;
    Mock::given(method("DELETE"))
        .and(path("/v1/secret/data/app"))
        .respond_with(ResponseTemplate::new(204))
        .mount(mock.server())
        .await;

    let result = client(&mock, "root").logical().delete("secret/data/app").await.unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn test_unavailable_is_retried() {
    let mock = MockVault::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/sys/health-check"))
        .respond_with(ResponseTemplate::new(503).set_body_json(fixtures::error_response(&["sealed"])))
        .up_to_n_times(1)
        .mount(mock.server())
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/sys/health-check"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"ok": true}})))
        .mount(mock.server())
        .await;

    let client = VaultClient::new(
        VaultConfig::new(mock.uri())
            .with_token("root")
            .with_max_retries(2)
            .with_retry_delay(Duration::from_millis(10)),
    )
    .unwrap();

    let secret = client.logical().read("sys/health-check").await.unwrap().unwrap();
    assert_eq!(secret.data["ok"], true);
    assert_eq!(mock.received_requests().await.len(), 2);
}

#[tokio::test]
async fn test_permission_denied_is_not_retried() {
    let mock = MockVault::start().await;
    mock.mock_error("GET", "secret/data/locked", 403, &["permission denied"])
        .await;

    let client = VaultClient::new(
        VaultConfig::new(mock.uri())
            .with_token("root")
            .with_max_retries(3)
            .with_retry_delay(Duration::from_millis(10)),
    )
    .unwrap();

    assert!(client.logical().read("secret/data/locked").await.is_err());
    assert_eq!(mock.received_requests().await.len(), 1);
}

#[tokio::test]
async fn test_circuit_breaker_opens_after_failures() {
    let mock = MockVault::start().await;
    mock.mock_error("GET", "secret/data/app", 500, &["internal error"])
        .await;

    let client = VaultClient::new(
        VaultConfig::new(mock.uri())
            .with_token("root")
            .with_max_retries(0)
            .with_circuit_breaker_threshold(2),
    )
    .unwrap();

    for _ in 0..2 {
        let err = client.logical().read("secret/data/app").await.unwrap_err();
        assert!(matches!(err, VaultError::Unavailable(_)));
    }
    let err = client.logical().read("secret/data/app").await.unwrap_err();
    assert!(matches!(err, VaultError::CircuitBreakerOpen));
    assert_eq!(mock.received_requests().await.len(), 2);
}

fn fragile_client(mock: &MockVault, max_retries: u32) -> VaultClient {
    VaultClient::new(
        VaultConfig::new(mock.uri())
            .with_token("root")
            .with_max_retries(max_retries)
            .with_circuit_breaker_threshold(1)
            .with_circuit_breaker_timeout(Duration::ZERO),
    )
    .unwrap()
}

#[tokio::test]
async fn test_refused_requests_close_half_open_circuit() {
    let mock = MockVault::start().await;
    mock.mock_error("GET", "secret/data/flaky", 503, &["sealed"]).await;
    mock.mock_error("GET", "secret/data/missing", 404, &[]).await;
    mock.mock_json("GET", "secret/data/app", 200, json!({"data": {"data": {"k": "v"}}}))
        .await;

    let client = fragile_client(&mock, 0);
    assert!(client.logical().read("secret/data/flaky").await.is_err());

    // a 404 is a healthy answer from Vault
    for _ in 0..3 {
        assert!(client.logical().read("secret/data/missing").await.unwrap().is_none());
    }
    for _ in 0..3 {
        assert!(client.logical().read("secret/data/app").await.unwrap().is_some());
    }
}

#[tokio::test]
async fn test_requests_failing_before_send_do_not_hold_half_open_slots() {
    let mock = MockVault::start().await;
    mock.mock_error("GET", "secret/data/flaky", 503, &["sealed"]).await;
    mock.mock_json("GET", "secret/data/app", 200, json!({"data": {"data": {"k": "v"}}}))
        .await;

    let client = fragile_client(&mock, 0);
    assert!(client.logical().read("secret/data/flaky").await.is_err());

    client.clear_token();
    for _ in 0..5 {
        let err = client.logical().read("secret/data/app").await.unwrap_err();
        assert!(matches!(err, VaultError::AuthenticationFailed(_)));
    }

    client.set_token("root");
    assert!(client.logical().read("secret/data/app").await.unwrap().is_some());
}

#[tokio::test]
async fn test_unwrap_is_never_retried() {
    let mock = MockVault::start().await;
    mock.mock_error("POST", "sys/wrapping/unwrap", 503, &["upstream timeout"])
        .await;

    let client = VaultClient::new(
        VaultConfig::new(mock.uri())
            .with_max_retries(3)
            .with_retry_delay(Duration::from_millis(1)),
    )
    .unwrap();
    let err = client
        .sys()
        .unwrap(SecretString::from("wrapping-token".to_string()))
        .await
        .unwrap_err();

    assert!(matches!(err, VaultError::Unavailable(_)));
    assert_eq!(mock.received_requests().await.len(), 1);
}

#[tokio::test]
async fn test_missing_token_without_auth_method_fails() {
    let mock = MockVault::start().await;
    let client = VaultClient::new(VaultConfig::new(mock.uri()).with_max_retries(0)).unwrap();

    let err = client.logical().read("secret/data/app").await.unwrap_err();
    assert!(matches!(err, VaultError::AuthenticationFailed(_)));
    assert!(mock.received_requests().await.is_empty());
}

#[tokio::test]
async fn test_attached_auth_method_logs_in_on_first_request() {
    let mock = MockVault::start().await;
    mock.mock_login("auth/userpass/login/alice", "user-token", 3600, true)
        .await;
    mock.mock_kv2_read("secret", "app", "user-token", &json!({"password": "s3cret"}))
        .await;

    let client = VaultClient::new(VaultConfig::new(mock.uri()).with_max_retries(0))
        .unwrap()
        .with_auth_method(UserpassAuth::new(
            "alice",
            CredentialSource::from_string("pw"),
        ));

    let secret = client.kv2("secret").get("app").await.unwrap();
    assert_eq!(secret.string("password").unwrap(), "s3cret");

    // the second read reuses the token
    client.kv2("secret").get("app").await.unwrap();
    let logins = mock
        .received_requests()
        .await
        .iter()
        .filter(|r| r.url.path().starts_with("/v1/auth/"))
        .count();
    assert_eq!(logins, 1);
}

#[tokio::test]
async fn test_token_inside_grace_period_triggers_login() {
    let mock = MockVault::start().await;
    // a 10s token with a 30s grace period is always due for refresh
    mock.mock_login("auth/userpass/login/alice", "short-token", 10, true)
        .await;
    mock.mock_kv2_read("secret", "app", "short-token", &json!({"k": "v"}))
        .await;

    let client = VaultClient::new(VaultConfig::new(mock.uri()).with_max_retries(0))
        .unwrap()
        .with_auth_method(UserpassAuth::new("alice", CredentialSource::from_string("pw")));

    client.kv2("secret").get("app").await.unwrap();
    client.kv2("secret").get("app").await.unwrap();

    let logins = mock
        .received_requests()
        .await
        .iter()
        .filter(|r| r.url.path().starts_with("/v1/auth/"))
        .count();
    assert_eq!(logins, 2);
}
