//! Mock Vault server for integration tests.
//!
//! Wraps a [`wiremock::MockServer`] with helpers for the endpoints the
//! client talks to. Token-carrying endpoints only match when the expected
//! `X-Vault-Token` header is present.

use crate::fixtures;
use serde_json::Value;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{header, method, path},
};

/// A running mock Vault.
pub struct MockVault {
    server: MockServer,
}

impl MockVault {
    /// Start a mock Vault on a random local port.
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Address to point a client at.
    #[must_use]
    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// Underlying wiremock server, for custom expectations.
    #[must_use]
    pub const fn server(&self) -> &MockServer {
        &self.server
    }

    /// Requests received so far.
    pub async fn received_requests(&self) -> Vec<wiremock::Request> {
        self.server.received_requests().await.unwrap_or_default()
    }

    /// Answer `POST /v1/<login_path>` with a login issuing `token`.
    pub async fn mock_login(&self, login_path: &str, token: &str, ttl: u64, renewable: bool) {
        Mock::given(method("POST"))
            .and(path(format!("/v1/{login_path}")))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(fixtures::login_response(token, ttl, renewable)),
            )
            .mount(&self.server)
            .await;
    }

    /// Answer a KV-v2 read of `<mount>/data/<secret_path>` made with `token`.
    pub async fn mock_kv2_read(&self, mount: &str, secret_path: &str, token: &str, data: &Value) {
        Mock::given(method("GET"))
            .and(path(format!("/v1/{mount}/data/{secret_path}")))
            .and(header("X-Vault-Token", token))
            .respond_with(ResponseTemplate::new(200).set_body_json(fixtures::kv2_read_response(data, 1)))
            .mount(&self.server)
            .await;
    }

    /// Answer a KV-v2 write to `<mount>/data/<secret_path>` made with `token`.
    pub async fn mock_kv2_write(&self, mount: &str, secret_path: &str, token: &str, version: u64) {
        Mock::given(method("POST"))
            .and(path(format!("/v1/{mount}/data/{secret_path}")))
            .and(header("X-Vault-Token", token))
            .respond_with(ResponseTemplate::new(200).set_body_json(fixtures::kv2_write_response(version)))
            .mount(&self.server)
            .await;
    }

    /// Answer `auth/token/lookup-self` made with `token`.
    pub async fn mock_lookup_self(&self, token: &str, ttl: u64, renewable: bool) {
        Mock::given(method("GET"))
            .and(path("/v1/auth/token/lookup-self"))
            .and(header("X-Vault-Token", token))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(fixtures::token_lookup_response(ttl, renewable)),
            )
            .mount(&self.server)
            .await;
    }

    /// Answer `auth/token/renew-self` made with `token`.
    pub async fn mock_renew_self(&self, token: &str, ttl: u64, renewable: bool) {
        Mock::given(method("POST"))
            .and(path("/v1/auth/token/renew-self"))
            .and(header("X-Vault-Token", token))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(fixtures::login_response(token, ttl, renewable)),
            )
            .mount(&self.server)
            .await;
    }

    /// Answer `sys/wrapping/unwrap` presented with `wrapping_token`.
    pub async fn mock_unwrap(&self, wrapping_token: &str, secret_id: &str) {
        Mock::given(method("POST"))
            .and(path("/v1/sys/wrapping/unwrap"))
            .and(header("X-Vault-Token", wrapping_token))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(fixtures::unwrapped_secret_id_response(secret_id)),
            )
            .mount(&self.server)
            .await;
    }

    /// Answer `<http_method> /v1/<api_path>` with `status` and a Vault
    /// error body.
    pub async fn mock_error(&self, http_method: &str, api_path: &str, status: u16, errors: &[&str]) {
        Mock::given(method(http_method))
            .and(path(format!("/v1/{api_path}")))
            .respond_with(ResponseTemplate::new(status).set_body_json(fixtures::error_response(errors)))
            .mount(&self.server)
            .await;
    }

    /// Answer `<http_method> /v1/<api_path>` with `status` and `body`.
    pub async fn mock_json(&self, http_method: &str, api_path: &str, status: u16, body: Value) {
        Mock::given(method(http_method))
            .and(path(format!("/v1/{api_path}")))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&self.server)
            .await;
    }
}
