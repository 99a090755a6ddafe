//! Vault HTTP client with circuit breaker, retries and token management.

use crate::{
    auth::{Auth, AuthMethod},
    breaker::{CircuitBreaker, CircuitBreakerConfig},
    config::VaultConfig,
    error::{VaultError, VaultResult},
    http::build_vault_http_client,
    kv2::Kv2,
    retry::RetryPolicy,
    secrets::Secret,
    sys::Sys,
};
use parking_lot::RwLock;
use reqwest::{Client, Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::Value;
use std::{
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

const TOKEN_HEADER: &str = "X-Vault-Token";
const NAMESPACE_HEADER: &str = "X-Vault-Namespace";

#[derive(Default)]
struct TokenState {
    token: Option<SecretString>,
    expires_at: Option<Instant>,
}

/// Which token, if any, a request carries.
pub(crate) enum TokenMode {
    /// The client's current token, logging in first if needed
    Client,
    /// A specific token (e.g. a response-wrapping token)
    Explicit(SecretString),
    /// No token: login endpoints
    Anonymous,
}

/// A single call against the `/v1` API.
pub(crate) struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<Value>,
    token: TokenMode,
    merge_patch: bool,
    single_use: bool,
}

impl ApiRequest {
    pub(crate) fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into().trim_start_matches('/').to_string(),
            query: Vec::new(),
            body: None,
            token: TokenMode::Client,
            merge_patch: false,
            single_use: false,
        }
    }

    pub(crate) fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub(crate) fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub(crate) fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub(crate) fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub(crate) fn patch(path: impl Into<String>) -> Self {
        let mut request = Self::new(Method::PATCH, path);
        request.merge_patch = true;
        request
    }

    pub(crate) fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub(crate) fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub(crate) fn anonymous(mut self) -> Self {
        self.token = TokenMode::Anonymous;
        self
    }

    pub(crate) fn with_token(mut self, token: SecretString) -> Self {
        self.token = TokenMode::Explicit(token);
        self
    }

    /// Never retried: the request consumes what it presents.
    pub(crate) fn single_use(mut self) -> Self {
        self.single_use = true;
        self
    }

    pub(crate) fn path(&self) -> &str {
        &self.path
    }

    fn try_clone(&self) -> Self {
        Self {
            method: self.method.clone(),
            path: self.path.clone(),
            query: self.query.clone(),
            body: self.body.clone(),
            token: match &self.token {
                TokenMode::Client => TokenMode::Client,
                TokenMode::Explicit(t) => TokenMode::Explicit(t.clone()),
                TokenMode::Anonymous => TokenMode::Anonymous,
            },
            merge_patch: self.merge_patch,
            single_use: self.single_use,
        }
    }
}

#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<String>,
}

/// Vault client with shared token state, circuit breaker and retries.
///
/// Cloning is cheap; clones share the token, connection pool and breaker.
#[derive(Clone)]
pub struct VaultClient {
    config: Arc<VaultConfig>,
    http: Client,
    token: Arc<RwLock<TokenState>>,
    login_lock: Arc<Mutex<()>>,
    auth_method: Option<Arc<dyn AuthMethod>>,
    circuit_breaker: Arc<CircuitBreaker>,
    retry: RetryPolicy,
}

impl fmt::Debug for VaultClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultClient")
            .field("addr", &self.config.addr)
            .field("namespace", &self.config.namespace)
            .field("has_token", &self.token.read().token.is_some())
            .field("auth_method", &self.auth_method.as_ref().map(|m| m.name()))
            .finish_non_exhaustive()
    }
}

impl VaultClient {
    /// Create a new Vault client.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be built.
    pub fn new(config: VaultConfig) -> VaultResult<Self> {
        config.validate()?;
        let http = build_vault_http_client(&config)?;

        let cb_config = CircuitBreakerConfig {
            failure_threshold: config.circuit_breaker_threshold,
            reset_timeout: config.circuit_breaker_timeout,
            ..CircuitBreakerConfig::default()
        };
        let retry = RetryPolicy::new(config.max_retries, config.retry_delay);
        let token = TokenState {
            token: config.token.clone(),
            expires_at: None,
        };

        Ok(Self {
            config: Arc::new(config),
            http,
            token: Arc::new(RwLock::new(token)),
            login_lock: Arc::new(Mutex::new(())),
            auth_method: None,
            circuit_breaker: Arc::new(CircuitBreaker::new(cb_config)),
            retry,
        })
    }

    /// Create a client from `VAULT_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the environment holds invalid values.
    pub fn from_env() -> VaultResult<Self> {
        Self::new(VaultConfig::from_env()?)
    }

    /// Attach an auth method used to log in again whenever the token is
    /// missing or about to expire.
    #[must_use]
    pub fn with_auth_method<M>(mut self, method: M) -> Self
    where
        M: AuthMethod + 'static,
    {
        self.auth_method = Some(Arc::new(method));
        self
    }

    /// Client configuration.
    #[must_use]
    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// Vault address.
    #[must_use]
    pub fn address(&self) -> &str {
        self.config.base_url()
    }

    /// Current token, if any.
    #[must_use]
    pub fn token(&self) -> Option<SecretString> {
        self.token.read().token.clone()
    }

    /// Use `token` for subsequent requests. The token is treated as
    /// non-expiring.
    pub fn set_token(&self, token: impl Into<String>) {
        let mut state = self.token.write();
        state.token = Some(SecretString::from(token.into()));
        state.expires_at = None;
    }

    /// Forget the current token.
    pub fn clear_token(&self) {
        *self.token.write() = TokenState::default();
    }

    /// Install a token obtained from a login or renewal.
    pub(crate) fn install_token(&self, token: SecretString, ttl: Duration) {
        let mut state = self.token.write();
        state.token = Some(token);
        state.expires_at = (!ttl.is_zero()).then(|| Instant::now() + ttl);
    }

    /// Update the expiry of the current token after a renewal.
    pub(crate) fn extend_token(&self, ttl: Duration) {
        let mut state = self.token.write();
        if state.token.is_some() {
            state.expires_at = (!ttl.is_zero()).then(|| Instant::now() + ttl);
        }
    }

    /// Time left before the current token expires, if it expires at all.
    #[must_use]
    pub fn token_remaining(&self) -> Option<Duration> {
        self.token
            .read()
            .expires_at
            .map(|exp| exp.saturating_duration_since(Instant::now()))
    }

    /// Authentication API.
    #[must_use]
    pub const fn auth(&self) -> Auth<'_> {
        Auth::new(self)
    }

    /// Raw logical API.
    #[must_use]
    pub const fn logical(&self) -> Logical<'_> {
        Logical { client: self }
    }

    /// KV version 2 secrets engine mounted at `mount`.
    #[must_use]
    pub fn kv2(&self, mount: impl Into<String>) -> Kv2 {
        Kv2::new(self.clone(), mount)
    }

    /// System backend (response wrapping).
    #[must_use]
    pub const fn sys(&self) -> Sys<'_> {
        Sys::new(self)
    }

    fn token_needs_refresh(&self) -> bool {
        let state = self.token.read();
        match (&state.token, state.expires_at) {
            (None, _) => true,
            (Some(_), Some(exp)) => {
                exp.saturating_duration_since(Instant::now()) < self.config.grace_period
            }
            (Some(_), None) => false,
        }
    }

    async fn current_token(&self) -> VaultResult<SecretString> {
        if let Some(method) = &self.auth_method {
            if self.token_needs_refresh() {
                let _guard = self.login_lock.lock().await;
                // another task may have logged in while we waited
                if self.token_needs_refresh() {
                    debug!(method = method.name(), "Token missing or expiring, logging in");
                    self.auth().login(method.as_ref()).await?;
                }
            }
        }

        self.token()
            .ok_or_else(|| VaultError::auth_failed("no Vault token set"))
    }

    /// Unauthenticated write to a login endpoint; a response is required.
    pub(crate) async fn login_write(&self, path: &str, body: Value) -> VaultResult<Secret> {
        self.send_secret(ApiRequest::post(path).body(body).anonymous())
            .await?
            .ok_or(VaultError::NoAuthInfo)
    }

    /// Send a request and decode the response as a [`Secret`].
    pub(crate) async fn send_secret(&self, request: ApiRequest) -> VaultResult<Option<Secret>> {
        let path = request.path().to_string();
        let Some(value) = self.send(request).await? else {
            return Ok(None);
        };
        let secret: Secret = serde_json::from_value(value)?;
        for warning in &secret.warnings {
            warn!(path = %path, warning = %warning, "Vault returned a warning");
        }
        Ok(Some(secret))
    }

    /// Send a request through the circuit breaker and retry policy.
    ///
    /// Returns `None` for empty (204) responses.
    pub(crate) async fn send(&self, request: ApiRequest) -> VaultResult<Option<Value>> {
        if request.single_use {
            return self.send_guarded(request).await;
        }
        self.retry
            .execute(|| self.send_guarded(request.try_clone()))
            .await
    }

    async fn send_guarded(&self, request: ApiRequest) -> VaultResult<Option<Value>> {
        if !self.circuit_breaker.allow_request() {
            warn!(path = %request.path, "Circuit breaker open for Vault");
            return Err(VaultError::CircuitBreakerOpen);
        }
        let result = self.do_send(request).await;
        match &result {
            Ok(_) => self.circuit_breaker.record_success(),
            Err(e) if e.is_retryable() => self.circuit_breaker.record_failure(),
            // Vault answered; the server is healthy even if the call was refused
            Err(e) if e.is_server_answer() => self.circuit_breaker.record_success(),
            Err(_) => self.circuit_breaker.release(),
        }
        result
    }

    #[instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    async fn do_send(&self, request: ApiRequest) -> VaultResult<Option<Value>> {
        let url = format!("{}/v1/{}", self.config.base_url(), request.path);
        let token = match request.token {
            TokenMode::Client => Some(self.current_token().await?),
            TokenMode::Explicit(token) => Some(token),
            TokenMode::Anonymous => None,
        };

        let mut builder = self.http.request(request.method, &url);
        if let Some(token) = &token {
            builder = builder.header(TOKEN_HEADER, token.expose_secret());
        }
        if let Some(namespace) = &self.config.namespace {
            builder = builder.header(NAMESPACE_HEADER, namespace);
        }
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = if request.merge_patch {
                builder
                    .header(reqwest::header::CONTENT_TYPE, "application/merge-patch+json")
                    .body(serde_json::to_vec(body)?)
            } else {
                builder.json(body)
            };
        }

        let response = builder
            .send()
            .await
            .map_err(|e| VaultError::unavailable(e.to_string()))?;

        let status = response.status();
        let bytes = response.bytes().await?;

        if status.is_success() {
            if status == StatusCode::NO_CONTENT || bytes.iter().all(u8::is_ascii_whitespace) {
                return Ok(None);
            }
            return Ok(Some(serde_json::from_slice(&bytes)?));
        }

        let errors = serde_json::from_slice::<ErrorBody>(&bytes)
            .unwrap_or_default()
            .errors;
        debug!(status = status.as_u16(), ?errors, "Vault request failed");
        Err(status_error(status, &request.path, errors))
    }
}

fn status_error(status: StatusCode, path: &str, errors: Vec<String>) -> VaultError {
    let detail = if errors.is_empty() {
        path.to_string()
    } else {
        format!("{path}: {}", errors.join("; "))
    };
    match status.as_u16() {
        404 => VaultError::not_found(path),
        401 | 403 => VaultError::PermissionDenied(detail),
        429 => VaultError::RateLimited,
        s if s >= 500 => VaultError::unavailable(format!("Status {status}: {detail}")),
        s => VaultError::Api { status: s, errors },
    }
}

/// Raw access to arbitrary Vault paths.
#[derive(Debug, Clone, Copy)]
pub struct Logical<'a> {
    client: &'a VaultClient,
}

impl Logical<'_> {
    /// Read `path`. A missing path yields `None`.
    ///
    /// # Errors
    ///
    /// Returns any transport or API error other than not-found.
    pub async fn read(&self, path: &str) -> VaultResult<Option<Secret>> {
        self.read_with_query(path, &[]).await
    }

    /// Read `path` with query parameters (e.g. `version`).
    ///
    /// # Errors
    ///
    /// Returns any transport or API error other than not-found.
    pub async fn read_with_query(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> VaultResult<Option<Secret>> {
        let request = query
            .iter()
            .fold(ApiRequest::get(path), |req, (k, v)| req.query(k, v));
        match self.client.send_secret(request).await {
            Err(e) if e.is_not_found() => Ok(None),
            other => other,
        }
    }

    /// Write `data` to `path`.
    ///
    /// # Errors
    ///
    /// Returns any transport or API error.
    pub async fn write(&self, path: &str, data: Value) -> VaultResult<Option<Secret>> {
        self.client
            .send_secret(ApiRequest::post(path).body(data))
            .await
    }

    /// Delete `path`.
    ///
    /// # Errors
    ///
    /// Returns any transport or API error.
    pub async fn delete(&self, path: &str) -> VaultResult<Option<Secret>> {
        self.client.send_secret(ApiRequest::delete(path)).await
    }

    /// List keys under `path`. A missing path yields `None`.
    ///
    /// # Errors
    ///
    /// Returns any transport or API error other than not-found.
    pub async fn list(&self, path: &str) -> VaultResult<Option<Secret>> {
        self.read_with_query(path, &[("list", "true")]).await
    }
}
