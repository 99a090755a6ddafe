//! Vault client configuration.
//!
//! Mirrors the environment contract of the official Vault clients
//! (`VAULT_ADDR`, `VAULT_TOKEN`, `VAULT_NAMESPACE`, ...). Parsing goes
//! through a lookup function so callers can feed values from anywhere.

use crate::error::{VaultError, VaultResult};
use secrecy::SecretString;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Default address used when `VAULT_ADDR` is unset.
pub const DEFAULT_ADDR: &str = "https://127.0.0.1:8200";

/// Vault client configuration.
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Vault server address
    pub addr: String,
    /// Pre-issued token, if any
    pub token: Option<SecretString>,
    /// Enterprise namespace sent as `X-Vault-Namespace`
    pub namespace: Option<String>,
    /// Request timeout
    pub timeout: Duration,
    /// Maximum retry attempts for retryable failures
    pub max_retries: u32,
    /// Base retry delay
    pub retry_delay: Duration,
    /// PEM bundle used to verify the server certificate
    pub ca_cert: Option<PathBuf>,
    /// Disable TLS verification (development only)
    pub skip_verify: bool,
    /// Window before token expiry in which an attached auth method logs in again
    pub grace_period: Duration,
    /// Circuit breaker failure threshold
    pub circuit_breaker_threshold: u32,
    /// Circuit breaker reset timeout
    pub circuit_breaker_timeout: Duration,
    /// User agent sent with every request
    pub user_agent: String,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            token: None,
            namespace: None,
            timeout: Duration::from_secs(60),
            max_retries: 2,
            retry_delay: Duration::from_millis(100),
            ca_cert: None,
            skip_verify: false,
            grace_period: Duration::from_secs(30),
            circuit_breaker_threshold: 5,
            circuit_breaker_timeout: Duration::from_secs(30),
            user_agent: concat!("vault-client-rs/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl VaultConfig {
    /// Create a new configuration for the given address.
    #[must_use]
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            ..Default::default()
        }
    }

    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::InvalidConfig`] if a variable cannot be parsed
    /// or the resulting configuration is invalid.
    pub fn from_env() -> VaultResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::InvalidConfig`] if a value cannot be parsed
    /// or the resulting configuration is invalid.
    pub fn from_lookup<F>(lookup: F) -> VaultResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(addr) = get("VAULT_ADDR") {
            config.addr = addr.trim().to_string();
        }
        config.token = get("VAULT_TOKEN").map(|t| SecretString::from(t.trim().to_string()));
        config.namespace = get("VAULT_NAMESPACE");
        if let Some(raw) = get("VAULT_CLIENT_TIMEOUT") {
            config.timeout = Duration::from_secs(parse_number("VAULT_CLIENT_TIMEOUT", &raw)?);
        }
        if let Some(raw) = get("VAULT_MAX_RETRIES") {
            config.max_retries = parse_number("VAULT_MAX_RETRIES", &raw)?;
        }
        config.ca_cert = get("VAULT_CACERT").map(PathBuf::from);
        if let Some(raw) = get("VAULT_SKIP_VERIFY") {
            config.skip_verify = parse_bool("VAULT_SKIP_VERIFY", &raw)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::InvalidConfig`] describing the first problem found.
    pub fn validate(&self) -> VaultResult<()> {
        let url = Url::parse(&self.addr)
            .map_err(|e| VaultError::invalid_config(format!("VAULT_ADDR {:?}: {e}", self.addr)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(VaultError::invalid_config(format!(
                "VAULT_ADDR {:?}: unsupported scheme {}",
                self.addr,
                url.scheme()
            )));
        }
        if self.timeout.is_zero() {
            return Err(VaultError::invalid_config("timeout must be greater than 0"));
        }
        if self.circuit_breaker_threshold == 0 {
            return Err(VaultError::invalid_config(
                "circuit breaker threshold must be greater than 0",
            ));
        }
        Ok(())
    }

    /// Set the token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(SecretString::from(token.into()));
        self
    }

    /// Set the namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Set request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set maximum retries.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set base retry delay.
    #[must_use]
    pub const fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Set grace period.
    #[must_use]
    pub const fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Set the CA bundle path.
    #[must_use]
    pub fn with_ca_cert(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_cert = Some(path.into());
        self
    }

    /// Disable TLS certificate verification.
    #[must_use]
    pub const fn with_skip_verify(mut self, skip: bool) -> Self {
        self.skip_verify = skip;
        self
    }

    /// Set circuit breaker threshold.
    #[must_use]
    pub const fn with_circuit_breaker_threshold(mut self, threshold: u32) -> Self {
        self.circuit_breaker_threshold = threshold;
        self
    }

    /// Set how long the circuit stays open before letting trial requests through.
    #[must_use]
    pub const fn with_circuit_breaker_timeout(mut self, timeout: Duration) -> Self {
        self.circuit_breaker_timeout = timeout;
        self
    }

    /// Address with any trailing slash removed.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.addr.trim_end_matches('/')
    }
}

fn parse_number<T>(name: &str, raw: &str) -> VaultResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e: T::Err| VaultError::invalid_config(format!("{name}: {e}")))
}

fn parse_bool(name: &str, raw: &str) -> VaultResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "t" => Ok(true),
        "0" | "false" | "no" | "f" => Ok(false),
        other => Err(VaultError::invalid_config(format!(
            "{name}: invalid boolean {other:?}"
        ))),
    }
}
