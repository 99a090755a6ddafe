//! Vault error types using thiserror 2.0.
//!
//! Every failure the client can hit (transport, Vault API status codes,
//! credential acquisition, response shape) maps onto [`VaultError`], with a
//! retryability classification used by the retry policy and circuit breaker.

use thiserror::Error;

/// Vault-specific errors.
#[derive(Error, Debug)]
pub enum VaultError {
    /// Vault server unavailable (5xx, sealed, or connection failure)
    #[error("Vault unavailable: {0}")]
    Unavailable(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Secret not found
    #[error("Secret not found at path: {0}")]
    SecretNotFound(String),

    /// Permission denied
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Rate limited
    #[error("Rate limited")]
    RateLimited,

    /// Circuit breaker open
    #[error("Circuit breaker open")]
    CircuitBreakerOpen,

    /// Vault rejected the request
    #[error("Vault API error (status {status}): {}", errors.join("; "))]
    Api {
        /// HTTP status code returned by Vault
        status: u16,
        /// Error messages from the `errors` array of the response body
        errors: Vec<String>,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Credentials could not be obtained from env, file, or cloud metadata
    #[error("Unable to obtain credentials: {0}")]
    Credentials(String),

    /// Login call returned no auth block
    #[error("no auth info was returned after login")]
    NoAuthInfo,

    /// Expected field absent from a response
    #[error("missing field: {0}")]
    MissingField(String),

    /// Field present but of the wrong JSON type
    #[error("value type assertion failed for {field}: expected {expected}, found {found}")]
    UnexpectedType {
        /// Field name
        field: String,
        /// Expected JSON type
        expected: &'static str,
        /// Actual JSON value rendered for diagnostics
        found: String,
    },

    /// Token or lease cannot be renewed
    #[error("lifetime watcher: secret is not renewable")]
    NotRenewable,

    /// Lease renewal failed
    #[error("Lease renewal failed: {0}")]
    LeaseRenewalFailed(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Local I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for Vault operations.
pub type VaultResult<T> = Result<T, VaultError>;

impl VaultError {
    /// Check if error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Unavailable(_) | Self::RateLimited | Self::Http(_)
        )
    }

    /// Whether Vault itself produced this error as an HTTP answer.
    #[must_use]
    pub const fn is_server_answer(&self) -> bool {
        matches!(
            self,
            Self::Api { .. } | Self::PermissionDenied(_) | Self::SecretNotFound(_)
        )
    }

    /// Create an unavailable error.
    #[must_use]
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Create an authentication failed error.
    #[must_use]
    pub fn auth_failed(msg: impl Into<String>) -> Self {
        Self::AuthenticationFailed(msg.into())
    }

    /// Create a secret not found error.
    #[must_use]
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::SecretNotFound(path.into())
    }

    /// Create a credentials error.
    #[must_use]
    pub fn credentials(msg: impl Into<String>) -> Self {
        Self::Credentials(msg.into())
    }

    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a missing field error.
    #[must_use]
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField(field.into())
    }

    /// Build a type-assertion error from the offending JSON value.
    #[must_use]
    pub fn unexpected_type(
        field: impl Into<String>,
        expected: &'static str,
        found: &serde_json::Value,
    ) -> Self {
        Self::UnexpectedType {
            field: field.into(),
            expected,
            found: found.to_string(),
        }
    }

    /// Whether this error means the requested path holds no secret.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::SecretNotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = VaultError::unavailable("connection refused");
        assert_eq!(err.to_string(), "Vault unavailable: connection refused");
    }

    #[test]
    fn test_api_error_joins_messages() {
        let err = VaultError::Api {
            status: 400,
            errors: vec!["missing role_id".to_string(), "invalid secret".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Vault API error (status 400): missing role_id; invalid secret"
        );
    }

    #[test]
    fn test_retryable_errors() {
        assert!(VaultError::Unavailable("timeout".to_string()).is_retryable());
        assert!(VaultError::RateLimited.is_retryable());
        assert!(!VaultError::SecretNotFound("path".to_string()).is_retryable());
        assert!(!VaultError::CircuitBreakerOpen.is_retryable());
        assert!(!VaultError::NoAuthInfo.is_retryable());
        assert!(!VaultError::credentials("no env").is_retryable());
    }

    #[test]
    fn test_server_answers() {
        assert!(VaultError::not_found("kv/data/missing").is_server_answer());
        assert!(VaultError::PermissionDenied("denied".to_string()).is_server_answer());
        assert!(!VaultError::unavailable("503").is_server_answer());
        assert!(!VaultError::credentials("no env").is_server_answer());
    }

    #[test]
    fn test_unexpected_type_renders_value() {
        let err = VaultError::unexpected_type("password", "string", &serde_json::json!(42));
        assert_eq!(
            err.to_string(),
            "value type assertion failed for password: expected string, found 42"
        );
    }
}
