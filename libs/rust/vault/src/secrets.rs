//! Secret types and structures returned by the Vault HTTP API.

use crate::error::{VaultError, VaultResult};
use secrecy::SecretString;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::time::Duration;

/// Generic Vault response envelope.
///
/// Every logical read/write and every login returns this shape; which of
/// `data`, `auth` and `wrap_info` are populated depends on the endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Secret {
    /// Request identifier assigned by Vault
    pub request_id: String,
    /// Lease identifier for dynamic secrets
    pub lease_id: String,
    /// Lease duration in seconds
    pub lease_duration: u64,
    /// Whether the lease can be renewed
    pub renewable: bool,
    /// Endpoint-specific payload
    #[serde(deserialize_with = "null_as_default")]
    pub data: Map<String, Value>,
    /// Populated by login and token endpoints
    pub auth: Option<SecretAuth>,
    /// Populated when the response was wrapped
    pub wrap_info: Option<WrapInfo>,
    /// Non-fatal warnings
    #[serde(deserialize_with = "null_as_default")]
    pub warnings: Vec<String>,
}

/// Auth block of a login or token response.
#[derive(Debug, Clone, Deserialize)]
pub struct SecretAuth {
    /// Token to use for subsequent requests
    pub client_token: SecretString,
    /// Token accessor
    #[serde(default)]
    pub accessor: String,
    /// All policies attached to the token
    #[serde(default, deserialize_with = "null_as_default")]
    pub policies: Vec<String>,
    /// Policies attached directly to the token
    #[serde(default, deserialize_with = "null_as_default")]
    pub token_policies: Vec<String>,
    /// Auth method metadata
    #[serde(default, deserialize_with = "null_as_default")]
    pub metadata: HashMap<String, String>,
    /// Token TTL in seconds
    #[serde(default)]
    pub lease_duration: u64,
    /// Whether the token can be renewed
    #[serde(default)]
    pub renewable: bool,
}

/// Response-wrapping information.
#[derive(Debug, Clone, Deserialize)]
pub struct WrapInfo {
    /// Single-use wrapping token
    pub token: SecretString,
    /// Wrapping token TTL in seconds
    #[serde(default)]
    pub ttl: u64,
    /// Creation timestamp (RFC 3339)
    #[serde(default)]
    pub creation_time: String,
    /// Path that produced the wrapped response
    #[serde(default)]
    pub creation_path: String,
    /// Accessor of the wrapping token
    #[serde(default)]
    pub accessor: String,
}

impl Secret {
    /// TTL of the token carried by this secret.
    ///
    /// Prefers the auth block; for token lookups (no auth block) reads the
    /// `ttl` field of the data.
    #[must_use]
    pub fn token_ttl(&self) -> Duration {
        if let Some(auth) = &self.auth {
            return Duration::from_secs(auth.lease_duration);
        }
        Duration::from_secs(self.data.get("ttl").and_then(Value::as_u64).unwrap_or(0))
    }

    /// Whether the token carried by this secret is renewable.
    #[must_use]
    pub fn token_is_renewable(&self) -> bool {
        if let Some(auth) = &self.auth {
            return auth.renewable;
        }
        self.data
            .get("renewable")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Lease duration of the secret itself.
    #[must_use]
    pub const fn lease_ttl(&self) -> Duration {
        Duration::from_secs(self.lease_duration)
    }

    /// Extract a string field from `data`.
    ///
    /// # Errors
    ///
    /// [`VaultError::MissingField`] if absent, [`VaultError::UnexpectedType`]
    /// if present but not a string.
    pub fn string_field(&self, key: &str) -> VaultResult<&str> {
        string_field(&self.data, key)
    }

    /// Extract a nested object from `data`, as KV-v2 reads through the
    /// logical API nest the payload under `data.data`.
    ///
    /// # Errors
    ///
    /// [`VaultError::MissingField`] if absent, [`VaultError::UnexpectedType`]
    /// if present but not an object.
    pub fn object_field(&self, key: &str) -> VaultResult<&Map<String, Value>> {
        let value = self
            .data
            .get(key)
            .ok_or_else(|| VaultError::missing_field(key))?;
        value
            .as_object()
            .ok_or_else(|| VaultError::unexpected_type(key, "object", value))
    }
}

/// Extract a string value from a JSON map with typed errors.
///
/// # Errors
///
/// [`VaultError::MissingField`] if absent, [`VaultError::UnexpectedType`]
/// if present but not a string.
pub fn string_field<'a>(map: &'a Map<String, Value>, key: &str) -> VaultResult<&'a str> {
    let value = map.get(key).ok_or_else(|| VaultError::missing_field(key))?;
    value
        .as_str()
        .ok_or_else(|| VaultError::unexpected_type(key, "string", value))
}

/// Vault database credentials response
#[derive(Debug, Deserialize)]
pub struct DatabaseCredsResponse {
    /// Credential payload
    pub data: DatabaseCredsData,
    /// Lease identifier (empty for static roles)
    #[serde(default)]
    pub lease_id: String,
    /// Lease duration in seconds
    #[serde(default)]
    pub lease_duration: u64,
    /// Whether the lease can be renewed
    #[serde(default)]
    pub renewable: bool,
}

/// Username/password pair issued by the database secrets engine.
#[derive(Debug, Deserialize)]
pub struct DatabaseCredsData {
    /// Database user
    pub username: String,
    /// Database password
    pub password: SecretString,
    /// Remaining TTL for static roles
    #[serde(default)]
    pub ttl: Option<u64>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use serde_json::json;

    #[test]
    fn test_login_response_parses() {
        let secret: Secret = serde_json::from_value(json!({
            "request_id": "r-1",
            "lease_id": "",
            "lease_duration": 0,
            "renewable": false,
            "data": null,
            "warnings": null,
            "wrap_info": null,
            "auth": {
                "client_token": "hvs.abc",
                "accessor": "acc",
                "policies": ["default", "dev-policy"],
                "token_policies": ["default", "dev-policy"],
                "metadata": {"username": "my-user"},
                "lease_duration": 3600,
                "renewable": true
            }
        }))
        .unwrap();

        let auth = secret.auth.as_ref().unwrap();
        assert_eq!(auth.client_token.expose_secret(), "hvs.abc");
        assert_eq!(secret.token_ttl(), Duration::from_secs(3600));
        assert!(secret.token_is_renewable());
        assert!(secret.data.is_empty());
    }

    #[test]
    fn test_token_lookup_fields_used_without_auth() {
        let secret: Secret = serde_json::from_value(json!({
            "data": {"ttl": 120, "renewable": true, "policies": ["root"]}
        }))
        .unwrap();
        assert_eq!(secret.token_ttl(), Duration::from_secs(120));
        assert!(secret.token_is_renewable());
    }

    #[test]
    fn test_string_field_errors() {
        let secret: Secret = serde_json::from_value(json!({
            "data": {"password": "Hashi123", "port": 5432}
        }))
        .unwrap();
        assert_eq!(secret.string_field("password").unwrap(), "Hashi123");
        assert!(matches!(
            secret.string_field("username"),
            Err(VaultError::MissingField(_))
        ));
        assert!(matches!(
            secret.string_field("port"),
            Err(VaultError::UnexpectedType { expected: "string", .. })
        ));
    }

    #[test]
    fn test_object_field_nested_kv_payload() {
        let secret: Secret = serde_json::from_value(json!({
            "data": {"data": {"password": "p"}, "metadata": {"version": 1}}
        }))
        .unwrap();
        let inner = secret.object_field("data").unwrap();
        assert_eq!(string_field(inner, "password").unwrap(), "p");
    }

    #[test]
    fn test_debug_hides_client_token() {
        let secret: Secret = serde_json::from_value(json!({
            "auth": {"client_token": "hvs.super-secret", "lease_duration": 60}
        }))
        .unwrap();
        let rendered = format!("{secret:?}");
        assert!(!rendered.contains("hvs.super-secret"));
    }
}
