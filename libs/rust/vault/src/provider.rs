//! Typed secret retrieval traits.

use crate::{
    error::{VaultError, VaultResult},
    kv2::{Kv2, KvSecret},
};
use async_trait::async_trait;
use secrecy::SecretString;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::instrument;

/// Metadata about a retrieved secret
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecretMetadata {
    /// Lease ID for renewable secrets
    pub lease_id: Option<String>,
    /// Time-to-live for the secret
    pub ttl: Duration,
    /// Whether the secret is renewable
    pub renewable: bool,
    /// Version number (for KV v2)
    pub version: Option<u64>,
}

/// Generic trait for secret providers with type-safe retrieval
#[async_trait]
pub trait SecretProvider: Send + Sync {
    /// Error returned by the provider
    type Error: std::error::Error + Send + Sync;

    /// Get a secret and deserialize to type T
    async fn get_secret<T>(&self, path: &str) -> Result<(T, SecretMetadata), Self::Error>
    where
        T: DeserializeOwned + Send;

    /// Get a specific version of a secret (KV v2)
    async fn get_secret_version<T>(
        &self,
        path: &str,
        version: u64,
    ) -> Result<(T, SecretMetadata), Self::Error>
    where
        T: DeserializeOwned + Send;

    /// Renew a lease, returning the new TTL
    async fn renew_lease(&self, lease_id: &str, increment: Duration) -> Result<Duration, Self::Error>;

    /// Revoke a lease
    async fn revoke_lease(&self, lease_id: &str) -> Result<(), Self::Error>;
}

/// Trait for database credential providers
#[async_trait]
pub trait DatabaseCredentialProvider: Send + Sync {
    /// Error returned by the provider
    type Error: std::error::Error + Send + Sync;

    /// Get dynamic database credentials
    async fn get_credentials(&self, role: &str) -> Result<DatabaseCredentials, Self::Error>;

    /// Get the current password of a static role
    async fn get_static_credentials(&self, role: &str) -> Result<DatabaseCredentials, Self::Error>;
}

/// Database credentials with lease information
#[derive(Debug, Clone)]
pub struct DatabaseCredentials {
    /// Database user
    pub username: String,
    /// Database password
    pub password: SecretString,
    /// Lease ID (empty for static roles)
    pub lease_id: String,
    /// Time until the credentials expire or rotate
    pub ttl: Duration,
    /// Whether the lease can be renewed
    pub renewable: bool,
}

impl DatabaseCredentials {
    /// Check if credentials should be renewed (at 80% of TTL)
    #[must_use]
    pub fn should_renew(&self, elapsed: Duration) -> bool {
        let threshold = self.ttl.as_secs_f64() * 0.8;
        elapsed.as_secs_f64() >= threshold
    }
}

fn decode<T: DeserializeOwned>(secret: KvSecret) -> VaultResult<(T, SecretMetadata)> {
    let metadata = SecretMetadata {
        lease_id: Some(secret.raw.lease_id.clone()).filter(|id| !id.is_empty()),
        ttl: secret.raw.lease_ttl(),
        renewable: secret.raw.renewable,
        version: secret.version_metadata.as_ref().map(|m| m.version),
    };
    let value: T = serde_json::from_value(Value::Object(secret.data))?;
    Ok((value, metadata))
}

#[async_trait]
impl SecretProvider for Kv2 {
    type Error = VaultError;

    #[instrument(skip(self), fields(mount = %self.mount()))]
    async fn get_secret<T>(&self, path: &str) -> VaultResult<(T, SecretMetadata)>
    where
        T: DeserializeOwned + Send,
    {
        decode(self.get(path).await?)
    }

    #[instrument(skip(self), fields(mount = %self.mount()))]
    async fn get_secret_version<T>(&self, path: &str, version: u64) -> VaultResult<(T, SecretMetadata)>
    where
        T: DeserializeOwned + Send,
    {
        decode(self.get_version(path, version).await?)
    }

    async fn renew_lease(&self, lease_id: &str, increment: Duration) -> VaultResult<Duration> {
        let renewed = self.client().sys().renew_lease(lease_id, increment).await?;
        Ok(renewed.lease_ttl())
    }

    async fn revoke_lease(&self, lease_id: &str) -> VaultResult<()> {
        self.client().sys().revoke_lease(lease_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::Secret;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Deserialize)]
    struct Creds {
        password: String,
    }

    #[test]
    fn test_should_renew_at_eighty_percent() {
        let creds = DatabaseCredentials {
            username: "v-app".to_string(),
            password: SecretString::from("p".to_string()),
            lease_id: "database/creds/app/1".to_string(),
            ttl: Duration::from_secs(100),
            renewable: true,
        };
        assert!(!creds.should_renew(Duration::from_secs(79)));
        assert!(creds.should_renew(Duration::from_secs(80)));
    }

    #[test]
    fn test_decode_kv_secret() {
        let raw: Secret = serde_json::from_value(json!({"lease_duration": 0})).unwrap();
        let secret = KvSecret {
            data: json!({"password": "Hashi123"}).as_object().unwrap().clone(),
            version_metadata: Some(crate::kv2::KvVersionMetadata {
                version: 4,
                ..Default::default()
            }),
            custom_metadata: std::collections::HashMap::new(),
            raw,
        };
        let (creds, meta): (Creds, _) = decode(secret).unwrap();
        assert_eq!(creds.password, "Hashi123");
        assert_eq!(meta.version, Some(4));
        assert!(meta.lease_id.is_none());
    }
}
