//! Database secrets engine.

use crate::{
    client::{ApiRequest, VaultClient},
    error::{VaultError, VaultResult},
    provider::{DatabaseCredentialProvider, DatabaseCredentials},
    secrets::DatabaseCredsResponse,
};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{info, instrument};

/// Handle to a database secrets engine mount.
#[derive(Debug, Clone)]
pub struct DatabaseEngine {
    client: VaultClient,
    mount: String,
}

impl DatabaseEngine {
    /// Engine mounted at `mount` (usually `database`).
    #[must_use]
    pub fn new(client: VaultClient, mount: impl Into<String>) -> Self {
        Self {
            client,
            mount: mount.into().trim_matches('/').to_string(),
        }
    }

    async fn fetch(&self, path: String) -> VaultResult<DatabaseCredentials> {
        let value = self
            .client
            .send(ApiRequest::get(path.as_str()))
            .await?
            .ok_or_else(|| VaultError::not_found(path))?;
        let response: DatabaseCredsResponse = serde_json::from_value(value)?;

        // static roles report their rotation period in data.ttl
        let ttl = response.data.ttl.unwrap_or(response.lease_duration);
        Ok(DatabaseCredentials {
            username: response.data.username,
            password: response.data.password,
            lease_id: response.lease_id,
            ttl: Duration::from_secs(ttl),
            renewable: response.renewable,
        })
    }
}

#[async_trait]
impl DatabaseCredentialProvider for DatabaseEngine {
    type Error = VaultError;

    #[instrument(skip(self), fields(mount = %self.mount))]
    async fn get_credentials(&self, role: &str) -> VaultResult<DatabaseCredentials> {
        let creds = self.fetch(format!("{}/creds/{role}", self.mount)).await?;
        info!(
            username = %creds.username,
            ttl_secs = creds.ttl.as_secs(),
            "Obtained dynamic database credentials"
        );
        Ok(creds)
    }

    #[instrument(skip(self), fields(mount = %self.mount))]
    async fn get_static_credentials(&self, role: &str) -> VaultResult<DatabaseCredentials> {
        self.fetch(format!("{}/static-creds/{role}", self.mount))
            .await
    }
}
