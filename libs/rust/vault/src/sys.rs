//! System backend: response wrapping and lease management.

use crate::{
    client::{ApiRequest, VaultClient},
    error::{VaultError, VaultResult},
    secrets::Secret,
};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use std::time::Duration;
use tracing::instrument;

/// System backend handle.
#[derive(Debug, Clone, Copy)]
pub struct Sys<'a> {
    client: &'a VaultClient,
}

impl<'a> Sys<'a> {
    pub(crate) const fn new(client: &'a VaultClient) -> Self {
        Self { client }
    }

    /// Unwrap a response-wrapping token and return the wrapped response.
    ///
    /// The wrapping token is presented as the request token, so the call
    /// works without (and never uses) the client's own token. Wrapping
    /// tokens are single use, so the call is never retried.
    ///
    /// # Errors
    ///
    /// Returns any transport or API error, or [`VaultError::MissingField`]
    /// if Vault answers with an empty body.
    #[instrument(skip(self, wrapping_token))]
    pub async fn unwrap(&self, wrapping_token: SecretString) -> VaultResult<Secret> {
        self.client
            .send_secret(
                ApiRequest::post("sys/wrapping/unwrap")
                    .with_token(wrapping_token)
                    .single_use(),
            )
            .await?
            .ok_or_else(|| VaultError::missing_field("data"))
    }

    /// Look up the properties of a wrapping token without consuming it.
    ///
    /// # Errors
    ///
    /// Returns any transport or API error.
    #[instrument(skip(self, wrapping_token))]
    pub async fn lookup_wrapping(&self, wrapping_token: &SecretString) -> VaultResult<Secret> {
        let body = json!({ "token": wrapping_token.expose_secret() });
        self.client
            .send_secret(ApiRequest::post("sys/wrapping/lookup").body(body).anonymous())
            .await?
            .ok_or_else(|| VaultError::missing_field("data"))
    }

    /// Renew a lease, asking for `increment` more time.
    ///
    /// # Errors
    ///
    /// Returns any transport or API error.
    #[instrument(skip(self))]
    pub async fn renew_lease(&self, lease_id: &str, increment: Duration) -> VaultResult<Secret> {
        let body = json!({ "lease_id": lease_id, "increment": increment.as_secs() });
        self.client
            .send_secret(ApiRequest::put("sys/leases/renew").body(body))
            .await?
            .ok_or_else(|| VaultError::missing_field("lease_id"))
    }

    /// Revoke a lease immediately.
    ///
    /// # Errors
    ///
    /// Returns any transport or API error.
    #[instrument(skip(self))]
    pub async fn revoke_lease(&self, lease_id: &str) -> VaultResult<()> {
        self.client
            .send(ApiRequest::put("sys/leases/revoke").body(json!({ "lease_id": lease_id })))
            .await
            .map(|_| ())
    }
}
