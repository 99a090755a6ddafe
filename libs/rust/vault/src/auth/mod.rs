//! Pluggable authentication backends.
//!
//! Each backend implements [`AuthMethod`]: it gathers credentials (from
//! strings, environment, files or cloud metadata services) and exchanges
//! them for a Vault token through an unauthenticated login call.
//! [`Auth::login`] installs the returned token on the client.

mod approle;
mod aws;
mod azure;
mod gcp;
mod kubernetes;
pub mod sigv4;
mod token;
mod userpass;

pub use approle::AppRoleAuth;
pub use aws::{AwsAuth, AwsAuthType, AwsCredentials};
pub use azure::AzureAuth;
pub use gcp::{GcpAuth, GcpAuthType};
pub use kubernetes::{DEFAULT_SERVICE_ACCOUNT_TOKEN_PATH, KubernetesAuth};
pub use token::TokenAuth;
pub use userpass::UserpassAuth;

use crate::{
    client::{ApiRequest, VaultClient},
    error::{VaultError, VaultResult},
    secrets::Secret,
};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use std::time::Duration;
use tracing::{info, instrument};

/// A way of obtaining a Vault token.
#[async_trait]
pub trait AuthMethod: Send + Sync {
    /// Short name used in logs (e.g. `userpass`).
    fn name(&self) -> &'static str;

    /// Perform the login call and return Vault's response.
    ///
    /// Implementations must not rely on the client's current token.
    async fn login(&self, client: &VaultClient) -> VaultResult<Secret>;
}

/// Authentication API of a [`VaultClient`].
#[derive(Debug, Clone, Copy)]
pub struct Auth<'a> {
    client: &'a VaultClient,
}

impl<'a> Auth<'a> {
    pub(crate) const fn new(client: &'a VaultClient) -> Self {
        Self { client }
    }

    /// Log in with `method` and use the resulting token for later requests.
    ///
    /// # Errors
    ///
    /// Returns the backend's error, or [`VaultError::NoAuthInfo`] when the
    /// response carries no token.
    #[instrument(skip(self, method), fields(method = method.name()))]
    pub async fn login(&self, method: &dyn AuthMethod) -> VaultResult<Secret> {
        let secret = method.login(self.client).await?;
        let auth = secret.auth.as_ref().ok_or(VaultError::NoAuthInfo)?;
        if auth.client_token.expose_secret().is_empty() {
            return Err(VaultError::NoAuthInfo);
        }

        let ttl = secret.token_ttl();
        self.client.install_token(auth.client_token.clone(), ttl);
        info!(
            ttl_secs = ttl.as_secs(),
            renewable = auth.renewable,
            policies = ?auth.policies,
            "Authenticated with Vault"
        );
        Ok(secret)
    }

    /// Token self-management endpoints.
    #[must_use]
    pub const fn token(&self) -> TokenApi<'a> {
        TokenApi {
            client: self.client,
        }
    }
}

/// `auth/token/*-self` endpoints for the client's own token.
#[derive(Debug, Clone, Copy)]
pub struct TokenApi<'a> {
    client: &'a VaultClient,
}

impl TokenApi<'_> {
    /// Look up the client's current token.
    ///
    /// # Errors
    ///
    /// Returns any transport or API error.
    pub async fn lookup_self(&self) -> VaultResult<Secret> {
        self.client
            .send_secret(ApiRequest::get("auth/token/lookup-self"))
            .await?
            .ok_or_else(|| VaultError::missing_field("data"))
    }

    /// Look up an arbitrary token by presenting it.
    pub(crate) async fn lookup_self_with(&self, token: SecretString) -> VaultResult<Secret> {
        self.client
            .send_secret(ApiRequest::get("auth/token/lookup-self").with_token(token))
            .await?
            .ok_or_else(|| VaultError::missing_field("data"))
    }

    /// Renew the client's token, asking for `increment` more time.
    ///
    /// # Errors
    ///
    /// Returns any transport or API error, or [`VaultError::NoAuthInfo`]
    /// when the response has no auth block.
    #[instrument(skip(self))]
    pub async fn renew_self(&self, increment: Duration) -> VaultResult<Secret> {
        let secret = self.renew(ApiRequest::post("auth/token/renew-self"), increment).await?;
        self.client.extend_token(secret.token_ttl());
        Ok(secret)
    }

    /// Renew `token` by presenting it. Updates the client's expiry when
    /// `token` is the client's own token.
    pub(crate) async fn renew_self_with(
        &self,
        token: SecretString,
        increment: Duration,
    ) -> VaultResult<Secret> {
        let is_client_token = self
            .client
            .token()
            .is_some_and(|current| current.expose_secret() == token.expose_secret());
        let request = ApiRequest::post("auth/token/renew-self").with_token(token);
        let secret = self.renew(request, increment).await?;
        if is_client_token {
            self.client.extend_token(secret.token_ttl());
        }
        Ok(secret)
    }

    async fn renew(&self, request: ApiRequest, increment: Duration) -> VaultResult<Secret> {
        let body = json!({ "increment": format!("{}s", increment.as_secs()) });
        let secret = self
            .client
            .send_secret(request.body(body))
            .await?
            .ok_or(VaultError::NoAuthInfo)?;
        if secret.auth.is_none() {
            return Err(VaultError::NoAuthInfo);
        }
        Ok(secret)
    }

    /// Revoke the client's token and forget it.
    ///
    /// # Errors
    ///
    /// Returns any transport or API error.
    pub async fn revoke_self(&self) -> VaultResult<()> {
        self.client
            .send(ApiRequest::post("auth/token/revoke-self"))
            .await?;
        self.client.clear_token();
        Ok(())
    }
}

/// Normalise a user-supplied mount path.
pub(crate) fn mount_path(mount: impl Into<String>) -> String {
    mount.into().trim_matches('/').to_string()
}
