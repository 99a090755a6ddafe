use super::{AuthMethod, mount_path};
use crate::{
    client::VaultClient,
    credential::CredentialSource,
    error::VaultResult,
    secrets::Secret,
};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tracing::{debug, instrument};

/// AppRole login (`auth/<mount>/login`).
///
/// With [`AppRoleAuth::with_wrapping_token`] the secret ID source holds a
/// response-wrapping token instead; it is unwrapped through
/// `sys/wrapping/unwrap` before every login, so the source must yield a
/// fresh wrapping token each time.
#[derive(Debug, Clone)]
pub struct AppRoleAuth {
    role_id: String,
    secret_id: CredentialSource,
    wrapped: bool,
    mount: String,
}

impl AppRoleAuth {
    /// Log in with `role_id` and a secret ID from `secret_id`.
    #[must_use]
    pub fn new(role_id: impl Into<String>, secret_id: CredentialSource) -> Self {
        Self {
            role_id: role_id.into(),
            secret_id,
            wrapped: false,
            mount: "approle".to_string(),
        }
    }

    /// Treat the secret ID source as a response-wrapping token.
    #[must_use]
    pub const fn with_wrapping_token(mut self) -> Self {
        self.wrapped = true;
        self
    }

    /// Use a non-default mount path.
    #[must_use]
    pub fn with_mount_path(mut self, mount: impl Into<String>) -> Self {
        self.mount = mount_path(mount);
        self
    }

    async fn secret_id(&self, client: &VaultClient) -> VaultResult<SecretString> {
        let value = self.secret_id.resolve().await?;
        if !self.wrapped {
            return Ok(value);
        }

        debug!("Unwrapping AppRole secret ID");
        let unwrapped = client.sys().unwrap(value).await?;
        Ok(SecretString::from(unwrapped.string_field("secret_id")?.to_string()))
    }
}

#[async_trait]
impl AuthMethod for AppRoleAuth {
    fn name(&self) -> &'static str {
        "approle"
    }

    #[instrument(skip(self, client), fields(mount = %self.mount, wrapped = self.wrapped))]
    async fn login(&self, client: &VaultClient) -> VaultResult<Secret> {
        let secret_id = self.secret_id(client).await?;
        let path = format!("auth/{}/login", self.mount);
        client
            .login_write(
                &path,
                json!({ "role_id": self.role_id, "secret_id": secret_id.expose_secret() }),
            )
            .await
    }
}
