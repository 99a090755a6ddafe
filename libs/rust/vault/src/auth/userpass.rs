use super::{AuthMethod, mount_path};
use crate::{client::VaultClient, credential::CredentialSource, error::VaultResult, secrets::Secret};
use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde_json::json;
use tracing::instrument;

/// Username and password login (`auth/<mount>/login/<username>`).
///
/// The username is percent-encoded into the path.
#[derive(Debug, Clone)]
pub struct UserpassAuth {
    username: String,
    password: CredentialSource,
    mount: String,
}

impl UserpassAuth {
    /// Log in as `username` with a password from `password`.
    #[must_use]
    pub fn new(username: impl Into<String>, password: CredentialSource) -> Self {
        Self {
            username: username.into(),
            password,
            mount: "userpass".to_string(),
        }
    }

    /// Use a non-default mount path.
    #[must_use]
    pub fn with_mount_path(mut self, mount: impl Into<String>) -> Self {
        self.mount = mount_path(mount);
        self
    }
}

#[async_trait]
impl AuthMethod for UserpassAuth {
    fn name(&self) -> &'static str {
        "userpass"
    }

    #[instrument(skip(self, client), fields(username = %self.username, mount = %self.mount))]
    async fn login(&self, client: &VaultClient) -> VaultResult<Secret> {
        let password = self.password.resolve().await?;
        let path = format!("auth/{}/login/{}", self.mount, urlencoding::encode(&self.username));
        client
            .login_write(&path, json!({ "password": password.expose_secret() }))
            .await
    }
}
