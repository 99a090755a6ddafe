use super::{AuthMethod, mount_path};
use crate::{client::VaultClient, credential::CredentialSource, error::VaultResult, secrets::Secret};
use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde_json::json;
use tracing::instrument;

/// Where Kubernetes mounts the pod's service account token.
pub const DEFAULT_SERVICE_ACCOUNT_TOKEN_PATH: &str =
    "/var/run/secrets/kubernetes.io/serviceaccount/token";

/// Kubernetes service account login (`auth/<mount>/login`).
#[derive(Debug, Clone)]
pub struct KubernetesAuth {
    role: String,
    service_account_token: CredentialSource,
    mount: String,
}

impl KubernetesAuth {
    /// Log in as Vault role `role` using the pod's mounted token.
    #[must_use]
    pub fn new(role: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            service_account_token: CredentialSource::from_file(DEFAULT_SERVICE_ACCOUNT_TOKEN_PATH),
            mount: "kubernetes".to_string(),
        }
    }

    /// Read the service account token from `path`.
    #[must_use]
    pub fn with_service_account_token_path(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.service_account_token = CredentialSource::from_file(path);
        self
    }

    /// Read the service account token from environment variable `var`.
    #[must_use]
    pub fn with_service_account_token_env(mut self, var: impl Into<String>) -> Self {
        self.service_account_token = CredentialSource::from_env(var);
        self
    }

    /// Use `jwt` as the service account token.
    #[must_use]
    pub fn with_service_account_token(mut self, jwt: impl Into<String>) -> Self {
        self.service_account_token = CredentialSource::from_string(jwt);
        self
    }

    /// Use a non-default mount path.
    #[must_use]
    pub fn with_mount_path(mut self, mount: impl Into<String>) -> Self {
        self.mount = mount_path(mount);
        self
    }
}

#[async_trait]
impl AuthMethod for KubernetesAuth {
    fn name(&self) -> &'static str {
        "kubernetes"
    }

    #[instrument(skip(self, client), fields(role = %self.role, mount = %self.mount))]
    async fn login(&self, client: &VaultClient) -> VaultResult<Secret> {
        let jwt = self.service_account_token.resolve().await?;
        let path = format!("auth/{}/login", self.mount);
        client
            .login_write(&path, json!({ "role": self.role, "jwt": jwt.expose_secret() }))
            .await
    }
}
