use super::{DEFAULT_SECRET_PATH, login_and_read};
use std::path::PathBuf;
use vault_client::{KubernetesAuth, VaultConfig, auth::DEFAULT_SERVICE_ACCOUNT_TOKEN_PATH};

/// Kubernetes login settings.
#[derive(Debug, Clone)]
pub struct KubernetesSample {
    /// Vault role bound to the service account
    pub role: String,
    /// Projected service account token
    pub token_path: PathBuf,
    /// Secret to read after login
    pub secret_path: String,
}

impl Default for KubernetesSample {
    fn default() -> Self {
        Self {
            role: "dev-role-k8s".to_string(),
            token_path: PathBuf::from(DEFAULT_SERVICE_ACCOUNT_TOKEN_PATH),
            secret_path: DEFAULT_SECRET_PATH.to_string(),
        }
    }
}

/// Log in with the pod's service account token, read the secret.
///
/// # Errors
///
/// Fails if the token file is unreadable, the login is rejected, or the
/// secret cannot be read.
pub async fn get_secret_with_kubernetes(
    config: &VaultConfig,
    sample: &KubernetesSample,
) -> anyhow::Result<String> {
    let method = KubernetesAuth::new(sample.role.clone())
        .with_service_account_token_path(sample.token_path.clone());
    login_and_read(config, &method, &sample.secret_path).await
}
