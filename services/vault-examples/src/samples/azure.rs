use super::{DEFAULT_SECRET_PATH, login_and_read};
use vault_client::{AzureAuth, VaultConfig};

/// Azure managed identity login settings.
#[derive(Debug, Clone)]
pub struct AzureSample {
    /// Vault role bound to the managed identity
    pub role: String,
    /// Instance metadata endpoint override
    pub metadata_endpoint: Option<String>,
    /// Secret to read after login
    pub secret_path: String,
}

impl Default for AzureSample {
    fn default() -> Self {
        Self {
            role: "dev-role-azure".to_string(),
            metadata_endpoint: None,
            secret_path: DEFAULT_SECRET_PATH.to_string(),
        }
    }
}

/// Log in with the VM's managed identity token, read the secret.
///
/// # Errors
///
/// Fails if instance metadata is unavailable, the login is rejected, or the
/// secret cannot be read.
pub async fn get_secret_with_azure(
    config: &VaultConfig,
    sample: &AzureSample,
) -> anyhow::Result<String> {
    let mut method = AzureAuth::new(sample.role.clone());
    if let Some(endpoint) = &sample.metadata_endpoint {
        method = method.with_metadata_endpoint(endpoint.clone());
    }
    login_and_read(config, &method, &sample.secret_path).await
}
