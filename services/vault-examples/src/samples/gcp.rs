use super::{DEFAULT_SECRET_PATH, login_and_read};
use std::path::PathBuf;
use vault_client::{GcpAuth, VaultConfig};

/// GCP IAM login settings.
#[derive(Debug, Clone)]
pub struct GcpIamSample {
    /// Vault role bound to the service account
    pub role: String,
    /// Service account that signs the login JWT
    pub service_account_email: String,
    /// Service account key file; application default credentials are used when unset
    pub credentials_file: Option<PathBuf>,
    /// Metadata server override
    pub metadata_endpoint: Option<String>,
    /// IAM credentials API override
    pub iam_endpoint: Option<String>,
    /// Secret to read after login
    pub secret_path: String,
}

impl GcpIamSample {
    /// Settings for `service_account_email` with the default role.
    pub fn new(service_account_email: impl Into<String>) -> Self {
        Self {
            role: "dev-role-iam".to_string(),
            service_account_email: service_account_email.into(),
            credentials_file: None,
            metadata_endpoint: None,
            iam_endpoint: None,
            secret_path: DEFAULT_SECRET_PATH.to_string(),
        }
    }

    /// Build the service account email from `GCP_SERVICE_ACCOUNT_NAME` and
    /// `GOOGLE_CLOUD_PROJECT`.
    pub fn service_account_email_from<F>(lookup: F) -> Option<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let name = lookup("GCP_SERVICE_ACCOUNT_NAME").filter(|v| !v.is_empty())?;
        let project = lookup("GOOGLE_CLOUD_PROJECT").filter(|v| !v.is_empty())?;
        Some(format!("{name}@{project}.iam.gserviceaccount.com"))
    }
}

/// Log in with a JWT signed by the service account, read the secret.
///
/// # Errors
///
/// Fails if no GCP credentials are available, signing or login fails, or
/// the secret cannot be read.
pub async fn get_secret_with_gcp_iam(
    config: &VaultConfig,
    sample: &GcpIamSample,
) -> anyhow::Result<String> {
    let mut method =
        GcpAuth::new(sample.role.clone()).with_iam_auth(sample.service_account_email.clone());
    if let Some(path) = &sample.credentials_file {
        method = method.with_credentials_file(path.clone());
    }
    if let Some(endpoint) = &sample.metadata_endpoint {
        method = method.with_metadata_endpoint(endpoint.clone());
    }
    if let Some(endpoint) = &sample.iam_endpoint {
        method = method.with_iam_endpoint(endpoint.clone());
    }
    login_and_read(config, &method, &sample.secret_path).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_service_account_email_from_env() {
        let vars = HashMap::from([
            ("GCP_SERVICE_ACCOUNT_NAME", "vault-auth"),
            ("GOOGLE_CLOUD_PROJECT", "demo-project"),
        ]);
        let email = GcpIamSample::service_account_email_from(|k| vars.get(k).map(ToString::to_string));
        assert_eq!(
            email.as_deref(),
            Some("vault-auth@demo-project.iam.gserviceaccount.com")
        );
    }

    #[test]
    fn test_service_account_email_needs_both_vars() {
        let email = GcpIamSample::service_account_email_from(|k| {
            (k == "GOOGLE_CLOUD_PROJECT").then(|| "demo-project".to_string())
        });
        assert!(email.is_none());
    }
}
