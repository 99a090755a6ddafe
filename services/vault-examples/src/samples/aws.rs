use super::{DEFAULT_SECRET_PATH, login_and_read};
use vault_client::{AwsAuth, AwsCredentials, VaultConfig};

/// AWS IAM login settings.
///
/// Credentials come from the environment or the instance profile unless set
/// explicitly.
#[derive(Debug, Clone)]
pub struct AwsIamSample {
    /// Vault role bound to the IAM principal
    pub role: String,
    /// STS signing region
    pub region: Option<String>,
    /// Value for `X-Vault-AWS-IAM-Server-ID`
    pub server_id_header: Option<String>,
    /// Explicit credentials
    pub credentials: Option<AwsCredentials>,
    /// STS endpoint override
    pub sts_endpoint: Option<String>,
    /// Instance metadata endpoint override
    pub imds_endpoint: Option<String>,
    /// Secret to read after login
    pub secret_path: String,
}

impl Default for AwsIamSample {
    fn default() -> Self {
        Self {
            role: "dev-role-iam".to_string(),
            region: None,
            server_id_header: None,
            credentials: None,
            sts_endpoint: None,
            imds_endpoint: None,
            secret_path: DEFAULT_SECRET_PATH.to_string(),
        }
    }
}

impl AwsIamSample {
    fn auth_method(&self) -> AwsAuth {
        let mut method = AwsAuth::new().with_role(self.role.clone());
        if let Some(region) = &self.region {
            method = method.with_region(region.clone());
        }
        if let Some(header) = &self.server_id_header {
            method = method.with_iam_server_id_header(header.clone());
        }
        if let Some(credentials) = &self.credentials {
            method = method.with_credentials(credentials.clone());
        }
        if let Some(endpoint) = &self.sts_endpoint {
            method = method.with_sts_endpoint(endpoint.clone());
        }
        if let Some(endpoint) = &self.imds_endpoint {
            method = method.with_imds_endpoint(endpoint.clone());
        }
        method
    }
}

/// Log in with a signed STS `GetCallerIdentity` request, read the secret.
///
/// # Errors
///
/// Fails if no AWS credentials are found, the login is rejected, or the
/// secret cannot be read.
pub async fn get_secret_with_aws_iam(
    config: &VaultConfig,
    sample: &AwsIamSample,
) -> anyhow::Result<String> {
    login_and_read(config, &sample.auth_method(), &sample.secret_path).await
}
