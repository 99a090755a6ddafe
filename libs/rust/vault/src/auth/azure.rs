use super::{AuthMethod, mount_path};
use crate::{
    client::VaultClient,
    error::{VaultError, VaultResult},
    http::build_metadata_http_client,
    secrets::Secret,
};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::instrument;

const DEFAULT_METADATA_ENDPOINT: &str = "http://169.254.169.254";
const DEFAULT_RESOURCE: &str = "https://management.azure.com/";

#[derive(Deserialize)]
struct TokenResponse {
    access_token: SecretString,
}

#[derive(Deserialize)]
struct InstanceMetadata {
    compute: ComputeMetadata,
}

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct ComputeMetadata {
    subscription_id: String,
    resource_group_name: String,
    name: String,
    vm_scale_set_name: String,
}

/// Azure managed identity login (`auth/<mount>/login`).
///
/// The JWT and the VM's identity come from the Azure instance metadata
/// service, so this only works on an Azure VM (or against a stand-in
/// endpoint).
#[derive(Debug, Clone)]
pub struct AzureAuth {
    role: String,
    mount: String,
    resource: String,
    client_id: Option<String>,
    metadata_endpoint: String,
    metadata_timeout: Duration,
}

impl AzureAuth {
    /// Log in as Vault role `role`.
    #[must_use]
    pub fn new(role: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            mount: "azure".to_string(),
            resource: DEFAULT_RESOURCE.to_string(),
            client_id: None,
            metadata_endpoint: DEFAULT_METADATA_ENDPOINT.to_string(),
            metadata_timeout: Duration::from_secs(5),
        }
    }

    /// Resource the access token is requested for.
    #[must_use]
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = resource.into();
        self
    }

    /// Client ID of a user-assigned managed identity.
    #[must_use]
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Override the instance metadata endpoint.
    #[must_use]
    pub fn with_metadata_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.metadata_endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    /// Use a non-default mount path.
    #[must_use]
    pub fn with_mount_path(mut self, mount: impl Into<String>) -> Self {
        self.mount = mount_path(mount);
        self
    }

    async fn access_token(&self, http: &Client) -> VaultResult<SecretString> {
        let mut query = vec![
            ("api-version", "2018-02-01"),
            ("resource", self.resource.as_str()),
        ];
        if let Some(client_id) = &self.client_id {
            query.push(("client_id", client_id.as_str()));
        }

        let response = http
            .get(format!("{}/metadata/identity/oauth2/token", self.metadata_endpoint))
            .query(&query)
            .header("Metadata", "true")
            .send()
            .await
            .map_err(|e| VaultError::credentials(format!("Azure managed identity: {e}")))?;
        if !response.status().is_success() {
            return Err(VaultError::credentials(format!(
                "Azure managed identity returned {}",
                response.status()
            )));
        }
        Ok(response.json::<TokenResponse>().await?.access_token)
    }

    async fn compute_metadata(&self, http: &Client) -> VaultResult<ComputeMetadata> {
        let response = http
            .get(format!("{}/metadata/instance", self.metadata_endpoint))
            .query(&[("api-version", "2017-08-01"), ("format", "json")])
            .header("Metadata", "true")
            .send()
            .await
            .map_err(|e| VaultError::credentials(format!("Azure instance metadata: {e}")))?;
        if !response.status().is_success() {
            return Err(VaultError::credentials(format!(
                "Azure instance metadata returned {}",
                response.status()
            )));
        }
        Ok(response.json::<InstanceMetadata>().await?.compute)
    }
}

#[async_trait]
impl AuthMethod for AzureAuth {
    fn name(&self) -> &'static str {
        "azure"
    }

    #[instrument(skip(self, client), fields(role = %self.role, mount = %self.mount))]
    async fn login(&self, client: &VaultClient) -> VaultResult<Secret> {
        let http = build_metadata_http_client(self.metadata_timeout)?;
        let jwt = self.access_token(&http).await?;
        let compute = self.compute_metadata(&http).await?;

        let body = json!({
            "role": self.role,
            "jwt": jwt.expose_secret(),
            "subscription_id": compute.subscription_id,
            "resource_group_name": compute.resource_group_name,
            "vm_name": compute.name,
            "vmss_name": compute.vm_scale_set_name,
        });
        client
            .login_write(&format!("auth/{}/login", self.mount), body)
            .await
    }
}
