use super::{AuthMethod, mount_path};
use crate::{
    client::VaultClient,
    error::{VaultError, VaultResult},
    http::build_metadata_http_client,
    secrets::Secret,
};
use async_trait::async_trait;
use chrono::Utc;
use google_cloud_auth::credentials::{self, CacheableResource, Credentials, mds, service_account};
use http::{Extensions, HeaderValue, header::AUTHORIZATION};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::{path::PathBuf, time::Duration};
use tracing::{debug, instrument};

const DEFAULT_METADATA_ENDPOINT: &str = "http://metadata.google.internal";
const DEFAULT_IAM_ENDPOINT: &str = "https://iamcredentials.googleapis.com";
const SIGNED_JWT_LIFETIME_SECS: i64 = 600;

/// Which flavour of the GCP auth backend to use.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum GcpAuthType {
    /// Identity token from the GCE metadata server
    #[default]
    Gce,
    /// JWT signed by the IAM Credentials API for a service account
    Iam {
        /// Service account whose identity is asserted
        service_account_email: String,
    },
}

#[derive(Serialize)]
struct VaultClaims<'a> {
    aud: String,
    sub: &'a str,
    exp: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignJwtResponse {
    signed_jwt: SecretString,
}

/// GCP login (`auth/<mount>/login`).
#[derive(Debug, Clone)]
pub struct GcpAuth {
    role: String,
    mount: String,
    auth_type: GcpAuthType,
    credentials_file: Option<PathBuf>,
    metadata_endpoint: Option<String>,
    iam_endpoint: String,
    metadata_timeout: Duration,
}

impl GcpAuth {
    /// GCE login as Vault role `role`.
    #[must_use]
    pub fn new(role: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            mount: "gcp".to_string(),
            auth_type: GcpAuthType::Gce,
            credentials_file: None,
            metadata_endpoint: None,
            iam_endpoint: DEFAULT_IAM_ENDPOINT.to_string(),
            metadata_timeout: Duration::from_secs(5),
        }
    }

    /// Switch to IAM login asserting `service_account_email`.
    #[must_use]
    pub fn with_iam_auth(mut self, service_account_email: impl Into<String>) -> Self {
        self.auth_type = GcpAuthType::Iam {
            service_account_email: service_account_email.into(),
        };
        self
    }

    /// Service account key file used to call the IAM API. Without one the
    /// application default credentials are used.
    #[must_use]
    pub fn with_credentials_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.credentials_file = Some(path.into());
        self
    }

    /// Override the metadata server endpoint. IAM logins then take their
    /// access token from this server.
    #[must_use]
    pub fn with_metadata_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.metadata_endpoint = Some(endpoint.into().trim_end_matches('/').to_string());
        self
    }

    /// Override the IAM Credentials API endpoint.
    #[must_use]
    pub fn with_iam_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.iam_endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    /// Use a non-default mount path.
    #[must_use]
    pub fn with_mount_path(mut self, mount: impl Into<String>) -> Self {
        self.mount = mount_path(mount);
        self
    }

    fn metadata_endpoint(&self) -> &str {
        self.metadata_endpoint.as_deref().unwrap_or(DEFAULT_METADATA_ENDPOINT)
    }

    async fn gce_jwt(&self, http: &Client) -> VaultResult<SecretString> {
        let audience = format!("http://vault/{}", self.role);
        let response = http
            .get(format!(
                "{}/computeMetadata/v1/instance/service-accounts/default/identity",
                self.metadata_endpoint()
            ))
            .query(&[("audience", audience.as_str()), ("format", "full")])
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| VaultError::credentials(format!("GCE metadata server: {e}")))?;
        let response = check_status(response, "GCE metadata server")?;
        Ok(SecretString::from(response.text().await?.trim().to_string()))
    }

    async fn iam_credentials(&self) -> VaultResult<Credentials> {
        if let Some(path) = &self.credentials_file {
            debug!(path = %path.display(), "Using service account key file");
            let raw = tokio::fs::read(path).await.map_err(|e| {
                VaultError::credentials(format!("unable to read {}: {e}", path.display()))
            })?;
            let key: Value = serde_json::from_slice(&raw)
                .map_err(|e| VaultError::credentials(format!("{}: {e}", path.display())))?;
            return service_account::Builder::new(key)
                .build()
                .map_err(|e| VaultError::credentials(format!("{}: {e}", path.display())));
        }

        if let Some(endpoint) = &self.metadata_endpoint {
            debug!(endpoint = %endpoint, "Using metadata server credentials");
            return mds::Builder::default()
                .with_endpoint(endpoint.clone())
                .build()
                .map_err(|e| VaultError::credentials(format!("GCE metadata server: {e}")));
        }

        credentials::Builder::default()
            .build()
            .map_err(|e| VaultError::credentials(format!("application default credentials: {e}")))
    }

    /// `Authorization` header value for the IAM Credentials API.
    async fn access_token(&self) -> VaultResult<HeaderValue> {
        let credentials = self.iam_credentials().await?;
        let headers = match credentials
            .headers(Extensions::new())
            .await
            .map_err(|e| VaultError::credentials(format!("GCP access token: {e}")))?
        {
            CacheableResource::New { data, .. } => data,
            CacheableResource::NotModified => {
                return Err(VaultError::credentials("GCP access token: no headers returned"));
            }
        };
        headers
            .get(AUTHORIZATION)
            .cloned()
            .ok_or_else(|| VaultError::credentials("GCP credentials produced no Authorization header"))
    }

    async fn iam_jwt(&self, http: &Client, service_account_email: &str) -> VaultResult<SecretString> {
        let authorization = self.access_token().await?;
        let claims = VaultClaims {
            aud: format!("vault/{}", self.role),
            sub: service_account_email,
            exp: Utc::now().timestamp() + SIGNED_JWT_LIFETIME_SECS,
        };

        let url = format!(
            "{}/v1/projects/-/serviceAccounts/{}:signJwt",
            self.iam_endpoint, service_account_email
        );
        let response = http
            .post(url)
            .header(AUTHORIZATION, authorization)
            .json(&json!({ "payload": serde_json::to_string(&claims)? }))
            .send()
            .await
            .map_err(|e| VaultError::credentials(format!("IAM signJwt: {e}")))?;
        let response = check_status(response, "IAM signJwt")?;
        Ok(response.json::<SignJwtResponse>().await?.signed_jwt)
    }
}

fn check_status(response: reqwest::Response, what: &str) -> VaultResult<reqwest::Response> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(VaultError::credentials(format!(
            "{what} returned {}",
            response.status()
        )))
    }
}

#[async_trait]
impl AuthMethod for GcpAuth {
    fn name(&self) -> &'static str {
        "gcp"
    }

    #[instrument(skip(self, client), fields(role = %self.role, mount = %self.mount))]
    async fn login(&self, client: &VaultClient) -> VaultResult<Secret> {
        let http = build_metadata_http_client(self.metadata_timeout)?;
        let jwt = match &self.auth_type {
            GcpAuthType::Gce => self.gce_jwt(&http).await?,
            GcpAuthType::Iam {
                service_account_email,
            } => self.iam_jwt(&http, service_account_email).await?,
        };

        client
            .login_write(
                &format!("auth/{}/login", self.mount),
                json!({ "role": self.role, "jwt": jwt.expose_secret() }),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vault_claims_payload() {
        let claims = VaultClaims {
            aud: "vault/dev-role-iam".to_string(),
            sub: "sa@project.iam.gserviceaccount.com",
            exp: 1_700_000_000,
        };
        let payload: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&claims).unwrap()).unwrap();
        assert_eq!(payload["aud"], "vault/dev-role-iam");
        assert_eq!(payload["sub"], "sa@project.iam.gserviceaccount.com");
        assert_eq!(payload["exp"], 1_700_000_000);
    }

    #[test]
    fn test_with_iam_auth_switches_type() {
        let auth = GcpAuth::new("dev-role-iam").with_iam_auth("sa@p.iam.gserviceaccount.com");
        assert_eq!(
            auth.auth_type,
            GcpAuthType::Iam {
                service_account_email: "sa@p.iam.gserviceaccount.com".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_bad_key_file_is_credentials_error() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"{\"client_email\": \"x\"}").unwrap();
        let auth = GcpAuth::new("dev-role-iam").with_credentials_file(file.path());
        let err = auth.iam_credentials().await.unwrap_err();
        assert!(matches!(err, VaultError::Credentials(_)));
    }

    #[test]
    fn test_metadata_endpoint_default() {
        let auth = GcpAuth::new("dev-role-gce");
        assert_eq!(auth.metadata_endpoint(), DEFAULT_METADATA_ENDPOINT);
        let auth = auth.with_metadata_endpoint("http://127.0.0.1:9000/");
        assert_eq!(auth.metadata_endpoint(), "http://127.0.0.1:9000");
    }
}
