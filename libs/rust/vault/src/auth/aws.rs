use super::{
    AuthMethod, mount_path,
    sigv4::{self, SignableRequest, SigningParams},
};
use crate::{
    client::VaultClient,
    error::{VaultError, VaultResult},
    secrets::Secret,
};
use async_trait::async_trait;
use aws_config::{
    Region,
    default_provider::credentials::DefaultCredentialsChain,
    environment::{
        credentials::EnvironmentVariableCredentialsProvider, region::EnvironmentVariableRegionProvider,
    },
    imds::{self, credentials::ImdsCredentialsProvider},
    meta::{credentials::CredentialsProviderChain, region::RegionProviderChain},
};
use aws_credential_types::{
    Credentials,
    provider::{ProvideCredentials, SharedCredentialsProvider},
};
use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::Utc;
use secrecy::SecretString;
use serde_json::{Map, Value, json};
use std::{collections::BTreeMap, fmt, time::Duration};
use tracing::{debug, instrument};
use url::Url;

const DEFAULT_REGION: &str = "us-east-1";
const STS_BODY: &str = "Action=GetCallerIdentity&Version=2011-06-15";
const SERVER_ID_HEADER: &str = "X-Vault-AWS-IAM-Server-ID";
const PKCS7_PATH: &str = "/latest/dynamic/instance-identity/pkcs7";

/// Which flavour of the AWS auth backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AwsAuthType {
    /// Signed `sts:GetCallerIdentity` request
    #[default]
    Iam,
    /// PKCS#7 signed instance identity document
    Ec2,
}

/// AWS access keys.
#[derive(Clone)]
pub struct AwsCredentials {
    /// Access key ID
    pub access_key_id: String,
    /// Secret access key
    pub secret_access_key: SecretString,
    /// Session token for temporary credentials
    pub session_token: Option<SecretString>,
}

impl AwsCredentials {
    /// Long-lived access keys.
    #[must_use]
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: SecretString::from(secret_access_key.into()),
            session_token: None,
        }
    }

    /// Attach a session token.
    #[must_use]
    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(SecretString::from(token.into()));
        self
    }
}

impl From<&Credentials> for AwsCredentials {
    fn from(creds: &Credentials) -> Self {
        let result = Self::new(creds.access_key_id(), creds.secret_access_key());
        match creds.session_token() {
            Some(token) => result.with_session_token(token),
            None => result,
        }
    }
}

impl fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .field("session_token", &self.session_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// AWS login (`auth/<mount>/login`).
#[derive(Debug, Clone)]
pub struct AwsAuth {
    auth_type: AwsAuthType,
    role: Option<String>,
    mount: String,
    region: Option<String>,
    iam_server_id: Option<String>,
    credentials: Option<AwsCredentials>,
    use_env_credentials: bool,
    sts_endpoint: Option<String>,
    imds_endpoint: Option<String>,
    nonce: Option<String>,
    metadata_timeout: Duration,
}

impl Default for AwsAuth {
    fn default() -> Self {
        Self {
            auth_type: AwsAuthType::Iam,
            role: None,
            mount: "aws".to_string(),
            region: None,
            iam_server_id: None,
            credentials: None,
            use_env_credentials: true,
            sts_endpoint: None,
            imds_endpoint: None,
            nonce: None,
            metadata_timeout: Duration::from_secs(5),
        }
    }
}

impl AwsAuth {
    /// IAM login with credentials from the default chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Vault role to log in as. Without one Vault infers it from the IAM
    /// role name or AMI ID.
    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// IAM or EC2 flavour.
    #[must_use]
    pub const fn with_auth_type(mut self, auth_type: AwsAuthType) -> Self {
        self.auth_type = auth_type;
        self
    }

    /// Region used for signing (otherwise `AWS_REGION`, `AWS_DEFAULT_REGION`
    /// or `us-east-1`).
    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Value of the `X-Vault-AWS-IAM-Server-ID` header the role requires.
    #[must_use]
    pub fn with_iam_server_id_header(mut self, value: impl Into<String>) -> Self {
        self.iam_server_id = Some(value.into());
        self
    }

    /// Use these credentials instead of the default chain.
    #[must_use]
    pub fn with_credentials(mut self, credentials: AwsCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Skip `AWS_*` environment credentials and go straight to the
    /// instance metadata service.
    #[must_use]
    pub const fn without_env_credentials(mut self) -> Self {
        self.use_env_credentials = false;
        self
    }

    /// Override the STS endpoint that is signed and sent to Vault.
    #[must_use]
    pub fn with_sts_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.sts_endpoint = Some(endpoint.into());
        self
    }

    /// Override the EC2 instance metadata endpoint.
    #[must_use]
    pub fn with_imds_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.imds_endpoint = Some(endpoint.into().trim_end_matches('/').to_string());
        self
    }

    /// Client nonce for EC2 logins (reauthentication).
    #[must_use]
    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    /// Use a non-default mount path.
    #[must_use]
    pub fn with_mount_path(mut self, mount: impl Into<String>) -> Self {
        self.mount = mount_path(mount);
        self
    }

    async fn region(&self) -> Region {
        let fallback = Region::from_static(DEFAULT_REGION);
        RegionProviderChain::first_try(self.region.clone().map(Region::new))
            .or_else(EnvironmentVariableRegionProvider::new())
            .or_else(fallback.clone())
            .region()
            .await
            .unwrap_or(fallback)
    }

    fn sts_endpoint(&self, region: &str) -> String {
        self.sts_endpoint.clone().unwrap_or_else(|| {
            if region == DEFAULT_REGION {
                "https://sts.amazonaws.com/".to_string()
            } else {
                format!("https://sts.{region}.amazonaws.com/")
            }
        })
    }

    fn imds_client(&self) -> VaultResult<imds::Client> {
        let mut builder = imds::Client::builder()
            .connect_timeout(self.metadata_timeout)
            .read_timeout(self.metadata_timeout);
        if let Some(endpoint) = &self.imds_endpoint {
            builder = builder.endpoint(endpoint).map_err(|e| {
                VaultError::invalid_config(format!("instance metadata endpoint {endpoint}: {e}"))
            })?;
        }
        Ok(builder.build())
    }

    /// Environment then instance metadata. Without an endpoint override
    /// this is the SDK's default chain (profiles, web identity, ECS too).
    async fn credentials_provider(&self, region: &Region) -> VaultResult<SharedCredentialsProvider> {
        if self.use_env_credentials && self.imds_endpoint.is_none() {
            let chain = DefaultCredentialsChain::builder()
                .region(region.clone())
                .build()
                .await;
            return Ok(SharedCredentialsProvider::new(chain));
        }

        let instance = ImdsCredentialsProvider::builder()
            .imds_client(self.imds_client()?)
            .build();
        if !self.use_env_credentials {
            return Ok(SharedCredentialsProvider::new(instance));
        }
        Ok(SharedCredentialsProvider::new(
            CredentialsProviderChain::first_try("Environment", EnvironmentVariableCredentialsProvider::new())
                .or_else("Ec2InstanceMetadata", instance),
        ))
    }

    async fn credentials(&self, region: &Region) -> VaultResult<AwsCredentials> {
        if let Some(creds) = &self.credentials {
            return Ok(creds.clone());
        }

        debug!("Resolving AWS credentials");
        let creds = self
            .credentials_provider(region)
            .await?
            .provide_credentials()
            .await
            .map_err(|e| VaultError::credentials(format!("AWS credentials: {e}")))?;
        Ok(AwsCredentials::from(&creds))
    }

    /// Build the IAM login payload: a signed `sts:GetCallerIdentity`
    /// request that Vault replays against STS.
    fn iam_login_data(&self, creds: &AwsCredentials, region: &str) -> VaultResult<Map<String, Value>> {
        let endpoint = self.sts_endpoint(region);
        let url = Url::parse(&endpoint)
            .map_err(|e| VaultError::invalid_config(format!("STS endpoint {endpoint}: {e}")))?;

        let mut headers = vec![(
            "Content-Type".to_string(),
            "application/x-www-form-urlencoded; charset=utf-8".to_string(),
        )];
        if let Some(server_id) = &self.iam_server_id {
            headers.push((SERVER_ID_HEADER.to_string(), server_id.clone()));
        }

        let signed = sigv4::sign(
            &SignableRequest {
                method: "POST",
                url: &url,
                headers,
                body: STS_BODY.as_bytes(),
            },
            &SigningParams {
                access_key_id: &creds.access_key_id,
                secret_access_key: &creds.secret_access_key,
                session_token: creds.session_token.as_ref(),
                region,
                service: "sts",
                time: Utc::now(),
            },
        )?;

        let header_map: BTreeMap<String, Vec<String>> =
            signed.into_iter().map(|(k, v)| (k, vec![v])).collect();

        let mut data = Map::new();
        data.insert("iam_http_request_method".into(), json!("POST"));
        data.insert("iam_request_url".into(), json!(STANDARD.encode(url.as_str())));
        data.insert(
            "iam_request_headers".into(),
            json!(STANDARD.encode(serde_json::to_vec(&header_map)?)),
        );
        data.insert("iam_request_body".into(), json!(STANDARD.encode(STS_BODY)));
        Ok(data)
    }

    async fn ec2_login_data(&self) -> VaultResult<Map<String, Value>> {
        let document = self
            .imds_client()?
            .get(PKCS7_PATH)
            .await
            .map_err(|e| VaultError::credentials(format!("instance identity document: {e}")))?;
        let pkcs7: String = document.as_ref().split_whitespace().collect();

        let mut data = Map::new();
        data.insert("pkcs7".into(), json!(pkcs7));
        if let Some(nonce) = &self.nonce {
            data.insert("nonce".into(), json!(nonce));
        }
        Ok(data)
    }
}

#[async_trait]
impl AuthMethod for AwsAuth {
    fn name(&self) -> &'static str {
        "aws"
    }

    #[instrument(skip(self, client), fields(auth_type = ?self.auth_type, mount = %self.mount))]
    async fn login(&self, client: &VaultClient) -> VaultResult<Secret> {
        let mut data = match self.auth_type {
            AwsAuthType::Iam => {
                let region = self.region().await;
                let creds = self.credentials(&region).await?;
                self.iam_login_data(&creds, region.as_ref())?
            }
            AwsAuthType::Ec2 => self.ec2_login_data().await?,
        };
        if let Some(role) = &self.role {
            data.insert("role".into(), json!(role));
        }

        client
            .login_write(&format!("auth/{}/login", self.mount), Value::Object(data))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn decode(value: &Value) -> String {
        String::from_utf8(STANDARD.decode(value.as_str().unwrap()).unwrap()).unwrap()
    }

    #[test]
    fn test_iam_login_data_shape() {
        let auth = AwsAuth::new().with_iam_server_id_header("vault.example.com");
        let creds = AwsCredentials::new("AKIDEXAMPLE", "secret").with_session_token("session");
        let data = auth.iam_login_data(&creds, "us-east-1").unwrap();

        assert_eq!(data["iam_http_request_method"], "POST");
        assert_eq!(decode(&data["iam_request_url"]), "https://sts.amazonaws.com/");
        assert_eq!(decode(&data["iam_request_body"]), STS_BODY);

        let headers: HashMap<String, Vec<String>> =
            serde_json::from_str(&decode(&data["iam_request_headers"])).unwrap();
        assert_eq!(headers[SERVER_ID_HEADER], vec!["vault.example.com"]);
        assert_eq!(headers["Host"], vec!["sts.amazonaws.com"]);
        assert_eq!(headers["X-Amz-Security-Token"], vec!["session"]);
        let authorization = &headers["Authorization"][0];
        assert!(authorization.starts_with("AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/"));
        assert!(authorization.contains("/us-east-1/sts/aws4_request"));
        assert!(authorization.contains("x-vault-aws-iam-server-id"));
    }

    #[test]
    fn test_regional_sts_endpoint() {
        let auth = AwsAuth::new();
        assert_eq!(auth.sts_endpoint("eu-west-1"), "https://sts.eu-west-1.amazonaws.com/");
        assert_eq!(auth.sts_endpoint("us-east-1"), "https://sts.amazonaws.com/");
    }

    #[test]
    fn test_credentials_from_sdk() {
        let sdk = Credentials::new("ASIA", "shh", Some("session".to_string()), None, "test");
        let creds = AwsCredentials::from(&sdk);
        assert_eq!(creds.access_key_id, "ASIA");
        assert_eq!(creds.secret_access_key.expose_secret(), "shh");
        assert_eq!(creds.session_token.unwrap().expose_secret(), "session");

        let long_lived = Credentials::new("AKID", "shh", None, None, "test");
        assert!(AwsCredentials::from(&long_lived).session_token.is_none());
    }

    #[tokio::test]
    async fn test_explicit_region_wins() {
        let auth = AwsAuth::new().with_region("eu-central-1");
        assert_eq!(auth.region().await.as_ref(), "eu-central-1");
    }

    #[test]
    fn test_credentials_debug_redacted() {
        let rendered = format!("{:?}", AwsCredentials::new("AKID", "very-secret"));
        assert!(!rendered.contains("very-secret"));
    }
}
