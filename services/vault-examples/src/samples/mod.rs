//! Sample procedures.
//!
//! Each one builds a client, logs in with a single auth method and reads the
//! `password` field of a KV-v2 secret. They return the value so the binary
//! decides what to do with it.

mod approle;
mod aws;
mod azure;
mod gcp;
mod kubernetes;
mod quick_start;
mod renew;
mod token;
mod userpass;

pub use approle::{APPROLE_ROLE_ID_ENV, AppRoleSample, get_secret_with_approle};
pub use aws::{AwsIamSample, get_secret_with_aws_iam};
pub use azure::{AzureSample, get_secret_with_azure};
pub use gcp::{GcpIamSample, get_secret_with_gcp_iam};
pub use kubernetes::{KubernetesSample, get_secret_with_kubernetes};
pub use quick_start::{QuickStartSample, quick_start};
pub use renew::{RenewTokenSample, renew_token};
pub use token::get_secret_with_token;
pub use userpass::{USERPASS_PASSWORD_ENV, UserpassSample, get_secret_with_userpass};

use crate::error::SampleError;
use anyhow::Context;
use serde_json::Value;
use tracing::info;
use vault_client::{AuthMethod, VaultClient, VaultConfig};

/// Secret read by every auth sample.
pub const DEFAULT_SECRET_PATH: &str = "kv-v2/data/creds";

/// Key holding the value of interest.
pub const PASSWORD_KEY: &str = "password";

pub(crate) fn new_client(config: &VaultConfig) -> anyhow::Result<VaultClient> {
    VaultClient::new(config.clone()).context("unable to initialize Vault client")
}

pub(crate) async fn login(client: &VaultClient, method: &dyn AuthMethod) -> anyhow::Result<()> {
    client
        .auth()
        .login(method)
        .await
        .with_context(|| format!("unable to login to {} auth method", method.name()))?;
    Ok(())
}

/// Log in with `method`, then read [`PASSWORD_KEY`] from `secret_path`.
///
/// # Errors
///
/// Fails if the client cannot be built, the login or the read fails, or the
/// secret does not have the expected shape.
pub async fn login_and_read(
    config: &VaultConfig,
    method: &dyn AuthMethod,
    secret_path: &str,
) -> anyhow::Result<String> {
    let client = new_client(config)?;
    login(&client, method).await?;
    read_password(&client, secret_path).await
}

/// Read a KV-v2 secret through the logical API and return `data.password`.
///
/// # Errors
///
/// Fails on a read error, a missing secret, or when `data` is not an object
/// or the password is not a string.
pub async fn read_password(client: &VaultClient, secret_path: &str) -> anyhow::Result<String> {
    let secret = client
        .logical()
        .read(secret_path)
        .await
        .context("unable to read secret")?
        .ok_or_else(|| SampleError::SecretNotFound(secret_path.to_string()))?;

    let data = match secret.data.get("data") {
        Some(Value::Object(data)) => data,
        other => return Err(SampleError::DataTypeAssertion(json_type(other)).into()),
    };

    match data.get(PASSWORD_KEY) {
        Some(Value::String(password)) => {
            info!(path = secret_path, "Read secret");
            Ok(password.clone())
        }
        other => Err(SampleError::ValueTypeAssertion {
            key: PASSWORD_KEY.to_string(),
            found: json_type(other),
        }
        .into()),
    }
}

const fn json_type(value: Option<&Value>) -> &'static str {
    match value {
        None => "nothing",
        Some(Value::Null) => "null",
        Some(Value::Bool(_)) => "bool",
        Some(Value::Number(_)) => "number",
        Some(Value::String(_)) => "string",
        Some(Value::Array(_)) => "array",
        Some(Value::Object(_)) => "object",
    }
}
