use super::{DEFAULT_SECRET_PATH, login_and_read};
use crate::error::SampleError;
use std::path::PathBuf;
use vault_client::{AppRoleAuth, CredentialSource, VaultConfig};

/// Variable holding the role ID.
pub const APPROLE_ROLE_ID_ENV: &str = "APPROLE_ROLE_ID";

/// AppRole login settings.
///
/// The secret ID is delivered response-wrapped: the file holds a single-use
/// wrapping token that is unwrapped right before login.
#[derive(Debug, Clone)]
pub struct AppRoleSample {
    /// Role ID, usually from [`APPROLE_ROLE_ID_ENV`]
    pub role_id: Option<String>,
    /// File containing the wrapping token
    pub wrapping_token_file: PathBuf,
    /// Secret to read after login
    pub secret_path: String,
}

impl Default for AppRoleSample {
    fn default() -> Self {
        Self {
            role_id: None,
            wrapping_token_file: PathBuf::from("path/to/wrapping-token"),
            secret_path: DEFAULT_SECRET_PATH.to_string(),
        }
    }
}

/// Unwrap the secret ID, log in with AppRole, read the secret.
///
/// # Errors
///
/// Fails when no role ID is set, the wrapping token cannot be read or
/// unwrapped, the login is rejected, or the secret cannot be read.
pub async fn get_secret_with_approle(
    config: &VaultConfig,
    sample: &AppRoleSample,
) -> anyhow::Result<String> {
    let role_id = sample
        .role_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or(SampleError::MissingEnv {
            what: "role ID",
            var: APPROLE_ROLE_ID_ENV,
        })?;

    let method = AppRoleAuth::new(
        role_id,
        CredentialSource::from_file(sample.wrapping_token_file.clone()),
    )
    .with_wrapping_token();
    login_and_read(config, &method, &sample.secret_path).await
}
