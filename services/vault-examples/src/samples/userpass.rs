use super::{DEFAULT_SECRET_PATH, login_and_read};
use vault_client::{CredentialSource, UserpassAuth, VaultConfig};

/// Variable the hello-world sample reads its password from.
pub const USERPASS_PASSWORD_ENV: &str = "SOME_ENV_VAR";

/// Userpass login settings.
#[derive(Debug, Clone)]
pub struct UserpassSample {
    /// Vault user
    pub username: String,
    /// Where the password comes from
    pub password: CredentialSource,
    /// Secret to read after login
    pub secret_path: String,
}

impl Default for UserpassSample {
    fn default() -> Self {
        Self {
            username: "my-user".to_string(),
            password: CredentialSource::from_env(USERPASS_PASSWORD_ENV),
            secret_path: DEFAULT_SECRET_PATH.to_string(),
        }
    }
}

/// Hello world: log in with username and password, read the secret.
///
/// # Errors
///
/// Fails if the login is rejected or the secret cannot be read.
pub async fn get_secret_with_userpass(
    config: &VaultConfig,
    sample: &UserpassSample,
) -> anyhow::Result<String> {
    let method = UserpassAuth::new(sample.username.clone(), sample.password.clone());
    login_and_read(config, &method, &sample.secret_path).await
}
