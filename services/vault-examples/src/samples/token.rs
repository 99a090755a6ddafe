use super::login_and_read;
use secrecy::{ExposeSecret, SecretString};
use vault_client::{TokenAuth, VaultConfig};

/// Authenticate with a pre-issued token and read the secret.
///
/// # Errors
///
/// Fails if the token is rejected or the secret cannot be read.
pub async fn get_secret_with_token(
    config: &VaultConfig,
    token: &SecretString,
    secret_path: &str,
) -> anyhow::Result<String> {
    let method = TokenAuth::new(token.expose_secret());
    login_and_read(config, &method, secret_path).await
}
