use std::{future::Future, time::Duration};
use vault_client::{
    CredentialSource, UserpassAuth, VaultConfig, renew_token_forever, renewal::DEFAULT_RENEW_INCREMENT,
};

/// Long-running token renewal settings.
#[derive(Debug, Clone)]
pub struct RenewTokenSample {
    /// Vault user
    pub username: String,
    /// Where the password comes from
    pub password: CredentialSource,
    /// Increment requested on each renewal
    pub increment: Duration,
}

impl Default for RenewTokenSample {
    fn default() -> Self {
        Self {
            username: "my-user".to_string(),
            password: CredentialSource::from_string("my-password"),
            increment: DEFAULT_RENEW_INCREMENT,
        }
    }
}

/// Log in with userpass and keep the token renewed until `shutdown`
/// resolves, logging in again whenever renewal stops.
///
/// # Errors
///
/// Fails if the client cannot be built, a login is rejected, or token
/// lifecycle management cannot be started.
pub async fn renew_token<F>(
    config: &VaultConfig,
    sample: &RenewTokenSample,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()>,
{
    let client = super::new_client(config)?;
    let method = UserpassAuth::new(sample.username.clone(), sample.password.clone());
    renew_token_forever(&client, &method, sample.increment, shutdown).await?;
    Ok(())
}
