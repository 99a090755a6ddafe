//! Keep a client logged in: renew its token while possible, log in again
//! once it is not.

use crate::{
    auth::AuthMethod,
    client::VaultClient,
    error::{VaultError, VaultResult},
    lifetime::{LifetimeWatcher, LifetimeWatcherInput},
    secrets::Secret,
};
use std::{future::Future, time::Duration};
use thiserror::Error;
use tracing::{info, instrument, warn};

/// Increment requested on each token renewal.
pub const DEFAULT_RENEW_INCREMENT: Duration = Duration::from_secs(3600);

/// Pause between giving up on a token and logging in again.
const RELOGIN_DELAY: Duration = Duration::from_secs(1);

/// Why [`renew_token_forever`] gave up.
#[derive(Error, Debug)]
pub enum RenewalError {
    /// Logging in failed
    #[error("unable to login to {method} auth method")]
    Login {
        /// Auth method name
        method: &'static str,
        /// Underlying failure
        #[source]
        source: VaultError,
    },

    /// The lifetime watcher could not be started
    #[error("unable to start managing token lifecycle")]
    Lifecycle(#[source] VaultError),
}

impl RenewalError {
    /// The Vault error behind this failure.
    #[must_use]
    pub const fn vault_error(&self) -> &VaultError {
        match self {
            Self::Login { source, .. } | Self::Lifecycle(source) => source,
        }
    }
}

/// Renew the token from `login` until it can no longer be renewed.
///
/// Returns `Ok(())` whenever the caller should log in again: the token is
/// not renewable, renewal failed, or the token reached its max TTL.
///
/// # Errors
///
/// Only fatal errors: the lifetime watcher could not be created.
#[instrument(skip_all)]
pub async fn manage_token_lifecycle(
    client: &VaultClient,
    login: &Secret,
    increment: Duration,
) -> VaultResult<()> {
    let renewable = login.auth.as_ref().is_some_and(|auth| auth.renewable);
    if !renewable {
        info!("Token is not configured to be renewable. Re-attempting login.");
        return Ok(());
    }

    let watcher = LifetimeWatcher::new(client.clone(), LifetimeWatcherInput::new(login.clone(), increment))?;
    let mut handle = watcher.start();

    loop {
        tokio::select! {
            result = &mut handle.done => {
                match result {
                    Err(e) => warn!(error = %e, "Failed to renew token. Re-attempting login."),
                    Ok(()) => info!("Token can no longer be renewed. Re-attempting login."),
                }
                return Ok(());
            }
            Some(renewal) = handle.renewals.recv() => {
                info!(
                    renewed_at = %renewal.renewed_at,
                    ttl_secs = renewal.secret.token_ttl().as_secs(),
                    "Successfully renewed token"
                );
            }
        }
    }
}

/// Log in with `method` and keep the token alive, forever, until
/// `shutdown` resolves.
///
/// # Errors
///
/// Returns [`RenewalError::Login`] on the first login failure and
/// [`RenewalError::Lifecycle`] when the watcher cannot be started.
#[instrument(skip_all, fields(method = method.name()))]
pub async fn renew_token_forever<F>(
    client: &VaultClient,
    method: &dyn AuthMethod,
    increment: Duration,
    shutdown: F,
) -> Result<(), RenewalError>
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let auth = client.auth();

    loop {
        let login = tokio::select! {
            () = &mut shutdown => return Ok(()),
            result = auth.login(method) => result.map_err(|source| RenewalError::Login {
                method: method.name(),
                source,
            })?,
        };

        tokio::select! {
            () = &mut shutdown => return Ok(()),
            result = manage_token_lifecycle(client, &login, increment) => {
                result.map_err(RenewalError::Lifecycle)?;
            }
        }

        tokio::select! {
            () = &mut shutdown => return Ok(()),
            () = tokio::time::sleep(RELOGIN_DELAY) => {}
        }
    }
}
