//! Background renewal of tokens and leases.
//!
//! A [`LifetimeWatcher`] renews a token (or a renewable lease) right away
//! and then again before it expires, publishing each renewal on a channel.
//! It finishes once the secret can no longer be extended, at which point
//! the caller is expected to log in again or fetch a new secret.

use crate::{
    client::VaultClient,
    error::{VaultError, VaultResult},
    secrets::Secret,
};
use chrono::{DateTime, Utc};
use rand::Rng;
use secrecy::SecretString;
use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};
use tokio::{
    sync::{mpsc, oneshot, watch},
    time::Instant,
};
use tracing::{debug, info, instrument, warn};

const RENEWAL_BUFFER: usize = 5;
const INITIAL_RETRY_INTERVAL: Duration = Duration::from_secs(10);
const MAX_RETRY_INTERVAL: Duration = Duration::from_secs(300);

/// How the watcher reacts to renewal problems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenewBehavior {
    /// Stop with an error on a failed or non-renewable renewal
    #[default]
    ErrorOnErrors,
    /// Keep retrying with backoff until the secret expires
    IgnoreErrors,
    /// Never renew; only wait out the current lease
    RenewDisabled,
}

/// A successful renewal.
#[derive(Debug, Clone)]
pub struct RenewalOutput {
    /// When the renewal happened
    pub renewed_at: DateTime<Utc>,
    /// Vault's renewal response
    pub secret: Secret,
}

/// Input for [`LifetimeWatcher::new`].
#[derive(Debug, Clone)]
pub struct LifetimeWatcherInput {
    /// Secret returned by a login (token mode) or a dynamic read (lease mode)
    pub secret: Secret,
    /// Requested extension on each renewal
    pub increment: Duration,
    /// Error handling policy
    pub behavior: RenewBehavior,
}

impl LifetimeWatcherInput {
    /// Watch `secret` with the default behaviour.
    #[must_use]
    pub fn new(secret: Secret, increment: Duration) -> Self {
        Self {
            secret,
            increment,
            behavior: RenewBehavior::default(),
        }
    }

    /// Set the error handling policy.
    #[must_use]
    pub const fn with_behavior(mut self, behavior: RenewBehavior) -> Self {
        self.behavior = behavior;
        self
    }
}

enum Target {
    Token(SecretString),
    Lease(String),
}

/// Renews a token or lease until it can no longer be extended.
pub struct LifetimeWatcher {
    client: VaultClient,
    target: Target,
    renewable: bool,
    lease: Duration,
    increment: Duration,
    behavior: RenewBehavior,
}

impl std::fmt::Debug for LifetimeWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifetimeWatcher")
            .field("token_mode", &matches!(self.target, Target::Token(_)))
            .field("renewable", &self.renewable)
            .field("lease", &self.lease)
            .field("increment", &self.increment)
            .field("behavior", &self.behavior)
            .finish_non_exhaustive()
    }
}

/// Handle to a running watcher. Dropping it stops the watcher.
#[derive(Debug)]
pub struct WatcherHandle {
    /// Successful renewals; slow consumers miss notifications
    pub renewals: mpsc::Receiver<RenewalOutput>,
    /// Resolves once the watcher has finished
    pub done: Done,
    stop: watch::Sender<bool>,
}

impl WatcherHandle {
    /// Ask the watcher to finish; `done` then resolves with `Ok(())`.
    pub fn stop(&self) {
        let _ = self.stop.send(true);
    }
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Completion of a watcher: `Ok(())` when renewal is no longer possible
/// or the watcher was stopped, `Err` when renewal failed.
#[derive(Debug)]
pub struct Done {
    rx: oneshot::Receiver<VaultResult<()>>,
}

impl Future for Done {
    type Output = VaultResult<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|result| {
            result.unwrap_or_else(|_| {
                Err(VaultError::LeaseRenewalFailed(
                    "lifetime watcher exited unexpectedly".to_string(),
                ))
            })
        })
    }
}

impl LifetimeWatcher {
    /// Create a watcher for the token in `input.secret.auth`, or for the
    /// secret's lease when it carries no auth block.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::InvalidConfig`] if the secret has neither a
    /// token nor a lease ID.
    pub fn new(client: VaultClient, input: LifetimeWatcherInput) -> VaultResult<Self> {
        let secret = input.secret;
        let (target, renewable, lease) = if let Some(auth) = &secret.auth {
            (
                Target::Token(auth.client_token.clone()),
                auth.renewable,
                Duration::from_secs(auth.lease_duration),
            )
        } else if !secret.lease_id.is_empty() {
            (
                Target::Lease(secret.lease_id.clone()),
                secret.renewable,
                secret.lease_ttl(),
            )
        } else {
            return Err(VaultError::invalid_config(
                "secret to watch has neither a token nor a lease",
            ));
        };

        Ok(Self {
            client,
            target,
            renewable,
            lease,
            increment: input.increment,
            behavior: input.behavior,
        })
    }

    /// Spawn the renewal loop.
    #[must_use]
    pub fn start(self) -> WatcherHandle {
        let (renew_tx, renewals) = mpsc::channel(RENEWAL_BUFFER);
        let (done_tx, done_rx) = oneshot::channel();
        let (stop, stop_rx) = watch::channel(false);

        tokio::spawn(async move {
            let result = self.run(&renew_tx, stop_rx).await;
            let _ = done_tx.send(result);
        });

        WatcherHandle {
            renewals,
            done: Done { rx: done_rx },
            stop,
        }
    }

    async fn renew(&self) -> VaultResult<Secret> {
        match &self.target {
            Target::Token(token) => {
                self.client
                    .auth()
                    .token()
                    .renew_self_with(token.clone(), self.increment)
                    .await
            }
            Target::Lease(lease_id) => self.client.sys().renew_lease(lease_id, self.increment).await,
        }
    }

    fn renewed_lease(&self, secret: &Secret) -> (Duration, bool) {
        match (&self.target, &secret.auth) {
            (Target::Token(_), Some(auth)) => {
                (Duration::from_secs(auth.lease_duration), auth.renewable)
            }
            _ => (secret.lease_ttl(), secret.renewable),
        }
    }

    #[instrument(skip_all, fields(behavior = ?self.behavior))]
    async fn run(
        self,
        renewals: &mpsc::Sender<RenewalOutput>,
        mut stop: watch::Receiver<bool>,
    ) -> VaultResult<()> {
        if !self.renewable && self.behavior == RenewBehavior::ErrorOnErrors {
            return Err(VaultError::NotRenewable);
        }

        let mut initial_time = Instant::now();
        let mut prior = self.lease;
        let mut grace = calculate_grace(prior);
        let mut retry_interval: Option<Duration> = None;

        loop {
            if *stop.borrow() {
                return Ok(());
            }

            let fallback = (initial_time + prior).saturating_duration_since(Instant::now());
            let mut backoff = None;

            let lease = if !self.renewable || self.behavior == RenewBehavior::RenewDisabled {
                fallback
            } else {
                match self.renew().await {
                    Ok(secret) => {
                        retry_interval = None;
                        let (lease, renewable) = self.renewed_lease(&secret);
                        debug!(lease_secs = lease.as_secs(), renewable, "Renewed");

                        let _ = renewals.try_send(RenewalOutput {
                            renewed_at: Utc::now(),
                            secret,
                        });

                        if !renewable && self.behavior == RenewBehavior::ErrorOnErrors {
                            return Err(VaultError::NotRenewable);
                        }
                        initial_time = Instant::now();
                        lease
                    }
                    Err(e) if self.behavior == RenewBehavior::ErrorOnErrors => return Err(e),
                    Err(e) => {
                        let delay = retry_interval
                            .map_or(INITIAL_RETRY_INTERVAL, |d| d.saturating_mul(2))
                            .min(MAX_RETRY_INTERVAL);
                        retry_interval = Some(delay);
                        warn!(error = %e, retry_in = ?delay, "Renewal failed, will retry");
                        backoff = Some(delay);
                        fallback
                    }
                }
            };

            // keep recomputing grace while the lease is still growing
            if lease > prior {
                grace = calculate_grace(lease);
            }
            prior = lease;

            // a retry never sleeps into the grace window
            let sleep = match backoff {
                Some(delay) => delay.min(lease.saturating_sub(grace)),
                None => sleep_duration(lease, grace),
            };
            if lease.is_zero()
                || grace > lease
                || sleep.is_zero()
                || (backoff.is_none() && grace > sleep)
            {
                info!(
                    lease_secs = lease.as_secs(),
                    grace_secs = grace.as_secs(),
                    "Lease can no longer be extended"
                );
                return Ok(());
            }

            tokio::select! {
                _ = stop.changed() => return Ok(()),
                () = tokio::time::sleep(sleep) => {}
            }
        }
    }
}

/// Random grace period between 10% and 20% of `lease`.
fn calculate_grace(lease: Duration) -> Duration {
    grace_with_fraction(lease, rand::thread_rng().gen_range(0.0..1.0))
}

fn grace_with_fraction(lease: Duration, fraction: f64) -> Duration {
    if lease.is_zero() {
        return Duration::ZERO;
    }
    lease.mul_f64(0.1 + 0.1 * fraction.clamp(0.0, 1.0))
}

/// Two thirds of the lease plus a third of the grace period.
fn sleep_duration(lease: Duration, grace: Duration) -> Duration {
    lease.mul_f64(2.0 / 3.0) + grace / 3
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VaultConfig;
    use serde_json::json;

    fn client() -> VaultClient {
        VaultClient::new(VaultConfig::default()).unwrap()
    }

    #[test]
    fn test_grace_between_ten_and_twenty_percent() {
        let lease = Duration::from_secs(100);
        assert_eq!(grace_with_fraction(lease, 0.0), Duration::from_secs(10));
        assert_eq!(grace_with_fraction(lease, 1.0), Duration::from_secs(20));
        for _ in 0..50 {
            let grace = calculate_grace(lease);
            assert!(grace >= Duration::from_secs(10) && grace <= Duration::from_secs(20));
        }
        assert_eq!(calculate_grace(Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn test_sleep_duration() {
        let sleep = sleep_duration(Duration::from_secs(90), Duration::from_secs(30));
        assert_eq!(sleep, Duration::from_secs(70));
    }

    #[test]
    fn test_new_requires_token_or_lease() {
        let err = LifetimeWatcher::new(
            client(),
            LifetimeWatcherInput::new(Secret::default(), Duration::from_secs(60)),
        )
        .unwrap_err();
        assert!(matches!(err, VaultError::InvalidConfig(_)));
    }

    #[test]
    fn test_new_picks_lease_mode_without_auth() {
        let secret: Secret = serde_json::from_value(json!({
            "lease_id": "database/creds/readonly/abc",
            "lease_duration": 3600,
            "renewable": true
        }))
        .unwrap();
        let watcher =
            LifetimeWatcher::new(client(), LifetimeWatcherInput::new(secret, Duration::ZERO)).unwrap();
        assert!(matches!(watcher.target, Target::Lease(ref id) if id == "database/creds/readonly/abc"));
        assert_eq!(watcher.lease, Duration::from_secs(3600));
    }

    #[tokio::test]
    async fn test_non_renewable_token_errors_immediately() {
        let secret: Secret = serde_json::from_value(json!({
            "auth": {"client_token": "t", "lease_duration": 60, "renewable": false}
        }))
        .unwrap();
        let mut handle = LifetimeWatcher::new(client(), LifetimeWatcherInput::new(secret, Duration::ZERO))
            .unwrap()
            .start();
        let result = (&mut handle.done).await;
        assert!(matches!(result, Err(VaultError::NotRenewable)));
    }

    #[tokio::test]
    async fn test_renew_disabled_short_lease_finishes_ok() {
        let secret: Secret = serde_json::from_value(json!({
            "auth": {"client_token": "t", "lease_duration": 0, "renewable": true}
        }))
        .unwrap();
        let input = LifetimeWatcherInput::new(secret, Duration::ZERO)
            .with_behavior(RenewBehavior::RenewDisabled);
        let mut handle = LifetimeWatcher::new(client(), input).unwrap().start();
        assert!((&mut handle.done).await.is_ok());
        assert!(handle.renewals.try_recv().is_err());
    }
}
