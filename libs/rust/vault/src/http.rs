//! HTTP client construction for Vault and cloud metadata endpoints.

use crate::config::VaultConfig;
use crate::error::{VaultError, VaultResult};
use reqwest::{Certificate, Client, ClientBuilder};
use std::time::Duration;
use tracing::warn;

/// Connection timeout used for every client built here.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Build the HTTP client used to talk to Vault.
///
/// # Errors
///
/// Returns an error if the CA bundle cannot be read or parsed, or the TLS
/// backend fails to initialise.
pub fn build_vault_http_client(config: &VaultConfig) -> VaultResult<Client> {
    let mut builder = base_builder(config.timeout, &config.user_agent);

    if let Some(path) = &config.ca_cert {
        let pem = std::fs::read(path).map_err(|e| {
            VaultError::invalid_config(format!("VAULT_CACERT {}: {e}", path.display()))
        })?;
        let cert = Certificate::from_pem(&pem).map_err(|e| {
            VaultError::invalid_config(format!("VAULT_CACERT {}: {e}", path.display()))
        })?;
        builder = builder.add_root_certificate(cert);
    }

    if config.skip_verify {
        warn!("TLS verification disabled for Vault client");
        builder = builder.danger_accept_invalid_certs(true);
    }

    builder.build().map_err(VaultError::Http)
}

/// Build a short-timeout client for cloud instance metadata services.
///
/// # Errors
///
/// Returns an error if the TLS backend fails to initialise.
pub fn build_metadata_http_client(timeout: Duration) -> VaultResult<Client> {
    base_builder(timeout, "vault-client-rs")
        // metadata services must never be reached through a proxy
        .no_proxy()
        .build()
        .map_err(VaultError::Http)
}

fn base_builder(timeout: Duration, user_agent: &str) -> ClientBuilder {
    ClientBuilder::new()
        .timeout(timeout)
        .connect_timeout(CONNECT_TIMEOUT.min(timeout))
        .pool_idle_timeout(Duration::from_secs(90))
        .pool_max_idle_per_host(10)
        .user_agent(user_agent)
        .use_rustls_tls()
}
