//! Configuration loading for the sample binary.
//!
//! Vault settings come from the standard `VAULT_*` variables, optionally
//! seeded from a `.env` file.

use anyhow::Context;
use std::collections::HashMap;
use vault_client::{VaultConfig, VaultResult};

/// Address of a local dev server.
pub const DEV_SERVER_ADDR: &str = "http://127.0.0.1:8200";

/// Root token a dev server is started with in the quick start.
pub const DEV_SERVER_TOKEN: &str = "dev-only-token";

/// Load `.env` if present, then read the Vault settings.
///
/// # Errors
///
/// Returns an error if a `VAULT_*` variable holds an invalid value.
pub fn load() -> anyhow::Result<VaultConfig> {
    dotenvy::dotenv().ok();
    VaultConfig::from_env().context("invalid Vault configuration in environment")
}

/// Settings for the quick start: the environment wins, a local dev server
/// fills the gaps.
///
/// # Errors
///
/// Returns an error if a `VAULT_*` variable holds an invalid value.
pub fn quick_start_from<F>(lookup: F) -> VaultResult<VaultConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = HashMap::from([("VAULT_ADDR", DEV_SERVER_ADDR), ("VAULT_TOKEN", DEV_SERVER_TOKEN)]);
    VaultConfig::from_lookup(|key| {
        lookup(key)
            .filter(|v| !v.trim().is_empty())
            .or_else(|| defaults.get(key).map(ToString::to_string))
    })
}

/// [`quick_start_from`] over the process environment.
///
/// # Errors
///
/// Returns an error if a `VAULT_*` variable holds an invalid value.
pub fn load_quick_start() -> anyhow::Result<VaultConfig> {
    dotenvy::dotenv().ok();
    quick_start_from(|key| std::env::var(key).ok()).context("invalid Vault configuration in environment")
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_quick_start_defaults_to_dev_server() {
        let config = quick_start_from(|_| None).unwrap();
        assert_eq!(config.base_url(), DEV_SERVER_ADDR);
        assert_eq!(config.token.unwrap().expose_secret(), DEV_SERVER_TOKEN);
    }

    #[test]
    fn test_quick_start_environment_wins() {
        let config = quick_start_from(|key| match key {
            "VAULT_ADDR" => Some("https://vault.internal:8200".to_string()),
            "VAULT_TOKEN" => Some(String::new()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.base_url(), "https://vault.internal:8200");
        // blank values fall back too
        assert_eq!(config.token.unwrap().expose_secret(), DEV_SERVER_TOKEN);
    }

    #[test]
    fn test_quick_start_rejects_bad_values() {
        let result = quick_start_from(|key| (key == "VAULT_MAX_RETRIES").then(|| "lots".to_string()));
        assert!(result.is_err());
    }
}
