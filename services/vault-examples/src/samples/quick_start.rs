use super::PASSWORD_KEY;
use crate::error::SampleError;
use anyhow::Context;
use serde_json::json;
use tracing::info;
use vault_client::VaultConfig;

/// Round trip against a dev server.
#[derive(Debug, Clone)]
pub struct QuickStartSample {
    /// KV-v2 mount
    pub mount: String,
    /// Secret path under the mount
    pub path: String,
    /// Value written under `password`
    pub password: String,
}

impl Default for QuickStartSample {
    fn default() -> Self {
        Self {
            mount: "secret".to_string(),
            path: "my-secret-password".to_string(),
            password: "Hashi123".to_string(),
        }
    }
}

/// Write a password to KV-v2, read it back and compare.
///
/// Returns the confirmation line printed by the binary.
///
/// # Errors
///
/// Fails on any write or read error, or when the value read back differs.
pub async fn quick_start(config: &VaultConfig, sample: &QuickStartSample) -> anyhow::Result<String> {
    let client = super::new_client(config)?;
    let kv = client.kv2(sample.mount.clone());

    let written = kv
        .put(&sample.path, &json!({ PASSWORD_KEY: sample.password }))
        .await
        .context("unable to write secret")?;
    info!(version = written.version, "Secret written successfully");

    let secret = kv.get(&sample.path).await.context("unable to read secret")?;
    let value = secret
        .string(PASSWORD_KEY)
        .context("value type assertion failed")?;

    if value != sample.password {
        return Err(SampleError::UnexpectedValue {
            key: PASSWORD_KEY.to_string(),
        }
        .into());
    }

    Ok("Access granted!".to_string())
}
