//! Sources for login credentials (passwords, secret IDs, JWTs).

use crate::error::{VaultError, VaultResult};
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::path::PathBuf;

/// Where a credential value comes from.
#[derive(Clone)]
pub enum CredentialSource {
    /// Value supplied directly
    FromString(SecretString),
    /// Read from the named environment variable
    FromEnv(String),
    /// Read from a file (e.g. a mounted secret)
    FromFile(PathBuf),
}

impl CredentialSource {
    /// Value supplied directly.
    #[must_use]
    pub fn from_string(value: impl Into<String>) -> Self {
        Self::FromString(SecretString::from(value.into()))
    }

    /// Value read from an environment variable at login time.
    #[must_use]
    pub fn from_env(var: impl Into<String>) -> Self {
        Self::FromEnv(var.into())
    }

    /// Value read from a file at login time.
    #[must_use]
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self::FromFile(path.into())
    }

    /// Resolve the credential, trimming surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Credentials`] if the variable is unset, the
    /// file cannot be read, or the value is empty.
    pub async fn resolve(&self) -> VaultResult<SecretString> {
        let raw = match self {
            Self::FromString(value) => value.expose_secret().to_string(),
            Self::FromEnv(var) => std::env::var(var).map_err(|_| {
                VaultError::credentials(format!("environment variable {var} is not set"))
            })?,
            Self::FromFile(path) => tokio::fs::read_to_string(path).await.map_err(|e| {
                VaultError::credentials(format!("unable to read {}: {e}", path.display()))
            })?,
        };

        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(VaultError::credentials(format!("{self} is empty")));
        }
        Ok(SecretString::from(trimmed.to_string()))
    }
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FromString(_) => f.write_str("inline credential"),
            Self::FromEnv(var) => write!(f, "environment variable {var}"),
            Self::FromFile(path) => write!(f, "file {}", path.display()),
        }
    }
}

impl fmt::Debug for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FromString(_) => f.write_str("FromString([REDACTED])"),
            Self::FromEnv(var) => f.debug_tuple("FromEnv").field(var).finish(),
            Self::FromFile(path) => f.debug_tuple("FromFile").field(path).finish(),
        }
    }
}
