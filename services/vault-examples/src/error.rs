//! Errors raised by the sample procedures themselves, as opposed to the
//! Vault client errors they wrap.

use thiserror::Error;

/// Sample-level failures.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SampleError {
    /// Required setting missing from the environment
    #[error("no {what} was provided in {var} env var")]
    MissingEnv {
        /// What the variable holds
        what: &'static str,
        /// Variable name
        var: &'static str,
    },

    /// Read returned nothing
    #[error("no secret found at {0}")]
    SecretNotFound(String),

    /// `data` of a KV-v2 response is not an object
    #[error("data type assertion failed: found {0}")]
    DataTypeAssertion(&'static str),

    /// Requested key is missing or not a string
    #[error("value type assertion failed for {key}: found {found}")]
    ValueTypeAssertion {
        /// Key looked up
        key: String,
        /// JSON type found instead of a string
        found: &'static str,
    },

    /// Read-back value differs from what was written
    #[error("unexpected {key} value retrieved from Vault")]
    UnexpectedValue {
        /// Key compared
        key: String,
    },
}
