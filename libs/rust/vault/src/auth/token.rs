use super::AuthMethod;
use crate::{
    client::VaultClient,
    credential::CredentialSource,
    error::VaultResult,
    secrets::{Secret, SecretAuth},
};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::instrument;

/// Authenticates with a pre-issued token.
///
/// The token is validated with `auth/token/lookup-self` and the lookup data
/// is turned into an auth block so it flows through the same path as every
/// other login.
#[derive(Debug, Clone)]
pub struct TokenAuth {
    token: CredentialSource,
}

impl TokenAuth {
    /// Use `token` directly.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: CredentialSource::from_string(token),
        }
    }

    /// Take the token from any credential source.
    #[must_use]
    pub const fn from_source(token: CredentialSource) -> Self {
        Self { token }
    }
}

#[async_trait]
impl AuthMethod for TokenAuth {
    fn name(&self) -> &'static str {
        "token"
    }

    #[instrument(skip(self, client))]
    async fn login(&self, client: &VaultClient) -> VaultResult<Secret> {
        let token = self.token.resolve().await?;
        let lookup = client
            .auth()
            .token()
            .lookup_self_with(token.clone())
            .await?;

        let auth = SecretAuth {
            client_token: token,
            accessor: str_value(&lookup.data, "accessor"),
            policies: str_list(&lookup.data, "policies"),
            token_policies: str_list(&lookup.data, "policies"),
            metadata: lookup
                .data
                .get("meta")
                .and_then(|m| serde_json::from_value::<HashMap<String, String>>(m.clone()).ok())
                .unwrap_or_default(),
            lease_duration: lookup.token_ttl().as_secs(),
            renewable: lookup.token_is_renewable(),
        };

        Ok(Secret {
            request_id: lookup.request_id,
            auth: Some(auth),
            warnings: lookup.warnings,
            ..Secret::default()
        })
    }
}

fn str_value(data: &Map<String, Value>, key: &str) -> String {
    data.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn str_list(data: &Map<String, Value>, key: &str) -> Vec<String> {
    data.get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_str_list_skips_non_strings() {
        let data = json!({"policies": ["default", 3, "admin"]});
        let map = data.as_object().unwrap();
        assert_eq!(str_list(map, "policies"), vec!["default", "admin"]);
        assert!(str_list(map, "missing").is_empty());
    }

    #[test]
    fn test_debug_hides_token() {
        let rendered = format!("{:?}", TokenAuth::new("hvs.hidden"));
        assert!(!rendered.contains("hvs.hidden"));
    }
}
