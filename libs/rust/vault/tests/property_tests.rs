//! Property-based tests for the Vault client.
//!
//! Tests validate:
//! - Secrets never appear in Debug or Display output
//! - Configuration parsing normalises addresses and tokens
//! - Mount paths are normalised regardless of stray slashes
//! - Retry delays stay within their cap
//! - `SigV4` signatures are deterministic and key-dependent

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::time::Duration;
use test_utils::{
    kv_path_strategy, lease_seconds_strategy, mount_strategy, secret_value_strategy,
    vault_token_strategy,
};
use url::Url;
use vault_client::{
    AwsCredentials, CredentialSource, DatabaseCredentials, VaultClient, VaultConfig,
    auth::sigv4::{self, SignableRequest, SigningParams},
    retry::RetryPolicy,
};

fn sts_signature(secret_key: &str, body: &[u8]) -> String {
    let url = Url::parse("https://sts.amazonaws.com/").unwrap();
    let secret = SecretString::from(secret_key.to_string());
    let headers = sigv4::sign(
        &SignableRequest {
            method: "POST",
            url: &url,
            headers: vec![("Content-Type".to_string(), "application/x-www-form-urlencoded".to_string())],
            body,
        },
        &SigningParams {
            access_key_id: "AKIDEXAMPLE",
            secret_access_key: &secret,
            session_token: None,
            region: "us-east-1",
            service: "sts",
            time: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).single().unwrap(),
        },
    )
    .unwrap();
    headers
        .into_iter()
        .find(|(name, _)| name == "Authorization")
        .map(|(_, value)| value)
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// The client's Debug output never contains its token.
    #[test]
    fn prop_client_debug_hides_token(token in vault_token_strategy()) {
        let client = VaultClient::new(VaultConfig::default().with_token(token.clone())).unwrap();
        let rendered = format!("{client:?}");
        prop_assert!(!rendered.contains(&token));
        prop_assert!(rendered.contains("has_token: true"));
    }

    /// Inline credentials are redacted in Debug and Display output.
    #[test]
    fn prop_credential_source_redacted(value in secret_value_strategy()) {
        let source = CredentialSource::from_string(value.clone());
        let debug_rendered = format!("{source:?}");
        let display_rendered = format!("{source}");
        prop_assert!(!debug_rendered.contains(&value));
        prop_assert!(!display_rendered.contains(&value));
    }

    /// AWS secret keys and session tokens are redacted.
    #[test]
    fn prop_aws_credentials_redacted(
        secret_key in secret_value_strategy(),
        session in secret_value_strategy(),
    ) {
        let creds = AwsCredentials::new("AKIDEXAMPLE", secret_key.clone()).with_session_token(session.clone());
        let rendered = format!("{creds:?}");
        prop_assert!(rendered.contains("AKIDEXAMPLE"));
        prop_assert!(!rendered.contains(&secret_key));
        prop_assert!(!rendered.contains(&session));
    }

    /// Database passwords are redacted.
    #[test]
    fn prop_database_credentials_redacted(password in secret_value_strategy(), ttl in lease_seconds_strategy()) {
        let creds = DatabaseCredentials {
            username: "v-app".to_string(),
            password: SecretString::from(password.clone()),
            lease_id: "database/creds/app/1".to_string(),
            ttl: Duration::from_secs(ttl),
            renewable: true,
        };
        let rendered = format!("{creds:?}");
        prop_assert!(!rendered.contains(&password));
    }

    /// Renewal is due from 80% of the TTL onwards, never before.
    #[test]
    fn prop_should_renew_threshold(ttl in lease_seconds_strategy(), pct in 0u32..=150) {
        let creds = DatabaseCredentials {
            username: "v-app".to_string(),
            password: SecretString::from("pw".to_string()),
            lease_id: String::new(),
            ttl: Duration::from_secs(ttl),
            renewable: true,
        };
        let elapsed = Duration::from_secs(ttl).mul_f64(f64::from(pct) / 100.0);
        if pct >= 81 {
            prop_assert!(creds.should_renew(elapsed));
        }
        if pct <= 79 {
            prop_assert!(!creds.should_renew(elapsed));
        }
    }

    /// Tokens and addresses from the environment are trimmed.
    #[test]
    fn prop_config_from_lookup_trims(token in vault_token_strategy(), port in 1024u16..65535) {
        let vars: HashMap<&str, String> = HashMap::from([
            ("VAULT_ADDR", format!(" http://127.0.0.1:{port}/ ")),
            ("VAULT_TOKEN", format!("{token}\n")),
        ]);
        let config = VaultConfig::from_lookup(|k| vars.get(k).cloned()).unwrap();
        prop_assert_eq!(config.base_url(), format!("http://127.0.0.1:{port}"));
        let config_token = config.token.unwrap();
        prop_assert_eq!(config_token.expose_secret(), token.as_str());
    }

    /// KV mounts never keep leading or trailing slashes.
    #[test]
    fn prop_kv2_mount_normalised(mount in mount_strategy()) {
        let client = VaultClient::new(VaultConfig::default()).unwrap();
        let kv = client.kv2(mount.clone());
        prop_assert_eq!(kv.mount(), mount.trim_matches('/'));
    }

    /// Retry delays grow but never exceed the cap plus jitter.
    #[test]
    fn prop_retry_delay_bounded(initial_ms in 1u64..1000, attempt in 0u32..20) {
        let max = Duration::from_secs(2);
        let policy = RetryPolicy::new(3, Duration::from_millis(initial_ms)).with_max_delay(max);
        let delay = policy.delay_for_attempt(attempt);
        prop_assert!(delay >= Duration::from_millis(initial_ms).min(max));
        prop_assert!(delay <= max.mul_f64(1.25));

        let exact = RetryPolicy::new(3, Duration::from_millis(initial_ms)).with_max_delay(max).without_jitter();
        prop_assert!(exact.delay_for_attempt(attempt) <= exact.delay_for_attempt(attempt + 1));
    }

    /// Signing the same request twice gives the same signature; a different
    /// key or body gives a different one.
    #[test]
    fn prop_sigv4_deterministic(
        key_a in "[A-Za-z0-9/+]{40}",
        key_b in "[A-Za-z0-9/+]{40}",
        path in kv_path_strategy(),
    ) {
        let body = format!("Action=GetCallerIdentity&Version=2011-06-15&Path={path}");
        let first = sts_signature(&key_a, body.as_bytes());
        prop_assert_eq!(&first, &sts_signature(&key_a, body.as_bytes()));
        prop_assert!(first.starts_with("AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20240501/us-east-1/sts/aws4_request"));
        if key_a != key_b {
            prop_assert_ne!(&first, &sts_signature(&key_b, body.as_bytes()));
        }
        prop_assert_ne!(first, sts_signature(&key_a, b"Action=GetCallerIdentity"));
    }
}
