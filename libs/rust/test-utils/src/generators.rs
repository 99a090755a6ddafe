//! Shared proptest generators for the Vault client crates.

use proptest::prelude::*;
use std::collections::BTreeMap;
use std::time::Duration;

/// Generate secret paths relative to a mount, e.g. `app/db/creds`.
pub fn kv_path_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec("[a-z][a-z0-9_-]{0,12}", 1..4).prop_map(|segments| segments.join("/"))
}

/// Generate mount paths, sometimes with stray slashes.
pub fn mount_strategy() -> impl Strategy<Value = String> {
    ("[a-z][a-z0-9-]{1,12}", 0..3usize).prop_map(|(name, style)| match style {
        0 => name,
        1 => format!("/{name}"),
        _ => format!("{name}/"),
    })
}

/// Generate service tokens in the `hvs.` format.
pub fn vault_token_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z0-9]{24,40}".prop_map(|body| format!("hvs.{body}"))
}

/// Generate secret values that are easy to spot in rendered output.
pub fn secret_value_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z0-9!@#$%^&*]{12,64}"
}

/// Generate flat key/value payloads for KV-v2 secrets.
pub fn kv_data_strategy() -> impl Strategy<Value = BTreeMap<String, String>> {
    prop::collection::btree_map("[a-z][a-z0-9_]{0,15}", "[ -~]{0,32}", 1..6)
}

/// Generate lease durations in seconds, from very short to a day.
pub fn lease_seconds_strategy() -> impl Strategy<Value = u64> {
    prop_oneof![1u64..60, 60u64..3600, 3600u64..=86_400]
}

/// Generate TTL durations.
pub fn ttl_strategy() -> impl Strategy<Value = Duration> {
    lease_seconds_strategy().prop_map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn kv_paths_have_no_empty_segments(path in kv_path_strategy()) {
            prop_assert!(path.split('/').all(|s| !s.is_empty()));
        }

        #[test]
        fn tokens_have_service_prefix(token in vault_token_strategy()) {
            prop_assert!(token.starts_with("hvs."));
        }
    }
}
