//! Canned Vault API response bodies.
//!
//! Shapes follow the Vault HTTP API; values are sample data.

use chrono::Utc;
use serde_json::{Value, json};

fn request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Response of a successful login.
#[must_use]
pub fn login_response(client_token: &str, lease_duration: u64, renewable: bool) -> Value {
    json!({
        "request_id": request_id(),
        "lease_id": "",
        "lease_duration": 0,
        "renewable": false,
        "data": null,
        "wrap_info": null,
        "warnings": null,
        "auth": {
            "client_token": client_token,
            "accessor": "accessor-sample",
            "policies": ["default", "dev-policy"],
            "token_policies": ["default", "dev-policy"],
            "metadata": {"role_name": "dev-role"},
            "lease_duration": lease_duration,
            "renewable": renewable,
            "entity_id": "",
            "token_type": "service",
            "orphan": true
        }
    })
}

/// Login-shaped response without an auth block.
#[must_use]
pub fn login_response_without_auth() -> Value {
    json!({
        "request_id": request_id(),
        "data": {},
        "auth": null
    })
}

/// Response of `auth/token/lookup-self`.
#[must_use]
pub fn token_lookup_response(ttl: u64, renewable: bool) -> Value {
    json!({
        "request_id": request_id(),
        "data": {
            "accessor": "accessor-sample",
            "display_name": "token",
            "policies": ["root"],
            "meta": null,
            "ttl": ttl,
            "renewable": renewable,
            "type": "service"
        }
    })
}

/// Response of a KV-v2 read of `data` at `version`.
#[must_use]
pub fn kv2_read_response(data: &Value, version: u64) -> Value {
    json!({
        "request_id": request_id(),
        "lease_id": "",
        "lease_duration": 0,
        "renewable": false,
        "data": {
            "data": data,
            "metadata": {
                "created_time": Utc::now().to_rfc3339(),
                "custom_metadata": null,
                "deletion_time": "",
                "destroyed": false,
                "version": version
            }
        }
    })
}

/// Response of a KV-v2 read of a soft-deleted version.
#[must_use]
pub fn kv2_deleted_response(version: u64) -> Value {
    json!({
        "data": {
            "data": null,
            "metadata": {
                "created_time": Utc::now().to_rfc3339(),
                "deletion_time": Utc::now().to_rfc3339(),
                "destroyed": false,
                "version": version
            }
        }
    })
}

/// Response of a KV-v2 write creating `version`.
#[must_use]
pub fn kv2_write_response(version: u64) -> Value {
    json!({
        "request_id": request_id(),
        "data": {
            "created_time": Utc::now().to_rfc3339(),
            "custom_metadata": null,
            "deletion_time": "",
            "destroyed": false,
            "version": version
        }
    })
}

/// Response of `sys/wrapping/unwrap` for a wrapped AppRole secret ID.
#[must_use]
pub fn unwrapped_secret_id_response(secret_id: &str) -> Value {
    json!({
        "request_id": request_id(),
        "data": {
            "secret_id": secret_id,
            "secret_id_accessor": "secret-id-accessor",
            "secret_id_ttl": 0,
            "secret_id_num_uses": 0
        }
    })
}

/// Response of a dynamic database credential read.
#[must_use]
pub fn database_creds_response(username: &str, password: &str, lease_duration: u64) -> Value {
    json!({
        "request_id": request_id(),
        "lease_id": format!("database/creds/readonly/{}", request_id()),
        "lease_duration": lease_duration,
        "renewable": true,
        "data": {"username": username, "password": password}
    })
}

/// Response of a lease renewal.
#[must_use]
pub fn lease_renew_response(lease_id: &str, lease_duration: u64, renewable: bool) -> Value {
    json!({
        "request_id": request_id(),
        "lease_id": lease_id,
        "lease_duration": lease_duration,
        "renewable": renewable,
        "data": null
    })
}

/// Vault error body.
#[must_use]
pub fn error_response(errors: &[&str]) -> Value {
    json!({ "errors": errors })
}
