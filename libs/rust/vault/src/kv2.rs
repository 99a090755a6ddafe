//! KV version 2 secrets engine.
//!
//! Paths given to [`Kv2`] are relative to the mount; the engine's
//! `data/`, `metadata/`, `delete/`, `undelete/` and `destroy/` prefixes are
//! added here.

use crate::{
    client::{ApiRequest, VaultClient},
    error::{VaultError, VaultResult},
    secrets::{Secret, string_field},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use tracing::{debug, instrument};

/// Metadata of a single secret version.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct KvVersionMetadata {
    /// Version number
    pub version: u64,
    /// Creation time (RFC 3339)
    pub created_time: String,
    /// Soft-deletion time (RFC 3339), empty if not deleted
    pub deletion_time: String,
    /// Whether the version was permanently destroyed
    pub destroyed: bool,
}

impl KvVersionMetadata {
    /// Parsed creation time.
    #[must_use]
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        parse_time(&self.created_time)
    }

    /// Parsed deletion time, if the version is soft-deleted.
    #[must_use]
    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        parse_time(&self.deletion_time)
    }
}

/// Metadata of a secret across all of its versions.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct KvMetadata {
    /// Latest version
    pub current_version: u64,
    /// Oldest version still kept
    pub oldest_version: u64,
    /// Versions kept before the oldest is dropped (0 = engine default)
    pub max_versions: u64,
    /// Whether writes must use check-and-set
    pub cas_required: bool,
    /// Creation time (RFC 3339)
    pub created_time: String,
    /// Last update time (RFC 3339)
    pub updated_time: String,
    /// Automatic deletion delay (Go duration string)
    pub delete_version_after: String,
    /// User-provided metadata
    #[serde(deserialize_with = "null_map")]
    pub custom_metadata: HashMap<String, String>,
    /// Per-version metadata keyed by version number
    pub versions: HashMap<String, KvVersionMetadata>,
}

/// A secret read from a KV-v2 mount.
#[derive(Debug, Clone)]
pub struct KvSecret {
    /// Key/value payload
    pub data: Map<String, Value>,
    /// Metadata of the version read
    pub version_metadata: Option<KvVersionMetadata>,
    /// User-provided metadata
    pub custom_metadata: HashMap<String, String>,
    /// Full response
    pub raw: Secret,
}

impl KvSecret {
    /// Extract a string value.
    ///
    /// # Errors
    ///
    /// [`VaultError::MissingField`] or [`VaultError::UnexpectedType`].
    pub fn string(&self, key: &str) -> VaultResult<&str> {
        string_field(&self.data, key)
    }
}

/// Handle to a KV-v2 mount.
#[derive(Debug, Clone)]
pub struct Kv2 {
    client: VaultClient,
    mount: String,
}

impl Kv2 {
    pub(crate) fn new(client: VaultClient, mount: impl Into<String>) -> Self {
        Self {
            client,
            mount: mount.into().trim_matches('/').to_string(),
        }
    }

    /// Mount path.
    #[must_use]
    pub fn mount(&self) -> &str {
        &self.mount
    }

    pub(crate) const fn client(&self) -> &VaultClient {
        &self.client
    }

    fn path(&self, prefix: &str, path: &str) -> String {
        format!("{}/{prefix}/{}", self.mount, path.trim_matches('/'))
    }

    /// Read the latest version of `path`.
    ///
    /// # Errors
    ///
    /// [`VaultError::SecretNotFound`] if the secret does not exist or its
    /// latest version is deleted; otherwise any transport or API error.
    pub async fn get(&self, path: &str) -> VaultResult<KvSecret> {
        self.read(path, None).await
    }

    /// Read a specific version of `path`.
    ///
    /// # Errors
    ///
    /// [`VaultError::SecretNotFound`] if the version does not exist or is
    /// deleted; otherwise any transport or API error.
    pub async fn get_version(&self, path: &str, version: u64) -> VaultResult<KvSecret> {
        self.read(path, Some(version)).await
    }

    /// Read the latest version of `path` into `T`.
    ///
    /// # Errors
    ///
    /// As [`Kv2::get`], plus [`VaultError::Serialization`] if the payload
    /// does not match `T`.
    pub async fn get_as<T: DeserializeOwned>(&self, path: &str) -> VaultResult<T> {
        let secret = self.get(path).await?;
        Ok(serde_json::from_value(Value::Object(secret.data))?)
    }

    #[instrument(skip(self), fields(mount = %self.mount))]
    async fn read(&self, path: &str, version: Option<u64>) -> VaultResult<KvSecret> {
        let full_path = self.path("data", path);
        let mut request = ApiRequest::get(full_path.as_str());
        if let Some(version) = version {
            request = request.query("version", version);
        }

        let secret = self
            .client
            .send_secret(request)
            .await?
            .ok_or_else(|| VaultError::not_found(full_path.as_str()))?;

        let data = match secret.data.get("data") {
            Some(Value::Object(map)) => map.clone(),
            Some(Value::Null) | None => {
                debug!(path = %full_path, "Secret version has no data (deleted or destroyed)");
                return Err(VaultError::not_found(full_path));
            }
            Some(other) => return Err(VaultError::unexpected_type("data", "object", other)),
        };

        let version_metadata = secret
            .data
            .get("metadata")
            .filter(|m| m.is_object())
            .map(|m| serde_json::from_value::<KvVersionMetadata>(m.clone()))
            .transpose()?;
        let custom_metadata = secret
            .data
            .get("metadata")
            .and_then(|m| m.get("custom_metadata"))
            .and_then(|m| serde_json::from_value(m.clone()).ok())
            .unwrap_or_default();

        Ok(KvSecret {
            data,
            version_metadata,
            custom_metadata,
            raw: secret,
        })
    }

    /// Write a new version of `path`.
    ///
    /// # Errors
    ///
    /// Returns any transport or API error.
    pub async fn put<T: Serialize + Sync>(&self, path: &str, data: &T) -> VaultResult<KvVersionMetadata> {
        let data = serde_json::to_value(data)?;
        self.write(path, json!({ "data": data })).await
    }

    /// Write a new version of `path` only if the current version is `cas`
    /// (0 means the secret must not exist yet).
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Api`] on a check-and-set mismatch, or any
    /// transport error.
    pub async fn put_with_cas<T: Serialize + Sync>(
        &self,
        path: &str,
        data: &T,
        cas: u64,
    ) -> VaultResult<KvVersionMetadata> {
        let data = serde_json::to_value(data)?;
        self.write(path, json!({ "options": { "cas": cas }, "data": data }))
            .await
    }

    #[instrument(skip(self, body), fields(mount = %self.mount))]
    async fn write(&self, path: &str, body: Value) -> VaultResult<KvVersionMetadata> {
        let secret = self
            .client
            .send_secret(ApiRequest::post(self.path("data", path)).body(body))
            .await?;
        version_metadata(secret)
    }

    /// Merge `data` into the latest version of `path`, creating a new
    /// version.
    ///
    /// # Errors
    ///
    /// [`VaultError::SecretNotFound`] if the secret does not exist;
    /// otherwise any transport or API error.
    #[instrument(skip(self, data), fields(mount = %self.mount))]
    pub async fn patch<T: Serialize + Sync>(&self, path: &str, data: &T) -> VaultResult<KvVersionMetadata> {
        let data = serde_json::to_value(data)?;
        let request = ApiRequest::patch(self.path("data", path)).body(json!({ "data": data }));
        let secret = self.client.send_secret(request).await?;
        version_metadata(secret)
    }

    /// Soft-delete the latest version of `path`.
    ///
    /// # Errors
    ///
    /// Returns any transport or API error.
    pub async fn delete(&self, path: &str) -> VaultResult<()> {
        self.client
            .send(ApiRequest::delete(self.path("data", path)))
            .await
            .map(|_| ())
    }

    /// Soft-delete specific versions of `path`.
    ///
    /// # Errors
    ///
    /// Returns any transport or API error.
    pub async fn delete_versions(&self, path: &str, versions: &[u64]) -> VaultResult<()> {
        self.versions_call(ApiRequest::post(self.path("delete", path)), versions)
            .await
    }

    /// Restore soft-deleted versions of `path`.
    ///
    /// # Errors
    ///
    /// Returns any transport or API error.
    pub async fn undelete_versions(&self, path: &str, versions: &[u64]) -> VaultResult<()> {
        self.versions_call(ApiRequest::post(self.path("undelete", path)), versions)
            .await
    }

    /// Permanently destroy versions of `path`.
    ///
    /// # Errors
    ///
    /// Returns any transport or API error.
    pub async fn destroy_versions(&self, path: &str, versions: &[u64]) -> VaultResult<()> {
        self.versions_call(ApiRequest::put(self.path("destroy", path)), versions)
            .await
    }

    async fn versions_call(&self, request: ApiRequest, versions: &[u64]) -> VaultResult<()> {
        if versions.is_empty() {
            return Err(VaultError::invalid_config("no secret versions specified"));
        }
        self.client
            .send(request.body(json!({ "versions": versions })))
            .await
            .map(|_| ())
    }

    /// Read the metadata of `path` across all versions.
    ///
    /// # Errors
    ///
    /// [`VaultError::SecretNotFound`] if the secret does not exist;
    /// otherwise any transport or API error.
    pub async fn get_metadata(&self, path: &str) -> VaultResult<KvMetadata> {
        let full_path = self.path("metadata", path);
        let secret = self
            .client
            .send_secret(ApiRequest::get(full_path.as_str()))
            .await?
            .ok_or_else(|| VaultError::not_found(full_path))?;
        Ok(serde_json::from_value(Value::Object(secret.data))?)
    }

    /// Delete `path` with all its versions and metadata.
    ///
    /// # Errors
    ///
    /// Returns any transport or API error.
    pub async fn delete_metadata(&self, path: &str) -> VaultResult<()> {
        self.client
            .send(ApiRequest::delete(self.path("metadata", path)))
            .await
            .map(|_| ())
    }

    /// List the keys directly under `path`. A missing path yields an empty
    /// list.
    ///
    /// # Errors
    ///
    /// Returns any transport or API error other than not-found.
    pub async fn list(&self, path: &str) -> VaultResult<Vec<String>> {
        let request = ApiRequest::get(self.path("metadata", path)).query("list", "true");
        let secret = match self.client.send_secret(request).await {
            Ok(Some(secret)) => secret,
            Ok(None) => return Ok(Vec::new()),
            Err(e) if e.is_not_found() => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        Ok(secret
            .data
            .get("keys")
            .and_then(Value::as_array)
            .map(|keys| keys.iter().filter_map(Value::as_str).map(str::to_string).collect())
            .unwrap_or_default())
    }
}

fn version_metadata(secret: Option<Secret>) -> VaultResult<KvVersionMetadata> {
    let secret = secret.ok_or_else(|| VaultError::missing_field("data"))?;
    Ok(serde_json::from_value(Value::Object(secret.data))?)
}

fn parse_time(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn null_map<'de, D>(deserializer: D) -> Result<HashMap<String, String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VaultConfig;

    #[test]
    fn test_paths_are_prefixed_per_operation() {
        let client = VaultClient::new(VaultConfig::default()).unwrap();
        let kv = client.kv2("/secret/");
        assert_eq!(kv.mount(), "secret");
        assert_eq!(kv.path("data", "/creds"), "secret/data/creds");
        assert_eq!(kv.path("metadata", "app/db"), "secret/metadata/app/db");
    }

    #[test]
    fn test_version_metadata_times() {
        let meta: KvVersionMetadata = serde_json::from_value(json!({
            "created_time": "2018-03-22T02:24:06.945319214Z",
            "deletion_time": "",
            "destroyed": false,
            "version": 1
        }))
        .unwrap();
        assert_eq!(meta.version, 1);
        assert!(meta.created_at().is_some());
        assert!(meta.deleted_at().is_none());
    }

    #[test]
    fn test_metadata_null_custom_metadata() {
        let meta: KvMetadata = serde_json::from_value(json!({
            "current_version": 3,
            "custom_metadata": null,
            "versions": {"1": {"version": 1, "destroyed": true}}
        }))
        .unwrap();
        assert_eq!(meta.current_version, 3);
        assert!(meta.custom_metadata.is_empty());
        assert!(meta.versions["1"].destroyed);
    }
}
