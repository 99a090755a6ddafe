//! Time-bounded cache in front of a KV-v2 mount.

use crate::{
    error::VaultResult,
    kv2::{Kv2, KvSecret},
};
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use tracing::debug;

/// How long a cached secret is served before Vault is asked again.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Caches [`Kv2::get`] results per path.
#[derive(Debug, Clone)]
pub struct SecretCache {
    kv: Kv2,
    ttl: Duration,
    entries: Arc<Mutex<HashMap<String, (Instant, KvSecret)>>>,
}

impl SecretCache {
    /// Cache reads from `kv` for [`DEFAULT_CACHE_TTL`].
    #[must_use]
    pub fn new(kv: Kv2) -> Self {
        Self::with_ttl(kv, DEFAULT_CACHE_TTL)
    }

    /// Cache reads from `kv` for `ttl`.
    #[must_use]
    pub fn with_ttl(kv: Kv2, ttl: Duration) -> Self {
        Self {
            kv,
            ttl,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Read `path`, serving a cached copy while it is fresh. Errors are
    /// never cached.
    ///
    /// # Errors
    ///
    /// As [`Kv2::get`].
    pub async fn get(&self, path: &str) -> VaultResult<KvSecret> {
        if let Some(secret) = self.fresh(path) {
            debug!(path, "Secret served from cache");
            return Ok(secret);
        }

        let secret = self.kv.get(path).await?;
        self.entries
            .lock()
            .insert(path.to_string(), (Instant::now(), secret.clone()));
        Ok(secret)
    }

    fn fresh(&self, path: &str) -> Option<KvSecret> {
        let entries = self.entries.lock();
        entries
            .get(path)
            .filter(|(stored, _)| stored.elapsed() < self.ttl)
            .map(|(_, secret)| secret.clone())
    }

    /// Drop the cached copy of `path`.
    pub fn invalidate(&self, path: &str) {
        self.entries.lock().remove(path);
    }

    /// Drop every cached secret.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Number of cached entries, fresh or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
