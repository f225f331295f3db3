//! Cache-aside wrapper over an optional `CacheStore`.
//!
//! The cache is never the source of truth. Every failure here (store down,
//! corrupt value, failed write) degrades to recomputing and is logged, never
//! returned to the caller. Only cancellation and the compute closure's own
//! errors propagate.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use matchwise_common::MatchError;

use crate::cancel::cancellable;
use crate::traits::CacheStore;

/// Known cache namespaces and their default TTLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheNamespace {
    Recommendations,
    Attendance,
    Queue,
    Statistics,
    Session,
}

impl CacheNamespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheNamespace::Recommendations => "recommendations",
            CacheNamespace::Attendance => "attendance",
            CacheNamespace::Queue => "queue",
            CacheNamespace::Statistics => "statistics",
            CacheNamespace::Session => "session",
        }
    }

    pub fn default_ttl(&self) -> Duration {
        match self {
            CacheNamespace::Recommendations => Duration::from_secs(30 * 60),
            CacheNamespace::Attendance => Duration::from_secs(2 * 60 * 60),
            CacheNamespace::Queue => Duration::from_secs(60 * 60),
            CacheNamespace::Statistics => Duration::from_secs(5 * 60),
            CacheNamespace::Session => Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl std::fmt::Display for CacheNamespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Default)]
pub struct CacheLayer {
    store: Option<Arc<dyn CacheStore>>,
}

impl CacheLayer {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store: Some(store) }
    }

    /// No backing store: every lookup is a miss, every write a no-op.
    pub fn disabled() -> Self {
        Self { store: None }
    }

    /// Return the cached value, or compute it and write it through with `ttl`.
    pub async fn get_or_compute<T, F, Fut>(
        &self,
        namespace: &str,
        key: &str,
        ttl: Duration,
        force_refresh: bool,
        cancel: &CancellationToken,
        compute: F,
    ) -> Result<T, MatchError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, MatchError>>,
    {
        if !force_refresh {
            if let Some(hit) = self.get::<T>(namespace, key, cancel).await? {
                debug!(namespace, key, "Cache hit");
                return Ok(hit);
            }
        }

        let value = compute().await?;
        self.set(namespace, key, &value, ttl, cancel).await?;
        Ok(value)
    }

    /// Cached value if present and decodable. Store failures read as a miss.
    pub async fn get<T: DeserializeOwned>(
        &self,
        namespace: &str,
        key: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<T>, MatchError> {
        let Some(store) = &self.store else {
            return Ok(None);
        };
        let raw = match cancellable(cancel, store.get(namespace, key)).await? {
            Ok(Some(raw)) => raw,
            Ok(None) => return Ok(None),
            Err(e) => {
                warn!(namespace, key, error = %e, "Cache read failed, treating as miss");
                return Ok(None);
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(namespace, key, error = %e, "Cached value undecodable, treating as miss");
                Ok(None)
            }
        }
    }

    /// Best-effort write. Failures are logged and swallowed.
    pub async fn set<T: Serialize>(
        &self,
        namespace: &str,
        key: &str,
        value: &T,
        ttl: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), MatchError> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(namespace, key, error = %e, "Value not serializable, skipping cache write");
                return Ok(());
            }
        };
        if let Err(e) = cancellable(cancel, store.set(namespace, key, raw, ttl)).await? {
            warn!(namespace, key, error = %e, "Cache write failed");
        }
        Ok(())
    }

    pub async fn invalidate(
        &self,
        namespace: &str,
        key: &str,
        cancel: &CancellationToken,
    ) -> Result<(), MatchError> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        if let Err(e) = cancellable(cancel, store.delete(namespace, key)).await? {
            warn!(namespace, key, error = %e, "Cache delete failed");
        }
        Ok(())
    }

    /// Bump a counter. `None` when the cache is absent or unreachable.
    pub async fn increment(
        &self,
        namespace: &str,
        key: &str,
        by: i64,
        ttl: Duration,
        cancel: &CancellationToken,
    ) -> Result<Option<i64>, MatchError> {
        let Some(store) = &self.store else {
            return Ok(None);
        };
        match cancellable(cancel, store.increment(namespace, key, by, ttl)).await? {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(namespace, key, error = %e, "Cache increment failed");
                Ok(None)
            }
        }
    }
}
