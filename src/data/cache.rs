//! Namespaced read-through cache
//!
//! Values are stored as JSON under `namespace:key`. Every backend failure is
//! logged and absorbed here: callers only ever see a miss or a `false`.
//! Uses Moka for the in-process backend.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache as MokaCache;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::config::{CacheBackendKind, CacheConfig};
use crate::error::AppError;
use crate::metrics::{
    CACHE_ERRORS_TOTAL, CACHE_HITS_TOTAL, CACHE_INVALIDATIONS_TOTAL, CACHE_MISSES_TOTAL,
};

/// Key used for whole-collection views
pub const ALL_KEY: &str = "all";

// =============================================================================
// Namespaces and invalidation targets
// =============================================================================

/// Logical grouping of cached views
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheNamespace {
    Categories,
    Movies,
    SingleMovie,
    Comments,
    Sources,
}

impl CacheNamespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Categories => "categories",
            Self::Movies => "movies",
            Self::SingleMovie => "single-movie",
            Self::Comments => "comments",
            Self::Sources => "sources",
        }
    }

    const COUNT: usize = 5;

    fn index(&self) -> usize {
        match self {
            Self::Categories => 0,
            Self::Movies => 1,
            Self::SingleMovie => 2,
            Self::Comments => 3,
            Self::Sources => 4,
        }
    }

    fn prefix(&self) -> String {
        format!("{}:", self.as_str())
    }

    fn key(&self, key: &str) -> String {
        format!("{}:{}", self.as_str(), key)
    }
}

/// Key of the per-movie comment thread view
pub fn movie_comments_key(movie_id: i64) -> String {
    format!("movie:{movie_id}")
}

/// One thing to drop from the cache after a write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invalidation {
    /// A single `namespace:key` entry
    Key(CacheNamespace, String),
    /// Every entry under the namespace
    Namespace(CacheNamespace),
}

impl Invalidation {
    /// The `all` list view of a namespace
    pub fn list(namespace: CacheNamespace) -> Self {
        Self::Key(namespace, ALL_KEY.to_string())
    }

    pub fn key(namespace: CacheNamespace, key: impl ToString) -> Self {
        Self::Key(namespace, key.to_string())
    }

    pub fn namespace(namespace: CacheNamespace) -> Self {
        Self::Namespace(namespace)
    }
}

// =============================================================================
// Backends
// =============================================================================

/// Cache backend failure. Never propagated past [`Cache`].
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),

    #[error("prefix deletion is not supported by the {0} backend")]
    PrefixDeleteUnsupported(&'static str),
}

/// What a backend can do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendCapabilities {
    pub supports_prefix_delete: bool,
}

/// Raw key/value store behind [`Cache`]
#[async_trait]
pub trait CacheBackend: Send + Sync {
    fn name(&self) -> &'static str;

    fn capabilities(&self) -> BackendCapabilities;

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    /// Returns whether an entry was removed.
    async fn delete(&self, key: &str) -> Result<bool, CacheError>;

    async fn delete_prefix(&self, prefix: &str) -> Result<(), CacheError>;

    async fn flush(&self) -> Result<(), CacheError>;

    async fn ping(&self) -> Result<(), CacheError>;

    async fn close(&self) {}
}

#[derive(Clone)]
struct StoredValue {
    body: Arc<str>,
    ttl: Duration,
}

/// Expiry honoring the TTL recorded with each entry
struct PerEntryTtl;

impl Expiry<String, StoredValue> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &StoredValue,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &StoredValue,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-process backend (volatile, cleared on restart)
pub struct MemoryBackend {
    entries: MokaCache<String, StoredValue>,
}

impl MemoryBackend {
    /// Create new memory backend
    ///
    /// # Arguments
    /// * `max_capacity` - Maximum number of entries before eviction
    pub fn new(max_capacity: u64) -> Self {
        let entries = MokaCache::builder()
            .max_capacity(max_capacity)
            .expire_after(PerEntryTtl)
            .support_invalidation_closures()
            .build();

        Self { entries }
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            supports_prefix_delete: true,
        }
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.entries.get(key).await.map(|v| v.body.to_string()))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let stored = StoredValue {
            body: Arc::from(value),
            ttl,
        };
        self.entries.insert(key.to_string(), stored).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.entries.remove(key).await.is_some())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<(), CacheError> {
        let prefix = prefix.to_string();
        self.entries
            .invalidate_entries_if(move |key, _| key.starts_with(&prefix))
            .map(|_| ())
            .map_err(|e| CacheError::Unavailable(e.to_string()))
    }

    async fn flush(&self) -> Result<(), CacheError> {
        self.entries.invalidate_all();
        self.entries.run_pending_tasks().await;
        Ok(())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }
}

/// Backend used when caching is disabled
///
/// Every read misses. Prefix deletion is reported as unsupported so callers
/// see the same failure signal a remote store without SCAN would give.
pub struct NullBackend;

#[async_trait]
impl CacheBackend for NullBackend {
    fn name(&self) -> &'static str {
        "none"
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            supports_prefix_delete: false,
        }
    }

    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: String, _ttl: Duration) -> Result<(), CacheError> {
        Ok(())
    }

    async fn delete(&self, _key: &str) -> Result<bool, CacheError> {
        Ok(false)
    }

    async fn delete_prefix(&self, _prefix: &str) -> Result<(), CacheError> {
        Err(CacheError::PrefixDeleteUnsupported(self.name()))
    }

    async fn flush(&self) -> Result<(), CacheError> {
        Ok(())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }
}

// =============================================================================
// Cache
// =============================================================================

/// Namespaced JSON cache shared by all entity services
pub struct Cache {
    backend: Arc<dyn CacheBackend>,
    default_ttl: Duration,
    /// Bumped on every invalidation touching the namespace
    generations: [AtomicU64; CacheNamespace::COUNT],
}

impl Cache {
    pub fn new(backend: Arc<dyn CacheBackend>, default_ttl: Duration) -> Self {
        Self {
            backend,
            default_ttl,
            generations: Default::default(),
        }
    }

    fn generation(&self, namespace: CacheNamespace) -> u64 {
        self.generations[namespace.index()].load(Ordering::Acquire)
    }

    fn bump_generation(&self, namespace: CacheNamespace) {
        self.generations[namespace.index()].fetch_add(1, Ordering::AcqRel);
    }

    /// Build the backend selected in configuration
    pub fn from_config(config: &CacheConfig) -> Self {
        let backend: Arc<dyn CacheBackend> = match config.backend {
            CacheBackendKind::Memory => Arc::new(MemoryBackend::new(config.max_capacity)),
            CacheBackendKind::None => Arc::new(NullBackend),
        };
        Self::new(backend, config.default_ttl())
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn capabilities(&self) -> BackendCapabilities {
        self.backend.capabilities()
    }

    /// Store a value. Returns false when encoding or the backend failed.
    pub async fn save<T: Serialize + ?Sized>(
        &self,
        namespace: CacheNamespace,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> bool {
        let body = match serde_json::to_string(value) {
            Ok(body) => body,
            Err(e) => {
                record_failure(namespace, "encode");
                tracing::warn!(namespace = namespace.as_str(), key, error = %e, "Failed to encode cache value");
                return false;
            }
        };

        let full_key = namespace.key(key);
        match self
            .backend
            .set(&full_key, body, ttl.unwrap_or(self.default_ttl))
            .await
        {
            Ok(()) => true,
            Err(e) => {
                record_failure(namespace, "save");
                tracing::warn!(key = %full_key, error = %e, "Cache save failed");
                false
            }
        }
    }

    /// Fetch a value. Corrupt entries are evicted and read as a miss.
    pub async fn get<T: DeserializeOwned>(&self, namespace: CacheNamespace, key: &str) -> Option<T> {
        let full_key = namespace.key(key);
        let body = match self.backend.get(&full_key).await {
            Ok(Some(body)) => body,
            Ok(None) => {
                CACHE_MISSES_TOTAL
                    .with_label_values(&[namespace.as_str()])
                    .inc();
                return None;
            }
            Err(e) => {
                record_failure(namespace, "get");
                tracing::warn!(key = %full_key, error = %e, "Cache read failed");
                return None;
            }
        };

        match serde_json::from_str(&body) {
            Ok(value) => {
                CACHE_HITS_TOTAL.with_label_values(&[namespace.as_str()]).inc();
                Some(value)
            }
            Err(e) => {
                record_failure(namespace, "decode");
                tracing::warn!(key = %full_key, error = %e, "Evicting corrupt cache entry");
                if let Err(e) = self.backend.delete(&full_key).await {
                    tracing::warn!(key = %full_key, error = %e, "Failed to evict corrupt cache entry");
                }
                None
            }
        }
    }

    /// Read-through helper: serve from cache, otherwise load and store.
    ///
    /// Loader errors propagate and nothing is cached for them.
    ///
    /// A load that overlaps an invalidation of the same namespace is returned
    /// but not stored, so a write committed mid-load cannot be masked by the
    /// pre-write value. A narrow window remains: an invalidation landing
    /// between that check and the backend write still lets the stale value
    /// in, and it then lives until its TTL.
    pub async fn get_or_load<T, F, Fut>(
        &self,
        namespace: CacheNamespace,
        key: &str,
        load: F,
    ) -> Result<T, AppError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        if let Some(cached) = self.get(namespace, key).await {
            return Ok(cached);
        }

        let generation = self.generation(namespace);
        let value = load().await?;
        if self.generation(namespace) == generation {
            self.save(namespace, key, &value, None).await;
        } else {
            tracing::debug!(
                namespace = namespace.as_str(),
                key,
                "Skipping save of a load that raced an invalidation"
            );
        }
        Ok(value)
    }

    /// Delete one key, or the whole namespace when `key` is `None`.
    ///
    /// Returns whether something was removed. Namespace deletion on a
    /// backend without prefix support is a no-op returning false.
    pub async fn delete(&self, namespace: CacheNamespace, key: Option<&str>) -> bool {
        self.bump_generation(namespace);
        match key {
            Some(key) => {
                let full_key = namespace.key(key);
                match self.backend.delete(&full_key).await {
                    Ok(removed) => removed,
                    Err(e) => {
                        record_failure(namespace, "delete");
                        tracing::warn!(key = %full_key, error = %e, "Cache delete failed");
                        false
                    }
                }
            }
            None => self.delete_namespace(namespace).await,
        }
    }

    async fn delete_namespace(&self, namespace: CacheNamespace) -> bool {
        if !self.backend.capabilities().supports_prefix_delete {
            record_failure(namespace, "delete_prefix");
            tracing::warn!(
                namespace = namespace.as_str(),
                backend = self.backend.name(),
                "Namespace invalidation unsupported; entries expire by TTL"
            );
            return false;
        }

        match self.backend.delete_prefix(&namespace.prefix()).await {
            Ok(()) => true,
            Err(e) => {
                record_failure(namespace, "delete_prefix");
                tracing::warn!(namespace = namespace.as_str(), error = %e, "Namespace invalidation failed");
                false
            }
        }
    }

    /// Apply every target. Returns true when none of them failed.
    ///
    /// A missing key counts as invalidated.
    pub async fn invalidate(&self, targets: &[Invalidation]) -> bool {
        let mut all_ok = true;
        for target in targets {
            let ok = match target {
                Invalidation::Key(namespace, key) => {
                    self.bump_generation(*namespace);
                    CACHE_INVALIDATIONS_TOTAL
                        .with_label_values(&[namespace.as_str(), "key"])
                        .inc();
                    let full_key = namespace.key(key);
                    match self.backend.delete(&full_key).await {
                        Ok(_) => true,
                        Err(e) => {
                            record_failure(*namespace, "delete");
                            tracing::warn!(key = %full_key, error = %e, "Cache invalidation failed");
                            false
                        }
                    }
                }
                Invalidation::Namespace(namespace) => {
                    self.bump_generation(*namespace);
                    CACHE_INVALIDATIONS_TOTAL
                        .with_label_values(&[namespace.as_str(), "namespace"])
                        .inc();
                    self.delete_namespace(*namespace).await
                }
            };
            all_ok &= ok;
        }
        all_ok
    }

    pub async fn flush(&self) -> bool {
        match self.backend.flush().await {
            Ok(()) => {
                tracing::info!(backend = self.backend.name(), "Cache flushed");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Cache flush failed");
                false
            }
        }
    }

    pub async fn health_check(&self) -> bool {
        match self.backend.ping().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(backend = self.backend.name(), error = %e, "Cache health check failed");
                false
            }
        }
    }

    pub async fn close(&self) {
        self.backend.close().await;
        tracing::info!(backend = self.backend.name(), "Cache closed");
    }
}

fn record_failure(namespace: CacheNamespace, operation: &str) {
    CACHE_ERRORS_TOTAL
        .with_label_values(&[namespace.as_str(), operation])
        .inc();
}
