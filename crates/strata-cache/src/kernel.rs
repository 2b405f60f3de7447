use crate::ast_cache::{
    AstCache, AstCacheConfig, AstCacheEntry, CacheInsert, CacheKey, CacheStats, EvictedEntry,
    Lookup,
};
use crate::clock::Clock;
use crate::error::CacheError;
use crate::fingerprint::Fingerprint;
use crate::size::SizeEstimable;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use strata_memory::{GuardLimits, MemoryGuard, MemoryGuardContext, Priority};

pub const DEFAULT_FAILURE_CAPACITY: usize = 5_000;

/// Parser-level metadata shadowing one [`AstCache`] entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KernelArtifact {
    pub project_id: String,
    pub file_path: String,
    pub version: String,
    pub language: String,
    pub parser: String,
    pub content_hash: String,
    /// SHA-256 of parser name and content hash.
    pub ast_digest: String,
    pub stored_at: u64,
    pub size_bytes: u64,
    /// Generation of the cache entry this artifact describes.
    pub generation: u64,
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KernelFailureRecord {
    pub project_id: String,
    pub file_path: String,
    pub error: String,
    pub timestamp: u64,
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KernelStats {
    pub cache: CacheStats,
    pub artifacts: usize,
    pub failures: usize,
    pub failure_capacity: usize,
}

/// A cached kernel and, when recorded, its artifact metadata.
#[derive(Debug)]
pub struct KernelHit<T> {
    pub entry: AstCacheEntry<T>,
    pub artifact: Option<KernelArtifact>,
}

impl<T> KernelHit<T> {
    pub fn ast(&self) -> &Arc<T> {
        &self.entry.payload
    }
}

/// Arguments of [`KernelCacheManager::store_kernel`].
#[derive(Debug)]
pub struct KernelStoreRequest<'a, T> {
    pub project_id: &'a str,
    pub file_path: &'a str,
    pub payload: Arc<T>,
    /// Source text; hashed when `content_hash` is not supplied.
    pub content: &'a str,
    pub content_hash: Option<&'a str>,
    pub version: &'a str,
    pub language: &'a str,
    pub parser: &'a str,
    pub project_size_bytes: Option<u64>,
    pub priority: Priority,
    pub size_bytes: Option<u64>,
    pub metadata: BTreeMap<String, String>,
}

impl<'a, T> KernelStoreRequest<'a, T> {
    pub fn new(project_id: &'a str, file_path: &'a str, payload: Arc<T>, content: &'a str) -> Self {
        Self {
            project_id,
            file_path,
            payload,
            content,
            content_hash: None,
            version: "",
            language: "",
            parser: "",
            project_size_bytes: None,
            priority: Priority::Normal,
            size_bytes: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn content_hash(mut self, content_hash: &'a str) -> Self {
        self.content_hash = Some(content_hash);
        self
    }

    pub fn version(mut self, version: &'a str) -> Self {
        self.version = version;
        self
    }

    pub fn language(mut self, language: &'a str) -> Self {
        self.language = language;
        self
    }

    pub fn parser(mut self, parser: &'a str) -> Self {
        self.parser = parser;
        self
    }

    pub fn project_size_bytes(mut self, bytes: Option<u64>) -> Self {
        self.project_size_bytes = bytes;
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn size_bytes(mut self, size_bytes: Option<u64>) -> Self {
        self.size_bytes = size_bytes;
        self
    }

    pub fn metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Façade over an [`AstCache`] that keeps per-entry [`KernelArtifact`]s in
/// step with the cache and retains a bounded log of build failures.
///
/// An artifact is dropped whenever its entry leaves the cache through this
/// manager. Entries removed behind the manager's back (directly through
/// [`KernelCacheManager::cache`]) are detected by generation and their
/// artifacts are never returned.
///
/// Lock order: artifacts, then cache, then guard.
pub struct KernelCacheManager<T> {
    cache: Arc<AstCache<T>>,
    artifacts: Mutex<HashMap<CacheKey, KernelArtifact>>,
    failures: Mutex<VecDeque<KernelFailureRecord>>,
    failure_capacity: usize,
}

impl<T: SizeEstimable + Send + Sync> KernelCacheManager<T> {
    pub fn new(cache: Arc<AstCache<T>>) -> Self {
        Self {
            cache,
            artifacts: Mutex::new(HashMap::new()),
            failures: Mutex::new(VecDeque::new()),
            failure_capacity: DEFAULT_FAILURE_CAPACITY,
        }
    }

    /// Manager over a fresh cache and a private guard.
    pub fn with_limits(config: AstCacheConfig, limits: GuardLimits) -> Result<Self, CacheError> {
        let guard = MemoryGuard::new(limits)?;
        Ok(Self::new(Arc::new(AstCache::new(config, guard)?)))
    }

    /// Manager with default cache sizing and default guard limits.
    pub fn with_defaults() -> Self {
        Self::new(Arc::new(AstCache::from_parts(
            AstCacheConfig::default(),
            MemoryGuard::default(),
        )))
    }

    pub fn with_failure_capacity(mut self, capacity: usize) -> Self {
        self.failure_capacity = capacity;
        self
    }

    pub fn cache(&self) -> &Arc<AstCache<T>> {
        &self.cache
    }

    pub fn guard(&self) -> &MemoryGuard {
        self.cache.guard()
    }

    /// Store a kernel and record its artifact. Returns `None` when the cache
    /// rejects the entry; nothing is recorded in that case and any artifact of
    /// a previous entry under the same key stays valid.
    pub fn store_kernel(&self, request: KernelStoreRequest<'_, T>) -> Option<KernelArtifact> {
        let KernelStoreRequest {
            project_id,
            file_path,
            payload,
            content,
            content_hash,
            version,
            language,
            parser,
            project_size_bytes,
            priority,
            size_bytes,
            metadata,
        } = request;

        let content_hash = match content_hash {
            Some(hash) => hash.to_owned(),
            None => Fingerprint::from_bytes(content).into_string(),
        };
        let context = MemoryGuardContext::new(project_id)
            .with_project_size(project_size_bytes)
            .with_priority(priority);
        let insert = CacheInsert::new(project_id, file_path, payload, content_hash.clone())
            .version(version)
            .language(language)
            .size_bytes(size_bytes);

        let mut artifacts = self.artifacts.lock();
        let outcome = self.cache.store_with_outcome(insert, Some(&context));
        drop_evicted(&mut artifacts, &outcome.evicted);

        let stored = outcome.stored?;

        let artifact = KernelArtifact {
            project_id: project_id.to_owned(),
            file_path: file_path.to_owned(),
            version: version.to_owned(),
            language: language.to_owned(),
            parser: parser.to_owned(),
            ast_digest: Fingerprint::from_bytes(format!("{parser}{content_hash}")).into_string(),
            content_hash,
            stored_at: stored.stored_at,
            size_bytes: stored.size_bytes,
            generation: stored.generation,
            metadata,
        };
        artifacts.insert(CacheKey::new(project_id, file_path), artifact.clone());
        Some(artifact)
    }

    /// Fetch a kernel, validating content hash and version when given.
    pub fn get_kernel(
        &self,
        project_id: &str,
        file_path: &str,
        content_hash: Option<&str>,
        version: Option<&str>,
    ) -> Option<KernelHit<T>> {
        let key = CacheKey::new(project_id, file_path);
        let mut artifacts = self.artifacts.lock();
        match self.cache.lookup(project_id, file_path, content_hash, version) {
            Lookup::Hit(entry) => {
                let artifact = current_artifact(&artifacts, &key, entry.generation);
                Some(KernelHit { entry, artifact })
            }
            Lookup::Expired(evicted) => {
                drop_evicted(&mut artifacts, std::slice::from_ref(&evicted));
                None
            }
            Lookup::Miss => {
                artifacts.remove(&key);
                None
            }
            Lookup::Mismatch => None,
        }
    }

    /// Like [`KernelCacheManager::get_kernel`] without validation, LRU
    /// promotion, or hit/miss accounting. Used to find the previous kernel of
    /// a changed file.
    pub fn peek_kernel(&self, project_id: &str, file_path: &str) -> Option<KernelHit<T>> {
        let key = CacheKey::new(project_id, file_path);
        let artifacts = self.artifacts.lock();
        let entry = self.cache.peek(project_id, file_path)?;
        let artifact = current_artifact(&artifacts, &key, entry.generation);
        Some(KernelHit { entry, artifact })
    }

    /// Drop cache entries and artifacts together. Returns the number of cache
    /// entries removed.
    pub fn invalidate(&self, project_id: &str, file_path: Option<&str>) -> usize {
        let mut artifacts = self.artifacts.lock();
        let evicted = self.cache.invalidate(project_id, file_path);
        artifacts.retain(|key, _| {
            key.project_id != project_id || file_path.is_some_and(|path| key.file_path != path)
        });
        tracing::debug!(
            target: "strata.cache",
            project_id,
            file_path = file_path.unwrap_or("*"),
            removed = evicted.len(),
            "invalidated kernels"
        );
        evicted.len()
    }

    pub fn record_failure(
        &self,
        project_id: &str,
        file_path: &str,
        error: impl Into<String>,
        metadata: BTreeMap<String, String>,
    ) {
        let record = KernelFailureRecord {
            project_id: project_id.to_owned(),
            file_path: file_path.to_owned(),
            error: error.into(),
            timestamp: self.cache.clock().now_millis(),
            metadata,
        };
        let mut failures = self.failures.lock();
        if self.failure_capacity == 0 {
            return;
        }
        while failures.len() >= self.failure_capacity {
            failures.pop_front();
        }
        failures.push_back(record);
    }

    /// The most recent `limit` failures (all when `None`), oldest first.
    pub fn get_failure_report(&self, limit: Option<usize>) -> Vec<KernelFailureRecord> {
        let failures = self.failures.lock();
        let skip = limit.map_or(0, |limit| failures.len().saturating_sub(limit));
        failures.iter().skip(skip).cloned().collect()
    }

    /// Resize the underlying cache; artifacts of evicted entries are dropped.
    pub fn apply_cache_overrides(
        &self,
        max_entries: Option<usize>,
        max_bytes: Option<u64>,
        ttl_seconds: Option<u64>,
    ) -> Result<(), CacheError> {
        let mut artifacts = self.artifacts.lock();
        let evicted = self.cache.reconfigure(max_entries, max_bytes, ttl_seconds)?;
        drop_evicted(&mut artifacts, &evicted);
        Ok(())
    }

    pub fn artifact(&self, project_id: &str, file_path: &str) -> Option<KernelArtifact> {
        let key = CacheKey::new(project_id, file_path);
        let artifacts = self.artifacts.lock();
        let artifact = artifacts.get(&key)?;
        let entry = self.cache.peek(project_id, file_path)?;
        (entry.generation == artifact.generation).then(|| artifact.clone())
    }

    /// Cache statistics plus artifact and failure counts. Artifacts whose
    /// entry is gone are pruned first.
    pub fn stats(&self) -> KernelStats {
        let mut artifacts = self.artifacts.lock();
        let live: HashMap<CacheKey, u64> = self.cache.generations().into_iter().collect();
        artifacts.retain(|key, artifact| live.get(key) == Some(&artifact.generation));
        let artifact_count = artifacts.len();
        let cache = self.cache.stats();
        drop(artifacts);

        KernelStats {
            cache,
            artifacts: artifact_count,
            failures: self.failures.lock().len(),
            failure_capacity: self.failure_capacity,
        }
    }
}

impl<T> std::fmt::Debug for KernelCacheManager<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KernelCacheManager")
            .field("artifacts", &self.artifacts.lock().len())
            .field("failures", &self.failures.lock().len())
            .field("failure_capacity", &self.failure_capacity)
            .finish_non_exhaustive()
    }
}

fn drop_evicted(artifacts: &mut HashMap<CacheKey, KernelArtifact>, evicted: &[EvictedEntry]) {
    for entry in evicted {
        if artifacts
            .get(&entry.key)
            .is_some_and(|artifact| artifact.generation == entry.generation)
        {
            artifacts.remove(&entry.key);
        }
    }
}

fn current_artifact(
    artifacts: &HashMap<CacheKey, KernelArtifact>,
    key: &CacheKey,
    generation: u64,
) -> Option<KernelArtifact> {
    artifacts
        .get(key)
        .filter(|artifact| artifact.generation == generation)
        .cloned()
}
