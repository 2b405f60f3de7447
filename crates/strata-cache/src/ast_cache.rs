use crate::clock::{Clock, SystemClock};
use crate::error::CacheError;
use crate::size::SizeEstimable;
use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use strata_memory::{MemoryGuard, MemoryGuardContext, MB};

/// Sizing and expiry for an [`AstCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AstCacheConfig {
    pub max_entries: usize,
    pub max_bytes: u64,
    /// `0` disables expiry.
    pub ttl_seconds: u64,
}

impl Default for AstCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 2_048,
            max_bytes: 512 * MB,
            ttl_seconds: 3_600,
        }
    }
}

impl AstCacheConfig {
    pub fn validate(&self) -> Result<(), CacheError> {
        if self.max_entries == 0 {
            return Err(CacheError::InvalidConfiguration {
                field: "max_entries",
                message: "must be at least 1".to_owned(),
            });
        }
        if self.max_bytes == 0 {
            return Err(CacheError::InvalidConfiguration {
                field: "max_bytes",
                message: "must be at least 1".to_owned(),
            });
        }
        Ok(())
    }

    /// Upper bound for a single entry's accounted size.
    fn max_entry_bytes(&self) -> u64 {
        (self.max_bytes / 4).max(1)
    }
}

/// Identity of a cache slot: one file within one project.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey {
    pub project_id: String,
    pub file_path: String,
}

impl CacheKey {
    pub fn new(project_id: impl Into<String>, file_path: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            file_path: file_path.into(),
        }
    }

    fn matches(&self, project_id: &str, file_path: Option<&str>) -> bool {
        self.project_id == project_id && file_path.map_or(true, |path| self.file_path == path)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.project_id, self.file_path)
    }
}

/// A cached parse result plus the metadata it was validated against.
///
/// The payload is shared; callers get a reference-counted handle and must
/// treat it as immutable.
#[derive(Debug)]
pub struct AstCacheEntry<T> {
    pub project_id: String,
    pub file_path: String,
    pub content_hash: String,
    pub version: String,
    pub language: String,
    pub payload: Arc<T>,
    pub size_bytes: u64,
    pub created_at: u64,
    pub accessed_at: u64,
    /// Monotonic per-cache store counter; distinguishes successive entries
    /// stored under the same key.
    pub generation: u64,
}

impl<T> Clone for AstCacheEntry<T> {
    fn clone(&self) -> Self {
        Self {
            project_id: self.project_id.clone(),
            file_path: self.file_path.clone(),
            content_hash: self.content_hash.clone(),
            version: self.version.clone(),
            language: self.language.clone(),
            payload: Arc::clone(&self.payload),
            size_bytes: self.size_bytes,
            created_at: self.created_at,
            accessed_at: self.accessed_at,
            generation: self.generation,
        }
    }
}

/// Input to [`AstCache::store`].
#[derive(Debug)]
pub struct CacheInsert<T> {
    pub project_id: String,
    pub file_path: String,
    pub payload: Arc<T>,
    pub content_hash: String,
    pub version: String,
    pub language: String,
    /// Explicit size; when absent the payload's [`SizeEstimable`] estimate is used.
    pub size_bytes: Option<u64>,
}

impl<T> CacheInsert<T> {
    pub fn new(
        project_id: impl Into<String>,
        file_path: impl Into<String>,
        payload: Arc<T>,
        content_hash: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            file_path: file_path.into(),
            payload,
            content_hash: content_hash.into(),
            version: String::new(),
            language: String::new(),
            size_bytes: None,
        }
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn size_bytes(mut self, size_bytes: Option<u64>) -> Self {
        self.size_bytes = size_bytes;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionReason {
    /// Entry-count or byte cap.
    Capacity,
    /// Memory guard demanded reclaim.
    Reclaim,
    Expired,
    Invalidated,
    Reconfigured,
}

/// An entry that left the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvictedEntry {
    pub key: CacheKey,
    pub generation: u64,
    pub size_bytes: u64,
    pub reason: EvictionReason,
}

/// Slot of a successful store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoredEntry {
    pub generation: u64,
    pub size_bytes: u64,
    pub stored_at: u64,
}

/// Result of [`AstCache::store_with_outcome`]. On rejection `stored` is
/// `None` and `evicted` is empty: the cache is left exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOutcome {
    pub stored: Option<StoredEntry>,
    pub evicted: Vec<EvictedEntry>,
}

/// Result of [`AstCache::lookup`].
#[derive(Debug)]
pub enum Lookup<T> {
    Hit(AstCacheEntry<T>),
    Miss,
    /// An entry exists but its content hash or version differs. It is kept.
    Mismatch,
    /// The entry outlived its TTL and was removed.
    Expired(EvictedEntry),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub bytes: u64,
    pub max_entries: usize,
    pub max_bytes: u64,
    pub ttl_seconds: u64,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub rejections: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,
    rejections: u64,
}

struct Inner<T> {
    config: AstCacheConfig,
    lru: LruCache<CacheKey, AstCacheEntry<T>>,
    current_bytes: u64,
    next_generation: u64,
    counters: Counters,
}

struct Victim<T> {
    key: CacheKey,
    entry: AstCacheEntry<T>,
    released: u64,
    reason: EvictionReason,
}

/// Bounded LRU of parse payloads, admission-controlled by a [`MemoryGuard`].
///
/// Every live entry holds a guard allocation of exactly its `size_bytes`
/// under a cache-scoped key, so several caches can share one guard. Lock
/// order is cache, then guard; the guard never calls back into the cache.
pub struct AstCache<T> {
    scope: String,
    guard: MemoryGuard,
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner<T>>,
}

static NEXT_SCOPE: AtomicU64 = AtomicU64::new(0);

impl<T: SizeEstimable + Send + Sync> AstCache<T> {
    pub fn new(config: AstCacheConfig, guard: MemoryGuard) -> Result<Self, CacheError> {
        config.validate()?;
        Ok(Self::from_parts(config, guard))
    }

    pub(crate) fn from_parts(config: AstCacheConfig, guard: MemoryGuard) -> Self {
        let scope = format!("ast-{}", NEXT_SCOPE.fetch_add(1, Ordering::Relaxed));
        Self {
            scope,
            guard,
            clock: Arc::new(SystemClock),
            inner: Mutex::new(Inner {
                config,
                lru: LruCache::unbounded(),
                current_bytes: 0,
                next_generation: 0,
                counters: Counters::default(),
            }),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Name used to namespace this cache's guard allocations.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn guard(&self) -> &MemoryGuard {
        &self.guard
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn config(&self) -> AstCacheConfig {
        self.inner.lock().config
    }

    pub fn get(
        &self,
        project_id: &str,
        file_path: &str,
        content_hash: Option<&str>,
        version: Option<&str>,
    ) -> Option<AstCacheEntry<T>> {
        match self.lookup(project_id, file_path, content_hash, version) {
            Lookup::Hit(entry) => Some(entry),
            Lookup::Miss | Lookup::Mismatch | Lookup::Expired(_) => None,
        }
    }

    /// Probe the cache. A hit refreshes the entry's LRU position and
    /// `accessed_at`; an expired entry is removed.
    pub fn lookup(
        &self,
        project_id: &str,
        file_path: &str,
        content_hash: Option<&str>,
        version: Option<&str>,
    ) -> Lookup<T> {
        let now = self.clock.now_millis();
        let key = CacheKey::new(project_id, file_path);
        let mut inner = self.inner.lock();
        let ttl_seconds = inner.config.ttl_seconds;

        let (expired, mismatched) = match inner.lru.peek(&key) {
            None => {
                inner.counters.misses += 1;
                return Lookup::Miss;
            }
            Some(entry) => (
                is_expired(entry, ttl_seconds, now),
                content_hash.is_some_and(|hash| hash != entry.content_hash)
                    || version.is_some_and(|version| version != entry.version),
            ),
        };

        if expired {
            inner.counters.misses += 1;
            inner.counters.expirations += 1;
            let evicted = self.remove_locked(&mut inner, &key, EvictionReason::Expired);
            drop(inner);
            return match evicted {
                Some(evicted) => {
                    tracing::debug!(target: "strata.cache", key = %evicted.key, "entry expired");
                    Lookup::Expired(evicted)
                }
                None => Lookup::Miss,
            };
        }
        if mismatched {
            inner.counters.misses += 1;
            return Lookup::Mismatch;
        }

        inner.counters.hits += 1;
        match inner.lru.get_mut(&key) {
            Some(entry) => {
                entry.accessed_at = now;
                Lookup::Hit(entry.clone())
            }
            None => Lookup::Miss,
        }
    }

    /// Read an entry without touching LRU order, timestamps, or counters.
    /// Expired entries are reported as absent but left for the next lookup.
    pub fn peek(&self, project_id: &str, file_path: &str) -> Option<AstCacheEntry<T>> {
        let now = self.clock.now_millis();
        let key = CacheKey::new(project_id, file_path);
        let inner = self.inner.lock();
        let ttl_seconds = inner.config.ttl_seconds;
        inner
            .lru
            .peek(&key)
            .filter(|entry| !is_expired(*entry, ttl_seconds, now))
            .cloned()
    }

    pub fn contains(&self, project_id: &str, file_path: &str) -> bool {
        self.inner
            .lock()
            .lru
            .contains(&CacheKey::new(project_id, file_path))
    }

    pub fn store(&self, insert: CacheInsert<T>, context: Option<&MemoryGuardContext>) -> bool {
        self.store_with_outcome(insert, context).stored.is_some()
    }

    /// Insert or replace an entry.
    ///
    /// LRU entries are evicted until the entry-count and byte caps hold after
    /// insertion, then further until the guard reports no reclaim is needed.
    /// If the guard still refuses the reservation, every eviction is undone and
    /// any previous entry under the same key stays in place.
    pub fn store_with_outcome(
        &self,
        insert: CacheInsert<T>,
        context: Option<&MemoryGuardContext>,
    ) -> StoreOutcome {
        // Sampled outside the lock; samplers may be slow.
        let system_pressure = self.guard.system_pressure();
        let now = self.clock.now_millis();

        let CacheInsert {
            project_id,
            file_path,
            payload,
            content_hash,
            version,
            language,
            size_bytes,
        } = insert;
        let key = CacheKey::new(project_id, file_path);
        let guard_key = self.guard_key(&key);

        let mut inner = self.inner.lock();
        let config = inner.config;
        let size_bytes = size_bytes
            .unwrap_or_else(|| payload.as_ref().estimated_size_bytes())
            .clamp(1, config.max_entry_bytes());

        let mut victims: Vec<Victim<T>> = Vec::new();

        // Caps.
        loop {
            let prior_size = inner.lru.peek(&key).map(|entry| entry.size_bytes);
            let entries_after = inner.lru.len() - usize::from(prior_size.is_some()) + 1;
            let bytes_after = inner.current_bytes - prior_size.unwrap_or(0) + size_bytes;
            if entries_after <= config.max_entries && bytes_after <= config.max_bytes {
                break;
            }
            match self.evict_lru_locked(&mut inner, &key, EvictionReason::Capacity) {
                Some(victim) => victims.push(victim),
                None => break,
            }
        }

        // Guard reclaim.
        let reclaim = self.guard.required_reclaim_with_pressure(
            Some(&guard_key),
            size_bytes,
            context,
            system_pressure,
        );
        let mut freed = 0;
        while freed < reclaim {
            match self.evict_lru_locked(&mut inner, &key, EvictionReason::Reclaim) {
                Some(victim) => {
                    freed += victim.released;
                    victims.push(victim);
                }
                None => break,
            }
        }

        let admitted = self.guard.reserve_allocation_with_pressure(
            &guard_key,
            size_bytes,
            context,
            system_pressure,
        );

        if !admitted {
            let undone = victims.len();
            for victim in victims.into_iter().rev() {
                self.guard
                    .reinstate_allocation(&self.guard_key(&victim.key), victim.released);
                inner.current_bytes += victim.entry.size_bytes;
                inner.lru.put(victim.key.clone(), victim.entry);
                inner.lru.demote(&victim.key);
            }
            inner.counters.rejections += 1;
            let entries = inner.lru.len();
            drop(inner);
            tracing::warn!(
                target: "strata.cache",
                key = %key,
                size_bytes,
                reclaim,
                system_pressure,
                restored = undone,
                entries,
                "store rejected by memory guard"
            );
            return StoreOutcome {
                stored: None,
                evicted: Vec::new(),
            };
        }

        inner.next_generation += 1;
        let generation = inner.next_generation;
        let entry = AstCacheEntry {
            project_id: key.project_id.clone(),
            file_path: key.file_path.clone(),
            content_hash,
            version,
            language,
            payload,
            size_bytes,
            created_at: now,
            accessed_at: now,
            generation,
        };
        if let Some(prior) = inner.lru.put(key.clone(), entry) {
            inner.current_bytes -= prior.size_bytes;
        }
        inner.current_bytes += size_bytes;
        inner.counters.evictions += victims.len() as u64;
        drop(inner);

        let evicted: Vec<EvictedEntry> = victims
            .into_iter()
            .map(|victim| {
                tracing::debug!(
                    target: "strata.cache",
                    key = %victim.key,
                    reason = ?victim.reason,
                    size_bytes = victim.entry.size_bytes,
                    "evicted entry"
                );
                EvictedEntry {
                    generation: victim.entry.generation,
                    size_bytes: victim.entry.size_bytes,
                    key: victim.key,
                    reason: victim.reason,
                }
            })
            .collect();

        StoreOutcome {
            stored: Some(StoredEntry {
                generation,
                size_bytes,
                stored_at: now,
            }),
            evicted,
        }
    }

    /// Remove one file's entry, or every entry of a project when `file_path`
    /// is `None`.
    pub fn invalidate(&self, project_id: &str, file_path: Option<&str>) -> Vec<EvictedEntry> {
        let mut inner = self.inner.lock();
        let keys: Vec<CacheKey> = match file_path {
            Some(path) => {
                let key = CacheKey::new(project_id, path);
                if inner.lru.contains(&key) {
                    vec![key]
                } else {
                    Vec::new()
                }
            }
            None => inner
                .lru
                .iter()
                .map(|(key, _)| key)
                .filter(|key| key.matches(project_id, None))
                .cloned()
                .collect(),
        };

        keys.iter()
            .filter_map(|key| self.remove_locked(&mut inner, key, EvictionReason::Invalidated))
            .collect()
    }

    /// Apply new caps and TTL, evicting LRU entries until the new caps hold.
    /// Invalid values are rejected and the current configuration is kept.
    pub fn reconfigure(
        &self,
        max_entries: Option<usize>,
        max_bytes: Option<u64>,
        ttl_seconds: Option<u64>,
    ) -> Result<Vec<EvictedEntry>, CacheError> {
        let mut inner = self.inner.lock();
        let config = AstCacheConfig {
            max_entries: max_entries.unwrap_or(inner.config.max_entries),
            max_bytes: max_bytes.unwrap_or(inner.config.max_bytes),
            ttl_seconds: ttl_seconds.unwrap_or(inner.config.ttl_seconds),
        };
        config.validate()?;
        inner.config = config;

        let mut evicted = Vec::new();
        while inner.lru.len() > config.max_entries || inner.current_bytes > config.max_bytes {
            let Some((key, _)) = inner.lru.peek_lru() else {
                break;
            };
            let key = key.clone();
            if let Some(entry) = self.remove_locked(&mut inner, &key, EvictionReason::Reconfigured) {
                inner.counters.evictions += 1;
                evicted.push(entry);
            }
        }
        drop(inner);

        tracing::info!(
            target: "strata.cache",
            scope = %self.scope,
            max_entries = config.max_entries,
            max_bytes = config.max_bytes,
            ttl_seconds = config.ttl_seconds,
            evicted = evicted.len(),
            "ast cache reconfigured"
        );
        Ok(evicted)
    }

    /// Drop every entry whose TTL has elapsed.
    pub fn purge_expired(&self) -> Vec<EvictedEntry> {
        let now = self.clock.now_millis();
        let mut inner = self.inner.lock();
        let ttl_seconds = inner.config.ttl_seconds;
        let expired: Vec<CacheKey> = inner
            .lru
            .iter()
            .filter(|(_, entry)| is_expired(*entry, ttl_seconds, now))
            .map(|(key, _)| key.clone())
            .collect();

        let evicted: Vec<EvictedEntry> = expired
            .iter()
            .filter_map(|key| self.remove_locked(&mut inner, key, EvictionReason::Expired))
            .collect();
        inner.counters.expirations += evicted.len() as u64;
        evicted
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            entries: inner.lru.len(),
            bytes: inner.current_bytes,
            max_entries: inner.config.max_entries,
            max_bytes: inner.config.max_bytes,
            ttl_seconds: inner.config.ttl_seconds,
            hits: inner.counters.hits,
            misses: inner.counters.misses,
            evictions: inner.counters.evictions,
            expirations: inner.counters.expirations,
            rejections: inner.counters.rejections,
        }
    }

    /// Keys from least to most recently used.
    pub fn keys_lru_order(&self) -> Vec<CacheKey> {
        self.inner
            .lock()
            .lru
            .iter()
            .rev()
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Generation of every live entry.
    pub fn generations(&self) -> Vec<(CacheKey, u64)> {
        self.inner
            .lock()
            .lru
            .iter()
            .map(|(key, entry)| (key.clone(), entry.generation))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().lru.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn guard_key(&self, key: &CacheKey) -> String {
        format!("ast_cache:{}:{}:{}", self.scope, key.project_id, key.file_path)
    }

    /// Pop the least recently used entry other than `keep`, releasing its
    /// guard allocation.
    fn evict_lru_locked(
        &self,
        inner: &mut Inner<T>,
        keep: &CacheKey,
        reason: EvictionReason,
    ) -> Option<Victim<T>> {
        let key = inner
            .lru
            .iter()
            .rev()
            .map(|(key, _)| key)
            .find(|key| *key != keep)?
            .clone();
        let entry = inner.lru.pop(&key)?;
        inner.current_bytes -= entry.size_bytes;
        let released = self.guard.release_allocation(&self.guard_key(&key));
        Some(Victim {
            key,
            entry,
            released,
            reason,
        })
    }

    fn remove_locked(
        &self,
        inner: &mut Inner<T>,
        key: &CacheKey,
        reason: EvictionReason,
    ) -> Option<EvictedEntry> {
        let entry = inner.lru.pop(key)?;
        inner.current_bytes -= entry.size_bytes;
        self.guard.release_allocation(&self.guard_key(key));
        Some(EvictedEntry {
            key: key.clone(),
            generation: entry.generation,
            size_bytes: entry.size_bytes,
            reason,
        })
    }
}

impl<T> fmt::Debug for AstCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("AstCache")
            .field("scope", &self.scope)
            .field("config", &inner.config)
            .field("entries", &inner.lru.len())
            .field("bytes", &inner.current_bytes)
            .finish_non_exhaustive()
    }
}

fn is_expired<T>(entry: &AstCacheEntry<T>, ttl_seconds: u64, now: u64) -> bool {
    ttl_seconds > 0 && now.saturating_sub(entry.created_at) >= ttl_seconds.saturating_mul(1_000)
}
