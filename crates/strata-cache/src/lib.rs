//! In-memory parse-result caching for Strata.
//!
//! - [`AstCache`]: bounded LRU of opaque, content-validated payloads whose
//!   memory use is admission-controlled by a [`strata_memory::MemoryGuard`].
//! - [`KernelCacheManager`]: the façade most callers use. It pairs each cache
//!   entry with a [`KernelArtifact`] (parser name, AST digest, metadata) and
//!   keeps a bounded ring of [`KernelFailureRecord`]s for diagnostics.
//!
//! Payloads are any type implementing [`SizeEstimable`]; the cache never
//! inspects them beyond asking for their size.

mod ast_cache;
mod clock;
mod error;
mod fingerprint;
mod kernel;
mod size;

pub use ast_cache::{
    AstCache, AstCacheConfig, AstCacheEntry, CacheInsert, CacheKey, CacheStats, EvictedEntry,
    EvictionReason, Lookup, StoreOutcome, StoredEntry,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::CacheError;
pub use fingerprint::Fingerprint;
pub use kernel::{
    KernelArtifact, KernelCacheManager, KernelFailureRecord, KernelHit, KernelStats,
    KernelStoreRequest, DEFAULT_FAILURE_CAPACITY,
};
pub use size::SizeEstimable;
