use std::sync::Arc;
use std::time::Duration;
use strata_cache::{
    AstCache, AstCacheConfig, CacheError, CacheInsert, CacheKey, EvictionReason, Lookup,
    ManualClock,
};
use strata_memory::{GuardLimits, ManualSampler, MemoryGuard, MB};

fn guard() -> MemoryGuard {
    MemoryGuard::new(GuardLimits::from_mb(64, 128)).expect("valid limits")
}

fn cache_with(config: AstCacheConfig, guard: MemoryGuard) -> AstCache<String> {
    AstCache::new(config, guard).expect("valid config")
}

fn config(max_entries: usize, max_bytes: u64, ttl_seconds: u64) -> AstCacheConfig {
    AstCacheConfig {
        max_entries,
        max_bytes,
        ttl_seconds,
    }
}

fn insert(file: &str, size: u64) -> CacheInsert<String> {
    CacheInsert::new("proj", file, Arc::new(format!("ast of {file}")), format!("hash-{file}"))
        .version("v1")
        .language("python")
        .size_bytes(Some(size))
}

fn files(keys: &[CacheKey]) -> Vec<&str> {
    keys.iter().map(|key| key.file_path.as_str()).collect()
}

#[test]
fn inserting_past_capacity_evicts_least_recently_used() {
    let cache = cache_with(config(3, MB, 0), guard());
    for file in ["a", "b", "c"] {
        assert!(cache.store(insert(file, 10), None));
    }

    // Touch `a` so `b` becomes the oldest.
    assert!(cache.get("proj", "a", None, None).is_some());

    let outcome = cache.store_with_outcome(insert("d", 10), None);
    assert!(outcome.stored.is_some());
    assert_eq!(outcome.evicted.len(), 1);
    assert_eq!(outcome.evicted[0].key, CacheKey::new("proj", "b"));
    assert_eq!(outcome.evicted[0].reason, EvictionReason::Capacity);

    assert_eq!(files(&cache.keys_lru_order()), ["c", "a", "d"]);
    assert_eq!(cache.stats().evictions, 1);
}

#[test]
fn byte_cap_evicts_until_entry_fits() {
    let cache = cache_with(config(100, 400, 0), guard());
    for file in ["a", "b", "c", "d"] {
        assert!(cache.store(insert(file, 100), None));
    }
    assert_eq!(cache.stats().bytes, 400);

    assert!(cache.store(insert("e", 100), None));
    let stats = cache.stats();
    assert_eq!(stats.bytes, 400);
    assert_eq!(stats.entries, 4);
    assert!(!cache.contains("proj", "a"));
}

#[test]
fn byte_accounting_matches_live_entries_through_mixed_operations() {
    let guard = guard();
    let cache = cache_with(config(16, 2_000, 0), guard.clone());

    // Deterministic pseudo-random workload.
    let mut seed: u64 = 0x5eed;
    let mut next = move || {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        seed >> 33
    };

    for _ in 0..2_000 {
        let file = format!("f{}", next() % 40);
        match next() % 5 {
            0 => {
                cache.invalidate("proj", Some(&file));
            }
            1 => {
                cache.get("proj", &file, None, None);
            }
            _ => {
                cache.store(insert(&file, 1 + next() % 700), None);
            }
        }

        let stats = cache.stats();
        let live: u64 = cache
            .keys_lru_order()
            .iter()
            .filter_map(|key| cache.peek(&key.project_id, &key.file_path))
            .map(|entry| entry.size_bytes)
            .sum();
        assert_eq!(stats.bytes, live);
        assert!(stats.bytes <= stats.max_bytes);
        assert!(stats.entries <= stats.max_entries);
        assert_eq!(guard.get_stats().allocated_bytes, stats.bytes);
    }
}

#[test]
fn expired_entries_are_removed_on_lookup() {
    let clock = Arc::new(ManualClock::new(1_000));
    let cache = cache_with(config(10, MB, 1), guard()).with_clock(clock.clone());
    assert!(cache.store(insert("a", 10), None));

    clock.advance(Duration::from_millis(500));
    assert!(cache.get("proj", "a", None, None).is_some());

    clock.advance(Duration::from_secs(2));
    assert!(matches!(
        cache.lookup("proj", "a", None, None),
        Lookup::Expired(_)
    ));

    let stats = cache.stats();
    assert_eq!(stats.entries, 0);
    assert_eq!(stats.bytes, 0);
    assert_eq!(stats.expirations, 1);
    assert_eq!(cache.guard().get_stats().allocated_bytes, 0);
}

#[test]
fn hit_refreshes_accessed_at_but_not_created_at() {
    let clock = Arc::new(ManualClock::new(0));
    let cache = cache_with(config(10, MB, 0), guard()).with_clock(clock.clone());
    assert!(cache.store(insert("a", 10), None));

    clock.set(5_000);
    let entry = cache.get("proj", "a", None, None).expect("hit");
    assert_eq!(entry.created_at, 0);
    assert_eq!(entry.accessed_at, 5_000);
}

#[test]
fn purge_expired_sweeps_everything_past_ttl() {
    let clock = Arc::new(ManualClock::new(0));
    let cache = cache_with(config(10, MB, 10), guard()).with_clock(clock.clone());
    assert!(cache.store(insert("old", 10), None));
    clock.advance(Duration::from_secs(8));
    assert!(cache.store(insert("new", 10), None));
    clock.advance(Duration::from_secs(3));

    let purged = cache.purge_expired();
    assert_eq!(purged.len(), 1);
    assert_eq!(purged[0].key.file_path, "old");
    assert!(cache.contains("proj", "new"));
}

#[test]
fn guard_refusal_leaves_cache_untouched() {
    let guard = MemoryGuard::new(GuardLimits {
        soft_bytes: 1_000,
        hard_bytes: 1_000,
        pressure_threshold: 0.85,
    })
    .expect("valid limits");
    assert!(guard.reserve_allocation("external", 900, None));

    let cache = cache_with(config(10, MB, 0), guard.clone());
    assert!(cache.store(insert("a", 50), None));
    assert!(cache.store(insert("b", 40), None));
    assert!(cache.get("proj", "a", None, None).is_some());
    let before = cache.keys_lru_order();

    // Evicting both entries frees only 90 of the 190 bytes required.
    let outcome = cache.store_with_outcome(insert("c", 200), None);
    assert!(outcome.stored.is_none());
    assert!(outcome.evicted.is_empty());

    assert_eq!(cache.keys_lru_order(), before);
    let stats = cache.stats();
    assert_eq!(stats.bytes, 90);
    assert_eq!(stats.rejections, 1);
    assert_eq!(stats.evictions, 0);
    assert_eq!(guard.get_stats().allocated_bytes, 990);
}

#[test]
fn rejected_replacement_keeps_previous_entry() {
    let guard = MemoryGuard::new(GuardLimits {
        soft_bytes: 100,
        hard_bytes: 100,
        pressure_threshold: 0.85,
    })
    .expect("valid limits");
    let cache = cache_with(config(10, MB, 0), guard.clone());
    assert!(cache.store(insert("a", 60), None));

    assert!(!cache.store(insert("a", 150), None));
    let entry = cache.get("proj", "a", Some("hash-a"), None).expect("kept");
    assert_eq!(entry.size_bytes, 60);
    assert_eq!(guard.allocation(&format!("ast_cache:{}:proj:a", cache.scope())), Some(60));
}

#[test]
fn system_pressure_rejects_stores() {
    let sampler = Arc::new(ManualSampler::new(0.0));
    let guard = MemoryGuard::with_sampler(GuardLimits::from_mb(64, 128), sampler.clone())
        .expect("valid limits");
    let cache = cache_with(config(10, MB, 0), guard);
    assert!(cache.store(insert("a", 10), None));

    sampler.set(0.97);
    assert!(!cache.store(insert("b", 10), None));
    assert!(cache.contains("proj", "a"));
    assert_eq!(cache.stats().entries, 1);

    sampler.set(0.2);
    assert!(cache.store(insert("b", 10), None));
}

#[test]
fn reconfigure_shrinks_immediately_and_validates() {
    let cache = cache_with(config(10, MB, 0), guard());
    for file in ["a", "b", "c", "d", "e"] {
        assert!(cache.store(insert(file, 10), None));
    }

    let evicted = cache.reconfigure(Some(2), None, Some(60)).expect("valid");
    assert_eq!(evicted.len(), 3);
    assert!(evicted
        .iter()
        .all(|entry| entry.reason == EvictionReason::Reconfigured));
    assert_eq!(files(&cache.keys_lru_order()), ["d", "e"]);
    assert_eq!(cache.config(), config(2, MB, 60));

    let err = cache.reconfigure(Some(0), None, None).unwrap_err();
    assert!(matches!(
        err,
        CacheError::InvalidConfiguration {
            field: "max_entries",
            ..
        }
    ));
    assert_eq!(cache.config(), config(2, MB, 60));

    cache.reconfigure(None, Some(15), None).expect("valid");
    assert_eq!(cache.stats().entries, 1);
    assert_eq!(cache.stats().bytes, 10);
}

#[test]
fn invalidate_removes_file_or_whole_project() {
    let guard = guard();
    let cache = cache_with(config(10, MB, 0), guard.clone());
    assert!(cache.store(insert("a", 10), None));
    assert!(cache.store(insert("b", 10), None));
    assert!(cache.store(
        CacheInsert::new("other", "a", Arc::new(String::new()), "h").size_bytes(Some(10)),
        None
    ));

    assert_eq!(cache.invalidate("proj", Some("a")).len(), 1);
    assert!(cache.invalidate("proj", Some("missing")).is_empty());
    assert_eq!(cache.invalidate("proj", None).len(), 1);

    assert_eq!(cache.len(), 1);
    assert!(cache.contains("other", "a"));
    assert_eq!(guard.get_stats().allocated_bytes, 10);
}

#[test]
fn caches_sharing_a_guard_do_not_collide() {
    let guard = guard();
    let first = cache_with(config(10, MB, 0), guard.clone());
    let second = cache_with(config(10, MB, 0), guard.clone());

    assert!(first.store(insert("a", 10), None));
    assert!(second.store(insert("a", 20), None));
    assert_eq!(guard.get_stats().allocated_bytes, 30);

    first.invalidate("proj", None);
    assert_eq!(guard.get_stats().allocated_bytes, 20);
}

#[test]
fn payload_size_is_estimated_when_not_given() {
    let cache = cache_with(config(10, MB, 0), guard());
    let payload = Arc::new("x".repeat(4_096));
    assert!(cache.store(CacheInsert::new("proj", "big", payload, "h"), None));
    assert!(cache.stats().bytes >= 4_096);
}
