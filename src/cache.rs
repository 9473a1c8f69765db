//! Decision Cache
//!
//! Memoizes resolution answers per (principal, owner, activity, target) tuple.
//! The only consistency boundary is the entry time-to-live: answers may be
//! stale for up to one TTL after the group graph or permission records change.
//!
//! Population is not locked. Two threads missing on the same key both compute
//! and both store; the last write wins, which is harmless because both computed
//! the same function of the collaborator state.

use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::error::Result;
use crate::metrics::PolicyMetrics;
use crate::types::CacheKey;

/// Storage behind the decision cache
pub trait DecisionStore: Send + Sync {
    /// Live (unexpired) answer for `key`.
    fn get(&self, key: &CacheKey) -> Option<bool>;

    /// Stores or overwrites `key`, restarting its time-to-live.
    fn put(&self, key: CacheKey, allowed: bool);

    fn remove(&self, key: &CacheKey) -> Option<bool>;

    /// Drops every entry whose principal string equals `principal`.
    fn invalidate_principal(&self, principal: &str) -> usize;

    /// Drops expired entries, returning how many were removed.
    fn purge_expired(&self) -> usize;

    fn clear(&self);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Cached answer with expiry bookkeeping
#[derive(Debug, Clone)]
pub struct DecisionEntry {
    pub allowed: bool,
    pub expires_at: Instant,
    pub hit_count: u64,
}

impl DecisionEntry {
    pub fn new(allowed: bool, ttl: Duration) -> Self {
        Self {
            allowed,
            expires_at: Instant::now() + ttl,
            hit_count: 0,
        }
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    pub fn record_hit(&mut self) {
        self.hit_count += 1;
    }
}

/// Concurrent in-memory store with per-entry expiry
pub struct TtlDecisionStore {
    entries: DashMap<CacheKey, DecisionEntry>,
    ttl: Duration,
    /// 0 means unbounded
    max_entries: usize,
    metrics: Arc<PolicyMetrics>,
}

impl TtlDecisionStore {
    pub fn new(ttl: Duration, max_entries: usize, metrics: Arc<PolicyMetrics>) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            max_entries,
            metrics,
        }
    }

    /// Entry snapshot including hit count, for diagnostics.
    pub fn entry(&self, key: &CacheKey) -> Option<DecisionEntry> {
        self.entries.get(key).map(|entry| entry.clone())
    }

    fn make_room(&self) {
        if self.max_entries == 0 || self.entries.len() < self.max_entries {
            return;
        }
        self.purge_expired();
        if self.entries.len() < self.max_entries {
            return;
        }
        // Iterator must be dropped before removing, it holds shard locks.
        let victim = self.entries.iter().next().map(|entry| entry.key().clone());
        if let Some(victim) = victim {
            debug!(key = %victim, "Evicting decision to stay within max_entries");
            self.entries.remove(&victim);
        }
    }
}

impl DecisionStore for TtlDecisionStore {
    fn get(&self, key: &CacheKey) -> Option<bool> {
        if let Some(mut entry) = self.entries.get_mut(key) {
            if !entry.is_expired() {
                entry.record_hit();
                return Some(entry.allowed);
            }
            // Release the shard lock before removing
            drop(entry);
            self.entries.remove(key);
            self.metrics.record_cache_expiry();
        }
        None
    }

    fn put(&self, key: CacheKey, allowed: bool) {
        if !self.entries.contains_key(&key) {
            self.make_room();
        }
        self.entries.insert(key, DecisionEntry::new(allowed, self.ttl));
    }

    fn remove(&self, key: &CacheKey) -> Option<bool> {
        self.entries.remove(key).map(|(_, entry)| entry.allowed)
    }

    fn invalidate_principal(&self, principal: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| key.principal != principal);
        before.saturating_sub(self.entries.len())
    }

    fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired());
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            self.metrics.record_cache_cleanup(removed);
        }
        removed
    }

    fn clear(&self) {
        self.entries.clear();
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Store that never retains anything; selected when caching is disabled
#[derive(Debug, Default)]
pub struct NoopDecisionStore;

impl DecisionStore for NoopDecisionStore {
    fn get(&self, _key: &CacheKey) -> Option<bool> {
        None
    }

    fn put(&self, _key: CacheKey, _allowed: bool) {}

    fn remove(&self, _key: &CacheKey) -> Option<bool> {
        None
    }

    fn invalidate_principal(&self, _principal: &str) -> usize {
        0
    }

    fn purge_expired(&self) -> usize {
        0
    }

    fn clear(&self) {}

    fn len(&self) -> usize {
        0
    }
}

/// Front of the decision cache used by the engine at every recursion level
#[derive(Clone)]
pub struct DecisionCache {
    store: Arc<dyn DecisionStore>,
    metrics: Arc<PolicyMetrics>,
}

impl DecisionCache {
    pub fn new(store: Arc<dyn DecisionStore>, metrics: Arc<PolicyMetrics>) -> Self {
        Self { store, metrics }
    }

    /// TTL-backed cache.
    pub fn with_ttl(ttl: Duration, max_entries: usize, metrics: Arc<PolicyMetrics>) -> Self {
        let store = Arc::new(TtlDecisionStore::new(ttl, max_entries, metrics.clone()));
        Self::new(store, metrics)
    }

    /// Cache that always recomputes.
    pub fn disabled(metrics: Arc<PolicyMetrics>) -> Self {
        Self::new(Arc::new(NoopDecisionStore), metrics)
    }

    pub fn get(&self, key: &CacheKey) -> Option<bool> {
        self.store.get(key)
    }

    pub fn put(&self, key: CacheKey, allowed: bool) {
        self.store.put(key, allowed);
    }

    /// Cached answer, or `compute`'s answer stored on a miss. Errors are not cached.
    pub fn get_or_compute<F>(&self, key: &CacheKey, compute: F) -> Result<bool>
    where
        F: FnOnce() -> Result<bool>,
    {
        if let Some(allowed) = self.store.get(key) {
            self.metrics.record_cache_hit();
            return Ok(allowed);
        }
        self.metrics.record_cache_miss();
        let allowed = compute()?;
        self.store.put(key.clone(), allowed);
        Ok(allowed)
    }

    /// Always recomputes and overwrites, restarting the time-to-live.
    pub fn force_refresh<F>(&self, key: CacheKey, compute: F) -> Result<bool>
    where
        F: FnOnce() -> Result<bool>,
    {
        let allowed = compute()?;
        debug!(key = %key, allowed, "Forcing decision into cache");
        self.store.put(key, allowed);
        self.metrics.record_cache_prewarm();
        Ok(allowed)
    }

    pub fn remove(&self, key: &CacheKey) -> Option<bool> {
        self.store.remove(key)
    }

    pub fn invalidate_principal(&self, principal: &str) -> usize {
        self.store.invalidate_principal(principal)
    }

    pub fn purge_expired(&self) -> usize {
        self.store.purge_expired()
    }

    pub fn clear(&self) {
        self.store.clear();
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let snapshot = self.metrics.snapshot();
        CacheStats {
            entries: self.store.len(),
            hits: snapshot.cache_hits,
            misses: snapshot.cache_misses,
            hit_rate: snapshot.cache_hit_rate,
        }
    }
}

/// Point-in-time cache statistics
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GrantWalkError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn key(principal: &str, target: &str) -> CacheKey {
        CacheKey {
            principal: principal.to_string(),
            owner: "O".to_string(),
            activity: "ACT".to_string(),
            target: target.to_string(),
        }
    }

    fn ttl_cache(ttl: Duration, max_entries: usize) -> (DecisionCache, Arc<PolicyMetrics>) {
        let metrics = Arc::new(PolicyMetrics::new());
        (DecisionCache::with_ttl(ttl, max_entries, metrics.clone()), metrics)
    }

    #[test]
    fn test_get_or_compute_computes_once_per_ttl() {
        let (cache, metrics) = ttl_cache(Duration::from_secs(60), 0);
        let calls = AtomicUsize::new(0);
        let compute = || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(true)
        };

        assert!(cache.get_or_compute(&key("person.a", "T"), compute).unwrap());
        assert!(cache.get_or_compute(&key("person.a", "T"), compute).unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.cache_hits, 1);
        assert_eq!(snapshot.cache_misses, 1);
    }

    #[test]
    fn test_errors_are_not_cached() {
        let (cache, _) = ttl_cache(Duration::from_secs(60), 0);
        let result = cache.get_or_compute(&key("person.a", "T"), || {
            Err(GrantWalkError::PermissionStore("offline".to_string()))
        });
        assert!(result.is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_expired_entries_are_recomputed() {
        let (cache, metrics) = ttl_cache(Duration::from_millis(20), 0);
        cache.put(key("person.a", "T"), true);
        assert_eq!(cache.get(&key("person.a", "T")), Some(true));

        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(cache.get(&key("person.a", "T")), None);
        assert_eq!(metrics.snapshot().cache_expiries, 1);

        let answer = cache
            .get_or_compute(&key("person.a", "T"), || Ok(false))
            .unwrap();
        assert!(!answer);
    }

    #[test]
    fn test_force_refresh_overwrites_existing_answer() {
        let (cache, metrics) = ttl_cache(Duration::from_secs(60), 0);
        cache.put(key("person.a", "T"), false);

        assert!(cache.force_refresh(key("person.a", "T"), || Ok(true)).unwrap());
        assert_eq!(cache.get(&key("person.a", "T")), Some(true));
        assert_eq!(metrics.snapshot().cache_prewarms, 1);
    }

    #[test]
    fn test_purge_and_invalidate() {
        let metrics = Arc::new(PolicyMetrics::new());
        let store = TtlDecisionStore::new(Duration::from_millis(10), 0, metrics.clone());
        store.put(key("person.a", "T1"), true);
        store.put(key("person.a", "T2"), false);
        store.put(key("person.b", "T1"), true);

        assert_eq!(store.invalidate_principal("person.a"), 2);
        assert_eq!(store.len(), 1);

        std::thread::sleep(Duration::from_millis(25));
        assert_eq!(store.purge_expired(), 1);
        assert!(store.is_empty());
        assert_eq!(metrics.snapshot().cache_cleanups, 1);
    }

    #[test]
    fn test_max_entries_is_respected() {
        let metrics = Arc::new(PolicyMetrics::new());
        let store = TtlDecisionStore::new(Duration::from_secs(60), 3, metrics);
        for i in 0..10 {
            store.put(key(&format!("person.{}", i), "T"), true);
        }
        assert_eq!(store.len(), 3);

        // Overwriting an existing key never evicts
        let existing = store
            .entries
            .iter()
            .next()
            .map(|entry| entry.key().clone())
            .unwrap();
        store.put(existing.clone(), false);
        assert_eq!(store.len(), 3);
        assert_eq!(store.get(&existing), Some(false));
    }

    #[test]
    fn test_hit_count_tracked() {
        let metrics = Arc::new(PolicyMetrics::new());
        let store = TtlDecisionStore::new(Duration::from_secs(60), 0, metrics);
        store.put(key("person.a", "T"), true);
        store.get(&key("person.a", "T"));
        store.get(&key("person.a", "T"));
        assert_eq!(store.entry(&key("person.a", "T")).unwrap().hit_count, 2);
    }

    #[test]
    fn test_disabled_cache_always_computes() {
        let cache = DecisionCache::disabled(Arc::new(PolicyMetrics::new()));
        let calls = AtomicUsize::new(0);
        for _ in 0..3 {
            cache
                .get_or_compute(&key("person.a", "T"), || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(true)
                })
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_stats_reports_entries_and_hits() {
        let (cache, _metrics) = ttl_cache(Duration::from_secs(60), 0);
        cache.get_or_compute(&key("person.a", "T"), || Ok(false)).unwrap();
        cache.get_or_compute(&key("person.a", "T"), || Ok(false)).unwrap();

        let stats = cache.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate - 0.5).abs() < f64::EPSILON);
    }
}
