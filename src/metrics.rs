//! Policy Metrics Collection
//!
//! Lock-free counters for permission queries, decision cache behaviour and
//! contained failures.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Counters shared by the policy, the decision cache and the warmer
#[derive(Debug, Default)]
pub struct PolicyMetrics {
    // Query outcomes
    grant_count: AtomicU64,
    deny_count: AtomicU64,
    query_latency_sum_nanos: AtomicU64,
    query_latency_count: AtomicU64,

    // Contained failures
    invalid_argument_count: AtomicU64,
    branch_failure_count: AtomicU64,
    top_level_failure_count: AtomicU64,

    // Shortcuts
    super_user_grants: AtomicU64,
    collective_grants: AtomicU64,

    // Decision cache
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    cache_expiries: AtomicU64,
    cache_cleanups: AtomicU64,
    cache_prewarms: AtomicU64,

    // Graph traversal
    nodes_evaluated: AtomicU64,
    cycle_guard_hits: AtomicU64,
}

impl PolicyMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    // Query metrics

    pub fn record_decision(&self, granted: bool, latency: Duration) {
        if granted {
            self.grant_count.fetch_add(1, Ordering::Relaxed);
        } else {
            self.deny_count.fetch_add(1, Ordering::Relaxed);
        }
        self.query_latency_sum_nanos
            .fetch_add(latency.as_nanos() as u64, Ordering::Relaxed);
        self.query_latency_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_invalid_argument(&self) {
        self.invalid_argument_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_branch_failure(&self) {
        self.branch_failure_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_top_level_failure(&self) {
        self.top_level_failure_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_super_user_grant(&self) {
        self.super_user_grants.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_collective_grant(&self) {
        self.collective_grants.fetch_add(1, Ordering::Relaxed);
    }

    // Cache metrics

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_expiry(&self) {
        self.cache_expiries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_cleanup(&self, cleaned_count: usize) {
        self.cache_cleanups
            .fetch_add(cleaned_count as u64, Ordering::Relaxed);
    }

    pub fn record_cache_prewarm(&self) {
        self.cache_prewarms.fetch_add(1, Ordering::Relaxed);
    }

    // Traversal metrics

    pub fn record_node_evaluated(&self) {
        self.nodes_evaluated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cycle_guard_hit(&self) {
        self.cycle_guard_hits.fetch_add(1, Ordering::Relaxed);
    }

    // Computed metrics

    pub fn cache_hit_rate(&self) -> f64 {
        let hits = self.cache_hits.load(Ordering::Relaxed);
        let misses = self.cache_misses.load(Ordering::Relaxed);
        let total = hits + misses;

        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    pub fn average_query_latency_nanos(&self) -> f64 {
        let sum = self.query_latency_sum_nanos.load(Ordering::Relaxed);
        let count = self.query_latency_count.load(Ordering::Relaxed);

        if count == 0 {
            0.0
        } else {
            sum as f64 / count as f64
        }
    }

    pub fn snapshot(&self) -> PolicyMetricsSnapshot {
        PolicyMetricsSnapshot {
            grant_count: self.grant_count.load(Ordering::Relaxed),
            deny_count: self.deny_count.load(Ordering::Relaxed),
            avg_query_latency_nanos: self.average_query_latency_nanos(),
            invalid_argument_count: self.invalid_argument_count.load(Ordering::Relaxed),
            branch_failure_count: self.branch_failure_count.load(Ordering::Relaxed),
            top_level_failure_count: self.top_level_failure_count.load(Ordering::Relaxed),
            super_user_grants: self.super_user_grants.load(Ordering::Relaxed),
            collective_grants: self.collective_grants.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            cache_hit_rate: self.cache_hit_rate(),
            cache_expiries: self.cache_expiries.load(Ordering::Relaxed),
            cache_cleanups: self.cache_cleanups.load(Ordering::Relaxed),
            cache_prewarms: self.cache_prewarms.load(Ordering::Relaxed),
            nodes_evaluated: self.nodes_evaluated.load(Ordering::Relaxed),
            cycle_guard_hits: self.cycle_guard_hits.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`PolicyMetrics`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicyMetricsSnapshot {
    pub grant_count: u64,
    pub deny_count: u64,
    pub avg_query_latency_nanos: f64,
    pub invalid_argument_count: u64,
    pub branch_failure_count: u64,
    pub top_level_failure_count: u64,
    pub super_user_grants: u64,
    pub collective_grants: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_hit_rate: f64,
    pub cache_expiries: u64,
    pub cache_cleanups: u64,
    pub cache_prewarms: u64,
    pub nodes_evaluated: u64,
    pub cycle_guard_hits: u64,
}
