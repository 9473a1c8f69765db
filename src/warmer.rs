//! Cache warming and expiry sweeping
//!
//! Permission checks can be expensive; keeping hot tuples warm means the
//! request path hits the cache. The warmer re-evaluates a registered set of
//! tuples on an interval and forces the answers into the decision cache with
//! a fresh time-to-live. Resolution is blocking, so every pass runs on the
//! blocking pool.

use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::cache::DecisionCache;
use crate::config::Config;
use crate::policy::AnyUnblockedGrantPolicy;
use crate::services::AuthorizationService;
use crate::types::*;

/// One tuple kept warm
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarmTarget {
    pub principal: Principal,
    pub owner: PermissionOwner,
    pub activity: PermissionActivity,
    pub target: Option<PermissionTarget>,
}

impl WarmTarget {
    pub fn new(
        principal: Principal,
        owner: PermissionOwner,
        activity: PermissionActivity,
        target: Option<PermissionTarget>,
    ) -> Self {
        Self {
            principal,
            owner,
            activity,
            target,
        }
    }
}

/// Outcome of one warming pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WarmReport {
    pub refreshed: usize,
    pub granted: usize,
}

pub struct CacheWarmer {
    policy: Arc<AnyUnblockedGrantPolicy>,
    service: Arc<dyn AuthorizationService>,
    targets: RwLock<Vec<WarmTarget>>,
}

impl CacheWarmer {
    pub fn new(policy: Arc<AnyUnblockedGrantPolicy>, service: Arc<dyn AuthorizationService>) -> Self {
        Self {
            policy,
            service,
            targets: RwLock::new(Vec::new()),
        }
    }

    /// Adds a tuple; registering the same tuple twice is a no-op.
    pub fn register(&self, target: WarmTarget) {
        let mut targets = self.targets.write();
        if !targets.contains(&target) {
            targets.push(target);
        }
    }

    pub fn unregister(&self, target: &WarmTarget) -> bool {
        let mut targets = self.targets.write();
        let before = targets.len();
        targets.retain(|t| t != target);
        targets.len() != before
    }

    pub fn len(&self) -> usize {
        self.targets.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.read().is_empty()
    }

    /// Re-evaluates every registered tuple on the calling thread.
    pub fn refresh_now(&self) -> WarmReport {
        // Snapshot so registration is not blocked during a slow pass
        let targets = self.targets.read().clone();
        let mut report = WarmReport::default();

        for warm in &targets {
            let granted = self.policy.load_in_cache(
                self.service.as_ref(),
                &warm.principal,
                &warm.owner,
                &warm.activity,
                warm.target.as_ref(),
            );
            report.refreshed += 1;
            if granted {
                report.granted += 1;
            }
        }

        debug!(
            refreshed = report.refreshed,
            granted = report.granted,
            "Cache warming pass complete"
        );
        report
    }

    /// Runs [`Self::refresh_now`] every `interval` until the handle is aborted.
    pub fn spawn(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        info!(interval_ms = interval.as_millis() as u64, "Starting cache warmer");
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);

            loop {
                ticker.tick().await;

                let warmer = self.clone();
                if let Err(e) = tokio::task::spawn_blocking(move || warmer.refresh_now()).await {
                    error!(error = %e, "Cache warming pass panicked");
                }
            }
        })
    }
}

/// Periodically drops expired decisions from `cache`.
pub fn spawn_expiry_sweeper(cache: DecisionCache, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);

        loop {
            ticker.tick().await;

            let removed = cache.purge_expired();
            if removed > 0 {
                debug!(removed, "Purged expired decisions");
            }
        }
    })
}

/// Background tasks started from configuration
#[derive(Debug, Default)]
pub struct BackgroundTasks {
    pub sweeper: Option<JoinHandle<()>>,
    pub warmer: Option<JoinHandle<()>>,
}

impl BackgroundTasks {
    pub fn abort(&self) {
        if let Some(handle) = &self.sweeper {
            handle.abort();
        }
        if let Some(handle) = &self.warmer {
            handle.abort();
        }
    }
}

/// Starts the expiry sweeper when caching is enabled and the warmer when
/// `warmer.enabled` is set and one is supplied. Must be called inside a
/// tokio runtime.
pub fn spawn_background_tasks(
    config: &Config,
    policy: &AnyUnblockedGrantPolicy,
    warmer: Option<Arc<CacheWarmer>>,
) -> BackgroundTasks {
    let mut tasks = BackgroundTasks::default();

    if config.cache.enabled {
        tasks.sweeper = Some(spawn_expiry_sweeper(
            policy.cache().clone(),
            Duration::from_secs(config.cache.cleanup_interval_seconds),
        ));
    }

    match warmer {
        Some(warmer) if config.warmer.enabled => {
            tasks.warmer = Some(warmer.spawn(Duration::from_secs(config.warmer.interval_seconds)));
        }
        Some(_) => debug!("Cache warmer supplied but disabled in configuration"),
        None => {}
    }

    tasks
}
