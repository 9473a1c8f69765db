//! Any-Unblocked-Grant Permission Policy
//!
//! A principal holds a permission when it, or a group reachable by walking up
//! the membership hierarchy, carries an explicit GRANT and no DENY interrupts
//! the path in between:
//!
//! ```text
//! alice (GRANT) -- small group -- bigger group -- huge group          => GRANT
//! alice -- small group -- bigger group (GRANT) -- huge group          => GRANT
//! alice -- small group (DENY) -- bigger group (GRANT) -- huge group   => DENY
//! alice -- small group (DENY) -- bigger group -- huge group
//! alice -- other group -- bigger other group (GRANT) -- huge group    => GRANT
//! ```
//!
//! Before the search two generalizations are tried: holders of
//! ALL_PERMISSIONS on the ALL target under the portal system owner are
//! granted everything, and a permission on a collective target (for example
//! ALL_PORTLETS) covers every target of that type.
//!
//! The policy never returns an error. Missing arguments and failures anywhere
//! in the resolution are logged and answered with `false`.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, trace, warn};

use crate::cache::DecisionCache;
use crate::config::{Config, PolicyConfig};
use crate::engine::GrantResolver;
use crate::error::{GrantWalkError, Result};
use crate::groups::SeenGroups;
use crate::metrics::PolicyMetrics;
use crate::services::*;
use crate::types::*;

pub struct AnyUnblockedGrantPolicy {
    definitions: Arc<dyn PermissionDefinitions>,
    targets: Arc<dyn TargetProviderRegistry>,
    cache: DecisionCache,
    metrics: Arc<PolicyMetrics>,
    config: PolicyConfig,
}

impl AnyUnblockedGrantPolicy {
    pub fn new(
        definitions: Arc<dyn PermissionDefinitions>,
        targets: Arc<dyn TargetProviderRegistry>,
        cache: DecisionCache,
        metrics: Arc<PolicyMetrics>,
        config: PolicyConfig,
    ) -> Self {
        Self {
            definitions,
            targets,
            cache,
            metrics,
            config,
        }
    }

    /// Builds the policy and its decision cache from configuration.
    pub fn from_config(
        config: &Config,
        definitions: Arc<dyn PermissionDefinitions>,
        targets: Arc<dyn TargetProviderRegistry>,
    ) -> Self {
        let metrics = Arc::new(PolicyMetrics::new());
        let cache = if config.cache.enabled {
            DecisionCache::with_ttl(
                Duration::from_secs(config.cache.ttl_seconds),
                config.cache.max_entries,
                metrics.clone(),
            )
        } else {
            DecisionCache::disabled(metrics.clone())
        };
        Self::new(definitions, targets, cache, metrics, config.policy.clone())
    }

    pub fn cache(&self) -> &DecisionCache {
        &self.cache
    }

    pub fn metrics(&self) -> &Arc<PolicyMetrics> {
        &self.metrics
    }

    /// Answers whether `principal` may perform `activity` on `target`.
    ///
    /// `None` stands for an absent argument. Service, principal, owner and
    /// activity are required; a missing one fails closed. A missing target is
    /// allowed and means the query has no target.
    pub fn does_principal_have_permission(
        &self,
        service: Option<&dyn AuthorizationService>,
        principal: Option<&Principal>,
        owner: Option<&PermissionOwner>,
        activity: Option<&PermissionActivity>,
        target: Option<&PermissionTarget>,
    ) -> bool {
        let (service, principal, owner, activity) = match (service, principal, owner, activity) {
            (Some(service), Some(principal), Some(owner), Some(activity)) => {
                (service, principal, owner, activity)
            }
            _ => {
                self.metrics.record_invalid_argument();
                error!(
                    service_present = service.is_some(),
                    principal = ?principal.map(|p| p.principal_string()),
                    owner = ?owner.map(|o| o.fname.as_str()),
                    activity = ?activity.map(|a| a.fname.as_str()),
                    target = ?target.map(|t| t.key.as_str()),
                    "Null argument to permission check; this indicates a bug in the \
                     authorization infrastructure, failing closed"
                );
                return false;
            }
        };

        let start = Instant::now();
        let granted = match self.evaluate(service, principal, owner, activity, target) {
            Ok(granted) => granted,
            Err(e) => {
                self.metrics.record_top_level_failure();
                error!(
                    principal = %principal,
                    owner = %owner.fname,
                    activity = %activity.fname,
                    target = target.map(|t| t.key.as_str()).unwrap_or(""),
                    error = %e,
                    "Error searching for unblocked path to grant, failing closed"
                );
                false
            }
        };
        self.metrics.record_decision(granted, start.elapsed());
        granted
    }

    /// Reference-typed form of [`Self::does_principal_have_permission`].
    pub fn has_permission(
        &self,
        service: &dyn AuthorizationService,
        principal: &Principal,
        owner: &PermissionOwner,
        activity: &PermissionActivity,
        target: Option<&PermissionTarget>,
    ) -> bool {
        self.does_principal_have_permission(
            Some(service),
            Some(principal),
            Some(owner),
            Some(activity),
            target,
        )
    }

    /// Evaluates the same permission against several targets.
    pub fn evaluate_batch(
        &self,
        service: &dyn AuthorizationService,
        principal: &Principal,
        owner: &PermissionOwner,
        activity: &PermissionActivity,
        targets: &[PermissionTarget],
    ) -> Vec<bool> {
        targets
            .iter()
            .map(|target| self.has_permission(service, principal, owner, activity, Some(target)))
            .collect()
    }

    /// Looks up owner, activity and target by name, then checks the permission.
    ///
    /// An owner or activity that is not defined fails closed. A target key the
    /// activity's provider does not know is checked as a plain target of type
    /// OTHER, so explicit records on it still apply.
    pub fn check_by_name(
        &self,
        service: &dyn AuthorizationService,
        principal: &Principal,
        owner_fname: &str,
        activity_fname: &str,
        target_key: Option<&str>,
    ) -> bool {
        match self.resolve_names(owner_fname, activity_fname, target_key) {
            Ok((owner, activity, target)) => {
                self.has_permission(service, principal, &owner, &activity, target.as_ref())
            }
            Err(e) => {
                self.metrics.record_top_level_failure();
                error!(
                    principal = %principal,
                    owner = owner_fname,
                    activity = activity_fname,
                    error = %e,
                    "Cannot resolve permission definitions, failing closed"
                );
                false
            }
        }
    }

    /// Resolves owner, activity and optional target from their names.
    pub fn resolve_names(
        &self,
        owner_fname: &str,
        activity_fname: &str,
        target_key: Option<&str>,
    ) -> Result<(PermissionOwner, PermissionActivity, Option<PermissionTarget>)> {
        let owner = self
            .definitions
            .resolve_owner(owner_fname)?
            .ok_or_else(|| GrantWalkError::UnknownOwner(owner_fname.to_string()))?;
        let activity = self
            .definitions
            .resolve_activity(owner_fname, activity_fname)?
            .ok_or_else(|| GrantWalkError::UnknownActivity {
                owner: owner_fname.to_string(),
                activity: activity_fname.to_string(),
            })?;
        let target = match target_key {
            Some(key) => Some(
                self.targets
                    .resolve_target(&activity.target_provider_key, key)?
                    .unwrap_or_else(|| {
                        debug!(target = key, "Unregistered target, checking as OTHER");
                        PermissionTarget::new(key, key, TargetType::Other)
                    }),
            ),
            None => None,
        };
        Ok((owner, activity, target))
    }

    /// Forces a fresh decision into the cache, restarting its time-to-live.
    ///
    /// Only the group search is evaluated; the super-user and collective
    /// generalizations are not applied. A failure is logged, leaves the
    /// cache untouched and answers `false`.
    pub fn load_in_cache(
        &self,
        service: &dyn AuthorizationService,
        principal: &Principal,
        owner: &PermissionOwner,
        activity: &PermissionActivity,
        target: Option<&PermissionTarget>,
    ) -> bool {
        let key = CacheKey::new(principal, owner, activity, target);
        let resolver = self.resolver(service);
        let mut seen = SeenGroups::with_capacity(self.config.seen_groups_capacity);

        let result = self.cache.force_refresh(key, || {
            resolver.has_unblocked_path_to_grant(principal, owner, activity, target, &mut seen)
        });
        match result {
            Ok(granted) => granted,
            Err(e) => {
                error!(
                    principal = %principal,
                    activity = %activity.fname,
                    error = %e,
                    "Failed to pre-warm permission decision"
                );
                false
            }
        }
    }

    fn resolver<'a>(&'a self, service: &'a dyn AuthorizationService) -> GrantResolver<'a> {
        GrantResolver::new(service, &self.cache, &self.metrics, self.config.max_traversal_depth)
    }

    fn evaluate(
        &self,
        service: &dyn AuthorizationService,
        principal: &Principal,
        owner: &PermissionOwner,
        activity: &PermissionActivity,
        target: Option<&PermissionTarget>,
    ) -> Result<bool> {
        if self.config.super_user_shortcut && self.is_super_user(service, principal, activity) {
            self.metrics.record_super_user_grant();
            trace!(principal = %principal, "Granted through ALL_PERMISSIONS");
            return Ok(true);
        }

        if self.config.collective_targets {
            if let Some(collective) = self.collective_target(activity, target) {
                if self.evaluate_contained(service, principal, owner, activity, Some(&collective)) {
                    self.metrics.record_collective_grant();
                    trace!(
                        principal = %principal,
                        collective = %collective.key,
                        "Granted through collective target"
                    );
                    return Ok(true);
                }
            }
        }

        let mut seen = SeenGroups::with_capacity(self.config.seen_groups_capacity);
        let granted = self.resolver(service).has_unblocked_path_to_grant_with_cache(
            principal, owner, activity, target, &mut seen,
        )?;

        let target_key = target.map(|t| t.key.as_str()).unwrap_or("");
        if granted {
            trace!(
                principal = %principal,
                activity = %activity.fname,
                target = target_key,
                owner = %owner.fname,
                "Principal granted: unblocked path to a GRANT"
            );
        } else {
            trace!(
                principal = %principal,
                activity = %activity.fname,
                target = target_key,
                owner = %owner.fname,
                "Principal denied: no unblocked path to a GRANT"
            );
        }
        Ok(granted)
    }

    /// Nested evaluation whose failure only costs this one generalization.
    fn evaluate_contained(
        &self,
        service: &dyn AuthorizationService,
        principal: &Principal,
        owner: &PermissionOwner,
        activity: &PermissionActivity,
        target: Option<&PermissionTarget>,
    ) -> bool {
        match self.evaluate(service, principal, owner, activity, target) {
            Ok(granted) => granted,
            Err(e) => {
                error!(
                    principal = %principal,
                    activity = %activity.fname,
                    target = target.map(|t| t.key.as_str()).unwrap_or(""),
                    error = %e,
                    "Error evaluating generalized permission"
                );
                false
            }
        }
    }

    fn is_super_user(
        &self,
        service: &dyn AuthorizationService,
        principal: &Principal,
        activity: &PermissionActivity,
    ) -> bool {
        let all_activity = match self
            .definitions
            .resolve_activity(PORTAL_SYSTEM, ALL_PERMISSIONS_ACTIVITY)
        {
            Ok(Some(all_activity)) => all_activity,
            Ok(None) => {
                warn!("ALL_PERMISSIONS activity is not defined, skipping super-user check");
                return false;
            }
            Err(e) => {
                warn!(error = %e, "Cannot resolve ALL_PERMISSIONS activity, skipping super-user check");
                return false;
            }
        };
        // Already evaluating ALL_PERMISSIONS; recursing would never end
        if *activity == all_activity {
            return false;
        }

        let all_owner = match self.definitions.resolve_owner(PORTAL_SYSTEM) {
            Ok(Some(owner)) => owner,
            Ok(None) => {
                warn!(owner = PORTAL_SYSTEM, "Portal system owner is not defined, skipping super-user check");
                return false;
            }
            Err(e) => {
                warn!(owner = PORTAL_SYSTEM, error = %e, "Cannot resolve portal system owner, skipping super-user check");
                return false;
            }
        };
        let all_target = match self
            .targets
            .resolve_target(&all_activity.target_provider_key, ALL_TARGET)
        {
            Ok(Some(target)) => target,
            Ok(None) => {
                warn!(
                    provider = %all_activity.target_provider_key,
                    "ALL target is not registered, skipping super-user check"
                );
                return false;
            }
            Err(e) => {
                warn!(
                    provider = %all_activity.target_provider_key,
                    error = %e,
                    "Cannot resolve ALL target, skipping super-user check"
                );
                return false;
            }
        };

        self.evaluate_contained(service, principal, &all_owner, &all_activity, Some(&all_target))
    }

    /// Collective sentinel covering `target`, unless `target` already is one.
    ///
    /// A sentinel that cannot be resolved only skips the generalization.
    fn collective_target(
        &self,
        activity: &PermissionActivity,
        target: Option<&PermissionTarget>,
    ) -> Option<PermissionTarget> {
        let target = target?;
        // Generalizing a collective to itself would never end
        if target.is_collective() {
            return None;
        }
        let collective_key = target.target_type.collective_target_key()?;

        match self
            .targets
            .resolve_target(&activity.target_provider_key, collective_key)
        {
            Ok(Some(collective)) => Some(collective),
            Ok(None) => {
                debug!(
                    provider = %activity.target_provider_key,
                    collective = collective_key,
                    "Collective target not registered"
                );
                None
            }
            Err(e) => {
                warn!(
                    provider = %activity.target_provider_key,
                    collective = collective_key,
                    error = %e,
                    "Cannot resolve collective target, skipping generalization"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{InMemoryDirectory, ALL_TARGETS_PROVIDER};

    const OWNER: &str = "UP_PORTLET_SUBSCRIBE";
    const ACT: &str = "SUBSCRIBE";
    const PROVIDER: &str = "portlets";

    fn setup() -> (Arc<InMemoryDirectory>, AnyUnblockedGrantPolicy) {
        let directory = Arc::new(InMemoryDirectory::with_portal_defaults());
        directory.add_owner(PermissionOwner::new(OWNER, "Portlet Subscribe"));
        directory.add_activity(OWNER, PermissionActivity::new(ACT, "Subscribe", PROVIDER));
        directory.register_collective_targets(PROVIDER);
        directory.add_target(PROVIDER, PermissionTarget::new("P1", "Weather", TargetType::Portlet));

        let policy = AnyUnblockedGrantPolicy::from_config(
            &Config::default(),
            directory.clone(),
            directory.clone(),
        );
        (directory, policy)
    }

    fn owner() -> PermissionOwner {
        PermissionOwner::new(OWNER, "Portlet Subscribe")
    }

    fn activity() -> PermissionActivity {
        PermissionActivity::new(ACT, "Subscribe", PROVIDER)
    }

    fn portlet() -> PermissionTarget {
        PermissionTarget::new("P1", "Weather", TargetType::Portlet)
    }

    #[test]
    fn test_missing_arguments_fail_closed() {
        let (directory, policy) = setup();
        let alice = Principal::person("alice");
        directory.add_permission(Permission::grant(&alice, OWNER, ACT, "P1"));

        let service: &dyn AuthorizationService = &*directory;
        assert!(!policy.does_principal_have_permission(None, Some(&alice), Some(&owner()), Some(&activity()), Some(&portlet())));
        assert!(!policy.does_principal_have_permission(Some(service), None, Some(&owner()), Some(&activity()), Some(&portlet())));
        assert!(!policy.does_principal_have_permission(Some(service), Some(&alice), None, Some(&activity()), Some(&portlet())));
        assert!(!policy.does_principal_have_permission(Some(service), Some(&alice), Some(&owner()), None, Some(&portlet())));
        assert_eq!(policy.metrics().snapshot().invalid_argument_count, 4);

        assert!(policy.does_principal_have_permission(Some(service), Some(&alice), Some(&owner()), Some(&activity()), Some(&portlet())));
    }

    #[test]
    fn test_missing_target_is_tolerated() {
        let (directory, policy) = setup();
        let alice = Principal::person("alice");
        directory.add_permission(Permission::grant(&alice, OWNER, ACT, ""));

        assert!(policy.has_permission(&*directory, &alice, &owner(), &activity(), None));
    }

    #[test]
    fn test_super_user_is_granted_everything() {
        let (directory, policy) = setup();
        let admins = Principal::group("admins");
        let root = Principal::person("root");
        directory.add_membership(&root, "admins");
        directory.add_permission(Permission::grant(
            &admins,
            PORTAL_SYSTEM,
            ALL_PERMISSIONS_ACTIVITY,
            ALL_TARGET,
        ));

        assert!(policy.has_permission(&*directory, &root, &owner(), &activity(), Some(&portlet())));
        assert!(policy.metrics().snapshot().super_user_grants >= 1);
    }

    #[test]
    fn test_super_user_check_does_not_recurse_on_itself() {
        let (directory, policy) = setup();
        let root = Principal::person("root");
        let all_owner = PermissionOwner::new(PORTAL_SYSTEM, "Portal System");
        let all_activity =
            PermissionActivity::new(ALL_PERMISSIONS_ACTIVITY, "All Permissions", ALL_TARGETS_PROVIDER);
        let all_target = PermissionTarget::new(ALL_TARGET, "All", TargetType::Other);

        assert!(!policy.has_permission(&*directory, &root, &all_owner, &all_activity, Some(&all_target)));
        directory.add_permission(Permission::grant(&root, PORTAL_SYSTEM, ALL_PERMISSIONS_ACTIVITY, ALL_TARGET));
        policy.cache().clear();
        assert!(policy.has_permission(&*directory, &root, &all_owner, &all_activity, Some(&all_target)));
    }

    #[test]
    fn test_collective_target_grants_concrete_target() {
        let (directory, policy) = setup();
        let alice = Principal::person("alice");
        directory.add_permission(Permission::grant(&alice, OWNER, ACT, ALL_PORTLETS_TARGET));

        assert!(policy.has_permission(&*directory, &alice, &owner(), &activity(), Some(&portlet())));
        assert_eq!(policy.metrics().snapshot().collective_grants, 1);
    }

    #[test]
    fn test_collective_generalization_can_be_disabled() {
        let directory = Arc::new(InMemoryDirectory::with_portal_defaults());
        directory.add_owner(owner());
        directory.add_activity(OWNER, activity());
        directory.register_collective_targets(PROVIDER);
        let alice = Principal::person("alice");
        directory.add_permission(Permission::grant(&alice, OWNER, ACT, ALL_PORTLETS_TARGET));

        let mut config = Config::default();
        config.policy.collective_targets = false;
        let policy = AnyUnblockedGrantPolicy::from_config(&config, directory.clone(), directory.clone());

        assert!(!policy.has_permission(&*directory, &alice, &owner(), &activity(), Some(&portlet())));
    }

    #[test]
    fn test_top_level_failure_fails_closed() {
        let (directory, policy) = setup();
        let alice = Principal::person("alice");
        directory.add_permission(Permission::grant(&alice, OWNER, ACT, "P1"));
        directory.fail_principal(&alice);

        assert!(!policy.has_permission(&*directory, &alice, &owner(), &activity(), Some(&portlet())));
        assert_eq!(policy.metrics().snapshot().top_level_failure_count, 1);
    }

    #[test]
    fn test_check_by_name() {
        let (directory, policy) = setup();
        let alice = Principal::person("alice");
        directory.add_permission(Permission::grant(&alice, OWNER, ACT, "P1"));
        directory.add_permission(Permission::grant(&alice, OWNER, ACT, "unregistered"));

        assert!(policy.check_by_name(&*directory, &alice, OWNER, ACT, Some("P1")));
        assert!(policy.check_by_name(&*directory, &alice, OWNER, ACT, Some("unregistered")));
        assert!(!policy.check_by_name(&*directory, &alice, OWNER, "NOPE", Some("P1")));
        assert!(!policy.check_by_name(&*directory, &alice, "NOPE", ACT, Some("P1")));
    }

    #[test]
    fn test_load_in_cache_overwrites_stale_answer() {
        let (directory, policy) = setup();
        let alice = Principal::person("alice");

        assert!(!policy.has_permission(&*directory, &alice, &owner(), &activity(), Some(&portlet())));

        directory.add_permission(Permission::grant(&alice, OWNER, ACT, "P1"));
        // Still the cached answer
        assert!(!policy.has_permission(&*directory, &alice, &owner(), &activity(), Some(&portlet())));

        assert!(policy.load_in_cache(&*directory, &alice, &owner(), &activity(), Some(&portlet())));
        assert!(policy.has_permission(&*directory, &alice, &owner(), &activity(), Some(&portlet())));
    }

    #[test]
    fn test_evaluate_batch() {
        let (directory, policy) = setup();
        let alice = Principal::person("alice");
        directory.add_permission(Permission::grant(&alice, OWNER, ACT, "P1"));
        let targets = vec![
            portlet(),
            PermissionTarget::new("P2", "News", TargetType::Portlet),
        ];

        assert_eq!(
            policy.evaluate_batch(&*directory, &alice, &owner(), &activity(), &targets),
            vec![true, false]
        );
    }

    #[test]
    fn test_unregistered_provider_keeps_explicit_grant() {
        let directory = Arc::new(InMemoryDirectory::with_portal_defaults());
        directory.add_owner(owner());
        directory.add_activity(OWNER, activity());
        let policy = AnyUnblockedGrantPolicy::from_config(&Config::default(), directory.clone(), directory.clone());
        let alice = Principal::person("alice");
        directory.add_permission(Permission::grant(&alice, OWNER, ACT, "P1"));

        // No provider is registered under PROVIDER, so ALL_PORTLETS cannot be resolved
        assert!(policy.has_permission(&*directory, &alice, &owner(), &activity(), Some(&portlet())));
        assert!(!policy.has_permission(&*directory, &Principal::person("bob"), &owner(), &activity(), Some(&portlet())));
        assert_eq!(policy.metrics().snapshot().top_level_failure_count, 0);
    }

    #[test]
    fn test_unregistered_collective_target_is_skipped() {
        let directory = Arc::new(InMemoryDirectory::with_portal_defaults());
        directory.add_owner(owner());
        directory.add_activity(OWNER, activity());
        directory.add_target(PROVIDER, portlet());
        let policy = AnyUnblockedGrantPolicy::from_config(&Config::default(), directory.clone(), directory.clone());
        let alice = Principal::person("alice");
        let bob = Principal::person("bob");
        directory.add_permission(Permission::grant(&alice, OWNER, ACT, "P1"));
        directory.add_permission(Permission::grant(&bob, OWNER, ACT, ALL_PORTLETS_TARGET));

        assert!(policy.has_permission(&*directory, &alice, &owner(), &activity(), Some(&portlet())));
        assert!(!policy.has_permission(&*directory, &bob, &owner(), &activity(), Some(&portlet())));

        let snapshot = policy.metrics().snapshot();
        assert_eq!(snapshot.collective_grants, 0);
        assert_eq!(snapshot.top_level_failure_count, 0);
    }

    #[test]
    fn test_super_user_skipped_until_fully_defined() {
        let directory = Arc::new(InMemoryDirectory::new());
        directory.add_owner(owner());
        directory.add_activity(OWNER, activity());
        directory.register_collective_targets(PROVIDER);
        let policy = AnyUnblockedGrantPolicy::from_config(&Config::default(), directory.clone(), directory.clone());

        let alice = Principal::person("alice");
        let root = Principal::person("root");
        directory.add_permission(Permission::grant(&alice, OWNER, ACT, "P1"));
        directory.add_permission(Permission::grant(&root, PORTAL_SYSTEM, ALL_PERMISSIONS_ACTIVITY, ALL_TARGET));

        let check = |principal: &Principal| {
            policy.cache().clear();
            policy.has_permission(&*directory, principal, &owner(), &activity(), Some(&portlet()))
        };

        // Nothing defined
        assert!(check(&alice));
        assert!(!check(&root));

        // ALL_PERMISSIONS defined, portal system owner missing
        directory.add_activity(
            PORTAL_SYSTEM,
            PermissionActivity::new(ALL_PERMISSIONS_ACTIVITY, "All Permissions", ALL_TARGETS_PROVIDER),
        );
        assert!(check(&alice));
        assert!(!check(&root));

        // Owner defined, provider of the ALL target missing
        directory.add_owner(PermissionOwner::new(PORTAL_SYSTEM, "Portal System"));
        assert!(check(&alice));
        assert!(!check(&root));

        // Provider known, ALL target missing
        directory.add_target(ALL_TARGETS_PROVIDER, PermissionTarget::new("SOMETHING", "Something", TargetType::Other));
        assert!(check(&alice));
        assert!(!check(&root));

        directory.add_target(ALL_TARGETS_PROVIDER, PermissionTarget::new(ALL_TARGET, "All", TargetType::Other));
        assert!(check(&alice));
        assert!(check(&root));

        let snapshot = policy.metrics().snapshot();
        assert_eq!(snapshot.super_user_grants, 1);
        assert_eq!(snapshot.top_level_failure_count, 0);
    }

    #[test]
    fn test_collective_category_and_group_targets() {
        let (directory, policy) = setup();
        let category = PermissionTarget::new("C1", "News Category", TargetType::Category);
        let group_target = PermissionTarget::new("G1", "Staff", TargetType::Group);
        directory.add_target(PROVIDER, category.clone());
        directory.add_target(PROVIDER, group_target.clone());

        let alice = Principal::person("alice");
        let bob = Principal::person("bob");
        directory.add_membership(&bob, "editors");
        directory.add_permission(Permission::grant(&alice, OWNER, ACT, ALL_CATEGORIES_TARGET));
        directory.add_permission(Permission::grant(&Principal::group("editors"), OWNER, ACT, ALL_GROUPS_TARGET));

        assert!(policy.has_permission(&*directory, &alice, &owner(), &activity(), Some(&category)));
        assert!(!policy.has_permission(&*directory, &alice, &owner(), &activity(), Some(&group_target)));
        assert!(!policy.has_permission(&*directory, &alice, &owner(), &activity(), Some(&portlet())));

        assert!(policy.has_permission(&*directory, &bob, &owner(), &activity(), Some(&group_target)));
        assert!(!policy.has_permission(&*directory, &bob, &owner(), &activity(), Some(&category)));

        assert_eq!(policy.metrics().snapshot().collective_grants, 2);
    }
}
