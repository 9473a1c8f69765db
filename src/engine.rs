//! Grant Resolution Engine
//!
//! Searches the principal and all of its ancestors for an unblocked GRANT.
//! At every node, in order:
//!
//! 1. Active records attached to the node for this exact owner, activity and
//!    target are fetched. A DENY ends the search along this path with `false`;
//!    otherwise a GRANT ends it with `true`.
//! 2. With no explicit record, the node is marked visited (a node already
//!    visited during this query answers `false`) and each immediate parent
//!    group is evaluated through the decision cache. The first parent that
//!    answers `true` wins. A parent that fails is logged and skipped, so a
//!    broken part of the group graph cannot hide a grant reachable through
//!    an intact one.
//! 3. No parent path grants: `false`.
//!
//! The engine knows nothing about super-users or collective targets; those
//! generalizations are applied by [`crate::policy`].

use chrono::Utc;
use tracing::{error, trace};

use crate::cache::DecisionCache;
use crate::error::{GrantWalkError, Result};
use crate::filter::{active_permissions, contains_type};
use crate::groups::{GroupWalker, SeenGroups};
use crate::metrics::PolicyMetrics;
use crate::services::AuthorizationService;
use crate::types::*;

pub struct GrantResolver<'a> {
    service: &'a dyn AuthorizationService,
    cache: &'a DecisionCache,
    metrics: &'a PolicyMetrics,
    max_depth: usize,
}

impl<'a> GrantResolver<'a> {
    pub fn new(
        service: &'a dyn AuthorizationService,
        cache: &'a DecisionCache,
        metrics: &'a PolicyMetrics,
        max_depth: usize,
    ) -> Self {
        Self {
            service,
            cache,
            metrics,
            max_depth,
        }
    }

    /// Cached entry point, consulted at every level of the search.
    pub fn has_unblocked_path_to_grant_with_cache(
        &self,
        principal: &Principal,
        owner: &PermissionOwner,
        activity: &PermissionActivity,
        target: Option<&PermissionTarget>,
        seen: &mut SeenGroups,
    ) -> Result<bool> {
        self.resolve_cached(principal, owner, activity, target, seen, 0)
    }

    /// Uncached evaluation of the top node. Parents are still resolved through the cache.
    pub fn has_unblocked_path_to_grant(
        &self,
        principal: &Principal,
        owner: &PermissionOwner,
        activity: &PermissionActivity,
        target: Option<&PermissionTarget>,
        seen: &mut SeenGroups,
    ) -> Result<bool> {
        self.resolve(principal, owner, activity, target, seen, 0)
    }

    fn resolve_cached(
        &self,
        principal: &Principal,
        owner: &PermissionOwner,
        activity: &PermissionActivity,
        target: Option<&PermissionTarget>,
        seen: &mut SeenGroups,
        depth: usize,
    ) -> Result<bool> {
        let key = CacheKey::new(principal, owner, activity, target);
        self.cache.get_or_compute(&key, || {
            self.resolve(principal, owner, activity, target, seen, depth)
        })
    }

    fn resolve(
        &self,
        principal: &Principal,
        owner: &PermissionOwner,
        activity: &PermissionActivity,
        target: Option<&PermissionTarget>,
        seen: &mut SeenGroups,
        depth: usize,
    ) -> Result<bool> {
        let target_key = target.map(|t| t.key.as_str());
        trace!(
            principal = %principal,
            activity = %activity.fname,
            target = target_key.unwrap_or(""),
            depth,
            seen = %seen,
            "Searching for unblocked path to GRANT"
        );
        self.metrics.record_node_evaluated();

        // Explicit records attached to this node
        let records = self.service.permissions_for_principal(
            principal,
            &owner.fname,
            &activity.fname,
            target_key,
        )?;
        let active = active_permissions(&records, Utc::now());

        if contains_type(&active, PermissionType::Deny) {
            // DENY trumps both GRANT and inherited permissions
            trace!(principal = %principal, "Found DENY, path blocked");
            return Ok(false);
        }
        if contains_type(&active, PermissionType::Grant) {
            trace!(
                principal = %principal,
                active = ?active,
                "Found unblocked path to a GRANT"
            );
            return Ok(true);
        }

        // Ancestors
        if depth >= self.max_depth {
            return Err(GrantWalkError::TraversalDepthExceeded {
                principal: principal.principal_string(),
                max_depth: self.max_depth,
            });
        }

        let walker = GroupWalker::new(self.service);
        let member = match walker.enter(principal, seen)? {
            Some(member) => member,
            None => {
                self.metrics.record_cycle_guard_hit();
                return Ok(false);
            }
        };

        for parent in walker.parents(&member)? {
            let outcome = walker.as_principal(&parent).and_then(|parent_principal| {
                self.resolve_cached(&parent_principal, owner, activity, target, seen, depth + 1)
            });

            match outcome {
                Ok(true) => return Ok(true),
                Ok(false) => {}
                Err(e) => {
                    self.metrics.record_branch_failure();
                    error!(
                        parent = %parent,
                        principal = %principal,
                        error = %e,
                        "Error evaluating permissions of parent group"
                    );
                }
            }
        }

        Ok(false)
    }
}
