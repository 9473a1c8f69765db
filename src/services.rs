//! Collaborator services consumed by the resolution engine.
//!
//! The engine never owns persistence: permission records, the group graph and
//! the permission definitions all come from implementations of these traits.
//! All calls are blocking.

use crate::error::Result;
use crate::types::*;

/// Lookup of raw permission records attached to one principal
pub trait PermissionStore: Send + Sync {
    /// Records for exactly this (principal, owner, activity, target) scope.
    /// `target` is `None` when the query carries no target.
    fn permissions_for_principal(
        &self,
        principal: &Principal,
        owner: &str,
        activity: &str,
        target: Option<&str>,
    ) -> Result<Vec<Permission>>;
}

/// Conversion between principals and nodes of the group graph
pub trait GroupStore: Send + Sync {
    fn group_member(&self, principal: &Principal) -> Result<GroupMember>;

    fn new_principal(&self, member: &GroupMember) -> Result<Principal>;

    /// Groups that immediately contain `member`.
    fn parent_groups(&self, member: &GroupMember) -> Result<Vec<GroupMember>>;
}

/// Everything the engine needs from an authorization service
pub trait AuthorizationService: PermissionStore + GroupStore {}

impl<T: PermissionStore + GroupStore> AuthorizationService for T {}

/// Registry of target providers, used to materialize sentinel targets
pub trait TargetProviderRegistry: Send + Sync {
    /// `Ok(None)` when the provider exists but knows no such target.
    fn resolve_target(
        &self,
        target_provider_key: &str,
        target_key: &str,
    ) -> Result<Option<PermissionTarget>>;
}

/// Lookup of owner and activity definitions
pub trait PermissionDefinitions: Send + Sync {
    fn resolve_owner(&self, owner_fname: &str) -> Result<Option<PermissionOwner>>;

    fn resolve_activity(
        &self,
        owner_fname: &str,
        activity_fname: &str,
    ) -> Result<Option<PermissionActivity>>;
}
