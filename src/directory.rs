//! In-Memory Directory
//!
//! A self-contained implementation of every collaborator service: group
//! memberships, permission records, owner/activity definitions and target
//! providers, all held in memory. Used by the command-line tool (loaded from a
//! TOML fixture) and throughout the tests.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::debug;

use crate::error::{GrantWalkError, Result};
use crate::services::*;
use crate::types::*;

/// Provider key under which the universal [`ALL_TARGET`] is registered.
pub const ALL_TARGETS_PROVIDER: &str = "allTargetsProvider";

#[derive(Default)]
pub struct InMemoryDirectory {
    /// member -> groups that immediately contain it
    parents: RwLock<HashMap<GroupMember, BTreeSet<GroupMember>>>,
    permissions: RwLock<Vec<Permission>>,
    owners: RwLock<HashMap<String, PermissionOwner>>,
    activities: RwLock<HashMap<(String, String), PermissionActivity>>,
    /// provider key -> target key -> target
    targets: RwLock<HashMap<String, HashMap<String, PermissionTarget>>>,
    /// principal strings whose lookups fail
    failing: RwLock<HashSet<String>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory pre-populated with the portal system owner, the
    /// ALL_PERMISSIONS activity and the universal ALL target.
    pub fn with_portal_defaults() -> Self {
        let directory = Self::new();
        directory.add_owner(PermissionOwner::new(PORTAL_SYSTEM, "Portal System"));
        directory.add_activity(
            PORTAL_SYSTEM,
            PermissionActivity::new(
                ALL_PERMISSIONS_ACTIVITY,
                "All Permissions",
                ALL_TARGETS_PROVIDER,
            ),
        );
        directory.add_target(
            ALL_TARGETS_PROVIDER,
            PermissionTarget::new(ALL_TARGET, "All", TargetType::Other),
        );
        directory
    }

    pub fn from_fixture(fixture: DirectoryFixture) -> Result<Self> {
        let directory = if fixture.portal_defaults {
            Self::with_portal_defaults()
        } else {
            Self::new()
        };

        for owner in fixture.owners {
            directory.add_owner(PermissionOwner::new(owner.fname, owner.name));
        }
        for activity in fixture.activities {
            directory.add_activity(
                &activity.owner,
                PermissionActivity::new(activity.fname, activity.name, activity.target_provider_key),
            );
        }
        for target in fixture.targets {
            directory.add_target(
                &target.provider,
                PermissionTarget::new(target.key, target.name, target.target_type),
            );
        }
        for provider in fixture.collective_providers {
            directory.register_collective_targets(&provider);
        }
        for membership in fixture.memberships {
            let member: Principal = membership.member.parse()?;
            for group in &membership.groups {
                directory.add_membership(&member, group);
            }
        }
        for permission in fixture.permissions {
            // Validate the principal string early
            let _: Principal = permission.principal.parse()?;
            directory.add_permission(permission);
        }

        Ok(directory)
    }

    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let fixture: DirectoryFixture = toml::from_str(&content)?;
        Self::from_fixture(fixture)
    }

    pub fn add_owner(&self, owner: PermissionOwner) {
        self.owners.write().insert(owner.fname.clone(), owner);
    }

    pub fn add_activity(&self, owner_fname: &str, activity: PermissionActivity) {
        self.activities
            .write()
            .insert((owner_fname.to_string(), activity.fname.clone()), activity);
    }

    pub fn add_target(&self, provider_key: &str, target: PermissionTarget) {
        self.targets
            .write()
            .entry(provider_key.to_string())
            .or_default()
            .insert(target.key.clone(), target);
    }

    /// Registers ALL_PORTLETS, ALL_CATEGORIES and ALL_GROUPS with a provider.
    pub fn register_collective_targets(&self, provider_key: &str) {
        self.add_target(
            provider_key,
            PermissionTarget::new(ALL_PORTLETS_TARGET, "All Portlets", TargetType::Portlet),
        );
        self.add_target(
            provider_key,
            PermissionTarget::new(ALL_CATEGORIES_TARGET, "All Categories", TargetType::Category),
        );
        self.add_target(
            provider_key,
            PermissionTarget::new(ALL_GROUPS_TARGET, "All Groups", TargetType::Group),
        );
    }

    /// Makes `member` an immediate member of the group keyed `group_key`.
    pub fn add_membership(&self, member: &Principal, group_key: &str) {
        self.parents
            .write()
            .entry(GroupMember::new(member.kind, member.key.clone()))
            .or_default()
            .insert(GroupMember::new(PrincipalKind::Group, group_key));
    }

    pub fn add_permission(&self, permission: Permission) {
        self.permissions.write().push(permission);
    }

    pub fn clear_permissions(&self) {
        self.permissions.write().clear();
    }

    pub fn summary(&self) -> DirectorySummary {
        DirectorySummary {
            owners: self.owners.read().len(),
            activities: self.activities.read().len(),
            targets: self.targets.read().values().map(|targets| targets.len()).sum(),
            memberships: self.parents.read().values().map(|groups| groups.len()).sum(),
            permissions: self.permissions.read().len(),
        }
    }

    /// Every permission and group lookup for `principal` fails from now on.
    pub fn fail_principal(&self, principal: &Principal) {
        self.failing.write().insert(principal.principal_string());
    }

    pub fn fail_group(&self, group_key: &str) {
        self.fail_principal(&Principal::group(group_key));
    }

    fn check_failing(&self, principal_string: &str) -> Result<()> {
        if self.failing.read().contains(principal_string) {
            return Err(GrantWalkError::GroupStore(format!(
                "lookup failed for {}",
                principal_string
            )));
        }
        Ok(())
    }
}

impl PermissionStore for InMemoryDirectory {
    fn permissions_for_principal(
        &self,
        principal: &Principal,
        owner: &str,
        activity: &str,
        target: Option<&str>,
    ) -> Result<Vec<Permission>> {
        let principal_string = principal.principal_string();
        self.check_failing(&principal_string)
            .map_err(|e| GrantWalkError::PermissionStore(e.to_string()))?;

        let target = target.unwrap_or("");
        Ok(self
            .permissions
            .read()
            .iter()
            .filter(|p| {
                p.principal == principal_string
                    && p.owner == owner
                    && p.activity == activity
                    && p.target == target
            })
            .cloned()
            .collect())
    }
}

impl GroupStore for InMemoryDirectory {
    fn group_member(&self, principal: &Principal) -> Result<GroupMember> {
        Ok(GroupMember::new(principal.kind, principal.key.clone()))
    }

    fn new_principal(&self, member: &GroupMember) -> Result<Principal> {
        if !member.is_group() {
            return Err(GrantWalkError::InvalidArgument(format!(
                "{} is not a group",
                member
            )));
        }
        Ok(Principal::new(member.kind, member.key.clone()))
    }

    fn parent_groups(&self, member: &GroupMember) -> Result<Vec<GroupMember>> {
        self.check_failing(&format!("{}.{}", member.kind, member.key))?;
        let parents = self
            .parents
            .read()
            .get(member)
            .map(|groups| groups.iter().cloned().collect())
            .unwrap_or_default();
        Ok(parents)
    }
}

impl TargetProviderRegistry for InMemoryDirectory {
    fn resolve_target(
        &self,
        target_provider_key: &str,
        target_key: &str,
    ) -> Result<Option<PermissionTarget>> {
        let targets = self.targets.read();
        let provider = targets
            .get(target_provider_key)
            .ok_or_else(|| GrantWalkError::UnknownTargetProvider(target_provider_key.to_string()))?;
        let target = provider.get(target_key).cloned();
        if target.is_none() {
            debug!(provider = target_provider_key, target = target_key, "Target not registered");
        }
        Ok(target)
    }
}

impl PermissionDefinitions for InMemoryDirectory {
    fn resolve_owner(&self, owner_fname: &str) -> Result<Option<PermissionOwner>> {
        Ok(self.owners.read().get(owner_fname).cloned())
    }

    fn resolve_activity(
        &self,
        owner_fname: &str,
        activity_fname: &str,
    ) -> Result<Option<PermissionActivity>> {
        Ok(self
            .activities
            .read()
            .get(&(owner_fname.to_string(), activity_fname.to_string()))
            .cloned())
    }
}

/// Counts of what a directory holds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DirectorySummary {
    pub owners: usize,
    pub activities: usize,
    pub targets: usize,
    /// Member-to-group edges
    pub memberships: usize,
    pub permissions: usize,
}

/// TOML layout of a directory file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryFixture {
    /// Seed the portal system owner, ALL_PERMISSIONS activity and ALL target
    pub portal_defaults: bool,
    pub owners: Vec<OwnerFixture>,
    pub activities: Vec<ActivityFixture>,
    pub targets: Vec<TargetFixture>,
    /// Providers that get the ALL_PORTLETS / ALL_CATEGORIES / ALL_GROUPS targets
    pub collective_providers: Vec<String>,
    pub memberships: Vec<MembershipFixture>,
    pub permissions: Vec<Permission>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnerFixture {
    pub fname: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityFixture {
    pub owner: String,
    pub fname: String,
    pub name: String,
    pub target_provider_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetFixture {
    pub provider: String,
    pub key: String,
    pub name: String,
    pub target_type: TargetType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MembershipFixture {
    /// `<kind>.<key>`
    pub member: String,
    /// Keys of the groups that immediately contain the member
    pub groups: Vec<String>,
}
