//! Permission data model
//!
//! Principals, permission owners, activities, targets and the individual
//! GRANT/DENY records attached to them, plus the structural cache key used by
//! the decision cache.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::GrantWalkError;

/// Owner under which the system-wide permissions are defined.
pub const PORTAL_SYSTEM: &str = "UP_SYSTEM";
/// Activity that, when granted on [`ALL_TARGET`], implies every other permission.
pub const ALL_PERMISSIONS_ACTIVITY: &str = "ALL_PERMISSIONS";
/// Universal target used together with [`ALL_PERMISSIONS_ACTIVITY`].
pub const ALL_TARGET: &str = "ALL";
pub const ALL_PORTLETS_TARGET: &str = "ALL_PORTLETS";
pub const ALL_CATEGORIES_TARGET: &str = "ALL_CATEGORIES";
pub const ALL_GROUPS_TARGET: &str = "ALL_GROUPS";

/// Kind of entity a principal or group member stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrincipalKind {
    Person,
    Group,
}

impl PrincipalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrincipalKind::Person => "person",
            PrincipalKind::Group => "group",
        }
    }
}

impl fmt::Display for PrincipalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrincipalKind {
    type Err = GrantWalkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "person" => Ok(PrincipalKind::Person),
            "group" => Ok(PrincipalKind::Group),
            other => Err(GrantWalkError::InvalidArgument(format!(
                "unknown principal kind '{}'",
                other
            ))),
        }
    }
}

/// Identity being evaluated for permission: a person or a group acting as a principal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    pub kind: PrincipalKind,
    pub key: String,
}

impl Principal {
    pub fn new(kind: PrincipalKind, key: impl Into<String>) -> Self {
        Self {
            kind,
            key: key.into(),
        }
    }

    pub fn person(key: impl Into<String>) -> Self {
        Self::new(PrincipalKind::Person, key)
    }

    pub fn group(key: impl Into<String>) -> Self {
        Self::new(PrincipalKind::Group, key)
    }

    /// Stable string form, `<kind>.<key>`, used in cache keys and logs.
    pub fn principal_string(&self) -> String {
        format!("{}.{}", self.kind, self.key)
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.kind, self.key)
    }
}

impl FromStr for Principal {
    type Err = GrantWalkError;

    /// Parses the `<kind>.<key>` form produced by [`Principal::principal_string`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, key) = s.split_once('.').ok_or_else(|| {
            GrantWalkError::InvalidArgument(format!("principal '{}' is not of the form kind.key", s))
        })?;
        if key.is_empty() {
            return Err(GrantWalkError::InvalidArgument(format!(
                "principal '{}' has an empty key",
                s
            )));
        }
        Ok(Principal::new(kind.parse()?, key))
    }
}

/// Node of the group-membership graph. Edges run from a member to the
/// groups that immediately contain it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupMember {
    pub kind: PrincipalKind,
    pub key: String,
}

impl GroupMember {
    pub fn new(kind: PrincipalKind, key: impl Into<String>) -> Self {
        Self {
            kind,
            key: key.into(),
        }
    }

    pub fn is_group(&self) -> bool {
        self.kind == PrincipalKind::Group
    }
}

impl fmt::Display for GroupMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.key)
    }
}

/// Namespace under which permissions are defined
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PermissionOwner {
    pub fname: String,
    pub name: String,
}

impl PermissionOwner {
    pub fn new(fname: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            fname: fname.into(),
            name: name.into(),
        }
    }
}

/// Action being authorized
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PermissionActivity {
    pub fname: String,
    pub name: String,
    /// Key of the target provider that materializes this activity's targets,
    /// including its collective targets.
    pub target_provider_key: String,
}

impl PermissionActivity {
    pub fn new(
        fname: impl Into<String>,
        name: impl Into<String>,
        target_provider_key: impl Into<String>,
    ) -> Self {
        Self {
            fname: fname.into(),
            name: name.into(),
            target_provider_key: target_provider_key.into(),
        }
    }
}

/// Closed set of target kinds the policy distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TargetType {
    Portlet,
    Category,
    Group,
    Other,
}

impl TargetType {
    /// Sentinel target meaning "every instance of this type", if one exists.
    pub fn collective_target_key(&self) -> Option<&'static str> {
        match self {
            TargetType::Portlet => Some(ALL_PORTLETS_TARGET),
            TargetType::Category => Some(ALL_CATEGORIES_TARGET),
            TargetType::Group => Some(ALL_GROUPS_TARGET),
            TargetType::Other => None,
        }
    }
}

/// Object an activity acts upon
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PermissionTarget {
    pub key: String,
    pub name: String,
    pub target_type: TargetType,
}

impl PermissionTarget {
    pub fn new(key: impl Into<String>, name: impl Into<String>, target_type: TargetType) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            target_type,
        }
    }

    pub fn is_collective(&self) -> bool {
        matches!(
            self.key.as_str(),
            ALL_PORTLETS_TARGET | ALL_CATEGORIES_TARGET | ALL_GROUPS_TARGET | ALL_TARGET
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PermissionType {
    Grant,
    Deny,
}

impl fmt::Display for PermissionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionType::Grant => f.write_str("GRANT"),
            PermissionType::Deny => f.write_str("DENY"),
        }
    }
}

/// Individual permission assignment record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    /// Principal string (`<kind>.<key>`) the record is attached to
    pub principal: String,
    pub owner: String,
    pub activity: String,
    pub target: String,
    #[serde(rename = "type")]
    pub permission_type: PermissionType,
    #[serde(default)]
    pub effective: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires: Option<DateTime<Utc>>,
}

impl Permission {
    pub fn new(
        principal: &Principal,
        owner: impl Into<String>,
        activity: impl Into<String>,
        target: impl Into<String>,
        permission_type: PermissionType,
    ) -> Self {
        Self {
            principal: principal.principal_string(),
            owner: owner.into(),
            activity: activity.into(),
            target: target.into(),
            permission_type,
            effective: None,
            expires: None,
        }
    }

    pub fn grant(
        principal: &Principal,
        owner: impl Into<String>,
        activity: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self::new(principal, owner, activity, target, PermissionType::Grant)
    }

    pub fn deny(
        principal: &Principal,
        owner: impl Into<String>,
        activity: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self::new(principal, owner, activity, target, PermissionType::Deny)
    }

    pub fn with_effective(mut self, effective: DateTime<Utc>) -> Self {
        self.effective = Some(effective);
        self
    }

    pub fn with_expires(mut self, expires: DateTime<Utc>) -> Self {
        self.expires = Some(expires);
        self
    }

    /// Active iff already effective (or no start) and not yet expired (or no end).
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.effective.map_or(true, |effective| effective <= now)
            && self.expires.map_or(true, |expires| expires > now)
    }
}

/// Cache key: one decision per (principal, owner, activity, target) tuple
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    pub principal: String,
    pub owner: String,
    pub activity: String,
    pub target: String,
}

impl CacheKey {
    pub fn new(
        principal: &Principal,
        owner: &PermissionOwner,
        activity: &PermissionActivity,
        target: Option<&PermissionTarget>,
    ) -> Self {
        Self {
            principal: principal.principal_string(),
            owner: owner.fname.clone(),
            activity: activity.fname.clone(),
            target: target.map(|t| t.key.clone()).unwrap_or_default(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[principal={}, owner={}, activity={}, target={}]",
            self.principal, self.owner, self.activity, self.target
        )
    }
}
