//! Group hierarchy walking
//!
//! Turns a principal into its node in the group graph, yields the node's
//! immediate parents as principals, and keeps the visited set that stops the
//! search from looping on cyclic memberships.

use std::collections::HashSet;
use std::fmt;

use tracing::trace;

use crate::error::Result;
use crate::services::GroupStore;
use crate::types::{GroupMember, Principal};

/// Group members already expanded during one top-level query.
///
/// Must be created fresh for every external query and never shared between
/// concurrent queries.
#[derive(Debug, Default)]
pub struct SeenGroups {
    members: HashSet<GroupMember>,
}

impl SeenGroups {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            members: HashSet::with_capacity(capacity),
        }
    }

    pub fn contains(&self, member: &GroupMember) -> bool {
        self.members.contains(member)
    }

    /// Returns false if the member was already present.
    pub fn insert(&mut self, member: GroupMember) -> bool {
        self.members.insert(member)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl fmt::Display for SeenGroups {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut members: Vec<&GroupMember> = self.members.iter().collect();
        members.sort();
        f.write_str("[")?;
        for (i, member) in members.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", member)?;
        }
        f.write_str("]")
    }
}

/// Walks the membership graph through a [`GroupStore`]
pub struct GroupWalker<'a, S: GroupStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: GroupStore + ?Sized> GroupWalker<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Marks `principal`'s group member as visited and returns it, or `None`
    /// if it was visited earlier in this query.
    pub fn enter(&self, principal: &Principal, seen: &mut SeenGroups) -> Result<Option<GroupMember>> {
        let member = self.store.group_member(principal)?;
        if seen.contains(&member) {
            trace!(
                principal = %principal,
                seen = %seen,
                "Declining to re-examine principal already among checked groups"
            );
            return Ok(None);
        }
        seen.insert(member.clone());
        Ok(Some(member))
    }

    /// Immediate containing groups of `member`.
    pub fn parents(&self, member: &GroupMember) -> Result<Vec<GroupMember>> {
        self.store.parent_groups(member)
    }

    /// Principal form of a parent group.
    pub fn as_principal(&self, parent: &GroupMember) -> Result<Principal> {
        self.store.new_principal(parent)
    }
}
