//! Permission record filtering

use chrono::{DateTime, Utc};

use crate::types::{Permission, PermissionType};

/// Records active at `now`: already effective and not yet expired.
/// Empty input yields an empty result.
pub fn active_permissions(records: &[Permission], now: DateTime<Utc>) -> Vec<&Permission> {
    records.iter().filter(|p| p.is_active_at(now)).collect()
}

/// Whether an already-filtered set holds a record of the given type.
pub fn contains_type(active: &[&Permission], sought: PermissionType) -> bool {
    active.iter().any(|p| p.permission_type == sought)
}
