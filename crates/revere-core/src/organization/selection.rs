//! Membership merging and active organization selection.

use std::collections::{HashMap, HashSet};

use crate::mode::OperatingMode;
use crate::organization::model::{MembershipRow, OrgMembership, OrganizationRow};

/// Distinct org ids of the membership rows, in first-seen order.
pub fn distinct_org_ids(rows: &[MembershipRow]) -> Vec<String> {
    let mut seen = HashSet::new();
    rows.iter()
        .filter(|row| seen.insert(row.org_id.as_str()))
        .map(|row| row.org_id.clone())
        .collect()
}

/// Left-joins membership rows with organization records by id.
///
/// Duplicate membership rows for the same org collapse to the first one, so
/// the result has exactly one entry per distinct org id.
pub fn merge_memberships(rows: &[MembershipRow], orgs: &[OrganizationRow]) -> Vec<OrgMembership> {
    let by_id: HashMap<&str, &OrganizationRow> =
        orgs.iter().map(|org| (org.id.as_str(), org)).collect();

    let mut seen = HashSet::new();
    rows.iter()
        .filter(|row| seen.insert(row.org_id.as_str()))
        .map(|row| OrgMembership::from_rows(row, by_id.get(row.org_id.as_str()).copied()))
        .collect()
}

/// Picks the active organization after a fresh membership load.
///
/// 1. A persisted id that is present in `memberships` wins verbatim.
/// 2. In live mode with several memberships, the first non-demo org.
/// 3. Otherwise the first membership.
///
/// Returns `None` only when `memberships` is empty.
pub fn select_active_org(
    memberships: &[OrgMembership],
    persisted: Option<&str>,
    mode: OperatingMode,
) -> Option<String> {
    if let Some(persisted) = persisted
        && memberships.iter().any(|m| m.org_id == persisted)
    {
        return Some(persisted.to_string());
    }

    if mode.is_live()
        && memberships.len() > 1
        && let Some(real) = memberships.iter().find(|m| !m.is_demo)
    {
        return Some(real.org_id.clone());
    }

    memberships.first().map(|m| m.org_id.clone())
}
