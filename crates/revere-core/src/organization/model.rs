//! Organization membership domain models.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Name shown for a membership whose organization record could not be loaded.
pub const UNKNOWN_ORG_NAME: &str = "Unknown Organization";

/// Slug used for a membership whose organization record could not be loaded.
pub const UNKNOWN_ORG_SLUG: &str = "unknown";

/// Role a user holds within one organization.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OrgRole {
    Admin,
    Manager,
    Staff,
    Viewer,
}

/// Row returned by the membership query (Step A).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipRow {
    pub org_id: String,
    pub role: OrgRole,
    pub is_active: bool,
}

/// Row returned by the organization query (Step B) and the slug lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationRow {
    pub id: String,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub is_demo: bool,
}

/// One relationship between the current identity and an organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgMembership {
    pub org_id: String,
    pub org_name: String,
    pub org_slug: String,
    pub is_demo: bool,
    pub role: OrgRole,
    pub is_active: bool,
}

impl OrgMembership {
    /// Joins a membership row with its organization record.
    ///
    /// A missing record still yields a membership, labelled with placeholder
    /// name and slug and never flagged as demo.
    pub fn from_rows(row: &MembershipRow, org: Option<&OrganizationRow>) -> Self {
        match org {
            Some(org) => Self {
                org_id: row.org_id.clone(),
                org_name: org.name.clone(),
                org_slug: org.slug.clone(),
                is_demo: org.is_demo,
                role: row.role,
                is_active: row.is_active,
            },
            None => Self {
                org_id: row.org_id.clone(),
                org_name: UNKNOWN_ORG_NAME.to_string(),
                org_slug: UNKNOWN_ORG_SLUG.to_string(),
                is_demo: false,
                role: row.role,
                is_active: row.is_active,
            },
        }
    }

    /// The single admin membership handed to the demo user.
    pub fn demo(org_id: impl Into<String>, org_name: impl Into<String>, org_slug: impl Into<String>) -> Self {
        Self {
            org_id: org_id.into(),
            org_name: org_name.into(),
            org_slug: org_slug.into(),
            is_demo: true,
            role: OrgRole::Admin,
            is_active: true,
        }
    }
}
