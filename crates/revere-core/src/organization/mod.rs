//! Organization domain module.
//!
//! # Module Structure
//!
//! - `model`: membership and organization rows, merged memberships, roles
//! - `id`: displayable vs. fetchable identifier classification
//! - `selection`: Step A/B merge and active org selection rules
//! - `backend`: the organization query collaborator trait

pub mod backend;
pub mod id;
pub mod model;
pub mod selection;

pub use backend::OrganizationBackend;
pub use id::{IdKind, is_displayable_id, is_fetchable_id};
pub use model::{MembershipRow, OrgMembership, OrgRole, OrganizationRow};
pub use selection::{distinct_org_ids, merge_memberships, select_active_org};
