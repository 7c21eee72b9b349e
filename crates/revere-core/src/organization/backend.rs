//! Organization backend trait.

use async_trait::async_trait;

use crate::error::Result;
use crate::organization::model::{MembershipRow, OrganizationRow};

/// Read-only collaborator interface to the organization tables.
#[async_trait]
pub trait OrganizationBackend: Send + Sync {
    /// Active membership rows of `user_id`, filtered server-side to
    /// `is_active = true`.
    async fn query_memberships(&self, user_id: &str) -> Result<Vec<MembershipRow>>;

    /// Organization records for the given ids. Unknown ids are simply absent.
    async fn query_orgs_by_ids(&self, ids: &[String]) -> Result<Vec<OrganizationRow>>;

    /// Looks up one organization by slug.
    async fn query_org_by_slug(&self, slug: &str) -> Result<Option<OrganizationRow>>;
}
