//! Active organization store trait.

use async_trait::async_trait;

use crate::error::Result;

/// Durable key-value entry holding the last selected organization id.
#[async_trait]
pub trait ActiveOrgStore: Send + Sync {
    async fn get_active_org(&self) -> Option<String>;

    async fn set_active_org(&self, org_id: String) -> Result<()>;

    async fn clear_active_org(&self) -> Result<()>;
}
