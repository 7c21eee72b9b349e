use std::sync::Arc;

use reqwest::Method;
use revere_core::error::Result;
use revere_core::organization::{MembershipRow, OrganizationBackend, OrganizationRow};
use serde::de::DeserializeOwned;

use super::error::{from_reqwest, rows_error};
use super::{REST_PATH, SupabaseAuthClient, SupabaseHttp};

const MEMBERSHIP_COLUMNS: &str = "org_id,role,is_active";
const ORGANIZATION_COLUMNS: &str = "id,name,slug,is_demo";

/// Row queries against `/rest/v1`, authorized as the signed-in user.
pub struct SupabaseRestClient {
    http: SupabaseHttp,
    auth: Arc<SupabaseAuthClient>,
}

impl SupabaseRestClient {
    pub fn new(http: SupabaseHttp, auth: Arc<SupabaseAuthClient>) -> Self {
        Self { http, auth }
    }

    async fn select<T: DeserializeOwned>(&self, table: &str, query: &[(&str, String)]) -> Result<Vec<T>> {
        let token = self.auth.access_token().await;
        let response = self
            .http
            .request(Method::GET, &format!("{}/{}", REST_PATH, table), token.as_deref())
            .query(query)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let err = rows_error(status, &text);
            tracing::debug!(table, status = status.as_u16(), kind = err.kind(), "[Rest] Query rejected");
            return Err(err);
        }

        response.json::<Vec<T>>().await.map_err(from_reqwest)
    }
}

#[async_trait::async_trait]
impl OrganizationBackend for SupabaseRestClient {
    async fn query_memberships(&self, user_id: &str) -> Result<Vec<MembershipRow>> {
        self.select(
            "org_members",
            &[
                ("select", MEMBERSHIP_COLUMNS.to_string()),
                ("user_id", format!("eq.{}", user_id)),
                ("is_active", "eq.true".to_string()),
            ],
        )
        .await
    }

    async fn query_orgs_by_ids(&self, ids: &[String]) -> Result<Vec<OrganizationRow>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.select(
            "organizations",
            &[
                ("select", ORGANIZATION_COLUMNS.to_string()),
                ("id", format!("in.({})", ids.join(","))),
            ],
        )
        .await
    }

    async fn query_org_by_slug(&self, slug: &str) -> Result<Option<OrganizationRow>> {
        let rows: Vec<OrganizationRow> = self
            .select(
                "organizations",
                &[
                    ("select", ORGANIZATION_COLUMNS.to_string()),
                    ("slug", format!("eq.{}", slug)),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;
        Ok(rows.into_iter().next())
    }
}
