//! SharePoint client

use async_trait::async_trait;
use core_graph::query::with_query;
use core_graph::{
    normalize_list, DeltaSync, DriveClient, DriveItem, DriveOperations, DriveResource, GraphApi,
    GraphError, Page, QueryOptions, Result, SubscriptionClient,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, instrument};

/// Site used when the caller does not name one
pub const DEFAULT_SITE_ID: &str = "root";

/// Site names hidden from [`SharepointClient::get_sites`]
pub const SYSTEM_SITES: &[&str] = &["appcatalog"];

pub const SHAREPOINT_SUBSCRIPTION_RESOURCE: &str = "/sites/root/drive/root";

/// Microsoft SharePoint client
///
/// The [`DriveClient`] methods act on the root site's default library; use
/// [`SharepointClient::site`] for any other site.
#[derive(Clone)]
pub struct SharepointClient {
    api: Arc<GraphApi>,
    root_site: DriveOperations,
}

impl SharepointClient {
    pub fn new(api: Arc<GraphApi>) -> Self {
        let root_site = DriveOperations::new(Arc::clone(&api), DriveResource::site(DEFAULT_SITE_ID));
        Self { api, root_site }
    }

    pub fn api(&self) -> &Arc<GraphApi> {
        &self.api
    }

    /// Drive operations on one site's default document library
    pub fn site(&self, site_id: Option<&str>) -> DriveOperations {
        match site_id {
            Some(site_id) if site_id != DEFAULT_SITE_ID => {
                DriveOperations::new(Arc::clone(&self.api), DriveResource::site(site_id))
            }
            _ => self.root_site.clone(),
        }
    }

    /// Profile of the signed-in user, limited to `fields` when any are given
    #[instrument(skip(self, fields))]
    pub async fn get_account_info<I, S>(&self, fields: I) -> Result<Value>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let query = QueryOptions::new().fields(fields);
        let url = with_query(&self.api.url("/me"), &query.encode());
        self.api.get(&url).await
    }

    pub async fn get_account_id(&self) -> Result<String> {
        let account = self.get_account_info(Vec::<String>::new()).await?;
        account
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                GraphError::malformed(
                    &self.api.url("/me"),
                    200,
                    account.to_string(),
                    "account has no id",
                )
            })
    }

    /// Sites visible to the user, without system sites
    #[instrument(skip(self))]
    pub async fn get_sites(&self) -> Result<Page<DriveItem>> {
        info!("Getting Sharepoint sites");

        let url = with_query(&self.api.url("/sites"), "search=");
        let mut response: Value = self.api.get(&url).await?;

        if let Some(sites) = response.get_mut("value").and_then(Value::as_array_mut) {
            sites.retain(|site| {
                !site
                    .get("name")
                    .and_then(Value::as_str)
                    .is_some_and(|name| SYSTEM_SITES.contains(&name))
            });
        }

        Ok(normalize_list(&response))
    }

    /// Revoke a known permission on a site item
    pub async fn remove_permission(
        &self,
        site_id: Option<&str>,
        item_id: &str,
        permission_id: &str,
    ) -> Result<()> {
        self.site(site_id).remove_permission(item_id, permission_id).await
    }

    pub fn delta(&self, site_id: Option<&str>) -> DeltaSync {
        self.site(site_id).delta()
    }

    pub fn subscriptions(&self) -> SubscriptionClient {
        SubscriptionClient::new(Arc::clone(&self.api))
            .with_default_resource(SHAREPOINT_SUBSCRIPTION_RESOURCE)
    }
}

#[async_trait]
impl DriveClient for SharepointClient {
    fn operations(&self) -> &DriveOperations {
        &self.root_site
    }
}
