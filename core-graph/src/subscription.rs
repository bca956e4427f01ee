//! Webhook subscriptions

use std::sync::Arc;

use bridge_traits::time::Clock;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument};

use crate::api::GraphApi;
use crate::error::{GraphError, Result};

pub const DEFAULT_CHANGE_TYPE: &str = "updated";

/// Resource watched when none is given
pub const DEFAULT_RESOURCE: &str = "/me/drive/root";

/// Longest lifetime the service accepts for drive subscriptions
pub const MAX_EXPIRATION_DAYS: i64 = 30;

/// Subscription as sent to and returned by the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub change_type: String,
    pub notification_url: String,
    pub resource: String,
    pub expiration_date_time: DateTime<Utc>,
    #[serde(default)]
    pub client_state: Option<String>,
}

/// Builder for a new subscription
#[derive(Debug, Clone, Default)]
pub struct SubscriptionRequest {
    notification_url: Option<String>,
    change_type: Option<String>,
    resource: Option<String>,
    expiration: Option<DateTime<Utc>>,
    client_state: Option<String>,
}

impl SubscriptionRequest {
    pub fn builder() -> Self {
        Self::default()
    }

    pub fn notification_url(mut self, url: impl Into<String>) -> Self {
        self.notification_url = Some(url.into());
        self
    }

    pub fn change_type(mut self, change_type: impl Into<String>) -> Self {
        self.change_type = Some(change_type.into());
        self
    }

    pub fn resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn expiration(mut self, expiration: DateTime<Utc>) -> Self {
        self.expiration = Some(expiration);
        self
    }

    pub fn client_state(mut self, client_state: impl Into<String>) -> Self {
        self.client_state = Some(client_state.into());
        self
    }

    /// Resolve defaults against [`DEFAULT_RESOURCE`].
    ///
    /// # Errors
    ///
    /// [`GraphError::Validation`] when the notification URL is missing or blank.
    pub fn build(self, clock: &dyn Clock) -> Result<Subscription> {
        self.build_for(clock, DEFAULT_RESOURCE)
    }

    fn build_for(self, clock: &dyn Clock, default_resource: &str) -> Result<Subscription> {
        let notification_url = self
            .notification_url
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| {
                GraphError::Validation("A notification URL is required for a subscription".to_string())
            })?;

        Ok(Subscription {
            id: None,
            change_type: self
                .change_type
                .unwrap_or_else(|| DEFAULT_CHANGE_TYPE.to_string()),
            notification_url,
            resource: self
                .resource
                .unwrap_or_else(|| default_resource.to_string()),
            expiration_date_time: self
                .expiration
                .unwrap_or_else(|| clock.now() + Duration::days(MAX_EXPIRATION_DAYS)),
            client_state: Some(self.client_state.unwrap_or_default()),
        })
    }
}

/// Subscription CRUD
#[derive(Clone)]
pub struct SubscriptionClient {
    api: Arc<GraphApi>,
    default_resource: String,
}

impl SubscriptionClient {
    pub fn new(api: Arc<GraphApi>) -> Self {
        Self {
            api,
            default_resource: DEFAULT_RESOURCE.to_string(),
        }
    }

    pub fn with_default_resource(mut self, resource: impl Into<String>) -> Self {
        self.default_resource = resource.into();
        self
    }

    pub fn default_resource(&self) -> &str {
        &self.default_resource
    }

    /// Validation happens before any request is issued.
    #[instrument(skip_all)]
    pub async fn create(&self, request: SubscriptionRequest) -> Result<Subscription> {
        let payload = request.build_for(self.api.config().clock.as_ref(), &self.default_resource)?;
        let body = serde_json::to_value(&payload)
            .map_err(|e| GraphError::Validation(format!("Invalid subscription payload: {}", e)))?;

        let created: Subscription = self.api.post(&self.api.url("/subscriptions"), body).await?;
        info!(resource = %created.resource, "Created subscription");
        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn renew(&self, id: &str, expiration: DateTime<Utc>) -> Result<Subscription> {
        let url = self.api.url(&format!("/subscriptions/{}", id));
        self.api
            .patch(&url, json!({ "expirationDateTime": expiration }))
            .await
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> Result<()> {
        let url = self.api.url(&format!("/subscriptions/{}", id));
        self.api.delete(&url).await
    }
}
