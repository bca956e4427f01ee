//! OneDrive client
//!
//! Every drive operation is delegated to [`DriveOperations`] bound to the
//! signed-in user's drive; this type only adds account lookup and the
//! drive-specific defaults.

use async_trait::async_trait;
use core_graph::{
    DeltaSync, DriveClient, DriveOperations, DriveResource, GraphApi, GraphError, Result,
    SubscriptionClient,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::instrument;

/// Resource watched by OneDrive subscriptions unless overridden
pub const ONEDRIVE_SUBSCRIPTION_RESOURCE: &str = "/me/drive/root";

/// Microsoft OneDrive client
///
/// # Example
///
/// ```ignore
/// use core_graph::{DriveClient, ListOptions};
/// use provider_onedrive::OneDriveClient;
///
/// let onedrive = OneDriveClient::new(api);
/// let page = onedrive.get_files_from(None, &ListOptions::new()).await?;
/// ```
#[derive(Clone)]
pub struct OneDriveClient {
    api: Arc<GraphApi>,
    drive: DriveOperations,
}

impl OneDriveClient {
    pub fn new(api: Arc<GraphApi>) -> Self {
        let drive = DriveOperations::new(Arc::clone(&api), DriveResource::me());
        Self { api, drive }
    }

    pub fn api(&self) -> &Arc<GraphApi> {
        &self.api
    }

    /// Id of the signed-in user's drive
    #[instrument(skip(self))]
    pub async fn get_account_id(&self) -> Result<String> {
        let url = self.api.url(self.drive.resource().root());
        let drive: Value = self.api.get(&url).await?;

        drive
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| GraphError::malformed(&url, 200, drive.to_string(), "drive has no id"))
    }

    pub fn delta(&self) -> DeltaSync {
        self.drive.delta()
    }

    pub fn subscriptions(&self) -> SubscriptionClient {
        SubscriptionClient::new(Arc::clone(&self.api))
            .with_default_resource(ONEDRIVE_SUBSCRIPTION_RESOURCE)
    }
}

#[async_trait]
impl DriveClient for OneDriveClient {
    fn operations(&self) -> &DriveOperations {
        &self.drive
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
    use bytes::Bytes;
    use core_auth::CredentialPair;
    use core_graph::{ConflictBehavior, InviteRequest, ListOptions, UnshareTarget};
    use core_runtime::GraphConfig;
    use mockall::mock;
    use std::collections::HashMap;

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
        }
    }

    fn response(status: u16, body: &str) -> BridgeResult<HttpResponse> {
        Ok(HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from(body.to_string()),
        })
    }

    fn client(mock_http: MockHttpClient) -> OneDriveClient {
        let config = GraphConfig::builder()
            .http_client(Arc::new(mock_http))
            .build()
            .unwrap();
        OneDriveClient::new(Arc::new(GraphApi::new(
            config,
            CredentialPair::new("access", "refresh"),
        )))
    }

    #[tokio::test]
    async fn test_get_account_id() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .withf(|request| {
                request.method == HttpMethod::Get
                    && request.url == "https://graph.microsoft.com/v1.0/me/drive"
            })
            .times(1)
            .returning(|_| response(200, r#"{"id":"b!drive-1"}"#));

        let account = client(mock_http).get_account_id().await.unwrap();
        assert_eq!(account, "b!drive-1");
    }

    #[tokio::test]
    async fn test_get_account_id_without_id_is_malformed() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .times(1)
            .returning(|_| response(200, r#"{"driveType":"personal"}"#));

        let result = client(mock_http).get_account_id().await;
        assert!(matches!(result, Err(GraphError::Request { status: Some(200), .. })));
    }

    #[tokio::test]
    async fn test_get_files_from_root_with_cursor() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .withf(|request| {
                request.url
                    == "https://graph.microsoft.com/v1.0/me/drive/items/root/children?$top=2&$skiptoken=abc"
            })
            .times(1)
            .returning(|_| {
                response(
                    200,
                    r#"{
                        "value": [
                            { "id": "1", "name": "Documents", "folder": { "childCount": 3 } },
                            { "id": "2", "name": "notes.txt", "file": { "mimeType": "text/plain" } }
                        ],
                        "@odata.nextLink": "https://graph.microsoft.com/v1.0/me/drive/items/root/children?$top=2&$skiptoken=def"
                    }"#,
                )
            });

        let options = ListOptions::new().top(2).cursor("abc");
        let page = client(mock_http).get_files_from(None, &options).await.unwrap();

        assert_eq!(page.cursor.as_deref(), Some("def"));
        assert_eq!(page.items.len(), 2);
        assert!(page.items[0].is_folder);
        assert!(!page.items[1].is_folder);
    }

    #[tokio::test]
    async fn test_upload_content_sets_conflict_behavior() {
        let mut mock_http = MockHttpClient::new();
        mock_http
            .expect_execute()
            .withf(|request| {
                request.method == HttpMethod::Put
                    && request.url.ends_with(
                        "/me/drive/items/folder-1:/report.txt:/content?@microsoft.graph.conflictBehavior=replace",
                    )
                    && request.headers.get("Content-Type").map(String::as_str) == Some("text/plain")
            })
            .times(1)
            .returning(|_| response(201, r#"{"id":"new-file","name":"report.txt","file":{}}"#));

        let item = client(mock_http)
            .operations()
            .upload_content(
                Some("folder-1"),
                "report.txt",
                Bytes::from_static(b"hello"),
                "text/plain",
                ConflictBehavior::Replace,
            )
            .await
            .unwrap();

        assert_eq!(item.id, "new-file");
    }

    #[tokio::test]
    async fn test_share_then_unshare_by_email() {
        let mut mock_http = MockHttpClient::new();
        let mut seq = mockall::Sequence::new();
        mock_http
            .expect_execute()
            .withf(|request| request.url.ends_with("/me/drive/items/item1/invite"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                response(
                    200,
                    r#"{"value":[{"id":"perm-1","roles":["read"],"invitation":{"email":"a@b.com"}}]}"#,
                )
            });
        mock_http
            .expect_execute()
            .withf(|request| request.method == HttpMethod::Get)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                response(
                    200,
                    r#"{"value":[{"id":"perm-1","roles":["read"],"invitation":{"email":"a@b.com"}}]}"#,
                )
            });
        mock_http
            .expect_execute()
            .withf(|request| {
                request.method == HttpMethod::Delete
                    && request.url.ends_with("/me/drive/items/item1/permissions/perm-1")
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| response(204, ""));

        let onedrive = client(mock_http);
        let granted = onedrive
            .share_for_email("item1", &InviteRequest::new("a@b.com"))
            .await
            .unwrap();
        assert_eq!(granted[0].id, "perm-1");

        onedrive
            .unshare_from("item1", &UnshareTarget::Email("a@b.com".to_string()))
            .await
            .unwrap();
    }

    #[test]
    fn test_bound_endpoints() {
        let onedrive = client(MockHttpClient::new());

        assert_eq!(
            onedrive.delta().delta_url(),
            "https://graph.microsoft.com/v1.0/me/drive/root/delta"
        );
        assert_eq!(onedrive.subscriptions().default_resource(), "/me/drive/root");
    }
}
