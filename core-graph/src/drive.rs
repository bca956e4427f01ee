//! Shared drive operations
//!
//! Both backends expose the same file, preview and sharing operations and
//! differ only in the drive root they address. [`DriveOperations`] implements
//! them once against a [`DriveResource`]; backend clients compose it and
//! expose it through the [`DriveClient`] trait.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bridge_traits::http::HttpMethod;
use bytes::Bytes;
use core_runtime::logging::redact_if_sensitive;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{info, instrument};

use crate::api::{GraphApi, RequestBody};
use crate::delta::DeltaSync;
use crate::error::{GraphError, Result};
use crate::normalize::{normalize_item, normalize_list, DriveItem, Page};
use crate::query::{with_query, ListOptions, QueryOptions};

const LOG_TARGET: &str = "core_graph::drive";

/// Conflict behavior annotation understood by create and upload calls
pub const CONFLICT_BEHAVIOR_PARAM: &str = "@microsoft.graph.conflictBehavior";

/// Folder id addressing the drive root
pub const ROOT_FOLDER_ID: &str = "root";

/// Resolution when an item with the same name already exists
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConflictBehavior {
    Fail,
    Replace,
    #[default]
    Rename,
}

impl ConflictBehavior {
    /// Unrecognized values fall back to [`ConflictBehavior::Rename`].
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "fail" => ConflictBehavior::Fail,
            "replace" => ConflictBehavior::Replace,
            _ => ConflictBehavior::Rename,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictBehavior::Fail => "fail",
            ConflictBehavior::Replace => "replace",
            ConflictBehavior::Rename => "rename",
        }
    }
}

impl fmt::Display for ConflictBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Root path of one drive, e.g. `/me/drive` or `/sites/{site}/drive`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriveResource {
    root: String,
}

impl DriveResource {
    pub fn new(root: impl Into<String>) -> Self {
        let root = root.into();
        Self {
            root: root.trim_end_matches('/').to_string(),
        }
    }

    /// The signed-in user's personal drive
    pub fn me() -> Self {
        Self::new("/me/drive")
    }

    /// Default document library of a site
    pub fn site(site_id: &str) -> Self {
        Self::new(format!("/sites/{}/drive", site_id))
    }

    pub fn drive(drive_id: &str) -> Self {
        Self::new(format!("/drives/{}", drive_id))
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn item_path(&self, item_id: &str) -> String {
        format!("{}/items/{}", self.root, item_id)
    }

    pub fn children_path(&self, parent_id: &str) -> String {
        format!("{}/children", self.item_path(parent_id))
    }

    pub fn permissions_path(&self, item_id: &str) -> String {
        format!("{}/permissions", self.item_path(item_id))
    }

    pub fn delta_path(&self) -> String {
        format!("{}/root/delta", self.root)
    }
}

/// One set of rendered thumbnails for an item
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThumbnailSet {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub small: Option<Thumbnail>,
    #[serde(default)]
    pub medium: Option<Thumbnail>,
    #[serde(default)]
    pub large: Option<Thumbnail>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thumbnail {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

/// Sharing link facet of a permission
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SharingLink {
    #[serde(rename = "type", default)]
    pub link_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub web_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invitation {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub sign_in_required: Option<bool>,
}

/// Permission entry on an item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Permission {
    pub id: String,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub link: Option<SharingLink>,
    #[serde(default)]
    pub invitation: Option<Invitation>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Permission {
    pub fn invitee_email(&self) -> Option<&str> {
        self.invitation.as_ref().and_then(|i| i.email.as_deref())
    }

    /// Link permission not tied to a specific invitee
    pub fn is_anonymous_link(&self) -> bool {
        self.link.is_some() && self.invitation.is_none()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LinkType {
    #[default]
    View,
    Edit,
    Embed,
}

impl LinkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkType::View => "view",
            LinkType::Edit => "edit",
            LinkType::Embed => "embed",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LinkScope {
    #[default]
    Anonymous,
    Organization,
}

impl LinkScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkScope::Anonymous => "anonymous",
            LinkScope::Organization => "organization",
        }
    }
}

/// Read-only invitation for a single recipient, sent without notifying them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InviteRequest {
    pub email: String,
    pub message: Option<String>,
    pub roles: Vec<String>,
}

impl InviteRequest {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            message: None,
            roles: vec!["read".to_string()],
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    fn to_body(&self) -> Value {
        let mut body = json!({
            "requireSignIn": true,
            "sendInvitation": false,
            "roles": self.roles,
            "recipients": [{ "email": self.email }],
        });
        if let Some(ref message) = self.message {
            body["message"] = json!(message);
        }
        body
    }
}

/// Which permission an unshare removes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnshareTarget {
    /// The invitation addressed to this email
    Email(String),
    /// The first link permission without an invitation
    AnonymousLink,
}

impl UnshareTarget {
    pub fn matches(&self, permission: &Permission) -> bool {
        match self {
            UnshareTarget::Email(email) => permission.invitee_email() == Some(email.as_str()),
            UnshareTarget::AnonymousLink => permission.is_anonymous_link(),
        }
    }

    fn describe(&self) -> String {
        match self {
            UnshareTarget::Email(email) => redact_if_sensitive("email", email),
            UnshareTarget::AnonymousLink => "anonymous link".to_string(),
        }
    }
}

#[derive(Deserialize)]
struct ValueList<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
}

/// File, preview and sharing operations over one drive
#[derive(Clone)]
pub struct DriveOperations {
    api: Arc<GraphApi>,
    resource: DriveResource,
}

impl fmt::Debug for DriveOperations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriveOperations")
            .field("resource", &self.resource)
            .finish_non_exhaustive()
    }
}

impl DriveOperations {
    pub fn new(api: Arc<GraphApi>, resource: DriveResource) -> Self {
        Self { api, resource }
    }

    pub fn resource(&self) -> &DriveResource {
        &self.resource
    }

    pub fn api(&self) -> &Arc<GraphApi> {
        &self.api
    }

    #[instrument(skip(self, query), fields(drive = %self.resource.root()))]
    pub async fn get_file_by_id(&self, item_id: &str, query: &QueryOptions) -> Result<DriveItem> {
        info!(item_id, "Getting drive item");
        let url = with_query(&self.api.url(&self.resource.item_path(item_id)), &query.encode());
        let raw: Value = self.api.get(&url).await?;
        Ok(normalize_item(&raw))
    }

    /// Browser URL of an item
    pub async fn get_public_url(&self, item_id: &str) -> Result<String> {
        let query = QueryOptions::new().fields(["name", "webUrl"]);
        let item = self.get_file_by_id(item_id, &query).await?;
        match item.web_url() {
            Some(web_url) => Ok(web_url.to_string()),
            None => Err(GraphError::malformed(
                &self.api.url(&self.resource.item_path(item_id)),
                200,
                String::new(),
                "item has no webUrl",
            )),
        }
    }

    /// Children of `parent_id`, or of the drive root when `None`
    #[instrument(skip(self, options), fields(drive = %self.resource.root()))]
    pub async fn get_files_from(
        &self,
        parent_id: Option<&str>,
        options: &ListOptions,
    ) -> Result<Page<DriveItem>> {
        let parent_id = parent_id.unwrap_or(ROOT_FOLDER_ID);
        info!(folder = parent_id, "Querying drive files");

        let url = with_query(
            &self.api.url(&self.resource.children_path(parent_id)),
            &options.encode(),
        );
        let raw: Value = self.api.get(&url).await?;
        Ok(normalize_list(&raw))
    }

    #[instrument(skip(self), fields(drive = %self.resource.root()))]
    pub async fn get_preview(&self, item_id: &str) -> Result<Vec<ThumbnailSet>> {
        let url = self
            .api
            .url(&format!("{}/thumbnails", self.resource.item_path(item_id)));
        let list: ValueList<ThumbnailSet> = self.api.get(&url).await?;
        Ok(list.value)
    }

    #[instrument(skip(self), fields(drive = %self.resource.root()))]
    pub async fn create_folder(
        &self,
        parent_id: Option<&str>,
        name: &str,
        conflict: ConflictBehavior,
    ) -> Result<DriveItem> {
        let parent_id = parent_id.unwrap_or(ROOT_FOLDER_ID);
        let url = self.api.url(&self.resource.children_path(parent_id));
        let body = json!({
            "name": name,
            "folder": {},
            CONFLICT_BEHAVIOR_PARAM: conflict.as_str(),
        });

        let raw: Value = self.api.post(&url, body).await?;
        Ok(normalize_item(&raw))
    }

    /// Simple upload of a small file under `parent_id`
    #[instrument(skip(self, data), fields(drive = %self.resource.root(), size = data.len()))]
    pub async fn upload_content(
        &self,
        parent_id: Option<&str>,
        name: &str,
        data: Bytes,
        content_type: &str,
        conflict: ConflictBehavior,
    ) -> Result<DriveItem> {
        let parent_id = parent_id.unwrap_or(ROOT_FOLDER_ID);
        let path = format!(
            "{}:/{}:/content",
            self.resource.item_path(parent_id),
            urlencoding::encode(name)
        );
        let url = with_query(
            &self.api.url(&path),
            &format!("{}={}", CONFLICT_BEHAVIOR_PARAM, conflict.as_str()),
        );

        let raw: Value = self
            .api
            .execute(
                HttpMethod::Put,
                &url,
                Some(RequestBody::Bytes {
                    content_type: content_type.to_string(),
                    data,
                }),
            )
            .await?;
        Ok(normalize_item(&raw))
    }

    /// Grant read access to one email recipient
    #[instrument(skip(self, invite), fields(drive = %self.resource.root()))]
    pub async fn share_for_email(
        &self,
        item_id: &str,
        invite: &InviteRequest,
    ) -> Result<Vec<Permission>> {
        let url = self
            .api
            .url(&format!("{}/invite", self.resource.item_path(item_id)));
        let granted: ValueList<Permission> = self.api.post(&url, invite.to_body()).await?;
        Ok(granted.value)
    }

    #[instrument(skip(self), fields(drive = %self.resource.root()))]
    pub async fn create_share_link(
        &self,
        item_id: &str,
        link_type: LinkType,
        scope: LinkScope,
    ) -> Result<SharingLink> {
        let url = self
            .api
            .url(&format!("{}/createLink", self.resource.item_path(item_id)));
        let body = json!({ "type": link_type.as_str(), "scope": scope.as_str() });

        let permission: Permission = self.api.post(&url, body).await?;
        permission
            .link
            .ok_or_else(|| GraphError::malformed(&url, 200, String::new(), "permission has no link"))
    }

    pub async fn list_permissions(&self, item_id: &str) -> Result<Vec<Permission>> {
        let url = self.api.url(&self.resource.permissions_path(item_id));
        let list: ValueList<Permission> = self.api.get(&url).await?;
        Ok(list.value)
    }

    /// Remove the first permission matching `target`.
    ///
    /// # Errors
    ///
    /// [`GraphError::PermissionNotFound`] when nothing matches; only the
    /// listing call has been made in that case.
    #[instrument(skip(self, target), fields(drive = %self.resource.root()))]
    pub async fn unshare_from(&self, item_id: &str, target: &UnshareTarget) -> Result<()> {
        let permissions = self.list_permissions(item_id).await?;

        let Some(permission) = permissions.iter().find(|p| target.matches(p)) else {
            let described = target.describe();
            self.api
                .logger()
                .error(
                    LOG_TARGET,
                    "Could not revoke permission from item",
                    &[("item_id", item_id.to_string()), ("target", described.clone())],
                )
                .await;
            return Err(GraphError::PermissionNotFound {
                item_id: item_id.to_string(),
                target: described,
            });
        };

        self.remove_permission(item_id, &permission.id).await
    }

    pub async fn remove_permission(&self, item_id: &str, permission_id: &str) -> Result<()> {
        let url = self.api.url(&format!(
            "{}/{}",
            self.resource.permissions_path(item_id),
            permission_id
        ));
        self.api.delete(&url).await
    }

    /// Change feed of this drive
    pub fn delta(&self) -> DeltaSync {
        DeltaSync::new(Arc::clone(&self.api), &self.resource.delta_path())
    }
}

/// Drive surface shared by every backend client.
///
/// Implementors only supply [`operations`](Self::operations); the calls are
/// delegated to the shared [`DriveOperations`].
#[async_trait]
pub trait DriveClient: Send + Sync {
    fn operations(&self) -> &DriveOperations;

    async fn get_file_by_id(&self, item_id: &str, query: &QueryOptions) -> Result<DriveItem> {
        self.operations().get_file_by_id(item_id, query).await
    }

    async fn get_public_url(&self, item_id: &str) -> Result<String> {
        self.operations().get_public_url(item_id).await
    }

    async fn get_files_from(
        &self,
        parent_id: Option<&str>,
        options: &ListOptions,
    ) -> Result<Page<DriveItem>> {
        self.operations().get_files_from(parent_id, options).await
    }

    async fn get_preview(&self, item_id: &str) -> Result<Vec<ThumbnailSet>> {
        self.operations().get_preview(item_id).await
    }

    async fn share_for_email(&self, item_id: &str, invite: &InviteRequest) -> Result<Vec<Permission>> {
        self.operations().share_for_email(item_id, invite).await
    }

    async fn unshare_from(&self, item_id: &str, target: &UnshareTarget) -> Result<()> {
        self.operations().unshare_from(item_id, target).await
    }
}
