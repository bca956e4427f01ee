//! # Microsoft Graph Core
//!
//! The request pipeline and protocol helpers shared by the drive backends.
//!
//! ## Overview
//!
//! - [`GraphApi`]: authenticated requests with a single refresh-and-retry on
//!   token expiry
//! - [`QueryOptions`] / [`ListOptions`]: `$expand`/`$select`/paging encoding
//! - [`normalize_list`] / [`normalize_item`]: uniform [`Page`] and [`DriveItem`]
//!   shapes
//! - [`DeltaSync`] / [`DeltaTracker`]: change feed with opaque cursors
//! - [`SearchClient`]: search with client-encoded cursors
//! - [`DriveOperations`]: file, preview and sharing calls over any drive root
//! - [`SubscriptionClient`]: webhook registration

pub mod api;
pub mod cursor;
pub mod delta;
pub mod drive;
pub mod error;
pub mod normalize;
pub mod query;
pub mod search;
pub mod subscription;

pub use api::{default_expiry_predicate, is_token_expired_message, ExpiryPredicate, GraphApi, RequestBody};
pub use cursor::{extract_query_param, SearchCursor};
pub use delta::{ChangeBatch, DeltaPoll, DeltaState, DeltaSync, DeltaTracker};
pub use drive::{
    ConflictBehavior, DriveClient, DriveOperations, DriveResource, InviteRequest, Invitation,
    LinkScope, LinkType, Permission, SharingLink, Thumbnail, ThumbnailSet, UnshareTarget,
};
pub use error::{GraphError, Result};
pub use normalize::{normalize_item, normalize_list, DriveItem, Page};
pub use query::{ListOptions, QueryOptions};
pub use search::{SearchClient, SearchRequest, SortProperty};
pub use subscription::{Subscription, SubscriptionClient, SubscriptionRequest};
