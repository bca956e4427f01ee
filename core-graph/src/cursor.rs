//! Cursor codecs
//!
//! Two incompatible cursor shapes exist and are kept apart:
//!
//! - Link cursors are pulled out of a continuation URL the service returns
//!   (`@odata.nextLink` carries `$skiptoken`, `@odata.deltaLink` carries
//!   `token`).
//! - Search cursors are built by the client: URL-safe base64 of the next
//!   page's request state, so a search can resume from the cursor alone.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::search::SortProperty;

/// Paging token parameter inside `@odata.nextLink`
pub const SKIP_TOKEN_PARAM: &str = "$skiptoken";

/// Change-feed token parameter inside `@odata.deltaLink`
pub const DELTA_TOKEN_PARAM: &str = "token";

/// Value of a named query parameter in an arbitrary URL.
///
/// Returns `None` when the link has no query string or lacks the parameter.
pub fn extract_query_param(link: &str, name: &str) -> Option<String> {
    let (_, query) = link.split_once('?')?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

pub fn skiptoken_from_link(link: &str) -> Option<String> {
    extract_query_param(link, SKIP_TOKEN_PARAM)
}

pub fn delta_token_from_link(link: &str) -> Option<String> {
    extract_query_param(link, DELTA_TOKEN_PARAM)
}

/// Request state of the next search page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchCursor {
    pub from: u32,
    pub size: u32,
    pub query: String,
    #[serde(default)]
    pub entity_types: Vec<String>,
    #[serde(default)]
    pub sort_properties: Vec<SortProperty>,
}

impl SearchCursor {
    pub fn encode(&self) -> String {
        // plain owned fields always serialize
        let json = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    /// `None` for anything that is not a cursor produced by [`encode`](Self::encode).
    pub fn decode(cursor: &str) -> Option<Self> {
        let json = URL_SAFE_NO_PAD.decode(cursor.trim()).ok()?;
        serde_json::from_slice(&json).ok()
    }
}
