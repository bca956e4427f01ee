//! Delta sync (change feed)
//!
//! A consumer first asks for a baseline cursor (`token=latest`), then polls
//! with the cursor it last received. Each batch must be applied in the order
//! returned.
//!
//! ```text
//! Uninitialized --baseline--> Synced(cursor) --changes--> Synced(next) --> ...
//!        ^                                |
//!        +------ cursor rejected ---------+
//! ```
//!
//! The engine never re-baselines on its own; [`DeltaTracker`] resets to
//! `Uninitialized` and leaves the next move to the caller.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::api::GraphApi;
use crate::cursor::{delta_token_from_link, extract_query_param, DELTA_TOKEN_PARAM, SKIP_TOKEN_PARAM};
use crate::error::{GraphError, Result};
use crate::normalize::{normalize_item, DriveItem, NEXT_LINK_FIELD};
use crate::query::with_query;

const LOG_TARGET: &str = "core_graph::delta";

/// Change-feed continuation field
pub const DELTA_LINK_FIELD: &str = "@odata.deltaLink";

/// One batch of changes plus the cursor for the next poll
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeBatch {
    /// Changed entries in service order
    pub changes: Vec<DriveItem>,
    pub cursor: String,
    /// More changes are pending; poll again immediately with `cursor`
    pub has_more: bool,
    /// Full response body
    pub raw: Value,
}

/// Change feed bound to one drive's `root/delta` endpoint
#[derive(Clone)]
pub struct DeltaSync {
    api: Arc<GraphApi>,
    delta_url: String,
}

impl DeltaSync {
    pub fn new(api: Arc<GraphApi>, delta_path: &str) -> Self {
        let delta_url = api.url(delta_path);
        Self { api, delta_url }
    }

    pub fn delta_url(&self) -> &str {
        &self.delta_url
    }

    /// Cursor for "now", without enumerating existing items.
    #[instrument(skip(self), fields(url = %self.delta_url))]
    pub async fn get_baseline_cursor(&self) -> Result<String> {
        let url = with_query(&self.delta_url, "token=latest");
        let body: Value = self.api.get(&url).await?;

        match body
            .get(DELTA_LINK_FIELD)
            .and_then(Value::as_str)
            .and_then(delta_token_from_link)
        {
            Some(cursor) => {
                info!("Obtained delta baseline cursor");
                Ok(cursor)
            }
            None => Err(self.missing_cursor(&url, &body).await),
        }
    }

    /// Changes since `cursor`.
    ///
    /// The next cursor comes from `@odata.deltaLink` when the feed is caught
    /// up, otherwise from `@odata.nextLink` with `has_more` set.
    #[instrument(skip(self, cursor), fields(url = %self.delta_url))]
    pub async fn get_changes_since(&self, cursor: &str) -> Result<ChangeBatch> {
        let url = with_query(&self.delta_url, &delta_query(cursor));
        let body: Value = self.api.get(&url).await?;

        let (next_cursor, has_more) = match next_delta_cursor(&body) {
            Some(found) => found,
            None => return Err(self.missing_cursor(&url, &body).await),
        };

        let changes: Vec<DriveItem> = body
            .get("value")
            .and_then(Value::as_array)
            .map(|values| values.iter().map(normalize_item).collect())
            .unwrap_or_default();

        debug!(count = changes.len(), has_more, "Fetched delta batch");

        Ok(ChangeBatch {
            changes,
            cursor: next_cursor,
            has_more,
            raw: body,
        })
    }

    async fn missing_cursor(&self, url: &str, body: &Value) -> GraphError {
        let body = body.to_string();
        self.api
            .logger()
            .error(
                LOG_TARGET,
                "Delta response carried no continuation cursor",
                &[("url", url.to_string()), ("body", body.clone())],
            )
            .await;
        GraphError::malformed(url, 200, body, "no delta cursor in response")
    }
}

fn next_delta_cursor(body: &Value) -> Option<(String, bool)> {
    if let Some(cursor) = body
        .get(DELTA_LINK_FIELD)
        .and_then(Value::as_str)
        .and_then(delta_token_from_link)
    {
        return Some((cursor, false));
    }

    let next_link = body.get(NEXT_LINK_FIELD).and_then(Value::as_str)?;
    if let Some(token) = extract_query_param(next_link, DELTA_TOKEN_PARAM) {
        return Some((token, true));
    }
    // keeps the parameter name so the next request echoes it back unchanged
    extract_query_param(next_link, SKIP_TOKEN_PARAM).map(|token| {
        let cursor = format!("{}={}", SKIP_TOKEN_PARAM, urlencoding::encode(&token));
        (cursor, true)
    })
}

/// Query string that resumes the feed at `cursor`
fn delta_query(cursor: &str) -> String {
    let skiptoken_prefix = format!("{}=", SKIP_TOKEN_PARAM);
    if cursor.starts_with(&skiptoken_prefix) {
        cursor.to_string()
    } else {
        format!("{}={}", DELTA_TOKEN_PARAM, urlencoding::encode(cursor))
    }
}

/// Consumer position in the change feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeltaState {
    Uninitialized,
    Synced(String),
}

/// Result of one [`DeltaTracker::poll`]
#[derive(Debug, Clone, PartialEq)]
pub enum DeltaPoll {
    /// A baseline was taken; nothing to apply yet
    Baselined { cursor: String },
    Changes(ChangeBatch),
}

/// Long-lived change-feed consumer state
pub struct DeltaTracker {
    sync: DeltaSync,
    state: DeltaState,
}

impl DeltaTracker {
    pub fn new(sync: DeltaSync) -> Self {
        Self {
            sync,
            state: DeltaState::Uninitialized,
        }
    }

    /// Continue from a cursor persisted by an earlier session
    pub fn resume(sync: DeltaSync, cursor: impl Into<String>) -> Self {
        Self {
            sync,
            state: DeltaState::Synced(cursor.into()),
        }
    }

    pub fn state(&self) -> &DeltaState {
        &self.state
    }

    pub fn reset(&mut self) {
        self.state = DeltaState::Uninitialized;
    }

    /// Baseline when uninitialized, otherwise fetch and advance.
    ///
    /// A rejected cursor resets the tracker to `Uninitialized` and the error
    /// is returned; the next poll takes a fresh baseline.
    pub async fn poll(&mut self) -> Result<DeltaPoll> {
        let current = match &self.state {
            DeltaState::Uninitialized => None,
            DeltaState::Synced(cursor) => Some(cursor.clone()),
        };

        match current {
            None => {
                let cursor = self.sync.get_baseline_cursor().await?;
                self.state = DeltaState::Synced(cursor.clone());
                Ok(DeltaPoll::Baselined { cursor })
            }
            Some(cursor) => match self.sync.get_changes_since(&cursor).await {
                Ok(batch) => {
                    self.state = DeltaState::Synced(batch.cursor.clone());
                    Ok(DeltaPoll::Changes(batch))
                }
                Err(err) if err.is_invalid_cursor() => {
                    self.sync
                        .api
                        .logger()
                        .warn(
                            LOG_TARGET,
                            "Delta cursor rejected, consumer must re-baseline",
                            &[("url", self.sync.delta_url.clone())],
                        )
                        .await;
                    self.state = DeltaState::Uninitialized;
                    Err(err)
                }
                Err(err) => Err(err),
            },
        }
    }
}
