//! Microsoft Search over drive content
//!
//! Search has no continuation link, so its cursor is the client-encoded
//! [`SearchCursor`]. Pages larger than the configured ceiling (25) make the
//! service return duplicate hits, so requested sizes are capped.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::instrument;

use crate::api::GraphApi;
use crate::cursor::SearchCursor;
use crate::error::Result;
use crate::normalize::Page;
use crate::query::{with_query, QueryOptions};

const LOG_TARGET: &str = "core_graph::search";

pub const DEFAULT_ENTITY_TYPE: &str = "driveItem";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortProperty {
    pub name: String,
    pub is_descending: bool,
}

impl SortProperty {
    pub fn ascending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_descending: false,
        }
    }

    pub fn descending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_descending: true,
        }
    }

    /// Parse `"name DESC, createdDateTime"`; a missing direction is ascending.
    pub fn parse_list(list: &str) -> Vec<SortProperty> {
        list.split(',')
            .filter_map(|part| {
                let mut tokens = part.split_whitespace();
                let name = tokens.next()?;
                let is_descending = tokens
                    .next()
                    .is_some_and(|direction| direction.eq_ignore_ascii_case("desc"));
                Some(SortProperty {
                    name: name.to_string(),
                    is_descending,
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub query: String,
    pub sort_properties: Vec<SortProperty>,
    pub entity_types: Vec<String>,
    /// Resource fields to return, sent as `$select`
    pub fields: Vec<String>,
    pub cursor: Option<String>,
    pub max_results: Option<u32>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            sort_properties: Vec::new(),
            entity_types: vec![DEFAULT_ENTITY_TYPE.to_string()],
            fields: Vec::new(),
            cursor: None,
            max_results: None,
        }
    }

    pub fn sort_by(mut self, sort_properties: Vec<SortProperty>) -> Self {
        self.sort_properties = sort_properties;
        self
    }

    pub fn entity_types<I, S>(mut self, entity_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entity_types = entity_types.into_iter().map(Into::into).collect();
        self
    }

    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn cursor(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = Some(cursor.into());
        self
    }

    pub fn max_results(mut self, max_results: u32) -> Self {
        self.max_results = Some(max_results);
        self
    }
}

/// Unified search client
#[derive(Clone)]
pub struct SearchClient {
    api: Arc<GraphApi>,
}

impl SearchClient {
    pub fn new(api: Arc<GraphApi>) -> Self {
        Self { api }
    }

    /// Run one page of a search.
    ///
    /// With a valid cursor the page position, query, entity types and sort
    /// order all come from the cursor. An unreadable cursor is logged and the
    /// search starts over from the first page.
    #[instrument(skip_all)]
    pub async fn search(&self, request: &SearchRequest) -> Result<Page<Value>> {
        let ceiling = self.api.config().max_search_results.max(1);
        let requested = request.max_results.unwrap_or(ceiling).clamp(1, ceiling);

        let state = match request.cursor.as_deref() {
            Some(cursor) => match SearchCursor::decode(cursor) {
                Some(state) => SearchCursor {
                    size: state.size.clamp(1, ceiling),
                    ..state
                },
                None => {
                    self.api
                        .logger()
                        .warn(
                            LOG_TARGET,
                            "Ignoring unreadable search cursor",
                            &[("cursor_len", cursor.len().to_string())],
                        )
                        .await;
                    self.first_page(request, requested)
                }
            },
            None => self.first_page(request, requested),
        };

        self.api
            .logger()
            .info(
                LOG_TARGET,
                "Searching in Microsoft account",
                &[
                    ("from", state.from.to_string()),
                    ("size", state.size.to_string()),
                    ("entity_types", state.entity_types.join(",")),
                ],
            )
            .await;

        let url = with_query(
            &self.api.url("/search/query"),
            &QueryOptions::new().fields(request.fields.clone()).encode(),
        );
        let response: Value = self
            .api
            .post(&url, json!({ "requests": [request_body(&state)] }))
            .await?;

        Ok(format_response(&state, &response))
    }

    fn first_page(&self, request: &SearchRequest, size: u32) -> SearchCursor {
        SearchCursor {
            from: 0,
            size,
            query: request.query.clone(),
            entity_types: request.entity_types.clone(),
            sort_properties: request.sort_properties.clone(),
        }
    }
}

fn request_body(state: &SearchCursor) -> Value {
    let mut body = json!({
        "entityTypes": state.entity_types,
        "query": { "queryString": state.query },
        "from": state.from,
        "size": state.size,
    });
    if !state.sort_properties.is_empty() {
        body["sortProperties"] = json!(state.sort_properties);
    }
    body
}

fn format_response(state: &SearchCursor, response: &Value) -> Page<Value> {
    let container = response.pointer("/value/0/hitsContainers/0");

    let items = container
        .and_then(|c| c.get("hits"))
        .and_then(Value::as_array)
        .map(|hits| {
            hits.iter()
                .filter_map(|hit| hit.get("resource").cloned())
                .collect()
        })
        .unwrap_or_default();

    let more = container
        .and_then(|c| c.get("moreResultsAvailable"))
        .and_then(Value::as_bool)
        .unwrap_or(false);

    // an offset past u32::MAX cannot be requested, so the listing ends there
    let cursor = more
        .then(|| state.from.checked_add(state.size))
        .flatten()
        .map(|from| {
            SearchCursor {
                from,
                ..state.clone()
            }
            .encode()
        });

    Page::new(cursor, items)
}
