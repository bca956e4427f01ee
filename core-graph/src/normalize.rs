//! Response normalization
//!
//! Maps raw Graph collection responses onto a uniform [`Page`] and single
//! items onto [`DriveItem`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::cursor::skiptoken_from_link;

/// Continuation link field of paged collections
pub const NEXT_LINK_FIELD: &str = "@odata.nextLink";

/// One page of a collection.
///
/// `cursor` is `None` exactly when no further page exists. Items keep the
/// order the service returned them in; the service may repeat entries near
/// page boundaries and they are not deduplicated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub cursor: Option<String>,
    pub items: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(cursor: Option<String>, items: Vec<T>) -> Self {
        Self { cursor, items }
    }

    pub fn has_more(&self) -> bool {
        self.cursor.is_some()
    }

    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            cursor: self.cursor,
            items: self.items.into_iter().map(f).collect(),
        }
    }
}

/// Drive entry with a derived folder flag and every other field passed through
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriveItem {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "isFolder", default)]
    pub is_folder: bool,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl DriveItem {
    /// Passthrough field by its wire name
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn web_url(&self) -> Option<&str> {
        self.field("webUrl").and_then(Value::as_str)
    }

    /// Set on entries the change feed reports as removed
    pub fn is_deleted(&self) -> bool {
        self.field("deleted").is_some_and(|value| !value.is_null())
    }
}

/// Normalize a single item response.
///
/// `isFolder` is `true` iff the payload carries a non-null `folder` facet.
pub fn normalize_item(raw: &Value) -> DriveItem {
    let mut fields = raw.as_object().cloned().unwrap_or_default();

    let id = take_string(&mut fields, "id");
    let name = take_string(&mut fields, "name");
    fields.remove("isFolder");
    let is_folder = fields.get("folder").is_some_and(|facet| !facet.is_null());

    DriveItem {
        id,
        name,
        is_folder,
        fields,
    }
}

/// Normalize a paged collection response.
///
/// Missing `value` yields no items; a missing or token-less
/// `@odata.nextLink` yields no cursor.
pub fn normalize_list(raw: &Value) -> Page<DriveItem> {
    let items = raw
        .get("value")
        .and_then(Value::as_array)
        .map(|values| values.iter().map(normalize_item).collect())
        .unwrap_or_default();

    Page::new(next_page_cursor(raw), items)
}

pub fn next_page_cursor(raw: &Value) -> Option<String> {
    raw.get(NEXT_LINK_FIELD)
        .and_then(Value::as_str)
        .and_then(skiptoken_from_link)
}

/// Non-string values stay in `fields` untouched.
fn take_string(fields: &mut Map<String, Value>, key: &str) -> String {
    if !fields.get(key).is_some_and(Value::is_string) {
        return String::new();
    }
    match fields.remove(key) {
        Some(Value::String(value)) => value,
        _ => String::new(),
    }
}
