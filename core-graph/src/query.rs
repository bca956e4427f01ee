//! OData query string encoding
//!
//! `$expand` is always emitted before `$select`: the service validates the
//! selection against relations that must already be declared. The `id` field
//! is appended to every non-empty selection so items stay addressable.

/// Field selection and relation expansion for a single request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    pub fields: Vec<String>,
    pub expand: Vec<String>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn expand<I, S>(mut self, expand: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expand = expand.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.expand.is_empty()
    }

    /// Encoded `key=value` pairs in emission order
    pub fn pairs(&self) -> Vec<String> {
        let mut pairs = Vec::new();

        if !self.expand.is_empty() {
            pairs.push(format!("$expand={}", encode_list(&self.expand)));
        }

        if !self.fields.is_empty() {
            let mut fields = self.fields.clone();
            fields.push("id".to_string());
            pairs.push(format!("$select={}", encode_list(&fields)));
        }

        pairs
    }

    /// Query string without the leading `?`; empty when nothing is requested.
    ///
    /// ```
    /// use core_graph::QueryOptions;
    ///
    /// let query = QueryOptions::new().fields(["name"]).expand(["thumbnails"]);
    /// assert_eq!(query.encode(), "$expand=thumbnails&$select=name,id");
    /// assert_eq!(QueryOptions::new().encode(), "");
    /// ```
    pub fn encode(&self) -> String {
        self.pairs().join("&")
    }
}

/// Options for paged collection requests
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    pub query: QueryOptions,
    /// Page size hint
    pub top: Option<u32>,
    /// Cursor from a previous page, sent back as `$skiptoken`
    pub cursor: Option<String>,
}

impl ListOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(mut self, query: QueryOptions) -> Self {
        self.query = query;
        self
    }

    pub fn top(mut self, top: u32) -> Self {
        self.top = Some(top);
        self
    }

    pub fn cursor(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = Some(cursor.into());
        self
    }

    pub fn encode(&self) -> String {
        let mut pairs = self.query.pairs();
        if let Some(top) = self.top {
            pairs.push(format!("$top={}", top));
        }
        if let Some(ref cursor) = self.cursor {
            pairs.push(format!("$skiptoken={}", urlencoding::encode(cursor)));
        }
        pairs.join("&")
    }
}

/// Append an encoded query to a URL, choosing `?` or `&` as needed
pub fn with_query(url: &str, query: &str) -> String {
    if query.is_empty() {
        return url.to_string();
    }
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{}{}{}", url, separator, query)
}

fn encode_list(values: &[String]) -> String {
    values
        .iter()
        .map(|value| urlencoding::encode(value).into_owned())
        .collect::<Vec<_>>()
        .join(",")
}
