//! Error types for Graph operations

use thiserror::Error;

/// Graph client errors
#[derive(Error, Debug)]
pub enum GraphError {
    /// Non-success HTTP outcome, transport failure or malformed response body
    #[error("Graph request to {url} failed: {message}")]
    Request {
        url: String,
        /// `None` when no HTTP response was received
        status: Option<u16>,
        body: String,
        message: String,
    },

    /// The access token expired and no refresh capability is configured
    #[error("Access token expired and no refresh capability is configured ({url})")]
    TokenExpiredNoRefresh { url: String },

    /// The refresh capability was invoked and failed
    #[error("Could not use refresh token to get a new access token: {reason}")]
    RefreshFailed { reason: String },

    /// No permission on the item matched the unshare target
    #[error("No permission matching {target} found on item {item_id}")]
    PermissionNotFound { item_id: String, target: String },

    /// Caller input rejected before any request was issued
    #[error("Validation failed: {0}")]
    Validation(String),
}

impl GraphError {
    /// HTTP status of a failed request, when one was received
    pub fn status(&self) -> Option<u16> {
        match self {
            GraphError::Request { status, .. } => *status,
            _ => None,
        }
    }

    /// The service rejected a delta cursor and the consumer must re-baseline.
    pub fn is_invalid_cursor(&self) -> bool {
        match self {
            GraphError::Request { status, body, .. } => {
                *status == Some(410) || body.contains("resyncRequired")
            }
            _ => false,
        }
    }

    /// A 2xx response whose body lacks what the operation needs
    pub fn malformed(url: &str, status: u16, body: impl Into<String>, detail: &str) -> Self {
        GraphError::Request {
            url: url.to_string(),
            status: Some(status),
            body: body.into(),
            message: format!("malformed response: {}", detail),
        }
    }
}

/// Result type for Graph operations
pub type Result<T> = std::result::Result<T, GraphError>;
