//! Authenticated request pipeline
//!
//! Every Graph call goes through [`GraphApi::execute`], which attaches the
//! current bearer token, detects the service's "access token expired" signal
//! and performs at most one refresh followed by exactly one retry of the
//! original call. A second expiry on the retry is reported like any other
//! failed request.
//!
//! Failures are logged once, here, with the failing URL, status and body,
//! through the [`ClientLogger`] handed over in the [`GraphConfig`].

use std::sync::{Arc, OnceLock};

use bridge_traits::http::{HttpMethod, HttpRequest, HttpResponse};
use bytes::Bytes;
use core_auth::{CredentialPair, RefreshObserver, RefreshOutcome, TokenRefresher, TokenStore};
use core_runtime::{ClientLogger, GraphConfig};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::error::{GraphError, Result};

const LOG_TARGET: &str = "core_graph::api";

/// Decides whether a failed response means the access token has expired.
pub type ExpiryPredicate = Arc<dyn Fn(&HttpResponse) -> bool + Send + Sync>;

/// Request payload
#[derive(Debug, Clone)]
pub enum RequestBody {
    Json(Value),
    Bytes { content_type: String, data: Bytes },
}

/// Match the upstream expiry code inside an error message.
///
/// The service reports expired tokens only through this code embedded in
/// free text, so the match breaks if the message format changes. Swap the
/// predicate with [`GraphApi::with_expiry_predicate`] when it does.
pub fn is_token_expired_message(message: &str) -> bool {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?i)code: 80049228").ok())
        .as_ref()
        .is_some_and(|pattern| pattern.is_match(message))
}

/// Default expiry predicate: `error.message` of the JSON error body.
pub fn default_expiry_predicate(response: &HttpResponse) -> bool {
    response
        .json::<Value>()
        .ok()
        .and_then(|body| {
            body.pointer("/error/message")
                .and_then(Value::as_str)
                .map(is_token_expired_message)
        })
        .unwrap_or(false)
}

/// Authenticated Graph request pipeline shared by every client.
pub struct GraphApi {
    config: GraphConfig,
    tokens: Arc<TokenStore>,
    refresher: Option<Arc<dyn TokenRefresher>>,
    observer: Option<Arc<dyn RefreshObserver>>,
    expiry_predicate: ExpiryPredicate,
}

impl std::fmt::Debug for GraphApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphApi")
            .field("config", &self.config)
            .field("has_refresher", &self.refresher.is_some())
            .field("has_observer", &self.observer.is_some())
            .finish_non_exhaustive()
    }
}

impl GraphApi {
    pub fn new(config: GraphConfig, credentials: CredentialPair) -> Self {
        Self::with_token_store(config, Arc::new(TokenStore::new(credentials)))
    }

    pub fn with_token_store(config: GraphConfig, tokens: Arc<TokenStore>) -> Self {
        Self {
            config,
            tokens,
            refresher: None,
            observer: None,
            expiry_predicate: Arc::new(default_expiry_predicate),
        }
    }

    /// Capability invoked once per expired call; without one, expiry is fatal.
    pub fn with_refresher(mut self, refresher: Arc<dyn TokenRefresher>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    /// Told about each new pair before the original call is retried.
    pub fn with_observer(mut self, observer: Arc<dyn RefreshObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn with_expiry_predicate(mut self, predicate: ExpiryPredicate) -> Self {
        self.expiry_predicate = predicate;
        self
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn logger(&self) -> &ClientLogger {
        &self.config.logger
    }

    pub fn tokens(&self) -> &Arc<TokenStore> {
        &self.tokens
    }

    /// Absolute URL for a resource path
    pub fn url(&self, path: &str) -> String {
        self.config.url(path)
    }

    pub async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        self.execute(HttpMethod::Get, url, None).await
    }

    pub async fn post<T: DeserializeOwned>(&self, url: &str, body: Value) -> Result<T> {
        self.execute(HttpMethod::Post, url, Some(RequestBody::Json(body)))
            .await
    }

    pub async fn patch<T: DeserializeOwned>(&self, url: &str, body: Value) -> Result<T> {
        self.execute(HttpMethod::Patch, url, Some(RequestBody::Json(body)))
            .await
    }

    pub async fn delete(&self, url: &str) -> Result<()> {
        self.execute::<Value>(HttpMethod::Delete, url, None)
            .await
            .map(|_| ())
    }

    /// Issue an authenticated call and parse the response body.
    ///
    /// An empty success body parses as JSON `null`.
    ///
    /// # Errors
    ///
    /// - [`GraphError::Request`] for transport failures, non-success statuses
    ///   (including a second expiry on the retry) and unparseable bodies
    /// - [`GraphError::TokenExpiredNoRefresh`] when the token expired and no
    ///   refresher is configured; no further request is made
    /// - [`GraphError::RefreshFailed`] when the refresher itself failed
    #[instrument(skip_all, fields(method = %method, url = %url))]
    pub async fn execute<T: DeserializeOwned>(
        &self,
        method: HttpMethod,
        url: &str,
        body: Option<RequestBody>,
    ) -> Result<T> {
        let access_token = self.tokens.access_token().await;
        let mut response = self.send(method, url, body.as_ref(), &access_token).await?;

        if !response.is_success() && (self.expiry_predicate)(&response) {
            let credentials = self.recover_expired(url, &access_token).await?;
            debug!("Retrying request with refreshed access token");
            response = self
                .send(method, url, body.as_ref(), &credentials.access_token)
                .await?;
        }

        self.finish(url, response).await
    }

    async fn send(
        &self,
        method: HttpMethod,
        url: &str,
        body: Option<&RequestBody>,
        access_token: &str,
    ) -> Result<HttpResponse> {
        let mut request = HttpRequest::new(method, url)
            .bearer_token(access_token)
            .header("Accept", "application/json")
            .timeout(self.config.request_timeout);

        match body {
            Some(RequestBody::Json(value)) => {
                request = request.json(value).map_err(|e| GraphError::Request {
                    url: url.to_string(),
                    status: None,
                    body: String::new(),
                    message: e.to_string(),
                })?;
            }
            Some(RequestBody::Bytes { content_type, data }) => {
                request = request
                    .header("Content-Type", content_type.clone())
                    .body(data.clone());
            }
            None => {}
        }

        match self.config.http_client.execute(request).await {
            Ok(response) => Ok(response),
            Err(err) => {
                self.logger()
                    .error(
                        LOG_TARGET,
                        "Unexpected error while executing a Graph API call",
                        &[("url", url.to_string()), ("error", err.to_string())],
                    )
                    .await;
                Err(GraphError::Request {
                    url: url.to_string(),
                    status: None,
                    body: String::new(),
                    message: err.to_string(),
                })
            }
        }
    }

    async fn recover_expired(&self, url: &str, failed_access_token: &str) -> Result<CredentialPair> {
        let Some(refresher) = self.refresher.as_ref() else {
            self.logger()
                .error(
                    LOG_TARGET,
                    "The access token has expired, and no refresh capability is set to renew it",
                    &[("url", url.to_string())],
                )
                .await;
            return Err(GraphError::TokenExpiredNoRefresh {
                url: url.to_string(),
            });
        };

        self.logger()
            .info(
                LOG_TARGET,
                "Access token expired, trying to refresh",
                &[("url", url.to_string())],
            )
            .await;

        match self
            .tokens
            .refresh_with(failed_access_token, refresher.as_ref())
            .await
        {
            Ok(RefreshOutcome::Refreshed(credentials)) => {
                self.logger()
                    .info(LOG_TARGET, "Successful refresh", &[])
                    .await;
                if let Some(observer) = self.observer.as_ref() {
                    observer.on_refresh(&credentials).await;
                }
                Ok(credentials)
            }
            Ok(RefreshOutcome::AlreadyRefreshed(credentials)) => {
                debug!("Reusing credentials refreshed by a concurrent request");
                Ok(credentials)
            }
            Err(err) => {
                self.logger()
                    .error(
                        LOG_TARGET,
                        "Could not use the refresh token",
                        &[("url", url.to_string()), ("reason", err.to_string())],
                    )
                    .await;
                Err(GraphError::RefreshFailed {
                    reason: err.to_string(),
                })
            }
        }
    }

    async fn finish<T: DeserializeOwned>(&self, url: &str, response: HttpResponse) -> Result<T> {
        let status = response.status;
        let body_text = String::from_utf8_lossy(&response.body).into_owned();

        if !response.is_success() {
            self.logger()
                .error(
                    LOG_TARGET,
                    "Received a non-200 while executing a Graph API call",
                    &[
                        ("url", url.to_string()),
                        ("status", status.to_string()),
                        ("body", body_text.clone()),
                    ],
                )
                .await;
            let message = error_message(&response).unwrap_or_else(|| format!("HTTP {}", status));
            return Err(GraphError::Request {
                url: url.to_string(),
                status: Some(status),
                body: body_text,
                message,
            });
        }

        let parsed = if body_text.trim().is_empty() {
            serde_json::from_value(Value::Null)
        } else {
            serde_json::from_slice(&response.body)
        };

        match parsed {
            Ok(value) => Ok(value),
            Err(err) => {
                self.logger()
                    .error(
                        LOG_TARGET,
                        "Could not parse Graph API response",
                        &[
                            ("url", url.to_string()),
                            ("status", status.to_string()),
                            ("body", body_text.clone()),
                            ("error", err.to_string()),
                        ],
                    )
                    .await;
                Err(GraphError::malformed(url, status, body_text, &err.to_string()))
            }
        }
    }
}

fn error_message(response: &HttpResponse) -> Option<String> {
    response
        .json::<Value>()
        .ok()?
        .pointer("/error/message")
        .and_then(Value::as_str)
        .map(str::to_string)
}
