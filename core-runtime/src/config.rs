//! # Core Configuration Module
//!
//! Provides configuration management for the Graph client core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `GraphConfig`
//! instance that holds the injected capabilities and settings every client
//! shares. It enforces fail-fast validation so a missing transport or a
//! malformed API root is reported before any request is attempted.
//!
//! ## Required Dependencies
//!
//! - `HttpClient` - Required unless the `desktop-shims` feature provides
//!   `ReqwestHttpClient`
//!
//! ## Optional Dependencies
//!
//! - `LoggerSink` - Host log forwarding (default: none)
//! - `Clock` - Time source for computed defaults (default: `SystemClock`)
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::GraphConfig;
//! use std::sync::Arc;
//!
//! let config = GraphConfig::builder()
//!     .http_client(Arc::new(MyHttpClient))
//!     .request_timeout(std::time::Duration::from_secs(20))
//!     .build()
//!     .expect("Failed to build config");
//! ```

use crate::error::{Error, Result};
use crate::logging::ClientLogger;
use bridge_traits::{Clock, HttpClient, LoggerSink, SystemClock};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Versioned Microsoft Graph API root all resource paths append to
pub const DEFAULT_API_ROOT: &str = "https://graph.microsoft.com/v1.0";

/// Search pages larger than this return duplicated hits upstream
pub const MAX_SEARCH_RESULTS: u32 = 25;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared configuration for every Graph client.
///
/// Use [`GraphConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct GraphConfig {
    /// API root without a trailing slash
    pub api_root: String,

    /// Timeout applied to every pipeline request
    pub request_timeout: Duration,

    /// Page size ceiling for search requests
    pub max_search_results: u32,

    /// HTTP transport
    pub http_client: Arc<dyn HttpClient>,

    /// Explicit logger capability handed to each client
    pub logger: ClientLogger,

    /// Time source
    pub clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for GraphConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphConfig")
            .field("api_root", &self.api_root)
            .field("request_timeout", &self.request_timeout)
            .field("max_search_results", &self.max_search_results)
            .field("http_client", &"HttpClient { ... }")
            .field("logger", &self.logger)
            .field("clock", &"Clock { ... }")
            .finish()
    }
}

impl GraphConfig {
    /// Create a new configuration builder
    pub fn builder() -> GraphConfigBuilder {
        GraphConfigBuilder::default()
    }

    /// Join a resource path onto the API root.
    ///
    /// Absolute URLs (continuation links handed back by the service) pass
    /// through unchanged.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("https://") || path.starts_with("http://") {
            return path.to_string();
        }
        format!("{}/{}", self.api_root, path.trim_start_matches('/'))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let parsed = Url::parse(&self.api_root)
            .map_err(|e| Error::Config(format!("Invalid API root '{}': {}", self.api_root, e)))?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "API root must use http or https, got '{}'",
                parsed.scheme()
            )));
        }

        if self.request_timeout.is_zero() {
            return Err(Error::Config(
                "Request timeout must be greater than zero".to_string(),
            ));
        }

        if self.max_search_results == 0 || self.max_search_results > MAX_SEARCH_RESULTS {
            return Err(Error::Config(format!(
                "Max search results must be between 1 and {}",
                MAX_SEARCH_RESULTS
            )));
        }

        Ok(())
    }
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    Err(Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "No HTTP client implementation provided. \
                  Desktop: enable the `desktop-shims` feature. \
                  Other hosts: inject a platform-native adapter."
            .to_string(),
    })
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client() -> Result<Arc<dyn HttpClient>> {
    let client = bridge_desktop::ReqwestHttpClient::with_timeout(DEFAULT_REQUEST_TIMEOUT)
        .map_err(|e| Error::CapabilityMissing {
            capability: "HttpClient".to_string(),
            message: e.to_string(),
        })?;
    Ok(Arc::new(client))
}

/// Builder for [`GraphConfig`].
#[derive(Default)]
pub struct GraphConfigBuilder {
    api_root: Option<String>,
    request_timeout: Option<Duration>,
    max_search_results: Option<u32>,
    http_client: Option<Arc<dyn HttpClient>>,
    logger_sink: Option<Arc<dyn LoggerSink>>,
    clock: Option<Arc<dyn Clock>>,
}

impl GraphConfigBuilder {
    /// Override the API root (defaults to [`DEFAULT_API_ROOT`])
    pub fn api_root(mut self, root: impl Into<String>) -> Self {
        self.api_root = Some(root.into());
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn max_search_results(mut self, max: u32) -> Self {
        self.max_search_results = Some(max);
        self
    }

    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Forward client diagnostics to a host logger
    pub fn logger_sink(mut self, sink: Arc<dyn LoggerSink>) -> Self {
        self.logger_sink = Some(sink);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Build the configuration
    ///
    /// # Errors
    ///
    /// - `Error::CapabilityMissing` when no HTTP client is available
    /// - `Error::Config` when a value fails validation
    pub fn build(self) -> Result<GraphConfig> {
        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client()?,
        };

        let api_root = self
            .api_root
            .unwrap_or_else(|| DEFAULT_API_ROOT.to_string())
            .trim_end_matches('/')
            .to_string();

        let config = GraphConfig {
            api_root,
            request_timeout: self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT),
            max_search_results: self.max_search_results.unwrap_or(MAX_SEARCH_RESULTS),
            http_client,
            logger: ClientLogger::new(self.logger_sink),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
        };

        config.validate()?;
        Ok(config)
    }
}
