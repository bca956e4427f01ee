//! Core service façade and bootstrap helpers.
//!
//! This crate wires configuration, credentials and the refresh capability
//! into one [`GraphApi`] shared by the OneDrive, SharePoint and search
//! clients, so every backend sees the same token store. Desktop apps
//! typically enable the `desktop-shims` feature, which supplies the
//! `reqwest`-backed HTTP client from `bridge-desktop`.

pub mod error;

pub use error::{CoreError, Result};

use std::sync::Arc;

use core_auth::{
    CredentialPair, OAuthFlowManager, RefreshObserver, TokenRefresher, TokenStore,
};
use core_graph::{ExpiryPredicate, GraphApi, SearchClient};
use core_runtime::GraphConfig;
use provider_onedrive::OneDriveClient;
use provider_sharepoint::SharepointClient;
use tracing::info;

#[cfg(all(feature = "desktop-shims", not(target_arch = "wasm32")))]
pub use bridge_desktop::ReqwestHttpClient;

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct GraphService {
    api: Arc<GraphApi>,
    onedrive: OneDriveClient,
    sharepoint: SharepointClient,
    search: SearchClient,
}

impl GraphService {
    pub fn builder() -> GraphServiceBuilder {
        GraphServiceBuilder::default()
    }

    /// Service whose refresh capability is the Microsoft identity token
    /// endpoint behind `oauth`.
    pub fn with_oauth(
        config: GraphConfig,
        oauth: OAuthFlowManager,
        credentials: CredentialPair,
    ) -> Result<Self> {
        Self::builder()
            .config(config)
            .credentials(credentials)
            .refresher(Arc::new(oauth))
            .build()
    }

    /// The shared request pipeline
    pub fn api(&self) -> &Arc<GraphApi> {
        &self.api
    }

    /// Current credentials, including any produced by a refresh
    pub async fn credentials(&self) -> CredentialPair {
        self.api.tokens().current().await
    }

    pub fn onedrive(&self) -> &OneDriveClient {
        &self.onedrive
    }

    pub fn sharepoint(&self) -> &SharepointClient {
        &self.sharepoint
    }

    pub fn search(&self) -> &SearchClient {
        &self.search
    }
}

#[derive(Default)]
pub struct GraphServiceBuilder {
    config: Option<GraphConfig>,
    credentials: Option<CredentialPair>,
    tokens: Option<Arc<TokenStore>>,
    refresher: Option<Arc<dyn TokenRefresher>>,
    observer: Option<Arc<dyn RefreshObserver>>,
    expiry_predicate: Option<ExpiryPredicate>,
}

impl GraphServiceBuilder {
    /// Defaults to `GraphConfig::builder().build()` when not set.
    pub fn config(mut self, config: GraphConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn credentials(mut self, credentials: CredentialPair) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Share an existing token store instead of creating one from
    /// [`credentials`](Self::credentials).
    pub fn token_store(mut self, tokens: Arc<TokenStore>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    pub fn refresher(mut self, refresher: Arc<dyn TokenRefresher>) -> Self {
        self.refresher = Some(refresher);
        self
    }

    pub fn observer(mut self, observer: Arc<dyn RefreshObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn expiry_predicate(mut self, predicate: ExpiryPredicate) -> Self {
        self.expiry_predicate = Some(predicate);
        self
    }

    /// # Errors
    ///
    /// - [`CoreError::InitializationFailed`] when neither credentials nor a
    ///   token store were given
    /// - [`CoreError::Runtime`] when the default configuration cannot be built
    pub fn build(self) -> Result<GraphService> {
        let config = match self.config {
            Some(config) => config,
            None => GraphConfig::builder().build()?,
        };

        let tokens = match (self.tokens, self.credentials) {
            (Some(tokens), _) => tokens,
            (None, Some(credentials)) => Arc::new(TokenStore::new(credentials)),
            (None, None) => {
                return Err(CoreError::InitializationFailed(
                    "credentials or a token store are required".to_string(),
                ))
            }
        };

        let has_refresher = self.refresher.is_some();
        let mut api = GraphApi::with_token_store(config, tokens);
        if let Some(refresher) = self.refresher {
            api = api.with_refresher(refresher);
        }
        if let Some(observer) = self.observer {
            api = api.with_observer(observer);
        }
        if let Some(predicate) = self.expiry_predicate {
            api = api.with_expiry_predicate(predicate);
        }
        let api = Arc::new(api);

        info!(api_root = %api.config().api_root, has_refresher, "Graph service initialized");

        Ok(GraphService {
            onedrive: OneDriveClient::new(Arc::clone(&api)),
            sharepoint: SharepointClient::new(Arc::clone(&api)),
            search: SearchClient::new(Arc::clone(&api)),
            api,
        })
    }
}
