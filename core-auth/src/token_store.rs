//! In-Memory Token Store
//!
//! Holds the current credential pair for one client instance. The store is
//! process-local and never persists anything; hosts that want persistence
//! register a [`RefreshObserver`](crate::RefreshObserver) on the pipeline.
//!
//! ## Refresh coalescing
//!
//! Requests that fail with an expired token at the same time all call
//! [`TokenStore::refresh_with`] with the access token they used. The first
//! caller performs the refresh; the rest wait on the same gate, see that the
//! stored access token has already moved on, and reuse the new pair without
//! calling the refresher again.
//!
//! ## Example
//!
//! ```no_run
//! use core_auth::{CredentialPair, TokenStore};
//!
//! # async fn example() {
//! let store = TokenStore::new(CredentialPair::new("access", "refresh"));
//! let current = store.current().await;
//! store.replace(CredentialPair::new("access-2", "refresh-2")).await;
//! # let _ = current;
//! # }
//! ```

use crate::error::Result;
use crate::refresh::TokenRefresher;
use crate::types::CredentialPair;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// Result of a coalesced refresh attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// This caller invoked the refresher and stored the returned pair
    Refreshed(CredentialPair),
    /// Another caller refreshed first; the stored pair is returned as-is
    AlreadyRefreshed(CredentialPair),
}

impl RefreshOutcome {
    pub fn credentials(&self) -> &CredentialPair {
        match self {
            RefreshOutcome::Refreshed(pair) | RefreshOutcome::AlreadyRefreshed(pair) => pair,
        }
    }

    pub fn into_credentials(self) -> CredentialPair {
        match self {
            RefreshOutcome::Refreshed(pair) | RefreshOutcome::AlreadyRefreshed(pair) => pair,
        }
    }
}

/// Shared, mutable holder of the current credential pair
pub struct TokenStore {
    credentials: RwLock<CredentialPair>,
    refresh_gate: Mutex<()>,
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore").finish_non_exhaustive()
    }
}

impl TokenStore {
    pub fn new(credentials: CredentialPair) -> Self {
        debug!("Initializing TokenStore");
        Self {
            credentials: RwLock::new(credentials),
            refresh_gate: Mutex::new(()),
        }
    }

    /// Snapshot of the current pair
    pub async fn current(&self) -> CredentialPair {
        self.credentials.read().await.clone()
    }

    /// Current access token only
    pub async fn access_token(&self) -> String {
        self.credentials.read().await.access_token.clone()
    }

    /// Overwrite both tokens together
    pub async fn replace(&self, credentials: CredentialPair) {
        let mut guard = self.credentials.write().await;
        *guard = credentials;
        info!("Credential pair replaced");
    }

    /// Refresh the pair unless another caller already replaced the token
    /// that `failed_access_token` names.
    ///
    /// # Errors
    ///
    /// Propagates the refresher's error unchanged; the stored pair is left
    /// untouched in that case.
    pub async fn refresh_with(
        &self,
        failed_access_token: &str,
        refresher: &dyn TokenRefresher,
    ) -> Result<RefreshOutcome> {
        let _guard = self.refresh_gate.lock().await;

        let current = self.current().await;
        if current.access_token != failed_access_token {
            debug!("Access token already rotated by a concurrent refresh");
            return Ok(RefreshOutcome::AlreadyRefreshed(current));
        }

        let refreshed = refresher.refresh(&current.refresh_token).await?;
        self.replace(refreshed.clone()).await;

        Ok(RefreshOutcome::Refreshed(refreshed))
    }
}
