//! Refresh capability and observer hooks.
//!
//! The request pipeline never talks to a token endpoint itself. It is handed
//! a [`TokenRefresher`] at construction (or none, in which case an expired
//! access token is fatal) and, optionally, a [`RefreshObserver`] that is
//! told about every new pair so the host can persist it.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

use crate::error::Result;
use crate::types::CredentialPair;

/// Given a refresh token, asynchronously yields a new credential pair.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> Result<CredentialPair>;
}

/// Notified after every successful refresh, before the original call is retried.
#[async_trait]
pub trait RefreshObserver: Send + Sync {
    async fn on_refresh(&self, credentials: &CredentialPair);
}

/// Adapter turning an async closure into a [`TokenRefresher`].
pub struct FnRefresher<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> TokenRefresher for FnRefresher<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<CredentialPair>> + Send,
{
    async fn refresh(&self, refresh_token: &str) -> Result<CredentialPair> {
        (self.f)(refresh_token.to_string()).await
    }
}

/// Wrap an async closure as a shareable refresh capability.
///
/// ```
/// use core_auth::{refresher_fn, CredentialPair};
///
/// let refresher = refresher_fn(|refresh_token: String| async move {
///     Ok(CredentialPair::new("new-access", refresh_token))
/// });
/// # let _ = refresher;
/// ```
pub fn refresher_fn<F, Fut>(f: F) -> Arc<dyn TokenRefresher>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<CredentialPair>> + Send + 'static,
{
    Arc::new(FnRefresher { f })
}
