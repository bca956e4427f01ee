//! # Authentication Module
//!
//! Credential handling for the Graph request pipeline.
//!
//! ## Overview
//!
//! This module holds the bearer credential pair for one client instance, the
//! injectable refresh capability the pipeline calls when the service reports
//! an expired access token, and the Microsoft identity platform OAuth flow
//! that can serve as that capability.
//!
//! ## Features
//!
//! - Atomic replacement of the access/refresh token pair
//! - Coalesced refresh: concurrent callers that raced the same expiry share
//!   a single refresh call
//! - Authorization URL generation and code exchange
//! - Observer hook for persisting refreshed credentials

pub mod error;
pub mod oauth;
pub mod refresh;
pub mod token_store;
pub mod types;

pub use error::{AuthError, Result};
pub use oauth::{OAuthConfig, OAuthFlowManager, DEFAULT_SCOPES};
pub use refresh::{refresher_fn, FnRefresher, RefreshObserver, TokenRefresher};
pub use token_store::{RefreshOutcome, TokenStore};
pub use types::CredentialPair;
