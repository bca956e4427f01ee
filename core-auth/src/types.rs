use serde::{Deserialize, Serialize};
use std::fmt;

/// Bearer credential pair for one client instance.
///
/// Both fields are always replaced together; a pair is never partially
/// updated.
///
/// # Security
///
/// The `Debug` implementation redacts both tokens.
///
/// # Examples
///
/// ```
/// use core_auth::CredentialPair;
///
/// let pair = CredentialPair::new("eyJ0eXAi...", "M.R3_BAY...");
/// assert_eq!(pair.access_token, "eyJ0eXAi...");
/// assert!(!format!("{:?}", pair).contains("eyJ0eXAi"));
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialPair {
    /// The access token attached to every request
    pub access_token: String,
    /// The refresh token handed to the refresh capability
    pub refresh_token: String,
}

impl CredentialPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .finish()
    }
}
