use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Token refresh failed: {0}")]
    TokenRefreshFailed(String),

    #[error("Authorization code exchange failed: {0}")]
    InvalidAuthCode(String),

    #[error("Invalid OAuth configuration: {0}")]
    InvalidConfig(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Unexpected token response: {0}")]
    InvalidTokenResponse(String),
}

pub type Result<T> = std::result::Result<T, AuthError>;
