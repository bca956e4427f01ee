//! OAuth 2.0 Authorization Code Flow for the Microsoft identity platform
//!
//! # Overview
//!
//! The flow manager handles:
//! - Building authorization URLs
//! - Exchanging authorization codes for a [`CredentialPair`]
//! - Refreshing access tokens
//!
//! [`OAuthFlowManager`] implements [`TokenRefresher`], so it can be handed
//! straight to the request pipeline as its refresh capability.
//!
//! # Security
//!
//! Tokens, codes and client secrets are never logged.
//!
//! # Example
//!
//! ```no_run
//! use core_auth::oauth::{OAuthConfig, OAuthFlowManager};
//! use std::sync::Arc;
//!
//! # async fn example() -> core_auth::Result<()> {
//! # use bridge_traits::http::HttpClient;
//! # let http_client: Arc<dyn HttpClient> = todo!();
//! let config = OAuthConfig::microsoft("your-client-id", "http://localhost:8080/callback");
//! let flow_manager = OAuthFlowManager::new(config, http_client);
//!
//! let auth_url = flow_manager.build_auth_url(Some("csrf-state"))?;
//! // Redirect user to auth_url, then:
//! let credentials = flow_manager.exchange_code("code_from_callback").await?;
//! # let _ = (auth_url, credentials);
//! # Ok(())
//! # }
//! ```

use crate::error::{AuthError, Result};
use crate::refresh::TokenRefresher;
use crate::types::CredentialPair;
use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use bytes::Bytes;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use url::Url;

const MICROSOFT_AUTHORIZE_URL: &str =
    "https://login.microsoftonline.com/common/oauth2/v2.0/authorize";
const MICROSOFT_TOKEN_URL: &str = "https://login.microsoftonline.com/common/oauth2/v2.0/token";

/// Scopes requested by [`OAuthConfig::microsoft`]
pub const DEFAULT_SCOPES: &[&str] = &["offline_access", "openid", "user.read", "files.readwrite"];

/// OAuth 2.0 client configuration.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    /// OAuth client ID
    pub client_id: String,
    /// OAuth client secret (absent for public clients)
    pub client_secret: Option<String>,
    /// Redirect URI for OAuth callback
    pub redirect_uri: String,
    /// List of OAuth scopes to request
    pub scopes: Vec<String>,
    /// Authorization endpoint URL
    pub auth_url: String,
    /// Token endpoint URL
    pub token_url: String,
}

impl OAuthConfig {
    /// Configuration for the common Microsoft identity endpoints with [`DEFAULT_SCOPES`].
    pub fn microsoft(client_id: impl Into<String>, redirect_uri: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: None,
            redirect_uri: redirect_uri.into(),
            scopes: DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect(),
            auth_url: MICROSOFT_AUTHORIZE_URL.to_string(),
            token_url: MICROSOFT_TOKEN_URL.to_string(),
        }
    }

    pub fn with_client_secret(mut self, client_secret: impl Into<String>) -> Self {
        self.client_secret = Some(client_secret.into());
        self
    }

    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }
}

/// OAuth 2.0 flow manager.
pub struct OAuthFlowManager {
    config: OAuthConfig,
    http_client: Arc<dyn HttpClient>,
}

impl OAuthFlowManager {
    pub fn new(config: OAuthConfig, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            config,
            http_client,
        }
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// Build the URL the user visits to grant consent.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidConfig`] if the authorization endpoint is
    /// not a valid URL.
    #[instrument(skip(self, state))]
    pub fn build_auth_url(&self, state: Option<&str>) -> Result<String> {
        let mut url = Url::parse(&self.config.auth_url)
            .map_err(|e| AuthError::InvalidConfig(format!("Invalid auth URL: {}", e)))?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("client_id", &self.config.client_id);
            query.append_pair("redirect_uri", &self.config.redirect_uri);
            query.append_pair("response_type", "code");
            query.append_pair("scope", &self.config.scopes.join(" "));
            query.append_pair("prompt", "consent");
            if let Some(state) = state {
                query.append_pair("state", state);
            }
        }

        debug!("Built authorization URL");

        Ok(url.to_string())
    }

    /// Exchange an authorization code for a credential pair.
    ///
    /// # Errors
    ///
    /// - [`AuthError::NetworkError`] if the token endpoint is unreachable
    /// - [`AuthError::InvalidAuthCode`] if it rejects the code
    /// - [`AuthError::InvalidTokenResponse`] if the response cannot be parsed
    ///   or carries no refresh token
    #[instrument(skip(self, code))]
    pub async fn exchange_code(&self, code: &str) -> Result<CredentialPair> {
        let scope = self.config.scopes.join(" ");
        let mut params = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("scope", scope.as_str()),
        ];
        if let Some(ref client_secret) = self.config.client_secret {
            params.push(("client_secret", client_secret.as_str()));
        }

        debug!("Exchanging authorization code for tokens");

        let response = self.post_form(&params).await?;

        if !response.is_success() {
            let status = response.status;
            let error_body = read_error_body(&response);

            warn!(
                status = status,
                error = %error_body,
                "Token exchange failed while exchanging authorization code"
            );

            return Err(AuthError::InvalidAuthCode(format!(
                "Token endpoint returned {}: {}",
                status, error_body
            )));
        }

        let token_response = parse_token_response(&response)?;
        let refresh_token = token_response.refresh_token.ok_or_else(|| {
            AuthError::InvalidTokenResponse(
                "Token endpoint returned no refresh_token; is offline_access requested?"
                    .to_string(),
            )
        })?;

        info!(
            expires_in = token_response.expires_in,
            "Exchanged authorization code for tokens"
        );

        Ok(CredentialPair::new(token_response.access_token, refresh_token))
    }

    /// Redeem a refresh token for a new pair.
    ///
    /// The old refresh token is kept when the endpoint does not rotate it.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::TokenRefreshFailed`] carrying the status and body
    /// on any non-2xx response or transport failure.
    #[instrument(skip(self, refresh_token))]
    pub async fn refresh_access_token(&self, refresh_token: &str) -> Result<CredentialPair> {
        let scope = self.config.scopes.join(" ");
        let mut params = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.config.client_id.as_str()),
            ("scope", scope.as_str()),
        ];
        if let Some(ref client_secret) = self.config.client_secret {
            params.push(("client_secret", client_secret.as_str()));
        }

        debug!("Refreshing access token");

        let response = self.post_form(&params).await.map_err(|e| match e {
            AuthError::NetworkError(message) => AuthError::TokenRefreshFailed(message),
            other => other,
        })?;

        if !response.is_success() {
            let status = response.status;
            let error_body = read_error_body(&response);

            warn!(
                status = status,
                error = %error_body,
                "Token refresh rejected by token endpoint"
            );

            return Err(AuthError::TokenRefreshFailed(format!(
                "Token endpoint returned {}: {}",
                status, error_body
            )));
        }

        let token_response = parse_token_response(&response)?;

        info!(
            expires_in = token_response.expires_in,
            rotated = token_response.refresh_token.is_some(),
            "Refreshed access token"
        );

        Ok(CredentialPair::new(
            token_response.access_token,
            token_response
                .refresh_token
                .unwrap_or_else(|| refresh_token.to_string()),
        ))
    }

    async fn post_form(&self, params: &[(&str, &str)]) -> Result<HttpResponse> {
        let encoded_body = serde_urlencoded::to_string(params).map_err(|e| {
            AuthError::InvalidConfig(format!("Failed to encode token request: {}", e))
        })?;

        let request = HttpRequest::new(HttpMethod::Post, self.config.token_url.clone())
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(Bytes::from(encoded_body));

        self.http_client
            .execute(request)
            .await
            .map_err(|e| AuthError::NetworkError(e.to_string()))
    }
}

#[async_trait]
impl TokenRefresher for OAuthFlowManager {
    async fn refresh(&self, refresh_token: &str) -> Result<CredentialPair> {
        self.refresh_access_token(refresh_token).await
    }
}

fn read_error_body(response: &HttpResponse) -> String {
    response
        .text()
        .unwrap_or_else(|_| "Unable to read error response".to_string())
}

fn parse_token_response(response: &HttpResponse) -> Result<TokenResponse> {
    response
        .json()
        .map_err(|e| AuthError::InvalidTokenResponse(format!("Failed to parse token response: {}", e)))
}

/// JSON body returned by the token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use bridge_traits::http::HttpResponse;
    use mockall::mock;
    use std::collections::HashMap;

    mock! {
        HttpClientImpl {}

        #[async_trait]
        impl HttpClient for HttpClientImpl {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
        }
    }

    fn json_response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from(body.to_string()),
        }
    }

    fn form_fields(request: &HttpRequest) -> HashMap<String, String> {
        let body = request.body.clone().unwrap_or_default();
        url::form_urlencoded::parse(&body).into_owned().collect()
    }

    fn test_config() -> OAuthConfig {
        OAuthConfig::microsoft("test-client", "http://localhost:8080/callback")
    }

    #[test]
    fn test_microsoft_config_defaults() {
        let config = test_config();

        assert_eq!(config.client_id, "test-client");
        assert!(config.client_secret.is_none());
        assert_eq!(
            config.scopes,
            vec!["offline_access", "openid", "user.read", "files.readwrite"]
        );
        assert!(config.token_url.ends_with("/oauth2/v2.0/token"));
    }

    #[test]
    fn test_build_auth_url() {
        let manager = OAuthFlowManager::new(test_config(), Arc::new(MockHttpClientImpl::new()));
        let url = manager.build_auth_url(Some("xyz")).unwrap();

        assert!(url.starts_with(MICROSOFT_AUTHORIZE_URL));
        assert!(url.contains("client_id=test-client"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("prompt=consent"));
        assert!(url.contains("state=xyz"));
        assert!(url.contains("scope=offline_access+openid") || url.contains("scope=offline_access%20openid"));
    }

    #[test]
    fn test_build_auth_url_without_state() {
        let manager = OAuthFlowManager::new(test_config(), Arc::new(MockHttpClientImpl::new()));
        let url = manager.build_auth_url(None).unwrap();

        assert!(!url.contains("state="));
    }

    #[test]
    fn test_build_auth_url_invalid_url() {
        let mut config = test_config();
        config.auth_url = "not a valid url".to_string();

        let manager = OAuthFlowManager::new(config, Arc::new(MockHttpClientImpl::new()));
        assert!(matches!(
            manager.build_auth_url(None),
            Err(AuthError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_exchange_code_returns_pair() {
        let mut http = MockHttpClientImpl::new();
        http.expect_execute()
            .withf(|request| {
                let fields = form_fields(request);
                request.method == HttpMethod::Post
                    && fields.get("grant_type").map(String::as_str) == Some("authorization_code")
                    && fields.get("code").map(String::as_str) == Some("the-code")
                    && fields.get("scope").map(String::as_str)
                        == Some("offline_access openid user.read files.readwrite")
            })
            .times(1)
            .returning(|_| {
                Ok(json_response(
                    200,
                    r#"{"access_token":"a1","refresh_token":"r1","expires_in":3600}"#,
                ))
            });

        let manager = OAuthFlowManager::new(test_config(), Arc::new(http));
        let pair = manager.exchange_code("the-code").await.unwrap();

        assert_eq!(pair, CredentialPair::new("a1", "r1"));
    }

    #[tokio::test]
    async fn test_exchange_code_rejected() {
        let mut http = MockHttpClientImpl::new();
        http.expect_execute()
            .returning(|_| Ok(json_response(400, r#"{"error":"invalid_grant"}"#)));

        let manager = OAuthFlowManager::new(test_config(), Arc::new(http));
        let result = manager.exchange_code("bad").await;

        assert!(matches!(result, Err(AuthError::InvalidAuthCode(msg)) if msg.contains("invalid_grant")));
    }

    #[tokio::test]
    async fn test_refresh_keeps_old_refresh_token_when_not_rotated() {
        let mut http = MockHttpClientImpl::new();
        http.expect_execute()
            .withf(|request| {
                let fields = form_fields(request);
                fields.get("grant_type").map(String::as_str) == Some("refresh_token")
                    && fields.get("refresh_token").map(String::as_str) == Some("r1")
                    && fields.get("scope").map(String::as_str)
                        == Some("offline_access openid user.read files.readwrite")
            })
            .times(1)
            .returning(|_| Ok(json_response(200, r#"{"access_token":"a2"}"#)));

        let manager = OAuthFlowManager::new(test_config(), Arc::new(http));
        let pair = manager.refresh("r1").await.unwrap();

        assert_eq!(pair, CredentialPair::new("a2", "r1"));
    }

    #[tokio::test]
    async fn test_refresh_failure_has_status_and_body() {
        let mut http = MockHttpClientImpl::new();
        http.expect_execute()
            .times(1)
            .returning(|_| Ok(json_response(401, r#"{"error":"invalid_client"}"#)));

        let manager = OAuthFlowManager::new(test_config(), Arc::new(http));
        let result = manager.refresh_access_token("r1").await;

        match result {
            Err(AuthError::TokenRefreshFailed(message)) => {
                assert!(message.contains("401"));
                assert!(message.contains("invalid_client"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_refresh_transport_failure() {
        let mut http = MockHttpClientImpl::new();
        http.expect_execute()
            .returning(|_| Err(BridgeError::OperationFailed("connection reset".to_string())));

        let manager = OAuthFlowManager::new(test_config(), Arc::new(http));
        let result = manager.refresh_access_token("r1").await;

        assert!(matches!(result, Err(AuthError::TokenRefreshFailed(_))));
    }

    #[test]
    fn test_token_response_deserialization_minimal() {
        let response: TokenResponse = serde_json::from_str(r#"{"access_token":"token"}"#).unwrap();
        assert_eq!(response.access_token, "token");
        assert_eq!(response.refresh_token, None);
        assert_eq!(response.expires_in, 3600);
    }
}
