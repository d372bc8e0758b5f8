//! OAuth2 authorization-code flow for Dropbox.

use oauth2::basic::BasicClient;
use oauth2::{
    AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, EndpointNotSet,
    EndpointSet, RedirectUrl, TokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use mdstore_common::{Error, Result};

use crate::session::Credential;

/// OAuth2 authorization endpoint.
pub const DROPBOX_AUTH_URL: &str = "https://www.dropbox.com/oauth2/authorize";
/// OAuth2 token endpoint.
pub const DROPBOX_TOKEN_URL: &str = "https://api.dropboxapi.com/oauth2/token";

fn default_auth_url() -> String {
    DROPBOX_AUTH_URL.to_string()
}

fn default_token_url() -> String {
    DROPBOX_TOKEN_URL.to_string()
}

/// App credentials and OAuth2 endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Dropbox app key (OAuth2 client ID).
    pub app_key: String,
    /// Dropbox app secret (OAuth2 client secret).
    pub app_secret: String,
    #[serde(default = "default_auth_url")]
    pub auth_url: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    /// Without a redirect the provider shows the code for the user to paste.
    #[serde(default)]
    pub redirect_url: Option<String>,
}

impl AuthConfig {
    pub fn new(app_key: impl Into<String>, app_secret: impl Into<String>) -> Self {
        Self {
            app_key: app_key.into(),
            app_secret: app_secret.into(),
            auth_url: default_auth_url(),
            token_url: default_token_url(),
            redirect_url: None,
        }
    }
}

type DropboxOAuthClient =
    BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// OAuth2 authentication manager for Dropbox.
pub struct AuthManager {
    client: DropboxOAuthClient,
    http: oauth2::reqwest::Client,
}

impl AuthManager {
    /// Create a new authentication manager.
    ///
    /// # Errors
    /// - Any configured URL fails to parse
    /// - HTTP client cannot be built
    pub fn new(config: AuthConfig) -> Result<Self> {
        let mut client = BasicClient::new(ClientId::new(config.app_key))
            .set_client_secret(ClientSecret::new(config.app_secret))
            .set_auth_uri(
                AuthUrl::new(config.auth_url)
                    .map_err(|e| Error::InvalidInput(format!("Invalid auth URL: {}", e)))?,
            )
            .set_token_uri(
                TokenUrl::new(config.token_url)
                    .map_err(|e| Error::InvalidInput(format!("Invalid token URL: {}", e)))?,
            )
            // Dropbox takes client_id and client_secret as form fields.
            .set_auth_type(AuthType::RequestBody);

        if let Some(redirect) = config.redirect_url {
            client = client.set_redirect_uri(
                RedirectUrl::new(redirect)
                    .map_err(|e| Error::InvalidInput(format!("Invalid redirect URL: {}", e)))?,
            );
        }

        // The token endpoint must not be followed through redirects.
        let http = oauth2::reqwest::ClientBuilder::new()
            .redirect(oauth2::reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| Error::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, http })
    }

    /// Generate the authorization URL for the user to visit.
    ///
    /// Returns the URL and the CSRF state it carries.
    pub fn authorization_url(&self) -> (String, String) {
        let (auth_url, csrf_token) = self.client.authorize_url(CsrfToken::new_random).url();
        (auth_url.to_string(), csrf_token.secret().clone())
    }

    /// Exchange an authorization code for a bearer credential.
    ///
    /// A rejected code and an unreachable token endpoint both surface as
    /// `Authentication`.
    pub async fn exchange_code(&self, code: &str) -> Result<Credential> {
        let token = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(&self.http)
            .await
            .map_err(|e| Error::Authentication(format!("Token exchange failed: {}", e)))?;

        info!("Obtained Dropbox access token");
        Ok(Credential::new(token.access_token().secret().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(token_url: String) -> AuthConfig {
        AuthConfig {
            token_url,
            ..AuthConfig::new("test_key", "test_secret")
        }
    }

    #[test]
    fn test_auth_config_defaults_from_json() {
        let config: AuthConfig =
            serde_json::from_str(r#"{"app_key": "k", "app_secret": "s"}"#).unwrap();
        assert_eq!(config.auth_url, DROPBOX_AUTH_URL);
        assert_eq!(config.token_url, DROPBOX_TOKEN_URL);
        assert!(config.redirect_url.is_none());
    }

    #[test]
    fn test_invalid_token_url_rejected() {
        let result = AuthManager::new(test_config("not a url".to_string()));
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_authorization_url_generation() {
        let manager = AuthManager::new(AuthConfig::new("test_key", "test_secret")).unwrap();
        let (url, csrf_token) = manager.authorization_url();

        assert!(url.starts_with(DROPBOX_AUTH_URL));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("client_id=test_key"));
        assert!(!csrf_token.is_empty());
    }

    #[tokio::test]
    async fn test_exchange_code_posts_form_fields() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=the-code"))
            .and(body_string_contains("client_id=test_key"))
            .and(body_string_contains("client_secret=test_secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "sl.token",
                "token_type": "bearer",
                "account_id": "dbid:abc",
                "uid": "42"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let manager = AuthManager::new(test_config(format!("{}/oauth2/token", server.uri()))).unwrap();
        let credential = manager.exchange_code("the-code").await.unwrap();
        assert_eq!(credential.secret(), "sl.token");
    }

    #[tokio::test]
    async fn test_exchange_code_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "code doesn't exist or has expired"
            })))
            .mount(&server)
            .await;

        let manager = AuthManager::new(test_config(format!("{}/oauth2/token", server.uri()))).unwrap();
        let err = manager.exchange_code("stale").await.unwrap_err();
        assert!(matches!(err, Error::Authentication(_)));
    }
}
