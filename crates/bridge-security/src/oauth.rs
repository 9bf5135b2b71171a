use crate::SecurityError;
use async_trait::async_trait;
use bridge_core::OAuthProfile;
use oauth2::{
    basic::BasicClient, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken,
    RedirectUrl, TokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone, Serialize, Deserialize)]
pub struct AuthorizationRequest {
    pub url: String,
    pub csrf_state: String,
}

impl std::fmt::Debug for AuthorizationRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationRequest")
            .field("url", &self.url)
            .field("csrf_state", &"[REDACTED]")
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct OAuthTokenResult {
    pub access_token: String,
    pub expires_in_secs: Option<u64>,
}

impl std::fmt::Debug for OAuthTokenResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthTokenResult")
            .field("access_token", &"[REDACTED]")
            .field("expires_in_secs", &self.expires_in_secs)
            .finish()
    }
}

/// The identity provider as seen by the auth state machine.
#[async_trait]
pub trait TokenExchanger: Send + Sync {
    /// Builds the provider URL to send the browser to. Local only, no network.
    fn authorization_request(
        &self,
        redirect_uri: &str,
    ) -> Result<AuthorizationRequest, SecurityError>;

    /// Server-to-server code exchange at the token endpoint.
    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<OAuthTokenResult, SecurityError>;
}

#[derive(Clone)]
pub struct OAuthWorkflow {
    profile: OAuthProfile,
    client_secret: String,
    http: reqwest::Client,
}

impl std::fmt::Debug for OAuthWorkflow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthWorkflow")
            .field("profile", &self.profile)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

impl OAuthWorkflow {
    /// Create a new OAuth workflow, validating the profile for security issues.
    pub fn new(
        profile: OAuthProfile,
        client_secret: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SecurityError> {
        Self::validate_profile(&profile)?;
        let client_secret = client_secret.into();
        if client_secret.trim().is_empty() {
            return Err(SecurityError::OAuth("Client secret is required".to_string()));
        }

        // The token endpoint must answer directly; following redirects would leak the code.
        let http = reqwest::ClientBuilder::new()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .build()?;

        Ok(Self {
            profile,
            client_secret,
            http,
        })
    }

    fn validate_profile(profile: &OAuthProfile) -> Result<(), SecurityError> {
        if profile.auth_url.scheme() != "https" {
            return Err(SecurityError::OAuth(
                "Authorization URL must use HTTPS".to_string(),
            ));
        }
        if profile.token_url.scheme() != "https" {
            return Err(SecurityError::OAuth("Token URL must use HTTPS".to_string()));
        }

        let client_id = profile.client_id.trim();
        if client_id.is_empty() {
            return Err(SecurityError::OAuth("Client ID is required".to_string()));
        }
        if client_id.len() > 512 {
            return Err(SecurityError::OAuth(
                "Client ID appears invalid (too long)".to_string(),
            ));
        }

        if profile.auth_url.host_str().is_none() {
            return Err(SecurityError::OAuth(
                "Authorization URL must have a valid host".to_string(),
            ));
        }
        if profile.token_url.host_str().is_none() {
            return Err(SecurityError::OAuth(
                "Token URL must have a valid host".to_string(),
            ));
        }

        Ok(())
    }
}

#[async_trait]
impl TokenExchanger for OAuthWorkflow {
    fn authorization_request(
        &self,
        redirect_uri: &str,
    ) -> Result<AuthorizationRequest, SecurityError> {
        let client = BasicClient::new(ClientId::new(self.profile.client_id.clone()))
            .set_auth_uri(AuthUrl::new(self.profile.auth_url.as_str().to_string())?)
            .set_token_uri(TokenUrl::new(self.profile.token_url.as_str().to_string())?)
            .set_redirect_uri(RedirectUrl::new(redirect_uri.to_string())?);

        let (auth_url, csrf_state) = client.authorize_url(CsrfToken::new_random).url();

        Ok(AuthorizationRequest {
            url: auth_url.to_string(),
            csrf_state: csrf_state.secret().to_string(),
        })
    }

    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<OAuthTokenResult, SecurityError> {
        // BasicClient sends the client credentials as HTTP basic auth.
        let client = BasicClient::new(ClientId::new(self.profile.client_id.clone()))
            .set_client_secret(ClientSecret::new(self.client_secret.clone()))
            .set_auth_uri(AuthUrl::new(self.profile.auth_url.as_str().to_string())?)
            .set_token_uri(TokenUrl::new(self.profile.token_url.as_str().to_string())?)
            .set_redirect_uri(RedirectUrl::new(redirect_uri.to_string())?);

        let token = client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(&self.http)
            .await
            .map_err(|err| SecurityError::Exchange(err.to_string()))?;

        Ok(OAuthTokenResult {
            access_token: token.access_token().secret().to_string(),
            expires_in_secs: token.expires_in().map(|duration| duration.as_secs()),
        })
    }
}
