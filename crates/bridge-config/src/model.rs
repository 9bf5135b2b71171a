use crate::ConfigError;
use bridge_core::OAuthProfile;
use serde::{Deserialize, Serialize};
use url::Url;

/// Shortest cookie secret accepted; the cookie key is derived from it.
pub const MIN_COOKIE_SECRET_LEN: usize = 32;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub oauth: OAuthConfig,
    pub cloud: CloudConfig,
    pub session: SessionConfig,
    pub correlation: CorrelationConfig,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub public_dir: String,
    /// Scheme used when deriving the OAuth redirect URI from the request host.
    pub public_scheme: String,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub auth_base_url: String,
    pub authorize_path: String,
    pub token_path: String,
    pub redirect_path: String,
    pub default_token_lifetime_secs: u64,
}

impl std::fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("auth_base_url", &self.auth_base_url)
            .field("authorize_path", &self.authorize_path)
            .field("token_path", &self.token_path)
            .field("redirect_path", &self.redirect_path)
            .field("default_token_lifetime_secs", &self.default_token_lifetime_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    pub api_base_url: String,
    pub voicemail_path: String,
    pub documents_path: String,
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub cookie_secret: String,
    pub max_age_secs: Option<i64>,
    pub secure: bool,
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("cookie_name", &self.cookie_name)
            .field("cookie_secret", &"[REDACTED]")
            .field("max_age_secs", &self.max_age_secs)
            .field("secure", &self.secure)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationConfig {
    /// When unset, tokens live in an in-process map (single instance only).
    pub redis_url: Option<String>,
    pub key_prefix: String,
    pub ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            public_dir: "public".to_string(),
            public_scheme: "https".to_string(),
        }
    }
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            auth_base_url: "https://auth.us-east-1.inindca.com".to_string(),
            authorize_path: "/authorize".to_string(),
            token_path: "/token".to_string(),
            redirect_path: "/oauth2/callback".to_string(),
            default_token_lifetime_secs: 3600,
        }
    }
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://public-api.us-east-1.inindca.com".to_string(),
            voicemail_path: "/api/v1/voicemail/messages".to_string(),
            documents_path: "/api/v1/contentmanagement/documents".to_string(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "PureCloudOutlookSession".to_string(),
            cookie_secret: String::new(),
            max_age_secs: None,
            secure: true,
        }
    }
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            key_prefix: "bridge:correlation".to_string(),
            ttl_secs: 60,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

impl AppConfig {
    /// Applies deployment overrides. `lookup` is `std::env::var` at startup and a map in tests.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(value) = lookup("OAUTHID") {
            self.oauth.client_id = value;
        }
        if let Some(value) = lookup("OAUTHSECRET") {
            self.oauth.client_secret = value;
        }
        if let Some(value) = lookup("COOKIESTORE") {
            self.session.cookie_secret = value;
        }
        if let Some(value) = lookup("REDIS_URL") {
            self.correlation.redis_url = Some(value);
        }
        if let Some(value) = lookup("API_BASE_URL") {
            self.cloud.api_base_url = value;
        }
        if let Some(port) = lookup("PORT") {
            match port.parse::<u16>() {
                Ok(port) => self.server.bind_addr = format!("0.0.0.0:{port}"),
                Err(_) => tracing::warn!(value = %port, "ignoring invalid PORT override"),
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.oauth.client_id.trim().is_empty() {
            return Err(ConfigError::Invalid("oauth.client_id is required".to_string()));
        }
        if self.oauth.client_secret.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "oauth.client_secret is required".to_string(),
            ));
        }
        if self.session.cookie_secret.len() < MIN_COOKIE_SECRET_LEN {
            return Err(ConfigError::Invalid(format!(
                "session.cookie_secret must be at least {MIN_COOKIE_SECRET_LEN} bytes"
            )));
        }
        if self.correlation.ttl_secs == 0 {
            return Err(ConfigError::Invalid(
                "correlation.ttl_secs must be positive".to_string(),
            ));
        }
        if self.http.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "http.timeout_secs must be positive".to_string(),
            ));
        }
        if !self.oauth.redirect_path.starts_with('/') {
            return Err(ConfigError::Invalid(
                "oauth.redirect_path must start with '/'".to_string(),
            ));
        }
        Url::parse(&self.cloud.api_base_url)?;
        let profile = self.oauth_profile()?;
        if profile.auth_url.scheme() != "https" || profile.token_url.scheme() != "https" {
            return Err(ConfigError::Invalid(
                "oauth.auth_base_url must use HTTPS".to_string(),
            ));
        }
        Ok(())
    }

    pub fn oauth_profile(&self) -> Result<OAuthProfile, ConfigError> {
        let base = Url::parse(&self.oauth.auth_base_url)?;
        Ok(OAuthProfile {
            client_id: self.oauth.client_id.trim().to_string(),
            auth_url: base.join(&self.oauth.authorize_path)?,
            token_url: base.join(&self.oauth.token_path)?,
            redirect_path: self.oauth.redirect_path.clone(),
        })
    }
}
