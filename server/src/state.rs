use crate::error::ApiError;
use anyhow::Context;
use axum::extract::FromRef;
use axum::http::{header, HeaderMap};
use axum_extra::extract::cookie::Key;
use bridge_cloud::{CloudApi, HttpCloudApi, VoicemailResolver};
use bridge_config::AppConfig;
use bridge_email::{EwsBackend, MailBackend};
use bridge_security::{
    cookie_key, Authenticator, CorrelationTokens, MemoryTokenStore, OAuthWorkflow,
    RedisTokenStore, SessionStore, TokenStore,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub(crate) struct ServerSettings {
    pub public_dir: PathBuf,
    pub public_scheme: String,
    pub redirect_path: String,
}

/// Everything a handler needs, built once at startup. Cloning is cheap.
#[derive(Clone)]
pub(crate) struct AppState {
    pub settings: Arc<ServerSettings>,
    pub key: Key,
    pub sessions: SessionStore,
    pub authenticator: Authenticator,
    pub tokens: CorrelationTokens,
    pub mail: Arc<dyn MailBackend>,
    pub cloud: Arc<dyn CloudApi>,
    pub resolver: VoicemailResolver,
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.key.clone()
    }
}

impl AppState {
    pub fn initialize(config: &AppConfig) -> anyhow::Result<Self> {
        let timeout = Duration::from_secs(config.http.timeout_secs);

        let profile = config.oauth_profile().context("build oauth profile")?;
        let workflow = OAuthWorkflow::new(profile, config.oauth.client_secret.clone(), timeout)
            .context("initialize oauth workflow")?;
        let authenticator = Authenticator::new(
            Arc::new(workflow),
            config.oauth.default_token_lifetime_secs,
        );

        let key = cookie_key(&config.session.cookie_secret).context("derive cookie key")?;
        let sessions = SessionStore::new(
            config.session.cookie_name.clone(),
            config.session.max_age_secs,
            config.session.secure,
        );

        let store: Arc<dyn TokenStore> = match config.correlation.redis_url.as_deref() {
            Some(url) => Arc::new(
                RedisTokenStore::new(url, config.correlation.key_prefix.clone())
                    .context("open redis correlation store")?,
            ),
            None => {
                tracing::warn!("REDIS_URL not set; correlation tokens are kept in process memory");
                Arc::new(MemoryTokenStore::new())
            }
        };
        let tokens =
            CorrelationTokens::new(store, Duration::from_secs(config.correlation.ttl_secs));

        let mail = Arc::new(EwsBackend::new(timeout).context("initialize EWS client")?);
        let cloud: Arc<dyn CloudApi> = Arc::new(
            HttpCloudApi::new(
                &config.cloud.api_base_url,
                &config.cloud.voicemail_path,
                &config.cloud.documents_path,
                timeout,
            )
            .context("initialize cloud API client")?,
        );
        let resolver = VoicemailResolver::new(cloud.clone(), &config.cloud.api_base_url);

        Ok(Self {
            settings: Arc::new(ServerSettings {
                public_dir: PathBuf::from(&config.server.public_dir),
                public_scheme: config.server.public_scheme.clone(),
                redirect_path: config.oauth.redirect_path.clone(),
            }),
            key,
            sessions,
            authenticator,
            tokens,
            mail,
            cloud,
            resolver,
        })
    }

    /// The provider sends the browser back to the host it was reached on.
    pub fn redirect_uri(&self, headers: &HeaderMap) -> Result<String, ApiError> {
        let host = headers
            .get(header::HOST)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|host| !host.is_empty() && !host.contains(['/', '?', '#', '@']))
            .ok_or(ApiError::BadRequest("request has no usable Host header"))?;
        Ok(format!(
            "{}://{}{}",
            self.settings.public_scheme, host, self.settings.redirect_path
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn config() -> AppConfig {
        let mut config = AppConfig::default();
        config.oauth.client_id = "plugin".to_string();
        config.oauth.client_secret = "client-secret".to_string();
        config.session.cookie_secret = "c".repeat(48);
        config
    }

    #[test]
    fn initializes_with_memory_store_when_redis_is_unset() {
        let state = AppState::initialize(&config()).expect("state");
        assert_eq!(state.tokens.backend_name(), "memory");

        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("bridge.example.com"));
        assert_eq!(
            state.redirect_uri(&headers).expect("redirect uri"),
            "https://bridge.example.com/oauth2/callback"
        );
    }

    #[test]
    fn host_with_path_characters_is_rejected() {
        let state = AppState::initialize(&config()).expect("state");
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("evil.example.com/x?"));
        assert!(matches!(
            state.redirect_uri(&headers),
            Err(ApiError::BadRequest(_))
        ));
        assert!(state.redirect_uri(&HeaderMap::new()).is_err());
    }
}
