use crate::SecurityError;
use axum_extra::extract::cookie::{Cookie, Key, PrivateCookieJar, SameSite};
use bridge_core::Session;

/// Derives the cookie encryption key. Shorter secrets are rejected instead of padded.
pub fn cookie_key(secret: &str) -> Result<Key, SecurityError> {
    if secret.len() < 32 {
        return Err(SecurityError::CookieKey(
            "cookie secret must be at least 32 bytes".to_string(),
        ));
    }
    Ok(Key::derive_from(secret.as_bytes()))
}

/// Stores the [`Session`] as JSON inside one encrypted, authenticated cookie.
#[derive(Debug, Clone)]
pub struct SessionStore {
    cookie_name: String,
    max_age: Option<time::Duration>,
    secure: bool,
}

impl SessionStore {
    pub fn new(cookie_name: impl Into<String>, max_age_secs: Option<i64>, secure: bool) -> Self {
        Self {
            cookie_name: cookie_name.into(),
            max_age: max_age_secs.map(time::Duration::seconds),
            secure,
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Missing, tampered, or unreadable cookies all load as an empty session.
    pub fn load(&self, jar: &PrivateCookieJar) -> Session {
        let Some(cookie) = jar.get(&self.cookie_name) else {
            return Session::default();
        };
        if cookie.value().is_empty() {
            return Session::default();
        }
        match serde_json::from_str(cookie.value()) {
            Ok(session) => session,
            Err(err) => {
                tracing::debug!(error = %err, "discarding unreadable session cookie");
                Session::default()
            }
        }
    }

    pub fn save(
        &self,
        jar: PrivateCookieJar,
        session: &Session,
    ) -> Result<PrivateCookieJar, SecurityError> {
        let value = serde_json::to_string(session)?;
        let mut cookie = Cookie::build((self.cookie_name.clone(), value))
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(self.same_site());
        if let Some(max_age) = self.max_age {
            cookie = cookie.max_age(max_age);
        }
        Ok(jar.add(cookie.build()))
    }

    /// Zero max-age; the browser discards the cookie. Safe to repeat.
    pub fn invalidate(&self, jar: PrivateCookieJar) -> PrivateCookieJar {
        let cookie = Cookie::build((self.cookie_name.clone(), String::new()))
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(self.same_site())
            .max_age(time::Duration::ZERO)
            .build();
        jar.add(cookie)
    }

    // Plugin pages load inside the mail client's frame, so a secure cookie must
    // be sent cross-site.
    fn same_site(&self) -> SameSite {
        if self.secure {
            SameSite::None
        } else {
            SameSite::Lax
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, HeaderMap, HeaderValue};
    use chrono::{Duration, Utc};

    fn key() -> Key {
        cookie_key("0123456789abcdef0123456789abcdef").expect("key")
    }

    fn store() -> SessionStore {
        SessionStore::new("PureCloudOutlookSession", Some(3600), true)
    }

    #[test]
    fn saved_session_loads_back() {
        let store = store();
        let session = Session {
            credential: Some("token".to_string()),
            expires_at: Some(Utc::now() + Duration::seconds(60)),
            pending_redirect: None,
            oauth_state: None,
        };

        let jar = store
            .save(PrivateCookieJar::new(key()), &session)
            .expect("save");

        assert_eq!(store.load(&jar), session);
    }

    #[test]
    fn tampered_cookie_loads_as_empty_session() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("PureCloudOutlookSession=not-a-sealed-value"),
        );
        let jar = PrivateCookieJar::from_headers(&headers, key());

        assert_eq!(store().load(&jar), Session::default());
    }

    #[test]
    fn short_secret_is_rejected() {
        assert!(matches!(
            cookie_key("too-short"),
            Err(SecurityError::CookieKey(_))
        ));
    }

    #[test]
    fn invalidating_twice_stays_unauthenticated() {
        let store = store();
        let session = Session {
            credential: Some("token".to_string()),
            expires_at: Some(Utc::now() + Duration::seconds(60)),
            ..Session::default()
        };
        let jar = store
            .save(PrivateCookieJar::new(key()), &session)
            .expect("save");

        let jar = store.invalidate(jar);
        assert_eq!(store.load(&jar), Session::default());
        let jar = store.invalidate(jar);
        assert_eq!(store.load(&jar), Session::default());
        assert!(!store.load(&jar).is_authenticated(Utc::now()));
    }
}
