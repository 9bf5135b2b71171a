//! Per-request authentication state machine.
//!
//! `Unauthenticated -> AwaitingProviderCallback -> Authenticated -> Expired`, where
//! `Expired` is handled exactly like `Unauthenticated`. Every transition mutates the
//! [`Session`] in place; callers persist it through the session store.

use crate::{SecurityError, TokenExchanger};
use bridge_core::Session;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::sync::Arc;

const FALLBACK_LIFETIME_SECS: i64 = 3600;

/// `None` when `secs` does not fit a signed duration.
fn lifetime_from_secs(secs: u64) -> Option<Duration> {
    i64::try_from(secs).ok().and_then(Duration::try_seconds)
}

/// Collapses leading slashes and backslashes: `//host/x` must stay a path on this host.
fn local_redirect_target(original_uri: &str) -> String {
    format!("/{}", original_uri.trim_start_matches(['/', '\\']))
}

fn is_local_target(target: &str) -> bool {
    target.starts_with('/') && !target[1..].starts_with(['/', '\\'])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    AwaitingProviderCallback,
    Authenticated,
    Expired,
}

pub fn evaluate(session: &Session, now: DateTime<Utc>) -> AuthState {
    if session.is_authenticated(now) {
        AuthState::Authenticated
    } else if session.credential.is_some() {
        AuthState::Expired
    } else if session.pending_redirect.is_some() {
        AuthState::AwaitingProviderCallback
    } else {
        AuthState::Unauthenticated
    }
}

/// Outcome of running a protected request through the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Admitted { credential: String },
    /// Send the browser to the identity provider; the session now holds the pending redirect.
    Redirect { location: String },
}

/// Query string of `GET /oauth2/callback`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
}

#[derive(Clone)]
pub struct Authenticator {
    exchanger: Arc<dyn TokenExchanger>,
    default_lifetime: Duration,
}

impl Authenticator {
    pub fn new(exchanger: Arc<dyn TokenExchanger>, default_lifetime_secs: u64) -> Self {
        Self {
            exchanger,
            default_lifetime: lifetime_from_secs(default_lifetime_secs)
                .unwrap_or_else(|| Duration::seconds(FALLBACK_LIFETIME_SECS)),
        }
    }

    /// Admits an unexpired credential. Otherwise remembers `original_uri` and
    /// starts the provider round-trip.
    pub fn admit(
        &self,
        session: &mut Session,
        original_uri: &str,
        redirect_uri: &str,
        now: DateTime<Utc>,
    ) -> Result<Admission, SecurityError> {
        if let Some(credential) = session.active_credential(now) {
            return Ok(Admission::Admitted {
                credential: credential.to_string(),
            });
        }

        let target = local_redirect_target(original_uri);
        let request = self.exchanger.authorization_request(redirect_uri)?;
        tracing::info!(target_uri = %target, "redirecting to identity provider");
        session.pending_redirect = Some(target);
        session.oauth_state = Some(request.csrf_state);

        Ok(Admission::Redirect {
            location: request.url,
        })
    }

    /// Exchanges the code and returns the path the user originally asked for.
    ///
    /// On any error the session is left exactly as it was.
    pub async fn complete(
        &self,
        session: &mut Session,
        params: &CallbackParams,
        redirect_uri: &str,
        now: DateTime<Utc>,
    ) -> Result<String, SecurityError> {
        let target = session
            .pending_redirect
            .clone()
            .ok_or(SecurityError::MissingPendingRedirect)?;
        if !is_local_target(&target) {
            return Err(SecurityError::UnsafeRedirect);
        }
        let code = params
            .code
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .ok_or(SecurityError::MissingCode)?;
        if let Some(expected) = session.oauth_state.as_deref() {
            if params.state.as_deref() != Some(expected) {
                return Err(SecurityError::StateMismatch);
            }
        }

        let token = self.exchanger.exchange_code(code, redirect_uri).await?;
        let lifetime = token
            .expires_in_secs
            .and_then(lifetime_from_secs)
            .unwrap_or(self.default_lifetime);
        let expires_at = now
            .checked_add_signed(lifetime)
            .or_else(|| now.checked_add_signed(self.default_lifetime))
            .ok_or_else(|| SecurityError::Exchange("token lifetime out of range".to_string()))?;

        session.credential = Some(token.access_token);
        session.expires_at = Some(expires_at);
        session.pending_redirect = None;
        session.oauth_state = None;
        tracing::info!(expires_at = %expires_at, "authorization code exchanged");

        Ok(target)
    }
}
