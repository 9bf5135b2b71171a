use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::{FromRequestParts, Query, Request, State};
use axum::http::request::Parts;
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::PrivateCookieJar;
use bridge_core::Session;
use bridge_security::{Admission, CallbackParams, SessionStore};
use chrono::Utc;

pub(crate) fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// Served without a session even though they are HTML.
const PUBLIC_PAGES: &[&str] = &["/internalinstall.html"];

/// Only HTML pages sign the user in. Manifests and static assets are fetched by
/// the mail client without the session cookie.
fn needs_session(path: &str) -> bool {
    let path = path.to_ascii_lowercase();
    (path.ends_with(".html") || path.ends_with(".htm")) && !PUBLIC_PAGES.contains(&path.as_str())
}

/// Gate for browser pages: admit an authenticated session, otherwise start sign-in.
pub(crate) async fn require_session(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !needs_session(request.uri().path()) {
        return Ok(next.run(request).await);
    }

    let jar = PrivateCookieJar::from_headers(request.headers(), state.key.clone());
    let mut session = state.sessions.load(&jar);
    let now = Utc::now();
    if session.is_authenticated(now) {
        return Ok(next.run(request).await);
    }

    let redirect_uri = state.redirect_uri(request.headers())?;
    let original_uri = request
        .uri()
        .path_and_query()
        .map(|target| target.as_str().to_string())
        .unwrap_or_else(|| "/".to_string());

    match state
        .authenticator
        .admit(&mut session, &original_uri, &redirect_uri, now)?
    {
        Admission::Admitted { .. } => Ok(next.run(request).await),
        Admission::Redirect { location } => {
            let jar = state.sessions.save(jar, &session)?;
            Ok((jar, found(&location)).into_response())
        }
    }
}

pub(crate) async fn oauth_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<CallbackParams>,
) -> Result<Response, ApiError> {
    let jar = PrivateCookieJar::from_headers(&headers, state.key.clone());
    let mut session = state.sessions.load(&jar);
    let redirect_uri = state.redirect_uri(&headers)?;

    let target = state
        .authenticator
        .complete(&mut session, &params, &redirect_uri, Utc::now())
        .await?;

    let jar = state.sessions.save(jar, &session)?;
    Ok((jar, found(&target)).into_response())
}

pub(crate) async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let jar = PrivateCookieJar::from_headers(&headers, state.key.clone());
    tracing::info!("session logged out");
    (state.sessions.invalidate(jar), StatusCode::OK).into_response()
}

/// Session of a JSON route. Rejects with 401 instead of redirecting.
pub(crate) struct ApiSession {
    jar: PrivateCookieJar,
    session: Session,
    pub credential: String,
}

impl FromRequestParts<AppState> for ApiSession {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
        let jar = PrivateCookieJar::from_headers(&parts.headers, state.key.clone());
        let session = state.sessions.load(&jar);
        let credential = session
            .active_credential(Utc::now())
            .map(str::to_string)
            .ok_or(ApiError::Unauthenticated)?;
        Ok(Self {
            jar,
            session,
            credential,
        })
    }
}

impl ApiSession {
    /// The cloud API refused the credential: forget it and answer 401.
    pub(crate) fn revoke(mut self, sessions: &SessionStore) -> Response {
        self.session.revoke_credential();
        tracing::info!("credential rejected downstream; cleared from session");
        match sessions.save(self.jar, &self.session) {
            Ok(jar) => (jar, ApiError::Unauthenticated).into_response(),
            Err(err) => ApiError::from(err).into_response(),
        }
    }
}
