use thiserror::Error;

#[derive(Debug, Error)]
pub enum SecurityError {
    #[error("oauth error: {0}")]
    OAuth(String),
    #[error("token exchange failed: {0}")]
    Exchange(String),
    #[error("callback has no pending redirect")]
    MissingPendingRedirect,
    #[error("callback is missing the authorization code")]
    MissingCode,
    #[error("oauth state mismatch")]
    StateMismatch,
    #[error("pending redirect does not name a local path")]
    UnsafeRedirect,
    #[error("cookie key error: {0}")]
    CookieKey(String),
    #[error("correlation store unavailable")]
    StoreUnavailable,
    #[error("could not mint an unused correlation token")]
    TokenCollision,
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}
