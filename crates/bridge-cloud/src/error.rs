use thiserror::Error;

#[derive(Debug, Error)]
pub enum CloudError {
    /// The cloud API rejected the bearer credential.
    #[error("cloud API rejected the credential")]
    Unauthorized,
    #[error("cloud API returned status {0}")]
    Status(u16),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
    #[error("data error: {0}")]
    Data(String),
}
