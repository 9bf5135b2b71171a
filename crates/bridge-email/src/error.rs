use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("base64 decode error: {0}")]
    Decode(#[from] base64::DecodeError),
    #[error("EWS request failed with status {0}")]
    Status(u16),
    #[error("invalid data: {0}")]
    Data(String),
}
