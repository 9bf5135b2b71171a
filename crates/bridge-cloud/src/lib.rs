mod client;
mod error;
mod resolver;

pub use client::{CloudApi, DownloadedDocument, HttpCloudApi, NewDocument, WorkspaceRef};
pub use error::CloudError;
pub use resolver::{select_voicemail, Resolution, VoicemailResolver};
