use crate::CloudError;
use async_trait::async_trait;
use bridge_core::VoicemailPage;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use reqwest::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Request body for creating a content-management document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDocument {
    pub name: String,
    pub workspace: WorkspaceRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceRef {
    pub id: String,
}

impl NewDocument {
    pub fn new(name: impl Into<String>, workspace_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            workspace: WorkspaceRef {
                id: workspace_id.into(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedDocument {
    upload_destination_uri: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DownloadedDocument {
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// The cloud API as seen by the resolver and the document routes.
///
/// Every call that carries a credential reports a 401 as [`CloudError::Unauthorized`].
#[async_trait]
pub trait CloudApi: Send + Sync {
    /// First page of the caller's voicemail list.
    async fn list_voicemail_messages(&self, credential: &str) -> Result<VoicemailPage, CloudError>;

    /// Creates the document record and returns where its content must be uploaded.
    async fn create_document(
        &self,
        credential: &str,
        document: &NewDocument,
    ) -> Result<String, CloudError>;

    /// Uploads content to a destination returned by [`CloudApi::create_document`].
    async fn upload_document(
        &self,
        upload_uri: &str,
        file_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<(), CloudError>;

    async fn download_document(
        &self,
        credential: &str,
        document_id: &str,
    ) -> Result<DownloadedDocument, CloudError>;
}

#[derive(Debug, Clone)]
pub struct HttpCloudApi {
    http: reqwest::Client,
    voicemail_url: Url,
    documents_url: Url,
}

impl HttpCloudApi {
    pub fn new(
        api_base_url: &str,
        voicemail_path: &str,
        documents_path: &str,
        timeout: Duration,
    ) -> Result<Self, CloudError> {
        let base = Url::parse(api_base_url)?;
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            voicemail_url: base.join(voicemail_path)?,
            documents_url: base.join(documents_path)?,
        })
    }

    fn document_content_url(&self, document_id: &str) -> Result<Url, CloudError> {
        if document_id.is_empty() {
            return Err(CloudError::Data("document id is required".to_string()));
        }
        let mut url = self.documents_url.clone();
        url.path_segments_mut()
            .map_err(|_| CloudError::Data("documents url cannot carry a path".to_string()))?
            .pop_if_empty()
            .push(document_id)
            .push("content");
        Ok(url)
    }
}

#[async_trait]
impl CloudApi for HttpCloudApi {
    async fn list_voicemail_messages(&self, credential: &str) -> Result<VoicemailPage, CloudError> {
        let response = self
            .http
            .get(self.voicemail_url.clone())
            .bearer_auth(credential)
            .header("Accept", "application/json")
            .send()
            .await?;
        let response = check_status(response, "voicemail list")?;

        let page: VoicemailPage = response.json().await?;
        tracing::debug!(entities = page.entities.len(), total = page.total, "fetched voicemail page");
        Ok(page)
    }

    async fn create_document(
        &self,
        credential: &str,
        document: &NewDocument,
    ) -> Result<String, CloudError> {
        let response = self
            .http
            .post(self.documents_url.clone())
            .bearer_auth(credential)
            .header("Accept", "application/json")
            .json(document)
            .send()
            .await?;
        let response = check_status(response, "create document")?;

        let created: CreatedDocument = response.json().await?;
        created
            .upload_destination_uri
            .filter(|uri| !uri.is_empty())
            .ok_or_else(|| CloudError::Data("document has no upload destination".to_string()))
    }

    async fn upload_document(
        &self,
        upload_uri: &str,
        file_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<(), CloudError> {
        let upload_url = Url::parse(upload_uri)?;
        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(content_type)?;
        let form = Form::new().part(file_name.to_string(), part);

        // The destination is pre-signed; it takes no bearer credential.
        let response = self.http.post(upload_url).multipart(form).send().await?;
        check_status(response, "document upload")?;
        tracing::info!(file_name, "uploaded document content");
        Ok(())
    }

    async fn download_document(
        &self,
        credential: &str,
        document_id: &str,
    ) -> Result<DownloadedDocument, CloudError> {
        let url = self.document_content_url(document_id)?;
        let response = self.http.get(url).bearer_auth(credential).send().await?;
        let response = check_status(response, "document download")?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?.to_vec();
        Ok(DownloadedDocument {
            content_type,
            bytes,
        })
    }
}

fn check_status(response: Response, operation: &'static str) -> Result<Response, CloudError> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        tracing::info!(operation, "cloud API rejected the credential");
        return Err(CloudError::Unauthorized);
    }
    if !status.is_success() {
        tracing::warn!(operation, status = %status, "cloud API request failed");
        return Err(CloudError::Status(status.as_u16()));
    }
    Ok(response)
}
