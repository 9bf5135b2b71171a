use crate::{decode_attachment_content, EmailError};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Where and as whom to call EWS. Both values come from the mail client per request.
#[derive(Clone, Serialize, Deserialize)]
pub struct EwsSettings {
    pub endpoint: String,
    pub access_token: String,
}

impl std::fmt::Debug for EwsSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EwsSettings")
            .field("endpoint", &self.endpoint)
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

#[async_trait]
pub trait MailBackend: Send + Sync {
    /// Raw `GetItem` response for one item, MIME content included.
    async fn fetch_item(&self, settings: &EwsSettings, item_id: &str)
        -> Result<Vec<u8>, EmailError>;

    /// Decoded bytes of one attachment.
    async fn fetch_attachment(
        &self,
        settings: &EwsSettings,
        attachment_id: &str,
    ) -> Result<Vec<u8>, EmailError>;
}

#[derive(Debug, Clone)]
pub struct EwsBackend {
    http: reqwest::Client,
}

impl EwsBackend {
    pub fn new(timeout: Duration) -> Result<Self, EmailError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }

    /// Posts one SOAP envelope and returns the response body untouched.
    async fn send_envelope(
        &self,
        settings: &EwsSettings,
        envelope: String,
    ) -> Result<Vec<u8>, EmailError> {
        let endpoint = validate_endpoint(&settings.endpoint)?;

        let response = self
            .http
            .post(endpoint)
            .header("Content-Type", "text/xml; charset=utf-8")
            .bearer_auth(&settings.access_token)
            .body(envelope)
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            tracing::warn!(status = %response.status(), "EWS request failed");
            return Err(EmailError::Status(response.status().as_u16()));
        }

        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl MailBackend for EwsBackend {
    async fn fetch_item(
        &self,
        settings: &EwsSettings,
        item_id: &str,
    ) -> Result<Vec<u8>, EmailError> {
        let body = self
            .send_envelope(settings, get_item_envelope(item_id))
            .await?;
        tracing::debug!(bytes = body.len(), "fetched mail item from EWS");
        Ok(body)
    }

    async fn fetch_attachment(
        &self,
        settings: &EwsSettings,
        attachment_id: &str,
    ) -> Result<Vec<u8>, EmailError> {
        let body = self
            .send_envelope(settings, get_attachment_envelope(attachment_id))
            .await?;
        decode_attachment_content(&body)
    }
}

fn validate_endpoint(raw: &str) -> Result<Url, EmailError> {
    let endpoint =
        Url::parse(raw.trim()).map_err(|err| EmailError::Data(format!("EWS url: {err}")))?;
    if endpoint.scheme() != "https" {
        return Err(EmailError::Data("EWS url must use HTTPS".to_string()));
    }
    Ok(endpoint)
}

pub fn get_item_envelope(item_id: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<soap:Envelope xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xmlns:xsd="http://www.w3.org/2001/XMLSchema" xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/" xmlns:t="http://schemas.microsoft.com/exchange/services/2006/types">
<soap:Header>
  <t:RequestServerVersion Version="Exchange2013" />
</soap:Header>
<soap:Body>
  <GetItem xmlns="http://schemas.microsoft.com/exchange/services/2006/messages" xmlns:t="http://schemas.microsoft.com/exchange/services/2006/types">
    <ItemShape>
      <t:BaseShape>Default</t:BaseShape>
      <t:IncludeMimeContent>true</t:IncludeMimeContent>
    </ItemShape>
    <ItemIds><t:ItemId Id="{}" /></ItemIds>
  </GetItem>
</soap:Body>
</soap:Envelope>"#,
        escape_xml(item_id)
    )
}

pub fn get_attachment_envelope(attachment_id: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<soap:Envelope xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xmlns:xsd="http://www.w3.org/2001/XMLSchema" xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/" xmlns:t="http://schemas.microsoft.com/exchange/services/2006/types">
<soap:Header>
  <t:RequestServerVersion Version="Exchange2013" />
</soap:Header>
<soap:Body>
  <GetAttachment xmlns="http://schemas.microsoft.com/exchange/services/2006/messages" xmlns:t="http://schemas.microsoft.com/exchange/services/2006/types">
    <AttachmentShape/>
    <AttachmentIds><t:AttachmentId Id="{}"/></AttachmentIds>
  </GetAttachment>
</soap:Body>
</soap:Envelope>"#,
        escape_xml(attachment_id)
    )
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
