use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// Identity-provider endpoints and client identity used by the authorization-code flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthProfile {
    pub client_id: String,
    pub auth_url: Url,
    pub token_url: Url,
    /// Path on this server the provider redirects back to; joined with the request host.
    pub redirect_path: String,
}

/// Cookie-backed record of one browser's authentication state.
///
/// The cookie is the only copy: nothing here is held server-side, so every
/// mutation must be written back with the session store before the response
/// leaves.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_redirect: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oauth_state: Option<String>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("credential", &self.credential.as_ref().map(|_| "[REDACTED]"))
            .field("expires_at", &self.expires_at)
            .field("pending_redirect", &self.pending_redirect)
            .field("oauth_state", &self.oauth_state.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Session {
    /// Returns the credential only while it is present and `now` is before its expiry.
    pub fn active_credential(&self, now: DateTime<Utc>) -> Option<&str> {
        match (self.credential.as_deref(), self.expires_at) {
            (Some(credential), Some(expires_at)) if now < expires_at => Some(credential),
            _ => None,
        }
    }

    pub fn is_authenticated(&self, now: DateTime<Utc>) -> bool {
        self.active_credential(now).is_some()
    }

    /// Drops the credential after a downstream 401; expiry and redirect bookkeeping stay.
    pub fn revoke_credential(&mut self) {
        self.credential = None;
    }
}

/// Call metadata pulled out of one mail item's free text.
///
/// Missing fields stay empty (or zero) and simply fail to match later.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailItemAttributes {
    pub phone: String,
    /// `YYYY-MM-DDTHH:MM:SS`, compared as a substring of the candidate's creation date.
    pub created_at: String,
    pub duration_seconds: u32,
}

impl MailItemAttributes {
    pub fn is_complete(&self) -> bool {
        !self.phone.is_empty() && !self.created_at.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoicemailCandidate {
    #[serde(rename = "audioRecordingDurationSeconds", default)]
    pub duration_seconds: u32,
    #[serde(rename = "callerAddress", default)]
    pub caller_address: String,
    #[serde(rename = "createdDate", default)]
    pub created_date: String,
    #[serde(rename = "selfUri", default)]
    pub self_uri: String,
}

impl VoicemailCandidate {
    pub fn matches(&self, attributes: &MailItemAttributes) -> bool {
        self.duration_seconds == attributes.duration_seconds
            && self.caller_address == attributes.phone
            && self.created_date.contains(&attributes.created_at)
    }
}

/// One page of the caller's voicemail list, in the order the cloud API returned it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoicemailPage {
    #[serde(default)]
    pub page_size: u32,
    #[serde(default)]
    pub page_number: u32,
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub next_uri: Option<String>,
    #[serde(default)]
    pub entities: Vec<VoicemailCandidate>,
}
