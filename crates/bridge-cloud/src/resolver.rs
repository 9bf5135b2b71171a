//! Matches a voicemail notification to its recording.
//!
//! Only the first page of the caller's list is scanned, in the order the API
//! returned it, and the first entry matching on all three attributes wins. A
//! recording that has been pushed to a later page is reported as not found.

use crate::{CloudApi, CloudError};
use bridge_core::{MailItemAttributes, VoicemailCandidate};
use std::sync::Arc;

/// First entry that matches duration, caller and creation time.
pub fn select_voicemail<'a>(
    candidates: &'a [VoicemailCandidate],
    attributes: &MailItemAttributes,
) -> Option<&'a VoicemailCandidate> {
    candidates
        .iter()
        .find(|candidate| candidate.matches(attributes))
}

#[derive(Debug)]
pub enum Resolution {
    /// Locator of the matched recording, relative to the API base when possible.
    Found(String),
    NotFound,
    /// The list could not be fetched; nothing is known about a match.
    TransientFailure(CloudError),
}

#[derive(Clone)]
pub struct VoicemailResolver {
    cloud: Arc<dyn CloudApi>,
    api_base: String,
}

impl VoicemailResolver {
    pub fn new(cloud: Arc<dyn CloudApi>, api_base_url: &str) -> Self {
        Self {
            cloud,
            api_base: api_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn resolve(&self, credential: &str, attributes: &MailItemAttributes) -> Resolution {
        if !attributes.is_complete() {
            tracing::info!("mail item is missing call details; skipping voicemail lookup");
            return Resolution::NotFound;
        }

        let page = match self.cloud.list_voicemail_messages(credential).await {
            Ok(page) => page,
            Err(err) => return Resolution::TransientFailure(err),
        };
        if page.next_uri.is_some() {
            tracing::debug!(total = page.total, "voicemail list has more pages; only the first is scanned");
        }

        match select_voicemail(&page.entities, attributes) {
            Some(candidate) => Resolution::Found(self.media_locator(&candidate.self_uri)),
            None => {
                tracing::info!(scanned = page.entities.len(), "no voicemail matched the mail item");
                Resolution::NotFound
            }
        }
    }

    fn media_locator(&self, self_uri: &str) -> String {
        match self_uri.strip_prefix(&self.api_base) {
            Some(relative) if relative.starts_with('/') => relative.to_string(),
            _ => self_uri.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DownloadedDocument, NewDocument};
    use async_trait::async_trait;
    use bridge_core::VoicemailPage;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeCloud {
        page: Option<VoicemailPage>,
        calls: AtomicUsize,
    }

    impl FakeCloud {
        fn with(entities: Vec<VoicemailCandidate>) -> Arc<Self> {
            Arc::new(Self {
                page: Some(VoicemailPage {
                    entities,
                    ..VoicemailPage::default()
                }),
                calls: AtomicUsize::new(0),
            })
        }

        fn unauthorized() -> Arc<Self> {
            Arc::new(Self {
                page: None,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl CloudApi for FakeCloud {
        async fn list_voicemail_messages(
            &self,
            _credential: &str,
        ) -> Result<VoicemailPage, CloudError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.page.clone().ok_or(CloudError::Unauthorized)
        }

        async fn create_document(
            &self,
            _credential: &str,
            _document: &NewDocument,
        ) -> Result<String, CloudError> {
            Err(CloudError::Status(501))
        }

        async fn upload_document(
            &self,
            _upload_uri: &str,
            _file_name: &str,
            _content_type: &str,
            _bytes: Vec<u8>,
        ) -> Result<(), CloudError> {
            Err(CloudError::Status(501))
        }

        async fn download_document(
            &self,
            _credential: &str,
            _document_id: &str,
        ) -> Result<DownloadedDocument, CloudError> {
            Err(CloudError::Status(501))
        }
    }

    fn attributes() -> MailItemAttributes {
        MailItemAttributes {
            phone: "+15551234567".to_string(),
            created_at: "2015-02-19T17:42:49".to_string(),
            duration_seconds: 57,
        }
    }

    fn candidate(duration: u32, caller: &str, created: &str, uri: &str) -> VoicemailCandidate {
        VoicemailCandidate {
            duration_seconds: duration,
            caller_address: caller.to_string(),
            created_date: created.to_string(),
            self_uri: uri.to_string(),
        }
    }

    #[tokio::test]
    async fn matching_entry_returns_its_locator() {
        let cloud = FakeCloud::with(vec![candidate(
            57,
            "+15551234567",
            "2015-02-19T17:42:49.579Z",
            "/v1/voicemail/messages/abc",
        )]);
        let resolver = VoicemailResolver::new(cloud, "https://api.example.com");

        match resolver.resolve("token", &attributes()).await {
            Resolution::Found(locator) => assert_eq!(locator, "/v1/voicemail/messages/abc"),
            other => panic!("expected a match, got {other:?}"),
        }
    }

    #[test]
    fn first_of_several_matches_wins() {
        let entries = vec![
            candidate(56, "+15551234567", "2015-02-19T17:42:49.579Z", "/wrong-duration"),
            candidate(57, "+15559999999", "2015-02-19T17:42:49.579Z", "/wrong-caller"),
            candidate(57, "+15551234567", "2015-02-19T17:42:50.000Z", "/wrong-time"),
            candidate(57, "+15551234567", "2015-02-19T17:42:49.579Z", "/first"),
            candidate(57, "+15551234567", "2015-02-19T17:42:49.900Z", "/second"),
        ];
        let selected = select_voicemail(&entries, &attributes()).expect("match");
        assert_eq!(selected.self_uri, "/first");
    }

    #[tokio::test]
    async fn empty_or_unmatched_lists_are_not_found() {
        let resolver = VoicemailResolver::new(FakeCloud::with(Vec::new()), "https://api.example.com");
        assert!(matches!(
            resolver.resolve("token", &attributes()).await,
            Resolution::NotFound
        ));

        let resolver = VoicemailResolver::new(
            FakeCloud::with(vec![candidate(12, "+15550000000", "2020-01-01T00:00:00Z", "/x")]),
            "https://api.example.com",
        );
        assert!(matches!(
            resolver.resolve("token", &attributes()).await,
            Resolution::NotFound
        ));
    }

    #[tokio::test]
    async fn incomplete_attributes_skip_the_network() {
        let cloud = FakeCloud::with(Vec::new());
        let resolver = VoicemailResolver::new(cloud.clone(), "https://api.example.com");

        let resolution = resolver
            .resolve("token", &MailItemAttributes::default())
            .await;

        assert!(matches!(resolution, Resolution::NotFound));
        assert_eq!(cloud.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn rejected_credential_is_a_transient_failure() {
        let resolver = VoicemailResolver::new(FakeCloud::unauthorized(), "https://api.example.com");
        assert!(matches!(
            resolver.resolve("token", &attributes()).await,
            Resolution::TransientFailure(CloudError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn absolute_locators_are_made_relative_to_the_api_base() {
        let cloud = FakeCloud::with(vec![candidate(
            57,
            "+15551234567",
            "2015-02-19T17:42:49.579Z",
            "https://api.example.com/api/v1/voicemail/messages/abc",
        )]);
        let resolver = VoicemailResolver::new(cloud, "https://api.example.com/");

        match resolver.resolve("token", &attributes()).await {
            Resolution::Found(locator) => {
                assert_eq!(locator, "/api/v1/voicemail/messages/abc")
            }
            other => panic!("expected a match, got {other:?}"),
        }
    }
}
