//! Pattern extraction over raw EWS responses.
//!
//! The call metadata sits in the free text of the voicemail notification, so
//! each field is the first match of its own pattern. A field that does not
//! match stays empty (or zero) and the resolver then finds nothing.

use crate::EmailError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bridge_core::MailItemAttributes;
use regex::Regex;
use std::sync::LazyLock;

/// `+` arrives HTML-escaped as `&#43;`; the number is the 11 digits after it.
static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#43;\d{11}").expect("valid phone regex"));
static TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}").expect("valid timestamp regex")
});
static DURATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Duration: (\d*) seconds").expect("valid duration regex"));
static CONTENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<t:Content>(.*?)</t:Content>").expect("valid EWS content regex")
});

pub fn extract_mail_item_attributes(raw: &[u8]) -> MailItemAttributes {
    let text = String::from_utf8_lossy(raw);

    let phone = PHONE_RE
        .find(&text)
        .map(|m| m.as_str().replace("#43;", "+"))
        .unwrap_or_default();
    let created_at = TIME_RE
        .find(&text)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default();
    let duration_seconds = DURATION_RE
        .captures(&text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .unwrap_or(0);

    let attributes = MailItemAttributes {
        phone,
        created_at,
        duration_seconds,
    };
    tracing::debug!(
        has_phone = !attributes.phone.is_empty(),
        created_at = %attributes.created_at,
        duration = attributes.duration_seconds,
        "extracted mail item attributes"
    );
    attributes
}

/// Base64 payload of the first `<t:Content>` element of a `GetAttachment` response.
pub fn decode_attachment_content(raw: &[u8]) -> Result<Vec<u8>, EmailError> {
    let text = String::from_utf8_lossy(raw);
    let encoded = CONTENT_RE
        .captures(&text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().split_whitespace().collect::<String>())
        .ok_or_else(|| EmailError::Data("attachment response has no content".to_string()))?;

    Ok(STANDARD.decode(encoded)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOTIFICATION: &[u8] = b"<t:MimeContent CharacterSet=\"UTF-8\">...</t:MimeContent>\
        <t:Body BodyType=\"HTML\">You received a voicemail from &#43;15551234567 \
        at 2015-02-19T17:42:49.579Z. Duration: 57 seconds</t:Body>\
        <t:DateTimeSent>2015-02-19T17:43:10Z</t:DateTimeSent>";

    #[test]
    fn extracts_phone_time_and_duration() {
        let attributes = extract_mail_item_attributes(NOTIFICATION);
        assert_eq!(
            attributes,
            MailItemAttributes {
                phone: "+15551234567".to_string(),
                created_at: "2015-02-19T17:42:49".to_string(),
                duration_seconds: 57,
            }
        );
    }

    #[test]
    fn missing_fields_stay_empty() {
        let attributes = extract_mail_item_attributes(b"<t:Body>No call details here</t:Body>");
        assert_eq!(attributes, MailItemAttributes::default());
        assert!(!attributes.is_complete());
    }

    #[test]
    fn empty_duration_capture_is_zero() {
        let attributes =
            extract_mail_item_attributes(b"#43;15551234567 2015-02-19T17:42:49 Duration:  seconds");
        assert_eq!(attributes.duration_seconds, 0);
        assert_eq!(attributes.phone, "+15551234567");
    }

    #[test]
    fn decodes_first_attachment_content() {
        let response = b"<m:Attachments><t:FileAttachment><t:Name>a.txt</t:Name>\
            <t:Content>aGVsbG8g\nd29ybGQ=</t:Content></t:FileAttachment></m:Attachments>";
        assert_eq!(
            decode_attachment_content(response).expect("decoded"),
            b"hello world".to_vec()
        );
    }

    #[test]
    fn attachment_without_content_is_an_error() {
        assert!(matches!(
            decode_attachment_content(b"<m:ResponseCode>ErrorItemNotFound</m:ResponseCode>"),
            Err(EmailError::Data(_))
        ));
    }
}
