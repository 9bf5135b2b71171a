mod backend;
mod error;
mod extract;

pub use backend::{
    get_attachment_envelope, get_item_envelope, EwsBackend, EwsSettings, MailBackend,
};
pub use error::EmailError;
pub use extract::{decode_attachment_content, extract_mail_item_attributes};
