//! Email message

use crate::domain::{communication::templates::html_to_plain, recipients::EmailAddress};

/// A fully addressed, fully rendered email
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutgoingMessage {
    /// The sender of the email
    pub from: String,

    /// The recipient of the email
    pub to: EmailAddress,

    /// The subject of the email
    pub subject: String,

    /// The HTML body of the email
    pub html_body: String,

    /// The plain text body of the email
    pub plain_body: String,
}

impl OutgoingMessage {
    /// Create a message, deriving the plain text body from the HTML
    pub fn new(
        from: impl Into<String>,
        to: EmailAddress,
        subject: impl Into<String>,
        html_body: impl Into<String>,
    ) -> Self {
        let html_body = html_body.into();

        Self {
            from: from.into(),
            to,
            subject: subject.into(),
            plain_body: html_to_plain(&html_body),
            html_body,
        }
    }
}
