//! Communication module: message rendering and SMTP delivery

pub mod mailer;
pub mod templates;
