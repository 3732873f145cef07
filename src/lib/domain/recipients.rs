//! Recipients module.

mod email_address;
mod recipient;
mod table;
mod validator;

pub use email_address::{normalize, EmailAddress, EmailAddressError};
pub use recipient::{
    Recipient, EMAIL_COLUMN, EMAIL_COLUMN_ALIASES, NAME_COLUMN, NAME_COLUMN_ALIASES,
};
pub use table::RecipientTable;
pub use validator::{validate, Rejection, RejectionReason, ValidationError, ValidationReport};
