//! Mailer errors

use lettre::{
    address::AddressError, error::Error as MessageError, transport::smtp::Error as SmtpError,
};
use thiserror::Error;
use tracing::debug;

/// Errors from a single connection attempt
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConnectAttemptError {
    /// The server rejected the credentials
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The connection could not be established; worth retrying
    #[error("connection failed: {0}")]
    Connection(String),
}

/// Errors that prevent a delivery session from opening
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OpenSessionError {
    /// The server rejected the credentials; never retried
    #[error("Authentication failed. Check credentials. ({0})")]
    AuthenticationFailed(String),

    /// Every connection attempt failed
    #[error("Failed to connect after {attempts} attempts: {reason}")]
    ConnectionFailed {
        /// Attempts made
        attempts: u32,

        /// The last failure
        reason: String,
    },
}

/// Errors sending one message
#[derive(Debug, Error)]
pub enum SendError {
    /// The server rejected the message; the session stays usable
    #[error("SMTP Error: {0}")]
    ProtocolError(String),

    /// The message could not be built
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// The session is not open
    #[error("SMTP session is not connected")]
    NotConnected,

    /// Unknown error
    #[error(transparent)]
    UnknownError(#[from] anyhow::Error),
}

impl From<SmtpError> for SendError {
    fn from(err: SmtpError) -> Self {
        debug!("SmtpError -> SendError");

        if err.is_permanent() || err.is_transient() {
            SendError::ProtocolError(err.to_string())
        } else {
            SendError::UnknownError(err.into())
        }
    }
}

impl From<AddressError> for SendError {
    fn from(err: AddressError) -> Self {
        SendError::InvalidMessage(err.to_string())
    }
}

impl From<MessageError> for SendError {
    fn from(err: MessageError) -> Self {
        SendError::InvalidMessage(err.to_string())
    }
}
