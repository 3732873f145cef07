//! SMTP endpoint configuration

use std::{fmt, time::Duration};

use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

use crate::domain::recipients::{EmailAddress, EmailAddressError};

/// Port on which the connection is TLS-wrapped from the first byte
pub const IMPLICIT_TLS_PORT: u16 = 465;

/// Upper bound on any single connect, login or send exchange
pub const NETWORK_TIMEOUT: Duration = Duration::from_secs(30);

lazy_static! {
    static ref HOST_REGEX: Regex = Regex::new(r"^[a-zA-Z0-9.-]+$").unwrap();
}

/// Errors found when checking an [`SmtpConfig`] before use
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SmtpConfigError {
    /// A required field is empty
    #[error("missing or empty: {0}")]
    MissingField(&'static str),

    /// The sender address is not a valid email address
    #[error("invalid sender address: {0}")]
    InvalidSender(#[from] EmailAddressError),

    /// The host contains characters that cannot appear in a hostname
    #[error("invalid SMTP server address")]
    InvalidHost,

    /// Port zero
    #[error("port must be between 1 and 65535")]
    InvalidPort,
}

/// SMTP configuration. The sender address doubles as the login name.
#[derive(Clone, PartialEq, Eq)]
pub struct SmtpConfig {
    /// The sender address and login name
    pub address: String,

    /// The login secret
    pub password: String,

    /// The SMTP host
    pub host: String,

    /// The SMTP port
    pub port: u16,

    /// Verify the server's TLS certificate
    pub verify_tls: bool,
}

impl SmtpConfig {
    /// Create a new configuration with certificate verification enabled
    pub fn new(
        address: impl Into<String>,
        password: impl Into<String>,
        host: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            address: address.into(),
            password: password.into(),
            host: host.into(),
            port,
            verify_tls: true,
        }
    }

    /// Whether to use implicit TLS rather than a STARTTLS upgrade
    pub fn implicit_tls(&self) -> bool {
        self.port == IMPLICIT_TLS_PORT
    }

    /// Checks that every field is usable
    pub fn validate(&self) -> Result<(), SmtpConfigError> {
        if self.address.trim().is_empty() {
            return Err(SmtpConfigError::MissingField("email"));
        }

        if self.password.is_empty() {
            return Err(SmtpConfigError::MissingField("password"));
        }

        if self.host.trim().is_empty() {
            return Err(SmtpConfigError::MissingField("server"));
        }

        EmailAddress::new(&self.address)?;

        if !HOST_REGEX.is_match(self.host.trim()) {
            return Err(SmtpConfigError::InvalidHost);
        }

        if self.port == 0 {
            return Err(SmtpConfigError::InvalidPort);
        }

        Ok(())
    }
}

impl fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("address", &self.address)
            .field("password", &"<redacted>")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("verify_tls", &self.verify_tls)
            .finish()
    }
}
