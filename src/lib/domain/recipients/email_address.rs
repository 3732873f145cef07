//! Email Address

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

lazy_static! {
    static ref EMAIL_REGEX: Regex =
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap();
}

use std::fmt;

use thiserror::Error;

use EmailAddressError::*;

const MAX_LOCAL_PART_LENGTH: usize = 64;
const MAX_DOMAIN_LENGTH: usize = 255;

const DISPOSABLE_DOMAINS: &[&str] = &[
    "tempmail.com",
    "guerrillamail.com",
    "10minutemail.com",
    "mailinator.com",
    "throwaway.email",
    "temp-mail.org",
];

/// An error that can occur when creating an email address
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EmailAddressError {
    /// The email address is empty
    #[error("email is empty")]
    EmptyEmailAddress,

    /// The email address is invalid
    #[error("email is invalid")]
    InvalidEmailAddress,
}

/// An email address
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Create a new email address, trimming surrounding whitespace
    pub fn new(raw: &str) -> Result<Self, EmailAddressError> {
        let trimmed = raw.trim();

        if trimmed.is_empty() {
            return Err(EmptyEmailAddress);
        }

        if !is_valid(trimmed) {
            return Err(InvalidEmailAddress);
        }

        Ok(Self(trimmed.to_string()))
    }

    /// Create a new email address without validation
    pub fn new_unchecked(raw: &str) -> Self {
        Self(raw.to_string())
    }

    /// The address as written
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The key used to detect duplicates within a batch
    pub fn normalized(&self) -> String {
        normalize(&self.0)
    }

    /// The part after the last `@`
    pub fn domain(&self) -> &str {
        self.0
            .rsplit_once('@')
            .map(|(_, domain)| domain)
            .unwrap_or_default()
    }

    /// Whether the domain belongs to a known throwaway-inbox provider
    pub fn is_disposable(&self) -> bool {
        let domain = self.domain().to_lowercase();

        DISPOSABLE_DOMAINS.contains(&domain.as_str())
    }
}

/// Lower-cases an address and strips every whitespace character
pub fn normalize(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

fn is_valid(address: &str) -> bool {
    if !EMAIL_REGEX.is_match(address) {
        return false;
    }

    if address.contains("..") || address.starts_with('.') || address.ends_with('.') {
        return false;
    }

    let Some((local, domain)) = address.rsplit_once('@') else {
        return false;
    };

    if local.len() > MAX_LOCAL_PART_LENGTH || domain.len() > MAX_DOMAIN_LENGTH {
        return false;
    }

    domain.split('.').all(|label| !label.is_empty())
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<EmailAddress> for String {
    fn from(email: EmailAddress) -> Self {
        email.0
    }
}
