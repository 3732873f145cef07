//! Campaign and outcome models

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Result of attempting delivery to one recipient
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum DeliveryStatus {
    /// Accepted by the server
    Success,

    /// Not delivered; see the error detail
    Failed,

    /// Not yet attempted
    Pending,
}

impl DeliveryStatus {
    /// The stored representation
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Success => "Success",
            DeliveryStatus::Failed => "Failed",
            DeliveryStatus::Pending => "Pending",
        }
    }

    /// Whether the delivery was accepted
    pub fn is_success(&self) -> bool {
        matches!(self, DeliveryStatus::Success)
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognised delivery status
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unknown delivery status '{0}'")]
pub struct ParseDeliveryStatusError(pub String);

impl FromStr for DeliveryStatus {
    type Err = ParseDeliveryStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "success" => Ok(DeliveryStatus::Success),
            "failed" => Ok(DeliveryStatus::Failed),
            "pending" => Ok(DeliveryStatus::Pending),
            _ => Err(ParseDeliveryStatusError(s.to_string())),
        }
    }
}

/// Create campaign request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewCampaign {
    id: Uuid,
    name: String,
    subject: String,
    total: u32,
}

impl NewCampaign {
    /// Create a new campaign request
    pub fn new(name: impl Into<String>, subject: impl Into<String>, total: u32) -> Self {
        Self {
            id: Uuid::now_v7(),
            name: name.into(),
            subject: subject.into(),
            total,
        }
    }

    /// A display name derived from the start time, e.g. `Campaign_20240131_093000`
    pub fn default_name(started_at: DateTime<Utc>) -> String {
        started_at.format("Campaign_%Y%m%d_%H%M%S").to_string()
    }

    /// The new campaign's ID
    pub fn id(&self) -> &Uuid {
        &self.id
    }

    /// The display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The subject template
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Number of recipients
    pub fn total(&self) -> u32 {
        self.total
    }
}

/// Campaign model
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Campaign {
    /// Campaign UUID
    pub id: Uuid,

    /// Display name
    pub name: String,

    /// Subject template
    pub subject: String,

    /// Number of recipients
    pub total: u32,

    /// Deliveries accepted so far
    pub successful: u32,

    /// Deliveries failed so far
    pub failed: u32,

    /// Recipients not yet recorded
    pub pending: u32,

    /// Start date in UTC
    pub started_at: DateTime<Utc>,

    /// End date in UTC, once every recipient is recorded or the run is stopped
    pub ended_at: Option<DateTime<Utc>>,
}

impl Campaign {
    /// Whether the campaign has finished
    pub fn is_finished(&self) -> bool {
        self.ended_at.is_some()
    }
}

/// One outcome to record
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewOutcome {
    /// Owning campaign
    pub campaign_id: Uuid,

    /// Recipient address, `unknown` when the row had none
    pub address: String,

    /// Recipient display name
    pub name: String,

    /// Rendered subject
    pub subject: String,

    /// Delivery result
    pub status: DeliveryStatus,

    /// Failure detail
    pub error: Option<String>,
}

impl NewOutcome {
    /// A successful delivery
    pub fn success(
        campaign_id: Uuid,
        address: impl Into<String>,
        name: impl Into<String>,
        subject: impl Into<String>,
    ) -> Self {
        Self {
            campaign_id,
            address: address.into(),
            name: name.into(),
            subject: subject.into(),
            status: DeliveryStatus::Success,
            error: None,
        }
    }

    /// A failed delivery
    pub fn failure(
        campaign_id: Uuid,
        address: impl Into<String>,
        name: impl Into<String>,
        subject: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            campaign_id,
            address: address.into(),
            name: name.into(),
            subject: subject.into(),
            status: DeliveryStatus::Failed,
            error: Some(error.into()),
        }
    }
}

/// A recorded outcome
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageOutcome {
    /// Row ID, in append order
    pub id: i64,

    /// Owning campaign
    pub campaign_id: Uuid,

    /// Recipient address
    pub address: String,

    /// Recipient display name
    pub name: String,

    /// Rendered subject
    pub subject: String,

    /// Delivery result
    pub status: DeliveryStatus,

    /// Failure detail
    pub error: Option<String>,

    /// When the outcome was recorded, in UTC
    pub sent_at: DateTime<Utc>,
}

/// Outcome query
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutcomeFilter {
    /// Only this campaign
    pub campaign_id: Option<Uuid>,

    /// Only this status
    pub status: Option<DeliveryStatus>,

    /// Maximum rows, newest first
    pub limit: u32,
}

impl Default for OutcomeFilter {
    fn default() -> Self {
        Self {
            campaign_id: None,
            status: None,
            limit: 1000,
        }
    }
}

/// Outcome counts by status
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeStatistics {
    /// All recorded outcomes
    pub total: u64,

    /// Successful deliveries
    pub successful: u64,

    /// Failed deliveries
    pub failed: u64,

    /// Pending deliveries
    pub pending: u64,
}

impl OutcomeStatistics {
    /// Successful deliveries as a percentage of all outcomes
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }

        self.successful as f64 * 100.0 / self.total as f64
    }
}
