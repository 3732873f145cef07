//! Error types for campaigns and their outcomes

use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur when creating a campaign
#[derive(Debug, Error)]
pub enum CreateCampaignError {
    /// A campaign with that ID already exists
    #[error("Campaign {0} already exists")]
    DuplicateCampaign(Uuid),

    /// Unknown error
    #[error(transparent)]
    UnknownError(#[from] anyhow::Error),
}

/// Errors that can occur when recording an outcome
#[derive(Debug, Error)]
pub enum RecordOutcomeError {
    /// The owning campaign does not exist
    #[error("Campaign {0} not found")]
    CampaignNotFound(Uuid),

    /// Unknown error
    #[error(transparent)]
    UnknownError(#[from] anyhow::Error),
}

/// Errors that can occur when updating a campaign
#[derive(Debug, Error)]
pub enum UpdateCampaignError {
    /// Campaign not found
    #[error("Campaign {0} not found")]
    CampaignNotFound(Uuid),

    /// Unknown error
    #[error(transparent)]
    UnknownError(#[from] anyhow::Error),
}

/// Errors that can occur when getting a campaign
#[derive(Debug, Error)]
pub enum GetCampaignError {
    /// Campaign not found
    #[error("Campaign {0} not found")]
    CampaignNotFound(Uuid),

    /// Unknown error
    #[error(transparent)]
    UnknownError(#[from] anyhow::Error),
}

/// Errors from listing, counting or pruning stored records
#[derive(Debug, Error)]
pub enum QueryError {
    /// Unknown error
    #[error(transparent)]
    UnknownError(#[from] anyhow::Error),
}
