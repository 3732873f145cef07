//! Campaign repository module

use async_trait::async_trait;
use uuid::Uuid;

#[cfg(test)]
use mockall::mock;

use crate::domain::campaigns::{
    errors::{
        CreateCampaignError, GetCampaignError, QueryError, RecordOutcomeError, UpdateCampaignError,
    },
    Campaign, MessageOutcome, NewCampaign, NewOutcome, OutcomeFilter, OutcomeStatistics,
};

/// Durable store for campaigns and their outcomes
#[async_trait]
pub trait CampaignRepository: Clone + Send + Sync + 'static {
    /// Creates a campaign with every recipient pending.
    ///
    /// # Returns
    /// A [`Result`] which is [`Ok`] containing the campaign's UUID,
    /// or an [`Err`] containing a [`CreateCampaignError`] if the campaign cannot be created.
    async fn create_campaign(&self, campaign: &NewCampaign) -> Result<Uuid, CreateCampaignError>;

    /// Appends one outcome and updates the owning campaign's counters.
    ///
    /// The insert, the counter increment and the end-time stamp (once every
    /// recipient is accounted for) happen atomically.
    async fn record_outcome(&self, outcome: &NewOutcome) -> Result<(), RecordOutcomeError>;

    /// Stamps the campaign's end time if it is not already set
    async fn finish_campaign(&self, id: &Uuid) -> Result<(), UpdateCampaignError>;

    /// Get a campaign by its ID
    async fn get_campaign(&self, id: &Uuid) -> Result<Campaign, GetCampaignError>;

    /// The most recently started campaigns, newest first
    async fn recent_campaigns(&self, limit: u32) -> Result<Vec<Campaign>, QueryError>;

    /// Recorded outcomes matching `filter`, newest first
    async fn outcomes(&self, filter: &OutcomeFilter) -> Result<Vec<MessageOutcome>, QueryError>;

    /// Outcome counts, for one campaign or across all of them
    async fn statistics(&self, campaign_id: Option<Uuid>) -> Result<OutcomeStatistics, QueryError>;

    /// Deletes outcomes older than `days` days, returning how many were removed
    async fn cleanup_old_outcomes(&self, days: u32) -> Result<u64, QueryError>;
}

#[cfg(test)]
mock! {
    pub CampaignRepository {}

    impl Clone for CampaignRepository {
        fn clone(&self) -> Self;
    }

    #[async_trait]
    impl CampaignRepository for CampaignRepository {
        async fn create_campaign(&self, campaign: &NewCampaign) -> Result<Uuid, CreateCampaignError>;
        async fn record_outcome(&self, outcome: &NewOutcome) -> Result<(), RecordOutcomeError>;
        async fn finish_campaign(&self, id: &Uuid) -> Result<(), UpdateCampaignError>;
        async fn get_campaign(&self, id: &Uuid) -> Result<Campaign, GetCampaignError>;
        async fn recent_campaigns(&self, limit: u32) -> Result<Vec<Campaign>, QueryError>;
        async fn outcomes(&self, filter: &OutcomeFilter) -> Result<Vec<MessageOutcome>, QueryError>;
        async fn statistics(&self, campaign_id: Option<Uuid>) -> Result<OutcomeStatistics, QueryError>;
        async fn cleanup_old_outcomes(&self, days: u32) -> Result<u64, QueryError>;
    }
}
