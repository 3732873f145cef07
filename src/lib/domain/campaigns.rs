//! Campaigns: one bulk send, its outcomes and the worker that drives it

mod models;
mod repository;
mod sender;

pub mod errors;

pub use models::{
    Campaign, DeliveryStatus, MessageOutcome, NewCampaign, NewOutcome, OutcomeFilter,
    OutcomeStatistics, ParseDeliveryStatusError,
};
pub use repository::CampaignRepository;
pub use sender::{
    spawn_control_reader, BulkSender, DeliveryLog, SendControl, SendEvent, SendHandle, SendJob,
    SendSummary, WorkerState, PAUSE_POLL_INTERVAL,
};

#[cfg(test)]
pub mod tests {
    pub use super::repository::MockCampaignRepository;
}
