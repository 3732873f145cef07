//! Postgres implementation of the CampaignRepository trait

use anyhow::{anyhow, Error};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    error::ErrorKind::{ForeignKeyViolation, UniqueViolation},
    query, query_as, FromRow,
    Error::{Database, RowNotFound},
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    domain::campaigns::{
        errors::{
            CreateCampaignError, GetCampaignError, QueryError, RecordOutcomeError,
            UpdateCampaignError,
        },
        Campaign, CampaignRepository, DeliveryStatus, MessageOutcome, NewCampaign, NewOutcome,
        OutcomeFilter, OutcomeStatistics,
    },
    infrastructure::db::postgres::PostgresDatabase,
};

#[derive(FromRow)]
struct CampaignRecord {
    id: Uuid,
    name: String,
    subject: String,
    total_emails: i32,
    successful: i32,
    failed: i32,
    pending: i32,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
}

impl TryFrom<CampaignRecord> for Campaign {
    type Error = Error;

    fn try_from(record: CampaignRecord) -> Result<Self, Self::Error> {
        Ok(Campaign {
            id: record.id,
            name: record.name,
            subject: record.subject,
            total: u32::try_from(record.total_emails)?,
            successful: u32::try_from(record.successful)?,
            failed: u32::try_from(record.failed)?,
            pending: u32::try_from(record.pending)?,
            started_at: record.start_time,
            ended_at: record.end_time,
        })
    }
}

#[derive(FromRow)]
struct OutcomeRecord {
    id: i64,
    campaign_id: Uuid,
    recipient_email: String,
    recipient_name: String,
    subject: String,
    status: String,
    error_message: Option<String>,
    sent_at: DateTime<Utc>,
}

impl TryFrom<OutcomeRecord> for MessageOutcome {
    type Error = Error;

    fn try_from(record: OutcomeRecord) -> Result<Self, Self::Error> {
        Ok(MessageOutcome {
            id: record.id,
            campaign_id: record.campaign_id,
            address: record.recipient_email,
            name: record.recipient_name,
            subject: record.subject,
            status: record.status.parse()?,
            error: record.error_message,
            sent_at: record.sent_at,
        })
    }
}

#[derive(FromRow)]
struct StatisticsRecord {
    total: i64,
    successful: i64,
    failed: i64,
    pending: i64,
}

impl TryFrom<StatisticsRecord> for OutcomeStatistics {
    type Error = Error;

    fn try_from(record: StatisticsRecord) -> Result<Self, Self::Error> {
        Ok(OutcomeStatistics {
            total: u64::try_from(record.total)?,
            successful: u64::try_from(record.successful)?,
            failed: u64::try_from(record.failed)?,
            pending: u64::try_from(record.pending)?,
        })
    }
}

fn unknown(err: sqlx::Error) -> Error {
    anyhow!("Unknown database error: {:?}", err)
}

#[async_trait]
impl CampaignRepository for PostgresDatabase {
    #[mutants::skip]
    async fn create_campaign(&self, campaign: &NewCampaign) -> Result<Uuid, CreateCampaignError> {
        let total = i32::try_from(campaign.total()).map_err(Error::from)?;

        let (id,): (Uuid,) = query_as(
            r#"
            INSERT INTO campaigns (id, name, subject, total_emails, pending)
            VALUES ($1, $2, $3, $4, $4)
            RETURNING id
            "#,
        )
        .bind(campaign.id())
        .bind(campaign.name())
        .bind(campaign.subject())
        .bind(total)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| match err {
            Database(db_err) => match db_err.kind() {
                UniqueViolation => CreateCampaignError::DuplicateCampaign(*campaign.id()),
                _ => CreateCampaignError::UnknownError(anyhow!(
                    "Unknown database error: {:?}",
                    db_err
                )),
            },
            _ => CreateCampaignError::UnknownError(unknown(err)),
        })?;

        info!(campaign_id = %id, name = campaign.name(), total, "created campaign");

        Ok(id)
    }

    #[mutants::skip]
    async fn record_outcome(&self, outcome: &NewOutcome) -> Result<(), RecordOutcomeError> {
        let campaign_id = outcome.campaign_id;
        let (successful, failed): (i32, i32) = match outcome.status {
            DeliveryStatus::Success => (1, 0),
            DeliveryStatus::Failed => (0, 1),
            DeliveryStatus::Pending => (0, 0),
        };

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|err| RecordOutcomeError::UnknownError(unknown(err)))?;

        query(
            r#"
            INSERT INTO email_logs
                (campaign_id, recipient_email, recipient_name, subject, status, error_message)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(campaign_id)
        .bind(&outcome.address)
        .bind(&outcome.name)
        .bind(&outcome.subject)
        .bind(outcome.status.as_str())
        .bind(outcome.error.as_deref())
        .execute(&mut *tx)
        .await
        .map_err(|err| match err {
            Database(db_err) => match db_err.kind() {
                ForeignKeyViolation => RecordOutcomeError::CampaignNotFound(campaign_id),
                _ => RecordOutcomeError::UnknownError(anyhow!(
                    "Unknown database error: {:?}",
                    db_err
                )),
            },
            _ => RecordOutcomeError::UnknownError(unknown(err)),
        })?;

        let updated = query(
            r#"
            UPDATE campaigns
            SET successful = successful + $2,
                failed = failed + $3,
                pending = GREATEST(pending - $2 - $3, 0),
                end_time = CASE
                    WHEN end_time IS NULL AND successful + failed + $2 + $3 >= total_emails
                    THEN NOW()
                    ELSE end_time
                END
            WHERE id = $1
            "#,
        )
        .bind(campaign_id)
        .bind(successful)
        .bind(failed)
        .execute(&mut *tx)
        .await
        .map_err(|err| RecordOutcomeError::UnknownError(unknown(err)))?;

        if updated.rows_affected() == 0 {
            return Err(RecordOutcomeError::CampaignNotFound(campaign_id));
        }

        tx.commit()
            .await
            .map_err(|err| RecordOutcomeError::UnknownError(unknown(err)))?;

        debug!(%campaign_id, recipient = %outcome.address, status = %outcome.status, "recorded outcome");

        Ok(())
    }

    #[mutants::skip]
    async fn finish_campaign(&self, id: &Uuid) -> Result<(), UpdateCampaignError> {
        let updated = query(
            r#"
            UPDATE campaigns
            SET end_time = COALESCE(end_time, NOW())
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|err| UpdateCampaignError::UnknownError(unknown(err)))?;

        if updated.rows_affected() == 0 {
            return Err(UpdateCampaignError::CampaignNotFound(*id));
        }

        Ok(())
    }

    #[mutants::skip]
    async fn get_campaign(&self, id: &Uuid) -> Result<Campaign, GetCampaignError> {
        Ok(query_as::<_, CampaignRecord>(
            r#"
            SELECT
                id,
                name,
                subject,
                total_emails,
                successful,
                failed,
                pending,
                start_time,
                end_time
            FROM campaigns
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| match err {
            RowNotFound => GetCampaignError::CampaignNotFound(*id),
            _ => GetCampaignError::UnknownError(unknown(err)),
        })?
        .try_into()?)
    }

    #[mutants::skip]
    async fn recent_campaigns(&self, limit: u32) -> Result<Vec<Campaign>, QueryError> {
        query_as::<_, CampaignRecord>(
            r#"
            SELECT
                id,
                name,
                subject,
                total_emails,
                successful,
                failed,
                pending,
                start_time,
                end_time
            FROM campaigns
            ORDER BY start_time DESC
            LIMIT $1
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|err| QueryError::UnknownError(unknown(err)))?
        .into_iter()
        .map(|record| Campaign::try_from(record).map_err(QueryError::from))
        .collect()
    }

    #[mutants::skip]
    async fn outcomes(&self, filter: &OutcomeFilter) -> Result<Vec<MessageOutcome>, QueryError> {
        query_as::<_, OutcomeRecord>(
            r#"
            SELECT
                id,
                campaign_id,
                recipient_email,
                recipient_name,
                subject,
                status,
                error_message,
                sent_at
            FROM email_logs
            WHERE ($1::uuid IS NULL OR campaign_id = $1)
              AND ($2::text IS NULL OR status = $2)
            ORDER BY sent_at DESC, id DESC
            LIMIT $3
            "#,
        )
        .bind(filter.campaign_id)
        .bind(filter.status.map(|status| status.as_str()))
        .bind(i64::from(filter.limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|err| QueryError::UnknownError(unknown(err)))?
        .into_iter()
        .map(|record| MessageOutcome::try_from(record).map_err(QueryError::from))
        .collect()
    }

    #[mutants::skip]
    async fn statistics(&self, campaign_id: Option<Uuid>) -> Result<OutcomeStatistics, QueryError> {
        Ok(query_as::<_, StatisticsRecord>(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE status = 'Success') AS successful,
                COUNT(*) FILTER (WHERE status = 'Failed') AS failed,
                COUNT(*) FILTER (WHERE status = 'Pending') AS pending
            FROM email_logs
            WHERE ($1::uuid IS NULL OR campaign_id = $1)
            "#,
        )
        .bind(campaign_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|err| QueryError::UnknownError(unknown(err)))?
        .try_into()?)
    }

    #[mutants::skip]
    async fn cleanup_old_outcomes(&self, days: u32) -> Result<u64, QueryError> {
        let days = i32::try_from(days).map_err(Error::from)?;

        let deleted = query(
            r#"
            DELETE FROM email_logs
            WHERE sent_at < NOW() - make_interval(days => $1)
            "#,
        )
        .bind(days)
        .execute(&self.pool)
        .await
        .map_err(|err| QueryError::UnknownError(unknown(err)))?
        .rows_affected();

        info!(deleted, days, "deleted old outcome records");

        Ok(deleted)
    }
}
