//! Postgres implementation of the ConfigRepository trait

use anyhow::anyhow;
use async_trait::async_trait;
use sqlx::{query, query_as};
use tracing::debug;

use crate::{
    domain::configuration::{ConfigRepository, ConfigValueError},
    infrastructure::db::postgres::PostgresDatabase,
};

#[async_trait]
impl ConfigRepository for PostgresDatabase {
    #[mutants::skip]
    async fn get_config_value(&self, key: &str) -> Result<Option<String>, ConfigValueError> {
        let value: Option<(String,)> = query_as("SELECT value FROM config WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| anyhow!("Unknown database error: {:?}", err))?;

        Ok(value.map(|(value,)| value))
    }

    #[mutants::skip]
    async fn set_config_value(&self, key: &str, value: &str) -> Result<(), ConfigValueError> {
        query(
            r#"
            INSERT INTO config (key, value, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (key)
            DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(|err| anyhow!("Unknown database error: {:?}", err))?;

        debug!(key, "stored setting");

        Ok(())
    }
}
