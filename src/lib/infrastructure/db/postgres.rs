//! Postgres module

mod campaigns;
mod config;

use anyhow::Result;
use clap::Parser;
use sqlx::{migrate::Migrator, postgres::PgPoolOptions, PgPool};
use tracing::info;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Database connection
#[derive(Debug, Clone)]
pub struct PostgresDatabase {
    /// The database connection pool
    pub pool: PgPool,
}

impl PostgresDatabase {
    /// Create a new database connection
    #[mutants::skip]
    pub async fn new(connection_string: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(connection_string)
            .await?;

        Ok(Self { pool })
    }

    /// Returns the underlying database connection
    pub fn connection(&self) -> &PgPool {
        &self.pool
    }

    /// Applies any pending schema migrations
    #[mutants::skip]
    pub async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await?;
        info!("database migrations applied");

        Ok(())
    }
}

/// Database connection details
#[derive(Debug, Parser)]
pub struct DatabaseConnectionDetails {
    /// The database connection string
    #[arg(long = "database-url", env = "DATABASE_URL")]
    pub connection_string: String,
}
