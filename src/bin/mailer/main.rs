#![warn(
    missing_debug_implementations,
    rust_2018_idioms,
    missing_docs,
    rustdoc::broken_intra_doc_links,
    rustdoc::missing_crate_level_docs
)]

//! Command-line front end for personalised bulk email campaigns

use std::{io::BufReader, path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use bulk_mailer::{
    domain::{
        campaigns::{
            spawn_control_reader, BulkSender, CampaignRepository, DeliveryStatus, NewCampaign,
            OutcomeFilter, SendControl, SendEvent, SendJob,
        },
        communication::templates::missing_for,
        configuration::{default_delay, delay_from_secs, ConfigRepository},
        recipients::{validate, Recipient, ValidationReport},
    },
    infrastructure::{
        db::postgres::{DatabaseConnectionDetails, PostgresDatabase},
        email::smtp::{test_smtp, LettreSmtpClient, SmtpSettings},
        spreadsheet::read_recipients,
    },
};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Command-line arguments / environment variables
#[derive(Debug, Parser)]
#[command(name = "mailer", version, about)]
pub struct Args {
    /// What to do
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Check a recipient list without sending anything
    Validate {
        /// CSV file or workbook (.xlsx, .xls, .ods) with an email column
        file: PathBuf,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Send a campaign
    Send(SendArgs),

    /// List recent campaigns
    Campaigns {
        /// Maximum campaigns to show
        #[arg(long, default_value_t = 10)]
        limit: u32,

        /// The database connection details
        #[command(flatten)]
        db: DatabaseConnectionDetails,
    },

    /// Show recorded outcomes, newest first
    Logs {
        /// Only this campaign
        #[arg(long)]
        campaign: Option<Uuid>,

        /// Only this status (success, failed, pending)
        #[arg(long)]
        status: Option<DeliveryStatus>,

        /// Maximum outcomes to show
        #[arg(long, default_value_t = 100)]
        limit: u32,

        /// The database connection details
        #[command(flatten)]
        db: DatabaseConnectionDetails,
    },

    /// Show outcome counts
    Stats {
        /// Only this campaign
        #[arg(long)]
        campaign: Option<Uuid>,

        /// The database connection details
        #[command(flatten)]
        db: DatabaseConnectionDetails,
    },

    /// Delete old outcome records
    Cleanup {
        /// Keep outcomes newer than this many days
        #[arg(long, default_value_t = 30)]
        days: u32,

        /// The database connection details
        #[command(flatten)]
        db: DatabaseConnectionDetails,
    },

    /// Read or write stored settings
    Config {
        /// get or set
        #[command(subcommand)]
        action: ConfigAction,

        /// The database connection details
        #[command(flatten)]
        db: DatabaseConnectionDetails,
    },

    /// Check the SMTP settings by logging in once
    TestSmtp {
        /// The SMTP settings
        #[command(flatten)]
        smtp: SmtpSettings,

        /// The database connection details
        #[command(flatten)]
        db: DatabaseConnectionDetails,
    },

    /// Apply database migrations
    Migrate {
        /// The database connection details
        #[command(flatten)]
        db: DatabaseConnectionDetails,
    },
}

/// Stored settings actions
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Print a stored value
    Get {
        /// Setting name, e.g. smtp_server
        key: String,
    },

    /// Store a value
    Set {
        /// Setting name, e.g. default_delay
        key: String,

        /// New value
        value: String,
    },
}

/// Arguments for `send`
#[derive(Debug, clap::Args)]
pub struct SendArgs {
    /// CSV file or workbook (.xlsx, .xls, .ods) with an email column
    pub file: PathBuf,

    /// Subject template, e.g. "Hello {name}"
    #[arg(long)]
    pub subject: String,

    /// HTML body template file
    #[arg(long)]
    pub body: PathBuf,

    /// Seconds between messages (defaults to the stored default_delay)
    #[arg(long)]
    pub delay: Option<f64>,

    /// Campaign name (defaults to Campaign_<timestamp>)
    #[arg(long)]
    pub name: Option<String>,

    /// Print events as JSON lines
    #[arg(long)]
    pub json: bool,

    /// The SMTP settings
    #[command(flatten)]
    pub smtp: SmtpSettings,

    /// The database connection details
    #[command(flatten)]
    pub db: DatabaseConnectionDetails,
}

#[mutants::skip]
#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match args.command {
        Command::Validate { file, json } => {
            let (_, report) = validate(&read_recipients(&file).await?)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
        }
        Command::Send(args) => send(args).await?,
        Command::Campaigns { limit, db } => {
            let db = connect(&db).await?;

            for campaign in db.recent_campaigns(limit).await? {
                println!(
                    "{}  {:<28} {:>5} total {:>5} ok {:>5} failed  started {}  {}",
                    campaign.id,
                    campaign.name,
                    campaign.total,
                    campaign.successful,
                    campaign.failed,
                    campaign.started_at.format("%Y-%m-%d %H:%M:%S"),
                    match campaign.ended_at {
                        Some(ended_at) => format!("ended {}", ended_at.format("%Y-%m-%d %H:%M:%S")),
                        None => "running".to_string(),
                    }
                );
            }
        }
        Command::Logs {
            campaign,
            status,
            limit,
            db,
        } => {
            let db = connect(&db).await?;
            let filter = OutcomeFilter {
                campaign_id: campaign,
                status,
                limit,
            };

            for outcome in db.outcomes(&filter).await? {
                println!(
                    "{}  {:<7} {:<32} {:<20} {}",
                    outcome.sent_at.format("%Y-%m-%d %H:%M:%S"),
                    outcome.status,
                    outcome.address,
                    outcome.name,
                    outcome.error.unwrap_or_default()
                );
            }
        }
        Command::Stats { campaign, db } => {
            let db = connect(&db).await?;
            let stats = db.statistics(campaign).await?;

            println!("Total:      {}", stats.total);
            println!("Successful: {}", stats.successful);
            println!("Failed:     {}", stats.failed);
            println!("Pending:    {}", stats.pending);
            println!("Success:    {:.1}%", stats.success_rate());
        }
        Command::Cleanup { days, db } => {
            let deleted = connect(&db).await?.cleanup_old_outcomes(days).await?;

            println!("Deleted {deleted} outcome records older than {days} days");
        }
        Command::Config { action, db } => {
            let db = connect(&db).await?;

            match action {
                ConfigAction::Get { key } => match db.get_config_value(&key).await? {
                    Some(value) => println!("{value}"),
                    None => bail!("no value stored for '{key}'"),
                },
                ConfigAction::Set { key, value } => {
                    db.set_config_value(&key, &value).await?;
                    println!("Saved {key}");
                }
            }
        }
        Command::TestSmtp { smtp, db } => {
            let db = connect(&db).await?;
            let config = smtp.resolve(&db).await?;

            test_smtp(&config).await?;
            println!("Connected and authenticated to {}:{}", config.host, config.port);
        }
        Command::Migrate { db } => {
            connect(&db).await?.migrate().await?;
            println!("Migrations applied");
        }
    }

    Ok(())
}

#[mutants::skip]
async fn connect(details: &DatabaseConnectionDetails) -> Result<PostgresDatabase> {
    PostgresDatabase::new(&details.connection_string)
        .await
        .context("could not connect to the database")
}

#[mutants::skip]
async fn send(args: SendArgs) -> Result<()> {
    let (recipients, report) = validate(&read_recipients(&args.file).await?)?;

    print_report(&report);

    if !report.is_sendable() {
        bail!("no valid recipients in {}", args.file.display());
    }

    let body_template = tokio::fs::read_to_string(&args.body)
        .await
        .with_context(|| format!("could not read {}", args.body.display()))?;

    warn_missing_placeholders(&recipients, &args.subject, &body_template);

    let db = connect(&args.db).await?;
    let config = args.smtp.resolve(&db).await?;

    let delay = match args.delay {
        Some(seconds) => match delay_from_secs(seconds) {
            Some(delay) => delay,
            None => bail!("invalid delay: {seconds}"),
        },
        None => default_delay(&db).await,
    };

    let name = args
        .name
        .unwrap_or_else(|| NewCampaign::default_name(Utc::now()));
    let campaign = NewCampaign::new(name, args.subject.as_str(), recipients.len() as u32);
    let campaign_id = db.create_campaign(&campaign).await?;

    info!(%campaign_id, recipients = recipients.len(), ?delay, "campaign created");
    println!("Campaign {campaign_id}: p+Enter pauses, r+Enter resumes, s+Enter or Ctrl+C stops");

    let mut handle = BulkSender::new(LettreSmtpClient::new(), Arc::new(db)).start(SendJob {
        campaign_id,
        config,
        recipients,
        subject_template: args.subject,
        body_template,
        delay,
    });

    spawn_control_reader(BufReader::new(std::io::stdin()), handle.control().clone())
        .context("could not start the control reader")?;
    tokio::spawn(stop_on_interrupt(handle.control().clone()));

    while let Some(event) = handle.next_event().await {
        if args.json {
            println!("{}", serde_json::to_string(&event)?);
        } else {
            print_event(&event);
        }
    }

    let summary = handle.join().await?;

    if summary.unprocessed() > 0 {
        println!("{} recipients were not attempted", summary.unprocessed());
    }

    Ok(())
}

#[mutants::skip]
async fn stop_on_interrupt(control: SendControl) {
    if tokio::signal::ctrl_c().await.is_ok() {
        println!("Stopping email sender...");
        control.stop();
    }
}

fn warn_missing_placeholders(recipients: &[Recipient], subject: &str, body: &str) {
    let Some(first) = recipients.first() else {
        return;
    };

    let template = format!("{subject}\n{body}");
    let missing = missing_for(&template, first.column_names());

    if !missing.is_empty() {
        let missing = missing.into_iter().collect::<Vec<_>>().join(", ");

        warn!(%missing, "placeholders without a matching column will be sent as written");
        println!("Warning: no column for placeholders: {missing}");
    }
}

fn print_report(report: &ValidationReport) {
    println!("Rows:       {}", report.total_rows);
    println!("Valid:      {}", report.valid);
    println!("Invalid:    {}", report.invalid);
    println!("Missing:    {}", report.missing);
    println!("Duplicates: {}", report.duplicates);
    println!("Disposable: {}", report.disposable);
    println!("Accepted:   {}", report.accepted);
    println!(
        "Columns:    {} (email: {}, name: {})",
        report.columns.join(", "),
        report.email_column,
        report.name_column.as_deref().unwrap_or("-")
    );

    if !report.shadowed_columns.is_empty() {
        println!(
            "Ignored:    {} (shadowed by the resolved email/name columns)",
            report.shadowed_columns.join(", ")
        );
    }

    for rejection in &report.rejections {
        println!(
            "  row {}: {:?} {}",
            rejection.row,
            rejection.reason,
            rejection.address.as_deref().unwrap_or_default()
        );
    }
}

fn print_event(event: &SendEvent) {
    match event {
        SendEvent::Progress { .. } => {}
        SendEvent::Status { message } => println!("{message}"),
        SendEvent::Delivery(log) if !log.status.is_success() => {
            println!("Failed: {} ({}): {}", log.address, log.name, log.error)
        }
        SendEvent::Delivery(_) => {}
        SendEvent::Completed(summary) => println!(
            "Done: {} successful, {} failed of {} in {:.1}s",
            summary.successful,
            summary.failed,
            summary.total,
            summary.elapsed.as_secs_f64()
        ),
    }
}
