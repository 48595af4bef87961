//! LINO back-office administration CLI
//!
//! Cron-friendly entry points for alert housekeeping, plus a token helper
//! for local development.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use lino_backoffice::{
    init_tracing, middleware::auth::encode_jwt, models::AlertRule, services::AlertService, Config,
};
use shared::default_roles;
use sqlx::{postgres::PgPoolOptions, PgPool};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "lino-admin", about = "LINO back-office administration", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate alert rules for a user and store new alerts
    GenerateAlerts {
        /// User who receives the alerts
        #[arg(long)]
        user: Uuid,
        #[arg(long, value_enum, default_value_t = AlertKind::All)]
        kind: AlertKind,
        /// Print the per-rule counts
        #[arg(long, action = ArgAction::SetTrue)]
        verbose: bool,
    },
    /// Archive read alerts older than the given number of days
    ArchiveAlerts {
        /// Defaults to `alerts.archive_after_days`
        #[arg(long)]
        days: Option<i64>,
    },
    /// Sign an access token for local development
    IssueToken {
        #[arg(long)]
        user: Uuid,
        #[arg(long, default_value = "admin")]
        username: String,
        /// `resource:action` keys; the owner role when omitted
        #[arg(long = "permission")]
        permissions: Vec<String>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum AlertKind {
    Stock,
    Margin,
    DeadStock,
    Opportunities,
    All,
}

impl AlertKind {
    fn rules(self) -> Vec<AlertRule> {
        match self {
            AlertKind::Stock => vec![AlertRule::Stock],
            AlertKind::Margin => vec![AlertRule::Margin],
            AlertKind::DeadStock => vec![AlertRule::DeadStock],
            AlertKind::Opportunities => vec![AlertRule::Opportunities],
            AlertKind::All => AlertRule::ALL.to_vec(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing("lino_admin=info,lino_backoffice=info,sqlx=warn");

    let cli = Cli::parse();
    let config = Config::load().context("loading configuration")?;

    match cli.command {
        Commands::GenerateAlerts {
            user,
            kind,
            verbose,
        } => {
            let db = connect(&config).await?;
            let service = AlertService::new(db);
            let report = service
                .generate(user, &kind.rules(), Utc::now().date_naive())
                .await
                .map_err(|e| anyhow!("alert generation failed: {}", e))?;

            if verbose {
                for (rule, count) in &report.created {
                    println!("{:<15} {}", rule, count);
                }
                println!("{:<15} {}", "duplicates", report.skipped_duplicates);
            }
            println!("{} alerts created", report.total);
        }
        Commands::ArchiveAlerts { days } => {
            let days = days.unwrap_or(config.alerts.archive_after_days);
            if days < 1 {
                return Err(anyhow!("--days must be at least 1"));
            }
            let db = connect(&config).await?;
            let archived = AlertService::new(db)
                .archive_old(days)
                .await
                .map_err(|e| anyhow!("archiving failed: {}", e))?;
            println!("{} alerts archived", archived);
        }
        Commands::IssueToken {
            user,
            username,
            permissions,
        } => {
            let permissions = if permissions.is_empty() {
                owner_permissions()
            } else {
                permissions
            };
            let token = encode_jwt(
                user,
                &username,
                permissions,
                config.jwt.access_token_expiry,
                &config.jwt.secret,
            )
            .map_err(|e| anyhow!("{}", e))?;
            println!("{}", token);
        }
    }

    Ok(())
}

async fn connect(config: &Config) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(2)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&config.database.url)
        .await
        .context("connecting to database")
}

fn owner_permissions() -> Vec<String> {
    default_roles()
        .into_iter()
        .find(|(name, _)| *name == "owner")
        .map(|(_, permissions)| permissions.iter().flat_map(|p| p.keys()).collect())
        .unwrap_or_default()
}
