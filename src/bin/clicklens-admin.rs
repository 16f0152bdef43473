use anyhow::{bail, Result};
use chrono::{Duration, Local, Utc};
use clap::{Parser, Subcommand};
use clicklens::analytics::{window_start, ClickAnalyticsAggregator};
use clicklens::config::{Config, DatabaseBackend};
use clicklens::storage::{PostgresStorage, SqliteStorage, Storage};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "clicklens-admin")]
#[command(about = "ClickLens maintenance CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the links owned by a user
    Links {
        /// Owner ID (sub claim from JWT)
        #[arg(long)]
        owner: String,
    },
    /// Print the seven-day analytics report of a link as JSON
    Report {
        #[arg(long)]
        link_id: i64,
        /// Owner ID (sub claim from JWT)
        #[arg(long)]
        owner: String,
    },
    /// Delete clicks older than the given number of days
    Prune {
        #[arg(long, default_value_t = 90)]
        older_than_days: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let storage: Arc<dyn Storage> = match config.database.backend {
        DatabaseBackend::Sqlite => Arc::new(
            SqliteStorage::new(&config.database.url, config.database.max_connections).await?,
        ),
        DatabaseBackend::Postgres => Arc::new(
            PostgresStorage::new(&config.database.url, config.database.max_connections).await?,
        ),
    };

    storage.init().await?;

    match cli.command {
        Commands::Links { owner } => {
            let links = storage.list_links(&owner).await?;
            if links.is_empty() {
                println!("No links owned by {}", owner);
            } else {
                println!("{:<8} {:<34} {:>8}  Destination", "ID", "Alias", "Clicks");
                println!("{}", "-".repeat(80));
                for entry in links {
                    println!(
                        "{:<8} {:<34} {:>8}  {}",
                        entry.link.id, entry.link.alias, entry.clicks, entry.link.original_url
                    );
                }
            }
        }
        Commands::Report { link_id, owner } => {
            let now = Local::now();
            let clicks = storage
                .fetch_clicks_for_link(link_id, &owner, window_start(&now))
                .await?;
            let report = ClickAnalyticsAggregator::new().aggregate(&clicks, &now);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Prune { older_than_days } => {
            if older_than_days < 1 {
                bail!("--older-than-days must be at least 1");
            }
            let removed = storage
                .prune_clicks(Utc::now() - Duration::days(older_than_days))
                .await?;
            println!("✓ Removed {} click(s) older than {} days", removed, older_than_days);
        }
    }

    Ok(())
}
