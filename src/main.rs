mod api;
mod cli;
mod config;
mod db;
mod error;
mod models;
mod services;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

#[derive(Parser)]
#[command(name = "matchoracle")]
#[command(about = "Quota-based scoring and leaderboards for AI football predictions")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Initialize the database
    InitDb,
    /// Load demo models, matches and predictions
    Seed,
    /// Record a final score and score every prediction for the match
    Settle {
        match_id: String,
        #[arg(long)]
        home: u32,
        #[arg(long)]
        away: u32,
        /// Only record the score; predictions are scored by a later `rescore`
        #[arg(long)]
        finish_only: bool,
    },
    /// Recompute quotas and points for one match, or every finished match
    Rescore {
        #[arg(required_unless_present = "all")]
        match_id: Option<String>,
        #[arg(long, conflicts_with = "match_id")]
        all: bool,
    },
    /// Show model standings
    Leaderboard {
        #[arg(short, long)]
        limit: Option<usize>,
        /// Also write the table to a CSV file
        #[arg(long)]
        csv: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut config = Config::from_env()?;
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve { port }) => {
            if let Some(port) = port {
                config.port = port;
            }
            tracing::info!("Starting MatchOracle API server on port {}", config.port);
            api::serve(config).await?;
        }
        Some(Commands::InitDb) => {
            tracing::info!("Initializing database...");
            db::init_database(&config).await?;
        }
        Some(Commands::Seed) => {
            tracing::info!("Seeding demo data...");
            cli::seed(&config).await?;
        }
        Some(Commands::Settle {
            match_id,
            home,
            away,
            finish_only,
        }) => {
            tracing::info!("Settling match {}", match_id);
            cli::settle(&config, &match_id, home, away, finish_only).await?;
        }
        Some(Commands::Rescore { match_id, all }) => {
            let target = if all { None } else { match_id.as_deref() };
            cli::rescore(&config, target).await?;
        }
        Some(Commands::Leaderboard { limit, csv }) => {
            cli::show_leaderboard(&config, limit, csv.as_deref()).await?;
        }
        None => {
            // Default to serving
            tracing::info!("Starting MatchOracle API server on port {}", config.port);
            api::serve(config).await?;
        }
    }

    Ok(())
}
