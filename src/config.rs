//! Runtime configuration, read from the environment after `.env` is loaded.

use anyhow::{Context, Result};
use std::env;

const DEFAULT_DATABASE_URL: &str = "sqlite:../data/matchoracle.db";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_LEADERBOARD_LIMIT: usize = 50;
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    /// Rows returned by the leaderboard when the caller gives no limit
    pub leaderboard_limit: usize,
    /// How long a settlement waits for another writer to release the database
    pub busy_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            port: DEFAULT_PORT,
            leaderboard_limit: DEFAULT_LEADERBOARD_LIMIT,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let port = match lookup("PORT") {
            Some(raw) => raw.parse().with_context(|| format!("PORT must be a port number, got '{}'", raw))?,
            None => defaults.port,
        };
        let leaderboard_limit = match lookup("LEADERBOARD_LIMIT") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("LEADERBOARD_LIMIT must be a positive integer, got '{}'", raw))?,
            None => defaults.leaderboard_limit,
        };
        let busy_timeout_ms = match lookup("DB_BUSY_TIMEOUT_MS") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("DB_BUSY_TIMEOUT_MS must be milliseconds, got '{}'", raw))?,
            None => defaults.busy_timeout_ms,
        };

        Ok(Self {
            database_url: lookup("DATABASE_URL").unwrap_or(defaults.database_url),
            port,
            leaderboard_limit,
            busy_timeout_ms,
        })
    }
}
