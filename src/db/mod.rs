pub mod seed;
pub use seed::seed_data;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteRow};
use sqlx::{Row, SqliteExecutor, SqlitePool};
use std::str::FromStr;
use std::time::Duration;

use crate::config::Config;
use crate::error::{Result, ScoreboardError};
use crate::models::*;

pub async fn create_pool(config: &Config) -> Result<SqlitePool> {
    let database_url = &config.database_url;

    // Strip the "sqlite:" prefix to get the file path, create parent dir if needed
    let file_path = database_url
        .strip_prefix("sqlite:///")
        .or_else(|| database_url.strip_prefix("sqlite://"))
        .or_else(|| database_url.strip_prefix("sqlite:"))
        .unwrap_or(database_url);

    if !file_path.starts_with(":memory:") {
        if let Some(parent) = std::path::Path::new(file_path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
        }
    }

    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms));

    let pool = SqlitePool::connect_with(options).await?;
    Ok(pool)
}

/// Single-connection in-memory pool with the schema applied.
#[cfg(test)]
pub async fn test_pool() -> SqlitePool {
    use sqlx::sqlite::SqlitePoolOptions;

    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .unwrap()
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .unwrap();
    init_database_with_pool(&pool).await.unwrap();
    pool
}

/// File-backed database with a multi-connection pool, for tests that need
/// real writer contention. Files are removed by `close`.
#[cfg(test)]
pub struct FileTestDb {
    pub pool: SqlitePool,
    pub config: Config,
    path: std::path::PathBuf,
}

#[cfg(test)]
impl FileTestDb {
    pub async fn open(busy_timeout_ms: u64) -> Self {
        let path = std::env::temp_dir().join(format!("matchoracle-test-{}.db", uuid::Uuid::new_v4()));
        let config = Config {
            database_url: format!("sqlite:{}", path.display()),
            busy_timeout_ms,
            ..Config::default()
        };
        let pool = create_pool(&config).await.unwrap();
        init_database_with_pool(&pool).await.unwrap();
        Self { pool, config, path }
    }

    pub async fn close(self) {
        self.pool.close().await;
        for suffix in ["", "-wal", "-shm"] {
            let mut file = self.path.clone().into_os_string();
            file.push(suffix);
            std::fs::remove_file(file).ok();
        }
    }
}

/// Called from the CLI where no pool exists yet.
pub async fn init_database(config: &Config) -> Result<()> {
    let pool = create_pool(config).await?;
    init_database_with_pool(&pool).await
}

/// Called from the server so schema creation shares the main pool.
pub async fn init_database_with_pool(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS models (
            id TEXT PRIMARY KEY,
            display_name TEXT NOT NULL,
            provider TEXT NOT NULL,
            active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS matches (
            id TEXT PRIMARY KEY,
            home_team TEXT NOT NULL,
            away_team TEXT NOT NULL,
            league TEXT NOT NULL,
            kickoff_at TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'scheduled',
            home_score INTEGER,
            away_score INTEGER,
            quota_home INTEGER,
            quota_draw INTEGER,
            quota_away INTEGER,
            scored_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // One prediction per (match, model); rows are never edited except for scoring columns
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS predictions (
            id TEXT PRIMARY KEY,
            match_id TEXT NOT NULL,
            model_id TEXT NOT NULL,
            predicted_home INTEGER NOT NULL,
            predicted_away INTEGER NOT NULL,
            tendency_points INTEGER,
            goal_diff_bonus INTEGER,
            exact_score_bonus INTEGER,
            total_points INTEGER,
            scored_at TEXT,
            created_at TEXT NOT NULL,
            UNIQUE (match_id, model_id),
            FOREIGN KEY (match_id) REFERENCES matches (id),
            FOREIGN KEY (model_id) REFERENCES models (id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_matches_status ON matches(status)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_predictions_model ON predictions(model_id)")
        .execute(pool)
        .await?;

    tracing::info!("Database initialized successfully");
    Ok(())
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)?.with_timezone(&Utc))
}

fn parse_optional_timestamp(raw: Option<String>) -> Result<Option<DateTime<Utc>>> {
    raw.as_deref().map(parse_timestamp).transpose()
}

fn unsigned(raw: Option<i64>, column: &str) -> Result<Option<u32>> {
    raw.map(|value| {
        u32::try_from(value).map_err(|_| ScoreboardError::Corrupt(format!("{} = {}", column, value)))
    })
    .transpose()
}

// Model operations

pub async fn upsert_model(pool: &SqlitePool, model: &AiModel) -> Result<()> {
    sqlx::query(
        r#"INSERT INTO models (id, display_name, provider, active, created_at)
           VALUES (?, ?, ?, ?, ?)
           ON CONFLICT(id) DO UPDATE SET
               display_name = excluded.display_name,
               provider     = excluded.provider,
               active       = excluded.active"#,
    )
    .bind(&model.id)
    .bind(&model.display_name)
    .bind(&model.provider)
    .bind(model.active)
    .bind(model.created_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_model_by_id(pool: &SqlitePool, model_id: &str) -> Result<Option<AiModel>> {
    let row = sqlx::query("SELECT * FROM models WHERE id = ?")
        .bind(model_id)
        .fetch_optional(pool)
        .await?;

    row.map(|row| {
        Ok(AiModel {
            id: row.get("id"),
            display_name: row.get("display_name"),
            provider: row.get("provider"),
            active: row.get("active"),
            created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
        })
    })
    .transpose()
}

// Match operations

pub async fn insert_match(pool: &SqlitePool, match_data: &Match) -> Result<()> {
    let quotas = match_data.quotas;
    sqlx::query(
        r#"INSERT INTO matches
           (id, home_team, away_team, league, kickoff_at, status, home_score, away_score,
            quota_home, quota_draw, quota_away, scored_at, created_at, updated_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
           ON CONFLICT(id) DO UPDATE SET
               home_team  = excluded.home_team,
               away_team  = excluded.away_team,
               league     = excluded.league,
               kickoff_at = excluded.kickoff_at,
               status     = excluded.status,
               home_score = excluded.home_score,
               away_score = excluded.away_score,
               quota_home = excluded.quota_home,
               quota_draw = excluded.quota_draw,
               quota_away = excluded.quota_away,
               scored_at  = excluded.scored_at,
               updated_at = excluded.updated_at"#,
    )
    .bind(&match_data.id)
    .bind(&match_data.home_team)
    .bind(&match_data.away_team)
    .bind(&match_data.league)
    .bind(match_data.kickoff_at.to_rfc3339())
    .bind(match_data.status.as_str())
    .bind(match_data.home_score)
    .bind(match_data.away_score)
    .bind(quotas.map(|q| q.home))
    .bind(quotas.map(|q| q.draw))
    .bind(quotas.map(|q| q.away))
    .bind(match_data.scored_at.map(|t| t.to_rfc3339()))
    .bind(match_data.created_at.to_rfc3339())
    .bind(match_data.updated_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

fn match_from_row(row: &SqliteRow) -> Result<Match> {
    let quotas = match (
        unsigned(row.get("quota_home"), "quota_home")?,
        unsigned(row.get("quota_draw"), "quota_draw")?,
        unsigned(row.get("quota_away"), "quota_away")?,
    ) {
        (Some(home), Some(draw), Some(away)) => Some(Quotas { home, draw, away }),
        _ => None,
    };

    Ok(Match {
        id: row.get("id"),
        home_team: row.get("home_team"),
        away_team: row.get("away_team"),
        league: row.get("league"),
        kickoff_at: parse_timestamp(&row.get::<String, _>("kickoff_at"))?,
        status: row.get::<String, _>("status").parse()?,
        home_score: unsigned(row.get("home_score"), "home_score")?,
        away_score: unsigned(row.get("away_score"), "away_score")?,
        quotas,
        scored_at: parse_optional_timestamp(row.get("scored_at"))?,
        created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
        updated_at: parse_timestamp(&row.get::<String, _>("updated_at"))?,
    })
}

pub async fn get_match_by_id<'e, E>(executor: E, match_id: &str) -> Result<Option<Match>>
where
    E: SqliteExecutor<'e>,
{
    let row = sqlx::query("SELECT * FROM matches WHERE id = ?")
        .bind(match_id)
        .fetch_optional(executor)
        .await?;

    row.as_ref().map(match_from_row).transpose()
}

pub async fn get_finished_match_ids(pool: &SqlitePool) -> Result<Vec<String>> {
    let rows = sqlx::query("SELECT id FROM matches WHERE status = 'finished' ORDER BY kickoff_at ASC")
        .fetch_all(pool)
        .await?;

    Ok(rows.iter().map(|row| row.get("id")).collect())
}

// Prediction operations

pub async fn insert_prediction(pool: &SqlitePool, prediction: &Prediction) -> Result<()> {
    sqlx::query(
        r#"INSERT INTO predictions (id, match_id, model_id, predicted_home, predicted_away, created_at)
           VALUES (?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&prediction.id)
    .bind(&prediction.match_id)
    .bind(&prediction.model_id)
    .bind(prediction.predicted.home)
    .bind(prediction.predicted.away)
    .bind(prediction.created_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

fn prediction_from_row(row: &SqliteRow) -> Result<Prediction> {
    let predicted_home: i64 = row.get("predicted_home");
    let predicted_away: i64 = row.get("predicted_away");
    let predicted = ScoreLine::try_from_raw(predicted_home, predicted_away)
        .map_err(|e| ScoreboardError::Corrupt(e.to_string()))?;

    let scored_at = parse_optional_timestamp(row.get("scored_at"))?;
    let breakdown = match scored_at {
        Some(_) => Some(ScoringBreakdown {
            tendency_points: unsigned(row.get("tendency_points"), "tendency_points")?.unwrap_or_default(),
            goal_diff_bonus: unsigned(row.get("goal_diff_bonus"), "goal_diff_bonus")?.unwrap_or_default(),
            exact_score_bonus: unsigned(row.get("exact_score_bonus"), "exact_score_bonus")?.unwrap_or_default(),
            total: unsigned(row.get("total_points"), "total_points")?.unwrap_or_default(),
        }),
        None => None,
    };

    Ok(Prediction {
        id: row.get("id"),
        match_id: row.get("match_id"),
        model_id: row.get("model_id"),
        predicted,
        breakdown,
        scored_at,
        created_at: parse_timestamp(&row.get::<String, _>("created_at"))?,
    })
}

pub async fn get_predictions_for_match<'e, E>(executor: E, match_id: &str) -> Result<Vec<Prediction>>
where
    E: SqliteExecutor<'e>,
{
    let rows = sqlx::query("SELECT * FROM predictions WHERE match_id = ? ORDER BY created_at, model_id")
        .bind(match_id)
        .fetch_all(executor)
        .await?;

    rows.iter().map(prediction_from_row).collect()
}

pub async fn prediction_exists(pool: &SqlitePool, match_id: &str, model_id: &str) -> Result<bool> {
    let row = sqlx::query("SELECT 1 FROM predictions WHERE match_id = ? AND model_id = ?")
        .bind(match_id)
        .bind(model_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.is_some())
}
