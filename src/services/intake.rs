use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::{get_match_by_id, get_model_by_id, insert_match, insert_prediction, prediction_exists, upsert_model};
use crate::error::{Result, ScoreboardError};
use crate::models::{AiModel, Match, MatchStatus, Prediction, ScoreLine};

/// Register a model, or update its name and provider if it already exists
pub async fn register_model(pool: &SqlitePool, id: &str, display_name: &str, provider: &str) -> Result<AiModel> {
    let model = AiModel {
        id: id.to_string(),
        display_name: display_name.to_string(),
        provider: provider.to_string(),
        active: true,
        created_at: Utc::now(),
    };
    upsert_model(pool, &model).await?;
    Ok(model)
}

pub async fn schedule_match(
    pool: &SqlitePool,
    home_team: &str,
    away_team: &str,
    league: &str,
    kickoff_at: DateTime<Utc>,
) -> Result<Match> {
    let now = Utc::now();
    let match_data = Match {
        id: Uuid::new_v4().to_string(),
        home_team: home_team.to_string(),
        away_team: away_team.to_string(),
        league: league.to_string(),
        kickoff_at,
        status: MatchStatus::Scheduled,
        home_score: None,
        away_score: None,
        quotas: None,
        scored_at: None,
        created_at: now,
        updated_at: now,
    };
    insert_match(pool, &match_data).await?;

    tracing::info!(
        "Scheduled {} vs {} ({}) at {}",
        match_data.home_team,
        match_data.away_team,
        match_data.league,
        match_data.kickoff_at.to_rfc3339()
    );
    Ok(match_data)
}

/// Store one model's prediction for a match.
///
/// Goals arrive unvalidated from the API, so they are checked here before
/// they can become a `ScoreLine`. A model gets one prediction per match and
/// only while the match is scheduled and has not kicked off.
pub async fn submit_prediction(
    pool: &SqlitePool,
    match_id: &str,
    model_id: &str,
    predicted_home: i64,
    predicted_away: i64,
) -> Result<Prediction> {
    let predicted = ScoreLine::try_from_raw(predicted_home, predicted_away)?;

    let match_data = get_match_by_id(pool, match_id)
        .await?
        .ok_or_else(|| ScoreboardError::MatchNotFound(match_id.to_string()))?;

    let now = Utc::now();
    if match_data.status != MatchStatus::Scheduled || match_data.kickoff_at <= now {
        return Err(ScoreboardError::PredictionsClosed(match_id.to_string()));
    }

    if get_model_by_id(pool, model_id).await?.is_none() {
        return Err(ScoreboardError::ModelNotFound(model_id.to_string()));
    }

    let duplicate = || ScoreboardError::DuplicatePrediction {
        match_id: match_id.to_string(),
        model_id: model_id.to_string(),
    };

    if prediction_exists(pool, match_id, model_id).await? {
        return Err(duplicate());
    }

    let prediction = Prediction {
        id: Uuid::new_v4().to_string(),
        match_id: match_id.to_string(),
        model_id: model_id.to_string(),
        predicted,
        breakdown: None,
        scored_at: None,
        created_at: now,
    };

    // The unique index still decides if two submissions race past the check above
    match insert_prediction(pool, &prediction).await {
        Ok(()) => Ok(prediction),
        Err(ScoreboardError::Database(sqlx::Error::Database(e))) if e.is_unique_violation() => Err(duplicate()),
        Err(e) => Err(e),
    }
}
