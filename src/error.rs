//! Domain errors for intake, settlement and the HTTP surface.

use axum::http::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScoreboardError {
    #[error("invalid score {home}-{away}: goals must be non-negative")]
    InvalidScore { home: i64, away: i64 },

    #[error("match {0} not found")]
    MatchNotFound(String),

    #[error("model {0} not found")]
    ModelNotFound(String),

    #[error("match {0} is not finished")]
    MatchNotFinished(String),

    #[error("match {0} is finished but has no final score")]
    MissingResult(String),

    #[error("match {0} has already been scored")]
    AlreadyScored(String),

    #[error("match {match_id} is {status}, not scheduled")]
    NotScheduled { match_id: String, status: &'static str },

    #[error("predictions for match {0} are closed")]
    PredictionsClosed(String),

    #[error("model {model_id} already predicted match {match_id}")]
    DuplicatePrediction { match_id: String, model_id: String },

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ScoreboardError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ScoreboardError::InvalidScore { .. } => StatusCode::BAD_REQUEST,
            ScoreboardError::MatchNotFound(_) | ScoreboardError::ModelNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            ScoreboardError::MatchNotFinished(_)
            | ScoreboardError::MissingResult(_)
            | ScoreboardError::AlreadyScored(_)
            | ScoreboardError::NotScheduled { .. }
            | ScoreboardError::PredictionsClosed(_)
            | ScoreboardError::DuplicatePrediction { .. } => StatusCode::CONFLICT,
            ScoreboardError::Corrupt(_) | ScoreboardError::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<chrono::ParseError> for ScoreboardError {
    fn from(err: chrono::ParseError) -> Self {
        ScoreboardError::Corrupt(format!("bad timestamp: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, ScoreboardError>;
