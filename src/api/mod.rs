use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::SqlitePool;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::Config;
use crate::db::{create_pool, get_match_by_id, get_predictions_for_match, init_database_with_pool};
use crate::error::ScoreboardError;
use crate::models::{AiModel, ApiResponse, LeaderboardEntry, Match, Prediction, ScoreLine};
use crate::services::{
    leaderboard, record_result, register_model, schedule_match, settle_match, start_match, submit_prediction,
    SettleMode, SettlementReport,
};

const MAX_LEADERBOARD_LIMIT: usize = 100;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Config,
}

pub async fn serve(config: Config) -> anyhow::Result<()> {
    let pool = create_pool(&config).await?;
    init_database_with_pool(&pool).await?;

    let port = config.port;
    let app = create_router().with_state(AppState { pool, config });

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    tracing::info!("MatchOracle API server listening on port {}", port);

    axum::serve(listener, app).await?;
    Ok(())
}

fn create_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/models", post(register_model_handler))
        .route("/matches", post(schedule_match_handler))
        .route("/matches/{id}", get(get_match_handler))
        .route("/matches/{id}/predictions", get(get_match_predictions_handler))
        .route("/matches/{id}/start", post(start_match_handler))
        .route("/matches/{id}/result", post(record_result_handler))
        .route("/matches/{id}/rescore", post(rescore_match_handler))
        .route("/predictions", post(submit_prediction_handler))
        .route("/leaderboard", get(leaderboard_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

impl IntoResponse for ScoreboardError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::warn!("Request rejected: {}", self);
        }
        (status, Json(ApiResponse::<()>::error(self.to_string()))).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ScoreboardError>;

// Health check endpoint
async fn health_check() -> Json<ApiResponse<&'static str>> {
    Json(ApiResponse::success("MatchOracle API is running"))
}

// POST /models - Register or update a model
#[derive(Deserialize)]
struct RegisterModelRequest {
    id: String,
    display_name: String,
    provider: String,
}

async fn register_model_handler(
    State(state): State<AppState>,
    Json(request): Json<RegisterModelRequest>,
) -> ApiResult<AiModel> {
    let model = register_model(&state.pool, &request.id, &request.display_name, &request.provider).await?;
    Ok(Json(ApiResponse::success(model)))
}

// POST /matches - Schedule a match
#[derive(Deserialize)]
struct ScheduleMatchRequest {
    home_team: String,
    away_team: String,
    league: String,
    kickoff_at: DateTime<Utc>,
}

async fn schedule_match_handler(
    State(state): State<AppState>,
    Json(request): Json<ScheduleMatchRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Match>>), ScoreboardError> {
    let match_data = schedule_match(
        &state.pool,
        &request.home_team,
        &request.away_team,
        &request.league,
        request.kickoff_at,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(match_data))))
}

// GET /matches/{id} - Match with its quotas once settled
async fn get_match_handler(State(state): State<AppState>, Path(match_id): Path<String>) -> ApiResult<Match> {
    let match_data = get_match_by_id(&state.pool, &match_id)
        .await?
        .ok_or(ScoreboardError::MatchNotFound(match_id))?;
    Ok(Json(ApiResponse::success(match_data)))
}

// GET /matches/{id}/predictions - Every prediction with its breakdown
async fn get_match_predictions_handler(
    State(state): State<AppState>,
    Path(match_id): Path<String>,
) -> ApiResult<Vec<Prediction>> {
    if get_match_by_id(&state.pool, &match_id).await?.is_none() {
        return Err(ScoreboardError::MatchNotFound(match_id));
    }
    let predictions = get_predictions_for_match(&state.pool, &match_id).await?;
    Ok(Json(ApiResponse::success(predictions)))
}

// POST /matches/{id}/start - Kick off a scheduled match, closing predictions
async fn start_match_handler(State(state): State<AppState>, Path(match_id): Path<String>) -> ApiResult<Match> {
    start_match(&state.pool, &match_id).await?;
    let match_data = get_match_by_id(&state.pool, &match_id)
        .await?
        .ok_or(ScoreboardError::MatchNotFound(match_id))?;
    Ok(Json(ApiResponse::success(match_data)))
}

// POST /matches/{id}/result - Finish a match and settle it
#[derive(Deserialize)]
struct RecordResultRequest {
    home_score: i64,
    away_score: i64,
}

async fn record_result_handler(
    State(state): State<AppState>,
    Path(match_id): Path<String>,
    Json(request): Json<RecordResultRequest>,
) -> ApiResult<SettlementReport> {
    let actual = ScoreLine::try_from_raw(request.home_score, request.away_score)?;
    let report = record_result(&state.pool, &match_id, actual).await?;
    Ok(Json(ApiResponse::success(report)))
}

// POST /matches/{id}/rescore - Recompute quotas and breakdowns
async fn rescore_match_handler(
    State(state): State<AppState>,
    Path(match_id): Path<String>,
) -> ApiResult<SettlementReport> {
    let report = settle_match(&state.pool, &match_id, SettleMode::Rescore).await?;
    Ok(Json(ApiResponse::success(report)))
}

// POST /predictions - Submit a model's prediction before kickoff
#[derive(Deserialize)]
struct SubmitPredictionRequest {
    match_id: String,
    model_id: String,
    predicted_home: i64,
    predicted_away: i64,
}

async fn submit_prediction_handler(
    State(state): State<AppState>,
    Json(request): Json<SubmitPredictionRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Prediction>>), ScoreboardError> {
    let prediction = submit_prediction(
        &state.pool,
        &request.match_id,
        &request.model_id,
        request.predicted_home,
        request.predicted_away,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(prediction))))
}

// GET /leaderboard - Model standings
#[derive(Deserialize)]
struct LeaderboardQuery {
    limit: Option<usize>,
}

async fn leaderboard_handler(
    State(state): State<AppState>,
    Query(params): Query<LeaderboardQuery>,
) -> ApiResult<Vec<LeaderboardEntry>> {
    let limit = params
        .limit
        .unwrap_or(state.config.leaderboard_limit)
        .min(MAX_LEADERBOARD_LIMIT); // Cap at 100
    let entries = leaderboard(&state.pool, limit).await?;
    Ok(Json(ApiResponse::success(entries)))
}
