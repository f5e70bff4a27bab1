use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db::{insert_match, insert_prediction, upsert_model};
use crate::error::Result;
use crate::models::{AiModel, Match, MatchStatus, Prediction, ScoreLine};

const DEMO_MODELS: &[(&str, &str, &str)] = &[
    ("claude-sonnet", "Claude Sonnet", "anthropic"),
    ("claude-haiku", "Claude Haiku", "anthropic"),
    ("gpt-4o", "GPT-4o", "openai"),
    ("gpt-4o-mini", "GPT-4o mini", "openai"),
    ("gemini-pro", "Gemini Pro", "google"),
    ("gemini-flash", "Gemini Flash", "google"),
    ("llama-70b", "Llama 70B", "meta"),
    ("llama-8b", "Llama 8B", "meta"),
    ("mistral-large", "Mistral Large", "mistral"),
    ("mixtral", "Mixtral 8x7B", "mistral"),
    ("deepseek-v3", "DeepSeek V3", "deepseek"),
    ("qwen-72b", "Qwen 72B", "alibaba"),
];

/// (home, away, league, hours from now, final score)
const DEMO_MATCHES: &[(&str, &str, &str, i64, Option<(u32, u32)>)] = &[
    ("Arsenal", "Tottenham", "Premier League", -30, Some((2, 2))),
    ("Real Madrid", "Barcelona", "La Liga", -52, Some((1, 3))),
    ("Juventus", "Napoli", "Serie A", 20, None),
    ("PSG", "Marseille", "Ligue 1", 44, None),
];

/// Deterministic spread of picks so demo quotas differ between matches
fn demo_pick(model_index: usize, match_index: usize) -> ScoreLine {
    let home = ((model_index * 7 + match_index * 3) % 4) as u32;
    let away = ((model_index * 5 + match_index) % 3) as u32;
    ScoreLine::new(home, away)
}

/// Populate an empty database with demo models, matches and predictions.
/// Finished matches get their result but are left unscored.
pub async fn seed_data(pool: &SqlitePool) -> Result<Vec<String>> {
    let now = Utc::now();

    for (id, name, provider) in DEMO_MODELS {
        upsert_model(
            pool,
            &AiModel {
                id: id.to_string(),
                display_name: name.to_string(),
                provider: provider.to_string(),
                active: true,
                created_at: now,
            },
        )
        .await?;
    }

    let mut finished = Vec::new();
    for (match_index, (home, away, league, offset_hours, result)) in DEMO_MATCHES.iter().enumerate() {
        let kickoff_at = now + Duration::hours(*offset_hours);
        let match_data = Match {
            id: Uuid::new_v4().to_string(),
            home_team: home.to_string(),
            away_team: away.to_string(),
            league: league.to_string(),
            kickoff_at,
            status: if result.is_some() { MatchStatus::Finished } else { MatchStatus::Scheduled },
            home_score: result.map(|r| r.0),
            away_score: result.map(|r| r.1),
            quotas: None,
            scored_at: None,
            created_at: now,
            updated_at: now,
        };
        insert_match(pool, &match_data).await?;

        for (model_index, (model_id, _, _)) in DEMO_MODELS.iter().enumerate() {
            insert_prediction(
                pool,
                &Prediction {
                    id: Uuid::new_v4().to_string(),
                    match_id: match_data.id.clone(),
                    model_id: model_id.to_string(),
                    predicted: demo_pick(model_index, match_index),
                    breakdown: None,
                    scored_at: None,
                    created_at: kickoff_at - Duration::hours(6),
                },
            )
            .await?;
        }

        if result.is_some() {
            finished.push(match_data.id.clone());
        }
    }

    tracing::info!(
        "Seeded {} models, {} matches ({} finished)",
        DEMO_MODELS.len(),
        DEMO_MATCHES.len(),
        finished.len()
    );
    Ok(finished)
}
