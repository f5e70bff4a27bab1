use sqlx::{Row, SqlitePool};
use std::path::Path;

use crate::error::{Result, ScoreboardError};
use crate::models::LeaderboardEntry;

/// Standings of every active model over its scored predictions.
///
/// Sorted by total points, then exact scores, then name. Models level on
/// both points and exact scores share a rank (1, 2, 2, 4).
pub async fn leaderboard(pool: &SqlitePool, limit: usize) -> Result<Vec<LeaderboardEntry>> {
    let rows = sqlx::query(
        r#"SELECT m.id AS model_id,
                  m.display_name AS display_name,
                  COUNT(p.id) AS predictions_scored,
                  COALESCE(SUM(p.total_points), 0) AS total_points,
                  COALESCE(SUM(CASE WHEN p.tendency_points > 0 THEN 1 ELSE 0 END), 0) AS correct_tendencies,
                  COALESCE(SUM(CASE WHEN p.exact_score_bonus > 0 THEN 1 ELSE 0 END), 0) AS exact_scores
           FROM models m
           LEFT JOIN predictions p ON p.model_id = m.id AND p.scored_at IS NOT NULL
           WHERE m.active = 1
           GROUP BY m.id, m.display_name
           ORDER BY total_points DESC, exact_scores DESC, m.display_name ASC
           LIMIT ?"#,
    )
    .bind(i64::try_from(limit).unwrap_or(i64::MAX))
    .fetch_all(pool)
    .await?;

    let mut entries: Vec<LeaderboardEntry> = Vec::with_capacity(rows.len());
    for row in rows {
        let predictions_scored = count(row.get("predictions_scored"))?;
        let total_points = count(row.get("total_points"))?;
        let correct_tendencies = count(row.get("correct_tendencies"))?;
        let exact_scores = count(row.get("exact_scores"))?;

        let rank = match entries.last() {
            Some(prev) if prev.total_points == total_points && prev.exact_scores == exact_scores => prev.rank,
            _ => entries.len() + 1,
        };

        entries.push(LeaderboardEntry {
            rank,
            model_id: row.get("model_id"),
            display_name: row.get("display_name"),
            predictions_scored,
            total_points,
            average_points: ratio(total_points, predictions_scored),
            correct_tendencies,
            exact_scores,
            tendency_accuracy: ratio(correct_tendencies, predictions_scored),
        });
    }

    Ok(entries)
}

fn count(raw: i64) -> Result<u32> {
    u32::try_from(raw).map_err(|_| ScoreboardError::Corrupt(format!("aggregate out of range: {}", raw)))
}

fn ratio(numerator: u32, denominator: u32) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    f64::from(numerator) / f64::from(denominator)
}

pub fn write_leaderboard_csv(entries: &[LeaderboardEntry], path: &Path) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for entry in entries {
        writer.serialize(entry)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::models::ScoreLine;
    use crate::services::{record_result, register_model, schedule_match, submit_prediction};
    use chrono::{Duration, Utc};

    async fn play(pool: &SqlitePool, picks: &[(&str, i64, i64)], actual: ScoreLine) {
        let m = schedule_match(pool, "Ajax", "PSV", "Eredivisie", Utc::now() + Duration::hours(1))
            .await
            .unwrap();
        for (model_id, home, away) in picks {
            submit_prediction(pool, &m.id, model_id, *home, *away).await.unwrap();
        }
        record_result(pool, &m.id, actual).await.unwrap();
    }

    #[tokio::test]
    async fn ranks_by_points_and_shares_ties() {
        let pool = test_pool().await;
        for (id, name) in [("a", "Alpha"), ("b", "Bravo"), ("c", "Charlie"), ("d", "Delta")] {
            register_model(&pool, id, name, "test").await.unwrap();
        }

        // quotas H2/D6/A4: a exact (6), b and c right tendency (2), d wrong
        play(&pool, &[("a", 1, 0), ("b", 3, 1), ("c", 2, 0), ("d", 0, 2)], ScoreLine::new(1, 0)).await;

        let table = leaderboard(&pool, 10).await.unwrap();
        let summary: Vec<(usize, &str, u32)> = table
            .iter()
            .map(|e| (e.rank, e.model_id.as_str(), e.total_points))
            .collect();
        assert_eq!(summary, vec![(1, "a", 6), (2, "b", 2), (2, "c", 2), (4, "d", 0)]);

        let alpha = &table[0];
        assert_eq!(alpha.exact_scores, 1);
        assert_eq!(alpha.correct_tendencies, 1);
        assert_eq!(alpha.predictions_scored, 1);
        assert!((alpha.average_points - 6.0).abs() < f64::EPSILON);
        assert!((table[3].tendency_accuracy - 0.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn models_without_scored_predictions_are_listed_last() {
        let pool = test_pool().await;
        register_model(&pool, "a", "Alpha", "test").await.unwrap();
        register_model(&pool, "idle", "Idle", "test").await.unwrap();
        play(&pool, &[("a", 0, 0)], ScoreLine::new(1, 1)).await;

        let table = leaderboard(&pool, 10).await.unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table[1].model_id, "idle");
        assert_eq!(table[1].predictions_scored, 0);
        assert_eq!(table[1].average_points, 0.0);

        assert_eq!(leaderboard(&pool, 1).await.unwrap().len(), 1);
    }
}
