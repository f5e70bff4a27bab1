use chrono::Utc;
use serde::Serialize;
use sqlx::SqlitePool;

use crate::db::{get_finished_match_ids, get_match_by_id, get_predictions_for_match};
use crate::error::{Result, ScoreboardError};
use crate::models::{MatchStatus, Quotas, ScoreLine};
use crate::services::{calculate_quotas, score_prediction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleMode {
    /// First settlement after the match finished; refuses an already scored match
    Initial,
    /// Throw away the stored quotas and breakdowns and score from scratch
    Rescore,
    /// Write this final score and score from scratch, replacing any earlier result
    Record(ScoreLine),
}

#[derive(Debug, Clone, Serialize)]
pub struct SettlementReport {
    pub match_id: String,
    pub actual: ScoreLine,
    pub quotas: Quotas,
    pub predictions_scored: usize,
    pub points_awarded: u32,
}

/// Move a scheduled match to live. Predictions close with it.
pub async fn start_match(pool: &SqlitePool, match_id: &str) -> Result<()> {
    let updated = sqlx::query("UPDATE matches SET status = ?, updated_at = ? WHERE id = ? AND status = ?")
        .bind(MatchStatus::Live.as_str())
        .bind(Utc::now().to_rfc3339())
        .bind(match_id)
        .bind(MatchStatus::Scheduled.as_str())
        .execute(pool)
        .await?;

    if updated.rows_affected() == 0 {
        return Err(match get_match_by_id(pool, match_id).await? {
            None => ScoreboardError::MatchNotFound(match_id.to_string()),
            Some(m) => ScoreboardError::NotScheduled {
                match_id: match_id.to_string(),
                status: m.status.as_str(),
            },
        });
    }

    tracing::info!("Match {} is live", match_id);
    Ok(())
}

/// Record the final score of an unscored match without scoring it, leaving
/// it for a later `Initial` settlement. A scored match is refused: its
/// result can only change through `record_result`, which rescores in the
/// same transaction.
pub async fn finish_match(pool: &SqlitePool, match_id: &str, actual: ScoreLine) -> Result<()> {
    let updated = sqlx::query(
        "UPDATE matches SET status = ?, home_score = ?, away_score = ?, updated_at = ? WHERE id = ? AND scored_at IS NULL",
    )
    .bind(MatchStatus::Finished.as_str())
    .bind(actual.home)
    .bind(actual.away)
    .bind(Utc::now().to_rfc3339())
    .bind(match_id)
    .execute(pool)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(match get_match_by_id(pool, match_id).await? {
            None => ScoreboardError::MatchNotFound(match_id.to_string()),
            Some(_) => ScoreboardError::AlreadyScored(match_id.to_string()),
        });
    }
    Ok(())
}

/// Score every prediction of a finished match.
///
/// Quotas are computed once from the full prediction set and every
/// prediction is scored against those same quotas, all inside one
/// transaction. The transaction opens by writing the match's `scored_at`
/// (and, for `Record`, its final score), which takes the database write
/// lock. Two settlements of one match therefore never interleave, the
/// second `Initial` one gets `AlreadyScored`, and a stored result is never
/// visible without the breakdowns computed from it.
pub async fn settle_match(pool: &SqlitePool, match_id: &str, mode: SettleMode) -> Result<SettlementReport> {
    let mut tx = pool.begin().await?;
    let now = Utc::now().to_rfc3339();

    let claim = match mode {
        SettleMode::Initial => sqlx::query(
            "UPDATE matches SET scored_at = ?, updated_at = ? WHERE id = ? AND status = 'finished' AND scored_at IS NULL",
        )
        .bind(&now)
        .bind(&now)
        .bind(match_id),
        SettleMode::Rescore => {
            sqlx::query("UPDATE matches SET scored_at = ?, updated_at = ? WHERE id = ? AND status = 'finished'")
                .bind(&now)
                .bind(&now)
                .bind(match_id)
        }
        SettleMode::Record(actual) => sqlx::query(
            r#"UPDATE matches SET status = 'finished', home_score = ?, away_score = ?, scored_at = ?, updated_at = ?
               WHERE id = ?"#,
        )
        .bind(actual.home)
        .bind(actual.away)
        .bind(&now)
        .bind(&now)
        .bind(match_id),
    }
    .execute(&mut *tx)
    .await?;

    if claim.rows_affected() == 0 {
        let err = match get_match_by_id(&mut *tx, match_id).await? {
            None => ScoreboardError::MatchNotFound(match_id.to_string()),
            Some(m) if m.status != MatchStatus::Finished => ScoreboardError::MatchNotFinished(match_id.to_string()),
            Some(_) => ScoreboardError::AlreadyScored(match_id.to_string()),
        };
        tx.rollback().await?;
        return Err(err);
    }

    let match_data = get_match_by_id(&mut *tx, match_id)
        .await?
        .ok_or_else(|| ScoreboardError::MatchNotFound(match_id.to_string()))?;
    let actual = match_data
        .result()
        .ok_or_else(|| ScoreboardError::MissingResult(match_id.to_string()))?;

    let predictions = get_predictions_for_match(&mut *tx, match_id).await?;
    let lines: Vec<ScoreLine> = predictions.iter().map(|p| p.predicted).collect();
    let quotas = calculate_quotas(&lines);

    sqlx::query("UPDATE matches SET quota_home = ?, quota_draw = ?, quota_away = ? WHERE id = ?")
        .bind(quotas.home)
        .bind(quotas.draw)
        .bind(quotas.away)
        .bind(match_id)
        .execute(&mut *tx)
        .await?;

    let mut points_awarded = 0;
    for prediction in &predictions {
        let breakdown = score_prediction(prediction.predicted, actual, quotas);
        points_awarded += breakdown.total;

        sqlx::query(
            r#"UPDATE predictions SET
                   tendency_points = ?,
                   goal_diff_bonus = ?,
                   exact_score_bonus = ?,
                   total_points = ?,
                   scored_at = ?
               WHERE id = ?"#,
        )
        .bind(breakdown.tendency_points)
        .bind(breakdown.goal_diff_bonus)
        .bind(breakdown.exact_score_bonus)
        .bind(breakdown.total)
        .bind(&now)
        .bind(&prediction.id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    tracing::info!(
        "Settled {} vs {} ({}): quotas H{}/D{}/A{}, {} predictions, {} points{}",
        match_data.home_team,
        match_data.away_team,
        actual,
        quotas.home,
        quotas.draw,
        quotas.away,
        predictions.len(),
        points_awarded,
        match mode {
            SettleMode::Initial => "",
            SettleMode::Rescore => " (rescore)",
            SettleMode::Record(_) => " (result recorded)",
        }
    );

    Ok(SettlementReport {
        match_id: match_id.to_string(),
        actual,
        quotas,
        predictions_scored: predictions.len(),
        points_awarded,
    })
}

/// Finish a match and score it in one transaction. Recording a result for
/// an already scored match replaces it and rescores from scratch.
pub async fn record_result(pool: &SqlitePool, match_id: &str, actual: ScoreLine) -> Result<SettlementReport> {
    settle_match(pool, match_id, SettleMode::Record(actual)).await
}

pub async fn rescore_all_finished(pool: &SqlitePool) -> Result<Vec<SettlementReport>> {
    let mut reports = Vec::new();
    for match_id in get_finished_match_ids(pool).await? {
        match settle_match(pool, &match_id, SettleMode::Rescore).await {
            Ok(report) => reports.push(report),
            Err(ScoreboardError::MissingResult(id)) => {
                tracing::warn!("Skipping finished match {} without a final score", id);
            }
            Err(e) => return Err(e),
        }
    }
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{test_pool, FileTestDb};
    use crate::models::ScoringBreakdown;
    use crate::services::{register_model, schedule_match, submit_prediction};
    use chrono::Duration;

    /// Schedules a match and stores one prediction per score line
    async fn match_with_predictions(pool: &SqlitePool, lines: &[(i64, i64)]) -> String {
        let m = schedule_match(pool, "Liverpool", "Everton", "Premier League", Utc::now() + Duration::hours(1))
            .await
            .unwrap();
        for (i, (home, away)) in lines.iter().enumerate() {
            let model_id = format!("model-{}", i);
            register_model(pool, &model_id, &model_id, "test").await.unwrap();
            submit_prediction(pool, &m.id, &model_id, *home, *away).await.unwrap();
        }
        m.id
    }

    fn breakdown_for(preds: &[crate::models::Prediction], model_id: &str) -> ScoringBreakdown {
        preds
            .iter()
            .find(|p| p.model_id == model_id)
            .and_then(|p| p.breakdown)
            .unwrap()
    }

    #[tokio::test]
    async fn settles_with_quotas_from_the_full_set() {
        let pool = test_pool().await;
        // 2 home, 1 draw, 1 away -> H2 / D4 / A4
        let match_id = match_with_predictions(&pool, &[(2, 1), (3, 0), (1, 1), (0, 1)]).await;

        let report = record_result(&pool, &match_id, ScoreLine::new(2, 1)).await.unwrap();
        assert_eq!(report.quotas, Quotas { home: 2, draw: 4, away: 4 });
        assert_eq!(report.predictions_scored, 4);
        // exact 2+1+3, right tendency only 2, two misses
        assert_eq!(report.points_awarded, 8);

        let stored = get_match_by_id(&pool, &match_id).await.unwrap().unwrap();
        assert_eq!(stored.quotas, Some(report.quotas));
        assert!(stored.scored_at.is_some());

        let preds = get_predictions_for_match(&pool, &match_id).await.unwrap();
        assert_eq!(breakdown_for(&preds, "model-0").total, 6);
        assert_eq!(breakdown_for(&preds, "model-1").total, 2);
        assert_eq!(breakdown_for(&preds, "model-2"), ScoringBreakdown::default());
        assert_eq!(breakdown_for(&preds, "model-3"), ScoringBreakdown::default());
    }

    #[tokio::test]
    async fn second_initial_settlement_is_refused() {
        let pool = test_pool().await;
        let match_id = match_with_predictions(&pool, &[(1, 0)]).await;
        record_result(&pool, &match_id, ScoreLine::new(1, 0)).await.unwrap();

        let err = settle_match(&pool, &match_id, SettleMode::Initial).await.unwrap_err();
        assert!(matches!(err, ScoreboardError::AlreadyScored(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_initial_settlements_score_once() {
        let db = FileTestDb::open(5_000).await;

        for round in 0..10 {
            let match_id = match_with_predictions(&db.pool, &[(1, 0), (0, 0), (2, 2)]).await;
            finish_match(&db.pool, &match_id, ScoreLine::new(0, 0)).await.unwrap();

            let handles: Vec<_> = (0..3)
                .map(|_| {
                    let pool = db.pool.clone();
                    let match_id = match_id.clone();
                    tokio::spawn(async move { settle_match(&pool, &match_id, SettleMode::Initial).await })
                })
                .collect();

            let (mut settled, mut refused) = (0, 0);
            for handle in handles {
                match handle.await.unwrap() {
                    Ok(report) => {
                        settled += 1;
                        assert_eq!(report.predictions_scored, 3);
                    }
                    Err(ScoreboardError::AlreadyScored(_)) => refused += 1,
                    Err(e) => panic!("round {}: unexpected error {}", round, e),
                }
            }
            assert_eq!((settled, refused), (1, 2), "round {}", round);

            let preds = get_predictions_for_match(&db.pool, &match_id).await.unwrap();
            assert!(preds.iter().all(|p| p.breakdown.is_some()));
        }

        db.close().await;
    }

    #[tokio::test]
    async fn result_and_breakdowns_change_together() {
        let db = FileTestDb::open(100).await;
        // H 1/2 and A 1/2: both common
        let match_id = match_with_predictions(&db.pool, &[(2, 0), (0, 1)]).await;
        record_result(&db.pool, &match_id, ScoreLine::new(2, 0)).await.unwrap();

        // another writer holds the lock past the busy timeout
        let mut blocker = db.pool.begin().await.unwrap();
        sqlx::query("UPDATE models SET active = 1")
            .execute(&mut *blocker)
            .await
            .unwrap();
        let err = record_result(&db.pool, &match_id, ScoreLine::new(0, 1)).await.unwrap_err();
        assert!(matches!(err, ScoreboardError::Database(_)));
        blocker.rollback().await.unwrap();

        let stored = get_match_by_id(&db.pool, &match_id).await.unwrap().unwrap();
        assert_eq!(stored.result(), Some(ScoreLine::new(2, 0)));
        let preds = get_predictions_for_match(&db.pool, &match_id).await.unwrap();
        assert_eq!(breakdown_for(&preds, "model-0").total, 6);
        assert_eq!(breakdown_for(&preds, "model-1").total, 0);

        record_result(&db.pool, &match_id, ScoreLine::new(0, 1)).await.unwrap();
        let stored = get_match_by_id(&db.pool, &match_id).await.unwrap().unwrap();
        assert_eq!(stored.result(), Some(ScoreLine::new(0, 1)));
        let preds = get_predictions_for_match(&db.pool, &match_id).await.unwrap();
        assert_eq!(breakdown_for(&preds, "model-0").total, 0);
        assert_eq!(breakdown_for(&preds, "model-1").total, 6);

        db.close().await;
    }

    #[tokio::test]
    async fn scored_match_result_only_changes_through_record_result() {
        let pool = test_pool().await;
        let match_id = match_with_predictions(&pool, &[(1, 0)]).await;
        record_result(&pool, &match_id, ScoreLine::new(1, 0)).await.unwrap();

        let err = finish_match(&pool, &match_id, ScoreLine::new(0, 3)).await.unwrap_err();
        assert!(matches!(err, ScoreboardError::AlreadyScored(_)));
        let stored = get_match_by_id(&pool, &match_id).await.unwrap().unwrap();
        assert_eq!(stored.result(), Some(ScoreLine::new(1, 0)));

        let err = finish_match(&pool, "missing", ScoreLine::new(0, 0)).await.unwrap_err();
        assert!(matches!(err, ScoreboardError::MatchNotFound(_)));
    }

    #[tokio::test]
    async fn live_match_closes_predictions_and_can_finish() {
        let pool = test_pool().await;
        let match_id = match_with_predictions(&pool, &[(1, 1)]).await;
        register_model(&pool, "late", "Late", "test").await.unwrap();

        start_match(&pool, &match_id).await.unwrap();
        let stored = get_match_by_id(&pool, &match_id).await.unwrap().unwrap();
        assert_eq!(stored.status, MatchStatus::Live);

        let err = submit_prediction(&pool, &match_id, "late", 0, 0).await.unwrap_err();
        assert!(matches!(err, ScoreboardError::PredictionsClosed(_)));

        let err = start_match(&pool, &match_id).await.unwrap_err();
        assert!(matches!(err, ScoreboardError::NotScheduled { status: "live", .. }));

        finish_match(&pool, &match_id, ScoreLine::new(1, 1)).await.unwrap();
        let report = settle_match(&pool, &match_id, SettleMode::Initial).await.unwrap();
        assert_eq!(report.points_awarded, 6);
    }

    #[tokio::test]
    async fn unfinished_match_cannot_be_settled() {
        let pool = test_pool().await;
        let match_id = match_with_predictions(&pool, &[(1, 0)]).await;

        let err = settle_match(&pool, &match_id, SettleMode::Initial).await.unwrap_err();
        assert!(matches!(err, ScoreboardError::MatchNotFinished(_)));

        let err = settle_match(&pool, "missing", SettleMode::Rescore).await.unwrap_err();
        assert!(matches!(err, ScoreboardError::MatchNotFound(_)));

        // nothing was claimed by the failed attempt
        let stored = get_match_by_id(&pool, &match_id).await.unwrap().unwrap();
        assert!(stored.scored_at.is_none());
    }

    #[tokio::test]
    async fn corrected_result_is_rescored_from_scratch() {
        let pool = test_pool().await;
        let match_id = match_with_predictions(&pool, &[(2, 0), (2, 0), (1, 1), (0, 1)]).await;
        let first = record_result(&pool, &match_id, ScoreLine::new(2, 0)).await.unwrap();
        assert_eq!(first.points_awarded, 12);

        let second = record_result(&pool, &match_id, ScoreLine::new(0, 1)).await.unwrap();
        assert_eq!(second.quotas, first.quotas);
        assert_eq!(second.actual, ScoreLine::new(0, 1));

        let preds = get_predictions_for_match(&pool, &match_id).await.unwrap();
        assert_eq!(breakdown_for(&preds, "model-0"), ScoringBreakdown::default());
        assert_eq!(
            breakdown_for(&preds, "model-3"),
            ScoringBreakdown { tendency_points: 4, goal_diff_bonus: 1, exact_score_bonus: 3, total: 8 }
        );
    }

    #[tokio::test]
    async fn match_without_predictions_gets_neutral_quotas() {
        let pool = test_pool().await;
        let match_id = match_with_predictions(&pool, &[]).await;

        let report = record_result(&pool, &match_id, ScoreLine::new(3, 3)).await.unwrap();
        assert_eq!(report.quotas, Quotas::NEUTRAL);
        assert_eq!(report.predictions_scored, 0);
    }

    #[tokio::test]
    async fn rescore_all_repeats_every_finished_match() {
        let pool = test_pool().await;
        let a = match_with_predictions(&pool, &[(1, 0)]).await;
        record_result(&pool, &a, ScoreLine::new(1, 0)).await.unwrap();
        let _still_scheduled = match_with_predictions(&pool, &[]).await;

        let reports = rescore_all_finished(&pool).await.unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].match_id, a);
        assert_eq!(reports[0].points_awarded, 6);
    }
}
