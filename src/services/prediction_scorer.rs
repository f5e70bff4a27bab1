use crate::models::{Quotas, ScoreLine, ScoringBreakdown, EXACT_SCORE_BONUS, GOAL_DIFF_BONUS};

/// Score one prediction against the final result using the match's
/// precomputed quotas.
///
/// The right tendency earns that outcome's quota, the right goal
/// difference on top of it earns `GOAL_DIFF_BONUS`, and the exact score
/// earns `EXACT_SCORE_BONUS`.
pub fn score_prediction(predicted: ScoreLine, actual: ScoreLine, quotas: Quotas) -> ScoringBreakdown {
    let actual_tendency = actual.tendency();
    let tendency_correct = predicted.tendency() == actual_tendency;

    let tendency_points = if tendency_correct {
        quotas.for_tendency(actual_tendency)
    } else {
        0
    };

    let goal_diff_bonus = if tendency_correct && predicted.goal_diff() == actual.goal_diff() {
        GOAL_DIFF_BONUS
    } else {
        0
    };

    let exact_score_bonus = if predicted == actual { EXACT_SCORE_BONUS } else { 0 };

    ScoringBreakdown {
        tendency_points,
        goal_diff_bonus,
        exact_score_bonus,
        total: tendency_points + goal_diff_bonus + exact_score_bonus,
    }
}
