use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ScoreboardError;

/// Quota for an outcome picked by at least half of the models
pub const QUOTA_COMMON: u32 = 2;
/// Quota for an outcome picked by at least a quarter of the models
pub const QUOTA_UNCOMMON: u32 = 4;
/// Quota for every other outcome, including ones nobody picked
pub const QUOTA_RARE: u32 = 6;

pub const GOAL_DIFF_BONUS: u32 = 1;
pub const EXACT_SCORE_BONUS: u32 = 3;

/// Coarse outcome of a score line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tendency {
    Home,
    Draw,
    Away,
}

impl Tendency {
    pub fn of(home: u32, away: u32) -> Self {
        match home.cmp(&away) {
            std::cmp::Ordering::Greater => Tendency::Home,
            std::cmp::Ordering::Equal => Tendency::Draw,
            std::cmp::Ordering::Less => Tendency::Away,
        }
    }
}

/// A predicted or final score. Goals are unsigned, so a `ScoreLine` is
/// always a valid input to the scoring functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScoreLine {
    pub home: u32,
    pub away: u32,
}

impl ScoreLine {
    pub fn new(home: u32, away: u32) -> Self {
        Self { home, away }
    }

    /// Validate raw goals coming from the API or the database
    pub fn try_from_raw(home: i64, away: i64) -> Result<Self, ScoreboardError> {
        match (u32::try_from(home), u32::try_from(away)) {
            (Ok(home), Ok(away)) => Ok(Self { home, away }),
            _ => Err(ScoreboardError::InvalidScore { home, away }),
        }
    }

    pub fn tendency(&self) -> Tendency {
        Tendency::of(self.home, self.away)
    }

    pub fn goal_diff(&self) -> i64 {
        i64::from(self.home) - i64::from(self.away)
    }
}

impl fmt::Display for ScoreLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.home, self.away)
    }
}

/// Points available per outcome for one match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quotas {
    pub home: u32,
    pub draw: u32,
    pub away: u32,
}

impl Quotas {
    /// Used when a match has no predictions at all
    pub const NEUTRAL: Quotas = Quotas {
        home: QUOTA_COMMON,
        draw: QUOTA_COMMON,
        away: QUOTA_COMMON,
    };

    pub fn for_tendency(&self, tendency: Tendency) -> u32 {
        match tendency {
            Tendency::Home => self.home,
            Tendency::Draw => self.draw,
            Tendency::Away => self.away,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScoringBreakdown {
    pub tendency_points: u32,
    pub goal_diff_bonus: u32,
    pub exact_score_bonus: u32,
    pub total: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Scheduled,
    Live,
    Finished,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Scheduled => "scheduled",
            MatchStatus::Live => "live",
            MatchStatus::Finished => "finished",
        }
    }
}

impl FromStr for MatchStatus {
    type Err = ScoreboardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(MatchStatus::Scheduled),
            "live" => Ok(MatchStatus::Live),
            "finished" => Ok(MatchStatus::Finished),
            other => Err(ScoreboardError::Corrupt(format!("unknown match status '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiModel {
    pub id: String,
    pub display_name: String,
    pub provider: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    pub id: String,
    pub home_team: String,
    pub away_team: String,
    pub league: String,
    pub kickoff_at: DateTime<Utc>,
    pub status: MatchStatus,
    pub home_score: Option<u32>,
    pub away_score: Option<u32>,
    /// Set once the match has been settled
    pub quotas: Option<Quotas>,
    pub scored_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Match {
    pub fn result(&self) -> Option<ScoreLine> {
        match (self.home_score, self.away_score) {
            (Some(home), Some(away)) => Some(ScoreLine::new(home, away)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub id: String,
    pub match_id: String,
    pub model_id: String,
    pub predicted: ScoreLine,
    pub breakdown: Option<ScoringBreakdown>,
    pub scored_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub model_id: String,
    pub display_name: String,
    pub predictions_scored: u32,
    pub total_points: u32,
    pub average_points: f64,
    pub correct_tendencies: u32,
    pub exact_scores: u32,
    /// Share of scored predictions with the right tendency, 0.0 to 1.0
    pub tendency_accuracy: f64,
}

// API Response types
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tendency_follows_goal_comparison() {
        assert_eq!(Tendency::of(2, 1), Tendency::Home);
        assert_eq!(Tendency::of(0, 0), Tendency::Draw);
        assert_eq!(Tendency::of(1, 3), Tendency::Away);
    }

    #[test]
    fn raw_scores_must_be_non_negative() {
        assert_eq!(ScoreLine::try_from_raw(3, 0).unwrap(), ScoreLine::new(3, 0));
        assert!(matches!(
            ScoreLine::try_from_raw(-1, 2),
            Err(ScoreboardError::InvalidScore { home: -1, away: 2 })
        ));
    }

    #[test]
    fn status_round_trips_through_text() {
        for status in [MatchStatus::Scheduled, MatchStatus::Live, MatchStatus::Finished] {
            assert_eq!(status.as_str().parse::<MatchStatus>().unwrap(), status);
        }
        assert!("postponed".parse::<MatchStatus>().is_err());
    }
}
