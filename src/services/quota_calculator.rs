use crate::models::{Quotas, ScoreLine, Tendency, QUOTA_COMMON, QUOTA_RARE, QUOTA_UNCOMMON};

/// Calculate the per-outcome quotas for one match from every prediction
/// submitted for it.
///
/// An outcome picked by at least half of the predictions is worth
/// `QUOTA_COMMON`, by at least a quarter `QUOTA_UNCOMMON`, otherwise
/// `QUOTA_RARE`. Both boundaries are inclusive toward the lower quota.
/// With no predictions every outcome gets `QUOTA_COMMON`.
pub fn calculate_quotas(predictions: &[ScoreLine]) -> Quotas {
    if predictions.is_empty() {
        return Quotas::NEUTRAL;
    }

    let (mut home, mut draw, mut away) = (0usize, 0usize, 0usize);
    for prediction in predictions {
        match prediction.tendency() {
            Tendency::Home => home += 1,
            Tendency::Draw => draw += 1,
            Tendency::Away => away += 1,
        }
    }

    let total = predictions.len();
    Quotas {
        home: quota_for_share(home, total),
        draw: quota_for_share(draw, total),
        away: quota_for_share(away, total),
    }
}

/// Map `count / total` onto a quota. Compared in integers so a share of
/// exactly 0.5 or 0.25 always lands on the lower quota.
fn quota_for_share(count: usize, total: usize) -> u32 {
    if count * 2 >= total {
        QUOTA_COMMON
    } else if count * 4 >= total {
        QUOTA_UNCOMMON
    } else {
        QUOTA_RARE
    }
}
