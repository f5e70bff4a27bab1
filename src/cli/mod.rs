use anyhow::Result;
use std::path::Path;

use crate::config::Config;
use crate::db::{create_pool, get_match_by_id, init_database_with_pool, seed_data};
use crate::models::ScoreLine;
use crate::services::{
    finish_match, leaderboard, record_result, rescore_all_finished, settle_match, write_leaderboard_csv, SettleMode,
    SettlementReport,
};

fn print_report(report: &SettlementReport) {
    println!(
        "   {} | final {} | quotas H{} D{} A{} | {} predictions, {} points",
        report.match_id,
        report.actual,
        report.quotas.home,
        report.quotas.draw,
        report.quotas.away,
        report.predictions_scored,
        report.points_awarded
    );
}

pub async fn seed(config: &Config) -> Result<()> {
    let pool = create_pool(config).await?;
    init_database_with_pool(&pool).await?;

    println!("🌱 Seeding demo data...");
    let finished = seed_data(&pool).await?;

    println!("⚖️  Settling {} finished matches...", finished.len());
    for match_id in &finished {
        let report = settle_match(&pool, match_id, SettleMode::Initial).await?;
        print_report(&report);
    }

    println!("✅ Demo data ready!");
    Ok(())
}

pub async fn settle(config: &Config, match_id: &str, home: u32, away: u32, finish_only: bool) -> Result<()> {
    let pool = create_pool(config).await?;

    let Some(match_data) = get_match_by_id(&pool, match_id).await? else {
        anyhow::bail!("no match with id '{}'", match_id);
    };

    if finish_only {
        finish_match(&pool, match_id, ScoreLine::new(home, away)).await?;
        println!(
            "🏁 {} vs {} finished {}-{}. Run `matchoracle rescore {}` to score it.",
            match_data.home_team, match_data.away_team, home, away, match_id
        );
        return Ok(());
    }

    println!(
        "⚖️  Settling {} vs {} at {}-{}...",
        match_data.home_team, match_data.away_team, home, away
    );
    let report = record_result(&pool, match_id, ScoreLine::new(home, away)).await?;
    print_report(&report);
    println!("✅ Match settled!");
    Ok(())
}

pub async fn rescore(config: &Config, match_id: Option<&str>) -> Result<()> {
    let pool = create_pool(config).await?;

    match match_id {
        Some(id) => {
            println!("🔁 Rescoring match {}...", id);
            let report = settle_match(&pool, id, SettleMode::Rescore).await?;
            print_report(&report);
        }
        None => {
            println!("🔁 Rescoring every finished match...");
            let reports = rescore_all_finished(&pool).await?;
            for report in &reports {
                print_report(report);
            }
            println!("✅ Rescored {} matches!", reports.len());
        }
    }

    Ok(())
}

pub async fn show_leaderboard(config: &Config, limit: Option<usize>, csv_path: Option<&Path>) -> Result<()> {
    let pool = create_pool(config).await?;
    let entries = leaderboard(&pool, limit.unwrap_or(config.leaderboard_limit)).await?;

    if entries.is_empty() {
        println!("📭 No models registered yet. Try: matchoracle seed");
        return Ok(());
    }

    println!("🏆 Leaderboard\n");
    println!(
        "{:>4}  {:<20} {:>6} {:>5} {:>6} {:>6} {:>7}",
        "#", "Model", "Points", "Games", "Avg", "Exact", "Tend %"
    );
    for entry in &entries {
        println!(
            "{:>4}  {:<20} {:>6} {:>5} {:>6.2} {:>6} {:>6.1}%",
            entry.rank,
            entry.display_name,
            entry.total_points,
            entry.predictions_scored,
            entry.average_points,
            entry.exact_scores,
            entry.tendency_accuracy * 100.0
        );
    }

    if let Some(path) = csv_path {
        write_leaderboard_csv(&entries, path)?;
        println!("\n💾 Exported {} rows to {}", entries.len(), path.display());
    }

    Ok(())
}
