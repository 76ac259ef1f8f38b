//! Composite MVP scoring.
//!
//! A player's score is the weighted sum of their ratio to the leaderboard
//! leader across every metric with a positive weight.

use std::collections::BTreeMap;

use super::leaderboard::metric_value;
use super::players::{PlayerAggregate, PlayerTable};
use crate::models::{LeaderboardRow, MvpContribution, MvpPlacement, MvpWeights};
use crate::professions::profession_color;

/// Metric label, leaderboard key, and whether higher wins. The order matches
/// [`MvpWeights::values`].
const MVP_METRICS: [(&str, &str, bool); 12] = [
    ("Down Contribution", "downContrib", true),
    ("Healing", "healing", true),
    ("Cleanses", "cleanses", true),
    ("Strips", "strips", true),
    ("Stability", "stability", true),
    ("CC", "cc", true),
    ("Revives", "revives", true),
    ("Distance to Tag", "closestToTag", false),
    ("Participation", "participation", true),
    ("Dodging", "dodges", true),
    ("DPS", "dps", true),
    ("Damage", "damage", true),
];

const TOP_REASONS: usize = 3;

#[derive(Debug, Clone)]
struct Scored<'a> {
    player: &'a PlayerAggregate,
    score: f64,
    contribs: Vec<MvpContribution>,
}

/// Gold, silver and bronze plus the mean score of every scored player.
#[derive(Debug, Clone, Default)]
pub struct MvpResult {
    pub mvp: MvpPlacement,
    pub silver: Option<MvpPlacement>,
    pub bronze: Option<MvpPlacement>,
    pub avg_mvp_score: f64,
}

fn score_player<'a>(
    player: &'a PlayerAggregate,
    boards: &BTreeMap<String, Vec<LeaderboardRow>>,
    weights: &[f64; 12],
) -> Scored<'a> {
    let mut score = 0.0;
    let mut contribs = Vec::new();

    for ((name, key, higher), weight) in MVP_METRICS.iter().zip(weights.iter()) {
        if *weight <= 0.0 {
            continue;
        }
        let board = boards.get(*key);
        let best = board
            .and_then(|b| b.first())
            .map(|row| row.value)
            .unwrap_or(0.0);
        if best == 0.0 || !best.is_finite() {
            continue;
        }
        let value = metric_value(player, key);
        if !value.is_finite() {
            continue;
        }
        let qualifies = if *higher { value > 0.0 } else { value < f64::INFINITY };
        if !qualifies {
            continue;
        }
        let ratio = if *higher {
            value / best
        } else if value > 0.0 {
            best / value
        } else {
            1.0
        };
        score += ratio * weight;
        let rank = board
            .and_then(|b| b.iter().find(|row| row.account == player.account))
            .map(|row| row.rank)
            .unwrap_or(0);
        contribs.push(MvpContribution {
            name: name.to_string(),
            ratio,
            val: value,
            rank,
        });
    }

    Scored { player, score, contribs }
}

fn placement(scored: &Scored<'_>) -> MvpPlacement {
    let mut top_stats = scored.contribs.clone();
    top_stats.sort_by(|a, b| {
        b.ratio
            .total_cmp(&a.ratio)
            .then_with(|| a.rank.cmp(&b.rank))
            .then_with(|| a.name.cmp(&b.name))
    });
    top_stats.truncate(TOP_REASONS);

    let profession = scored.player.primary_profession();
    MvpPlacement {
        player: scored.player.name.clone(),
        account: scored.player.account.clone(),
        score: scored.score,
        color: profession_color(&profession).to_string(),
        profession,
        profession_list: scored.player.profession_list(),
        reason: top_stats
            .first()
            .map(|c| c.name.clone())
            .unwrap_or_else(|| "Top Performance".to_string()),
        top_stats,
    }
}

/// Score every player against the total-mode leaderboards.
///
/// A leader whose score is not positive leaves the default placement in
/// place; silver and bronze are reported whenever the players exist.
pub fn compute_mvp(
    table: &PlayerTable,
    boards: &BTreeMap<String, Vec<LeaderboardRow>>,
    weights: &MvpWeights,
) -> MvpResult {
    let weights = weights.values();
    let mut scored: Vec<Scored<'_>> = table
        .iter()
        .map(|player| score_player(player, boards, &weights))
        .collect();
    // Stable sort keeps table order among equal scores.
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));

    let avg_mvp_score = if scored.is_empty() {
        0.0
    } else {
        scored.iter().map(|s| s.score).sum::<f64>() / scored.len() as f64
    };

    let mvp = scored
        .first()
        .filter(|s| s.score > 0.0)
        .map(placement)
        .unwrap_or_default();

    MvpResult {
        mvp,
        silver: scored.get(1).map(placement),
        bronze: scored.get(2).map(placement),
        avg_mvp_score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculate::leaderboard::total_leaderboards;
    use crate::models::PlayerEntry;

    fn player(account: &str, healing: f64, cleanses: f64) -> (PlayerEntry, f64, f64) {
        let entry = PlayerEntry {
            account: Some(account.to_string()),
            name: Some(account.trim_end_matches(".1").to_string()),
            profession: Some("Druid".to_string()),
            ..Default::default()
        };
        (entry, healing, cleanses)
    }

    fn table(rows: &[(PlayerEntry, f64, f64)]) -> PlayerTable {
        let mut table = PlayerTable::default();
        for (entry, healing, cleanses) in rows {
            let agg = table.get_or_insert(entry);
            agg.healing += healing;
            agg.cleanses += cleanses;
            agg.logs_joined += 1;
        }
        table
    }

    fn only(healing: f64, cleanses: f64) -> MvpWeights {
        MvpWeights {
            down_contribution: 0.0,
            healing,
            cleanses,
            strips: 0.0,
            stability: 0.0,
            cc: 0.0,
            revives: 0.0,
            distance_to_tag: 0.0,
            participation: 0.0,
            dodging: 0.0,
            dps: 0.0,
            damage: 0.0,
        }
    }

    #[test]
    fn test_weighted_ratio_scoring() {
        let table = table(&[
            player("alpha.1", 1000.0, 10.0),
            player("bravo.1", 500.0, 20.0),
            player("charlie.1", 0.0, 0.0),
        ]);
        let boards = total_leaderboards(&table);
        let result = compute_mvp(&table, &boards, &only(1.0, 2.0));

        // alpha: 1.0 * 1 + 0.5 * 2 = 2.0; bravo: 0.5 * 1 + 1.0 * 2 = 2.5
        assert_eq!(result.mvp.account, "bravo.1");
        assert!((result.mvp.score - 2.5).abs() < 0.001);
        assert_eq!(result.mvp.reason, "Cleanses");
        assert_eq!(result.silver.as_ref().map(|s| s.account.as_str()), Some("alpha.1"));
        assert!(result.bronze.as_ref().is_some_and(|b| b.score.abs() < 0.001));
        // zero-score players still count toward the mean
        assert!((result.avg_mvp_score - 1.5).abs() < 0.001);
    }

    #[test]
    fn test_zero_weight_metrics_are_ignored() {
        let table = table(&[player("alpha.1", 1000.0, 10.0)]);
        let boards = total_leaderboards(&table);
        let result = compute_mvp(&table, &boards, &only(0.0, 1.0));
        assert_eq!(result.mvp.top_stats.len(), 1);
        assert_eq!(result.mvp.top_stats[0].name, "Cleanses");
        assert_eq!(result.mvp.top_stats[0].rank, 1);
    }

    #[test]
    fn test_no_positive_score_keeps_placeholder() {
        let table = table(&[player("alpha.1", 0.0, 0.0)]);
        let boards = total_leaderboards(&table);
        let result = compute_mvp(&table, &boards, &only(1.0, 1.0));
        assert_eq!(result.mvp.account, "None");
        assert!((result.mvp.score + 1.0).abs() < 0.001);
        assert!(result.silver.is_none());
    }
}
