//! Dense-ranked leaderboards and the top-stat cards built from them.

use std::collections::BTreeMap;

use super::players::{PlayerAggregate, PlayerTable};
use crate::models::{LeaderboardRow, TopStat, TopStats, UNKNOWN};

/// Metrics that get a leaderboard, in output order.
pub const LEADERBOARD_KEYS: [&str; 13] = [
    "downContrib",
    "barrier",
    "healing",
    "dodges",
    "strips",
    "cleanses",
    "cc",
    "stability",
    "revives",
    "participation",
    "dps",
    "damage",
    "closestToTag",
];

/// Metrics surfaced as top-stat cards; also the per-second board set.
pub const TOP_STAT_KEYS: [&str; 9] = [
    "downContrib",
    "barrier",
    "healing",
    "dodges",
    "strips",
    "cleanses",
    "cc",
    "stability",
    "closestToTag",
];

/// Distance is the only metric where smaller wins.
pub fn higher_is_better(key: &str) -> bool {
    key != "closestToTag"
}

/// Raw cross-fight value of one metric for a player.
pub fn metric_value(player: &PlayerAggregate, key: &str) -> f64 {
    match key {
        "downContrib" => player.down_contrib,
        "barrier" => player.barrier,
        "healing" => player.healing,
        "dodges" => player.dodges,
        "strips" => player.strips,
        "cleanses" => player.cleanses,
        "cc" => player.cc,
        "stability" => player.stab,
        "revives" => player.revives,
        "dps" => player.dps,
        "damage" => player.damage,
        "participation" => player.logs_joined as f64,
        "closestToTag" => player.closest_to_tag(),
        _ => 0.0,
    }
}

/// Metric value divided by active seconds. Distance is not a rate.
pub fn per_second_value(player: &PlayerAggregate, key: &str) -> f64 {
    let value = metric_value(player, key);
    if key == "closestToTag" {
        value
    } else {
        value / player.active_seconds()
    }
}

/// Input row for [`build_leaderboard`].
#[derive(Debug, Clone)]
pub struct LeaderboardCandidate {
    pub account: String,
    pub profession: String,
    pub profession_list: Vec<String>,
    pub value: f64,
    pub count: usize,
}

impl LeaderboardCandidate {
    fn from_player(player: &PlayerAggregate, value: f64) -> Self {
        Self {
            account: player.account.clone(),
            profession: player.primary_profession(),
            profession_list: player
                .profession_list()
                .into_iter()
                .filter(|p| p != UNKNOWN)
                .collect(),
            value,
            count: player.logs_joined,
        }
    }
}

/// Filter, sort and dense-rank candidates.
///
/// Non-finite values never rank. Higher-is-better boards drop values at or
/// below zero; lower-is-better boards keep zero. Ties order by account and
/// share a rank; the next distinct value takes its 1-based position.
pub fn build_leaderboard(
    candidates: Vec<LeaderboardCandidate>,
    higher_is_better: bool,
) -> Vec<LeaderboardRow> {
    let mut filtered: Vec<LeaderboardCandidate> = candidates
        .into_iter()
        .filter(|c| {
            c.value.is_finite() && if higher_is_better { c.value > 0.0 } else { c.value >= 0.0 }
        })
        .collect();

    filtered.sort_by(|a, b| {
        let ord = if higher_is_better {
            b.value.total_cmp(&a.value)
        } else {
            a.value.total_cmp(&b.value)
        };
        ord.then_with(|| a.account.cmp(&b.account))
    });

    let mut last_value: Option<f64> = None;
    let mut last_rank = 0;
    filtered
        .into_iter()
        .enumerate()
        .map(|(index, c)| {
            if last_value != Some(c.value) {
                last_rank = index + 1;
                last_value = Some(c.value);
            }
            LeaderboardRow {
                rank: last_rank,
                account: c.account,
                profession: c.profession,
                profession_list: c.profession_list,
                value: c.value,
                count: c.count,
            }
        })
        .collect()
}

fn board_for<F>(table: &PlayerTable, key: &str, value: F) -> Vec<LeaderboardRow>
where
    F: Fn(&PlayerAggregate, &str) -> f64,
{
    let candidates = table
        .iter()
        .map(|p| LeaderboardCandidate::from_player(p, value(p, key)))
        .collect();
    build_leaderboard(candidates, higher_is_better(key))
}

/// Total-mode boards for every [`LEADERBOARD_KEYS`] metric.
pub fn total_leaderboards(table: &PlayerTable) -> BTreeMap<String, Vec<LeaderboardRow>> {
    LEADERBOARD_KEYS
        .iter()
        .map(|key| (key.to_string(), board_for(table, key, metric_value)))
        .collect()
}

/// Per-second boards for the [`TOP_STAT_KEYS`] metrics.
pub fn per_second_leaderboards(table: &PlayerTable) -> BTreeMap<String, Vec<LeaderboardRow>> {
    TOP_STAT_KEYS
        .iter()
        .map(|key| (key.to_string(), board_for(table, key, per_second_value)))
        .collect()
}

/// Leading row of a board, or the placeholder card when it is empty.
pub fn top_from_leaderboard(rows: Option<&Vec<LeaderboardRow>>) -> TopStat {
    match rows.and_then(|r| r.first()) {
        Some(row) => TopStat {
            value: row.value,
            player: row.account.clone(),
            count: row.count,
            profession: row.profession.clone(),
            profession_list: row.profession_list.clone(),
        },
        None => TopStat::default(),
    }
}

/// Top-stat cards read from a set of boards.
pub fn top_stats(boards: &BTreeMap<String, Vec<LeaderboardRow>>) -> TopStats {
    let top = |key: &str| top_from_leaderboard(boards.get(key));
    TopStats {
        max_down_contrib: top("downContrib"),
        max_barrier: top("barrier"),
        max_healing: top("healing"),
        max_dodges: top("dodges"),
        max_strips: top("strips"),
        max_cleanses: top("cleanses"),
        max_cc: top("cc"),
        max_stab: top("stability"),
        closest_to_tag: top("closestToTag"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(account: &str, value: f64) -> LeaderboardCandidate {
        LeaderboardCandidate {
            account: account.to_string(),
            profession: "Firebrand".to_string(),
            profession_list: vec!["Firebrand".to_string()],
            value,
            count: 1,
        }
    }

    #[test]
    fn test_dense_rank_with_ties() {
        let rows = build_leaderboard(
            vec![
                candidate("c.1", 10.0),
                candidate("a.1", 20.0),
                candidate("b.1", 20.0),
                candidate("d.1", 5.0),
            ],
            true,
        );
        let ranks: Vec<(String, usize)> =
            rows.iter().map(|r| (r.account.clone(), r.rank)).collect();
        assert_eq!(
            ranks,
            vec![
                ("a.1".to_string(), 1),
                ("b.1".to_string(), 1),
                ("c.1".to_string(), 3),
                ("d.1".to_string(), 4),
            ]
        );
    }

    #[test]
    fn test_filters_by_direction() {
        let higher = build_leaderboard(
            vec![candidate("a", 0.0), candidate("b", -1.0), candidate("c", f64::NAN), candidate("d", 2.0)],
            true,
        );
        assert_eq!(higher.len(), 1);
        assert_eq!(higher[0].account, "d");

        let lower = build_leaderboard(
            vec![candidate("a", 0.0), candidate("b", f64::INFINITY), candidate("c", 150.0)],
            false,
        );
        assert_eq!(lower.len(), 2);
        assert_eq!(lower[0].account, "a");
        assert_eq!(lower[1].rank, 2);
    }

    #[test]
    fn test_top_stat_defaults_when_empty() {
        let top = top_from_leaderboard(None);
        assert_eq!(top.player, "-");
        assert_eq!(top.profession, "Unknown");
        assert!((top.value - 0.0).abs() < 0.001);

        let rows = build_leaderboard(vec![candidate("x.1", 7.5)], true);
        let top = top_from_leaderboard(Some(&rows));
        assert_eq!(top.player, "x.1");
        assert!((top.value - 7.5).abs() < 0.001);
    }

    #[test]
    fn test_per_second_keeps_distance_raw() {
        let player = PlayerAggregate {
            account: "a.1".to_string(),
            healing: 10_000.0,
            active_ms: 20_000.0,
            total_dist: 300.0,
            dist_count: 2,
            ..Default::default()
        };
        assert!((per_second_value(&player, "healing") - 500.0).abs() < 0.001);
        assert!((per_second_value(&player, "closestToTag") - 150.0).abs() < 0.001);
        assert!(higher_is_better("healing"));
        assert!(!higher_is_better("closestToTag"));
    }
}
