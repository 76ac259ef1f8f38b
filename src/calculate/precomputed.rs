//! Passthrough for an aggregate computed earlier.
//!
//! A precomputed aggregate is returned as-is except for fields that older
//! producers left empty: fight timestamps, team breakdowns, diff-mode rows
//! and top-stat cards that lag behind their own leaderboards.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use super::breakdown::{fight_diff, team_counts};
use super::fights::{prepare_fights, resolve_permalink};
use super::leaderboard::{higher_is_better, top_from_leaderboard, TOP_STAT_KEYS};
use super::timestamp::resolve_fight_timestamp;
use crate::models::{FightRecord, LeaderboardRow, StatsAggregate, TopStat, TopStats};

fn top_stat_mut<'a>(top: &'a mut TopStats, key: &str) -> Option<&'a mut TopStat> {
    match key {
        "downContrib" => Some(&mut top.max_down_contrib),
        "barrier" => Some(&mut top.max_barrier),
        "healing" => Some(&mut top.max_healing),
        "dodges" => Some(&mut top.max_dodges),
        "strips" => Some(&mut top.max_strips),
        "cleanses" => Some(&mut top.max_cleanses),
        "cc" => Some(&mut top.max_cc),
        "stability" => Some(&mut top.max_stab),
        "closestToTag" => Some(&mut top.closest_to_tag),
        _ => None,
    }
}

/// Replace cards that their leaderboard's leader beats. Returns how many
/// were replaced.
pub fn refresh_top_stats(top: &mut TopStats, boards: &BTreeMap<String, Vec<LeaderboardRow>>) -> usize {
    let mut replaced = 0;
    for key in TOP_STAT_KEYS {
        let Some(board) = boards.get(key).filter(|b| !b.is_empty()) else {
            continue;
        };
        let Some(stat) = top_stat_mut(top, key) else {
            continue;
        };
        let leader = top_from_leaderboard(Some(board));
        let stale = if higher_is_better(key) {
            leader.value > stat.value
        } else {
            stat.player == TopStat::default().player || leader.value < stat.value
        };
        if stale {
            *stat = leader;
            replaced += 1;
        }
    }
    replaced
}

/// Fill gaps in a precomputed aggregate from the records it was built from.
pub fn enrich_precomputed(mut stats: StatsAggregate, records: &[FightRecord]) -> StatsAggregate {
    let mut by_id: HashMap<&str, &FightRecord> = HashMap::new();
    let mut by_permalink: HashMap<String, &FightRecord> = HashMap::new();
    for record in records {
        if let Some(id) = record.record_id() {
            by_id.insert(id, record);
        }
        if let Some(link) = resolve_permalink(record) {
            by_permalink.insert(link, record);
        }
    }

    let mut patched_timestamps = 0;
    let mut patched_teams = 0;
    for row in &mut stats.fight_breakdown {
        let matched = by_id.get(row.id.as_str()).copied().or_else(|| {
            row.permalink
                .as_deref()
                .map(str::trim)
                .and_then(|link| by_permalink.get(link).copied())
        });
        let Some(record) = matched else {
            continue;
        };
        if row.timestamp <= 0.0 {
            let resolved = resolve_fight_timestamp(record);
            if resolved > 0.0 {
                row.timestamp = resolved;
                patched_timestamps += 1;
            }
        }
        if let Some(details) = record.valid_details() {
            if row.team_counts.total() == 0.0 {
                row.team_counts = team_counts(details);
                patched_teams += 1;
            }
        }
    }

    let mut patched_diff = false;
    if stats.fight_diff.is_empty() {
        let fights = prepare_fights(records);
        if !fights.is_empty() {
            stats.fight_diff = fight_diff(&fights);
            patched_diff = true;
        }
    }

    let refreshed = refresh_top_stats(&mut stats.top_stats, &stats.leaderboards)
        + refresh_top_stats(
            &mut stats.top_stats_per_second,
            &stats.top_stats_leaderboards_per_second,
        );

    debug!(
        patched_timestamps,
        patched_teams, patched_diff, refreshed, "Enriched precomputed aggregate"
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculate::leaderboard::{build_leaderboard, LeaderboardCandidate};
    use serde_json::json;

    fn board(rows: &[(&str, f64)], higher: bool) -> Vec<LeaderboardRow> {
        build_leaderboard(
            rows.iter()
                .map(|(account, value)| LeaderboardCandidate {
                    account: account.to_string(),
                    profession: "Druid".to_string(),
                    profession_list: vec!["Druid".to_string()],
                    value: *value,
                    count: 1,
                })
                .collect(),
            higher,
        )
    }

    #[test]
    fn test_stale_top_stat_takes_leaderboard_value() {
        let mut top = TopStats::default();
        top.max_healing = TopStat {
            value: 100.0,
            player: "old.1".to_string(),
            ..Default::default()
        };
        top.max_cleanses = TopStat {
            value: 90.0,
            player: "keep.1".to_string(),
            ..Default::default()
        };
        let mut boards = BTreeMap::new();
        boards.insert("healing".to_string(), board(&[("new.1", 250.0)], true));
        boards.insert("cleanses".to_string(), board(&[("lower.1", 50.0)], true));
        boards.insert("closestToTag".to_string(), board(&[("near.1", 120.0)], false));

        let replaced = refresh_top_stats(&mut top, &boards);
        assert_eq!(replaced, 2);
        assert!((top.max_healing.value - 250.0).abs() < 0.001);
        assert_eq!(top.max_healing.player, "new.1");
        assert_eq!(top.max_cleanses.player, "keep.1");
        assert_eq!(top.closest_to_tag.player, "near.1");
    }

    #[test]
    fn test_patches_missing_timestamps_and_teams() {
        let records: Vec<FightRecord> = vec![
            serde_json::from_value(json!({
                "filePath": "log-1",
                "details": {
                    "timeStartStd": "2026-02-10T01:00:00Z",
                    "players": [{ "account": "a.1" }],
                    "targets": [{ "teamID": 0 }, { "teamID": 1 }]
                }
            }))
            .unwrap(),
            serde_json::from_value(json!({
                "filePath": "log-2",
                "permalink": "https://dps.report/xyz",
                "uploadTime": 1770685500
            }))
            .unwrap(),
        ];
        let stats: StatsAggregate = serde_json::from_value(json!({
            "total": 1,
            "fightBreakdown": [
                { "id": "log-1", "timestamp": 0 },
                { "id": "renamed", "permalink": " https://dps.report/xyz ", "timestamp": 0 },
                { "id": "missing", "timestamp": 0 }
            ]
        }))
        .unwrap();

        let stats = enrich_precomputed(stats, &records);
        assert!(stats.fight_breakdown[0].timestamp > 0.0);
        assert!((stats.fight_breakdown[0].team_counts.total() - 2.0).abs() < 0.001);
        assert!((stats.fight_breakdown[1].timestamp - 1_770_685_500_000.0).abs() < 0.001);
        assert!((stats.fight_breakdown[2].timestamp - 0.0).abs() < 0.001);
        assert_eq!(stats.fight_diff.len(), 1);
        assert_eq!(stats.total, 1);
    }
}
