//! Per-fight breakdown and diff rows, the fight timeline, and the map and
//! class composition charts.
//!
//! Breakdown and timeline cover every record, so uploads without a roster
//! still show up as placeholders built from their dashboard summary.

use std::collections::{BTreeMap, HashMap};

use super::fights::{fight_outcome, resolve_map_name, resolve_permalink, FightView};
use super::players::PlayerTable;
use super::timestamp::order_records;
use crate::format::{duration_label, format_duration_ms, map_color};
use crate::models::{
    ChartSlice, FightBreakdownRow, FightDetails, FightDiffRow, FightRecord, PlayerEntry,
    SeriesShape, SquadMetric, TargetEntry, TargetFocusSlice, TeamBucket, TeamCounts, TeamValue,
    TimelinePoint, UNKNOWN,
};
use crate::professions::{profession_color, resolve_profession_label};

const TOP_ENEMY_TEAMS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TeamColor {
    Red,
    Green,
    Blue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TeamNumbering {
    ZeroBased,
    OneBased,
}

fn team_color(value: &TeamValue, numbering: TeamNumbering) -> Option<TeamColor> {
    match value {
        TeamValue::Name(name) => {
            let lower = name.to_lowercase();
            if lower.contains("red") || lower == "r" {
                Some(TeamColor::Red)
            } else if lower.contains("green") || lower == "g" {
                Some(TeamColor::Green)
            } else if lower.contains("blue") || lower == "b" {
                Some(TeamColor::Blue)
            } else {
                None
            }
        }
        TeamValue::Id(id) => match (numbering, id) {
            (TeamNumbering::ZeroBased, 0) | (TeamNumbering::OneBased, 1) => Some(TeamColor::Red),
            (TeamNumbering::ZeroBased, 1) | (TeamNumbering::OneBased, 2) => Some(TeamColor::Green),
            (TeamNumbering::ZeroBased, 2) | (TeamNumbering::OneBased, 3) => Some(TeamColor::Blue),
            _ => None,
        },
    }
}

fn team_key(value: &TeamValue) -> String {
    match value {
        TeamValue::Id(id) => id.to_string(),
        TeamValue::Name(name) => name.clone(),
    }
}

/// Value counts, largest first; equal counts keep first-seen order.
fn ranked_team_counts(values: &[&TeamValue]) -> Vec<(String, f64)> {
    let mut counts: Vec<(String, f64)> = Vec::new();
    for value in values {
        let key = team_key(value);
        match counts.iter_mut().find(|(k, _)| *k == key) {
            Some((_, n)) => *n += 1.0,
            None => counts.push((key, 1.0)),
        }
    }
    counts.sort_by(|a, b| b.1.total_cmp(&a.1));
    counts
}

/// Red/green/blue enemy head-counts.
///
/// Explicit uploader counts win. Otherwise team values on enemies and
/// off-squad allies are read (all players when those carry none); numeric
/// ids are zero-based unless only a one-based `3` shows up. Unrecognised ids
/// are ranked by frequency onto the three colours, and with no team data at
/// all the enemy count lands on red.
pub fn team_counts(details: &FightDetails) -> TeamCounts {
    if let Some(raw) = &details.team_counts {
        return TeamCounts {
            red: raw.red,
            green: raw.green,
            blue: raw.blue,
        };
    }

    let mut values: Vec<&TeamValue> = details
        .enemy_targets()
        .filter_map(|t| t.team.as_ref())
        .chain(details.allies().filter_map(|p| p.team.as_ref()))
        .collect();
    if values.is_empty() {
        values = details.players.iter().filter_map(|p| p.team.as_ref()).collect();
    }

    let has_id = |n: i64| values.iter().any(|v| **v == TeamValue::Id(n));
    let numbering = if !has_id(0) && has_id(3) {
        TeamNumbering::OneBased
    } else {
        TeamNumbering::ZeroBased
    };

    let mut counts = TeamCounts::default();
    for value in &values {
        match team_color(value, numbering) {
            Some(TeamColor::Red) => counts.red += 1.0,
            Some(TeamColor::Green) => counts.green += 1.0,
            Some(TeamColor::Blue) => counts.blue += 1.0,
            None => {}
        }
    }
    if counts.total() == 0.0 && !values.is_empty() {
        let ranked = ranked_team_counts(&values);
        let nth = |i: usize| ranked.get(i).map(|(_, n)| *n).unwrap_or(0.0);
        counts = TeamCounts {
            red: nth(0),
            green: nth(1),
            blue: nth(2),
        };
    }
    if counts.total() == 0.0 {
        counts.red = details.enemy_targets().count().max(details.allies().count()) as f64;
    }
    counts
}

fn top_enemy_teams(details: &FightDetails) -> Vec<TeamBucket> {
    let values: Vec<&TeamValue> = details.enemy_targets().filter_map(|t| t.team.as_ref()).collect();
    ranked_team_counts(&values)
        .into_iter()
        .take(TOP_ENEMY_TEAMS)
        .map(|(team, count)| TeamBucket { team, count })
        .collect()
}

fn class_counts<'a>(labels: impl Iterator<Item = Option<&'a str>>) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for raw in labels {
        *counts.entry(resolve_profession_label(raw)).or_default() += 1;
    }
    counts
}

fn player_label(player: &PlayerEntry) -> Option<&str> {
    player.profession.as_deref().or(player.name.as_deref())
}

fn squad_sum(details: &FightDetails, f: impl Fn(&PlayerEntry) -> f64) -> f64 {
    details
        .squad_players()
        .map(f)
        .filter(|v| v.is_finite())
        .sum()
}

fn outgoing_barrier(player: &PlayerEntry) -> f64 {
    player
        .ext_barrier_stats
        .as_ref()
        .map(|b| b.outgoing_barrier.iter().map(|p| p.barrier).sum())
        .unwrap_or(0.0)
}

fn outgoing_healing(player: &PlayerEntry) -> f64 {
    player
        .ext_healing_stats
        .as_ref()
        .map(|h| {
            h.outgoing_healing_allies
                .iter()
                .filter_map(|phases| phases.first())
                .map(|p| p.healing)
                .sum()
        })
        .unwrap_or(0.0)
}

fn breakdown_row(fight: &FightView<'_>) -> FightBreakdownRow {
    let details = fight.details;
    let defenses = |p: &PlayerEntry| p.defenses.clone().unwrap_or_default();
    FightBreakdownRow {
        id: fight.fight_id.clone(),
        label: fight
            .record
            .encounter_name
            .clone()
            .unwrap_or_else(|| fight.full_label.clone()),
        permalink: resolve_permalink(fight.record),
        timestamp: fight.timestamp,
        map_name: fight.map_name.clone(),
        duration: format_duration_ms(details.duration_ms),
        is_win: Some(fight_outcome(details, &fight.tally)),
        squad_count: fight.squad_count as f64,
        ally_count: details.allies().count() as f64,
        enemy_count: details.enemy_targets().count() as f64,
        team_counts: team_counts(details),
        allies_down: squad_sum(details, |p| defenses(p).down_count),
        allies_dead: squad_sum(details, |p| defenses(p).dead_count),
        allies_revived: details
            .squad_players()
            .filter(|p| p.stats_all.as_ref().is_some_and(|s| s.saved > 0.0))
            .count() as f64,
        rallies: 0.0,
        enemy_deaths: fight.tally.enemy_deaths,
        enemy_downs: fight.tally.enemy_downs(),
        total_outgoing_damage: squad_sum(details, |p| {
            p.dps_all.as_ref().map(|d| d.damage).unwrap_or(0.0)
        }),
        total_incoming_damage: squad_sum(details, |p| defenses(p).damage_taken),
        incoming_barrier_absorbed: squad_sum(details, |p| defenses(p).damage_barrier),
        outgoing_barrier_absorbed: squad_sum(details, outgoing_barrier),
        squad_class_counts_fight: class_counts(details.squad_players().map(player_label)),
        ally_class_counts_fight: class_counts(details.allies().map(player_label)),
        enemy_class_counts: class_counts(details.enemy_targets().map(TargetEntry::raw_label)),
        top_enemy_teams: top_enemy_teams(details),
    }
}

/// Row for a record without a roster, from its dashboard summary and
/// whatever partial details it carries.
fn placeholder_row(record: &FightRecord, order: usize, timestamp: f64) -> FightBreakdownRow {
    let summary = record.dashboard_summary.clone().unwrap_or_default();
    let details = record.details.as_ref();
    let duration = match (&record.encounter_duration, details) {
        (Some(raw), _) => duration_label(raw),
        (None, Some(d)) => format_duration_ms(d.duration_ms),
        (None, None) => format_duration_ms(0.0),
    };
    let enemy_count = if summary.enemy_count > 0.0 {
        summary.enemy_count
    } else {
        details.map_or(0.0, |d| d.enemy_targets().count() as f64)
    };
    FightBreakdownRow {
        id: record
            .record_id()
            .map(str::to_string)
            .unwrap_or_else(|| format!("fight-{}", order + 1)),
        label: record
            .encounter_name
            .clone()
            .unwrap_or_else(|| format!("Fight {}", order + 1)),
        permalink: resolve_permalink(record),
        timestamp,
        map_name: resolve_map_name(record),
        duration,
        is_win: summary.is_win.or_else(|| details.and_then(|d| d.success)),
        squad_count: summary.squad_count,
        enemy_count,
        allies_dead: summary.squad_deaths,
        enemy_deaths: summary.enemy_deaths,
        ..Default::default()
    }
}

/// One row per record in fight order; rosterless records become placeholders.
pub fn fight_breakdown(records: &[FightRecord], fights: &[FightView<'_>]) -> Vec<FightBreakdownRow> {
    let by_index: HashMap<usize, &FightView<'_>> =
        fights.iter().map(|f| (f.input_index, f)).collect();
    order_records(records)
        .into_iter()
        .enumerate()
        .map(|(order, (input_index, timestamp))| match by_index.get(&input_index) {
            Some(fight) => breakdown_row(fight),
            None => placeholder_row(&records[input_index], order, timestamp),
        })
        .collect()
}

/// Squad, ally and enemy head-counts for every record in fight order.
pub fn timeline(records: &[FightRecord], fights: &[FightView<'_>]) -> Vec<TimelinePoint> {
    let by_index: HashMap<usize, &FightView<'_>> =
        fights.iter().map(|f| (f.input_index, f)).collect();
    order_records(records)
        .into_iter()
        .enumerate()
        .map(|(order, (input_index, timestamp))| {
            let base = TimelinePoint {
                index: order + 1,
                label: format!("Log {}", order + 1),
                timestamp,
                ..Default::default()
            };
            match by_index.get(&input_index) {
                Some(fight) => TimelinePoint {
                    squad_count: fight.squad_count as f64,
                    friendly_count: fight.details.players.len() as f64,
                    enemies: fight.details.enemy_targets().count() as f64,
                    is_win: Some(fight_outcome(fight.details, &fight.tally)),
                    ..base
                },
                None => {
                    let summary = records[input_index].dashboard_summary.clone().unwrap_or_default();
                    TimelinePoint {
                        squad_count: summary.squad_count,
                        friendly_count: summary.squad_count,
                        enemies: summary.enemy_count,
                        is_win: summary.is_win,
                        ..base
                    }
                }
            }
        })
        .collect()
}

fn sorted_slices(counts: BTreeMap<String, f64>, color: impl Fn(&str) -> &'static str) -> Vec<ChartSlice> {
    let mut slices: Vec<ChartSlice> = counts
        .into_iter()
        .map(|(name, value)| ChartSlice {
            color: color(&name).to_string(),
            name,
            value,
        })
        .collect();
    slices.sort_by(|a, b| b.value.total_cmp(&a.value).then_with(|| a.name.cmp(&b.name)));
    slices
}

/// Fights per map.
pub fn map_data(fights: &[FightView<'_>]) -> Vec<ChartSlice> {
    let mut counts: BTreeMap<String, f64> = BTreeMap::new();
    for fight in fights {
        *counts.entry(fight.map_name.clone()).or_default() += 1.0;
    }
    sorted_slices(counts, map_color)
}

/// Squad members per primary profession.
pub fn squad_class_data(table: &PlayerTable) -> Vec<ChartSlice> {
    let mut counts: BTreeMap<String, f64> = BTreeMap::new();
    for player in table.iter() {
        let profession = player.primary_profession();
        if profession != UNKNOWN {
            *counts.entry(profession).or_default() += 1.0;
        }
    }
    sorted_slices(counts, profession_color)
}

/// Enemy appearances per profession across every fight.
pub fn enemy_class_data(fights: &[FightView<'_>]) -> Vec<ChartSlice> {
    let mut counts: BTreeMap<String, f64> = BTreeMap::new();
    for fight in fights {
        for target in fight.details.enemy_targets() {
            *counts.entry(resolve_profession_label(target.raw_label())).or_default() += 1.0;
        }
    }
    sorted_slices(counts, profession_color)
}

/// Damage and hits per enemy profession, keyed by target index.
type FocusTotals = BTreeMap<String, (f64, f64)>;

fn enemy_labels(details: &FightDetails) -> Vec<Option<String>> {
    details
        .targets
        .iter()
        .map(|t| (!t.is_fake).then(|| resolve_profession_label(t.raw_label())))
        .collect()
}

fn add_focus(totals: &mut FocusTotals, labels: &[Option<String>], index: usize, damage: f64, hits: f64) {
    if let Some(Some(label)) = labels.get(index) {
        if damage.is_finite() && hits.is_finite() {
            let entry = totals.entry(label.clone()).or_default();
            entry.0 += damage;
            entry.1 += hits;
        }
    }
}

fn focus_from_stat_slices(details: &FightDetails, labels: &[Option<String>]) -> FocusTotals {
    let mut totals = FocusTotals::new();
    for player in details.squad_players() {
        for (index, dps) in player.dps_targets.iter().enumerate() {
            let hits = player
                .stats_targets
                .get(index)
                .map_or(0.0, |s| s.connected_damage_count);
            add_focus(&mut totals, labels, index, dps.damage, hits);
        }
    }
    totals
}

fn focus_from_timelines(details: &FightDetails, labels: &[Option<String>]) -> FocusTotals {
    let mut totals = FocusTotals::new();
    for player in details.squad_players() {
        let raw = &player.target_damage_1s;
        let per_target = SeriesShape::detect(raw, details.targets.len()).per_target(raw);
        for (index, series) in per_target.iter().enumerate() {
            add_focus(&mut totals, labels, index, series.total(), 0.0);
        }
    }
    totals
}

fn focus_from_damage_taken(details: &FightDetails, labels: &[Option<String>]) -> FocusTotals {
    let mut totals = FocusTotals::new();
    for (index, target) in details.targets.iter().enumerate() {
        let entries = target.total_damage_taken.first().into_iter().flatten();
        let (damage, hits) = entries.fold((0.0, 0.0), |(d, h), e| (d + e.total_damage, h + e.effective_hits()));
        add_focus(&mut totals, labels, index, damage, hits);
    }
    totals
}

fn has_damage(totals: &FocusTotals) -> bool {
    totals.values().any(|(damage, hits)| *damage > 0.0 || *hits > 0.0)
}

/// Share of squad damage per enemy profession.
///
/// Sources are tried in order: per-target stat slices, per-target damage
/// timelines, the enemies' own damage-taken tables, and finally plain
/// head-counts (share only).
pub fn target_focus(details: &FightDetails) -> Vec<TargetFocusSlice> {
    let labels = enemy_labels(details);
    let sources: [fn(&FightDetails, &[Option<String>]) -> FocusTotals; 3] =
        [focus_from_stat_slices, focus_from_timelines, focus_from_damage_taken];

    let mut slices: Vec<TargetFocusSlice> = match sources
        .iter()
        .map(|source| source(details, &labels))
        .find(has_damage)
    {
        Some(totals) => {
            let total_damage: f64 = totals.values().map(|(d, _)| d).sum();
            let total_hits: f64 = totals.values().map(|(_, h)| h).sum();
            totals
                .into_iter()
                .filter(|(_, (d, h))| *d > 0.0 || *h > 0.0)
                .map(|(label, (damage, hits))| TargetFocusSlice {
                    share: if total_damage > 0.0 {
                        damage / total_damage
                    } else if total_hits > 0.0 {
                        hits / total_hits
                    } else {
                        0.0
                    },
                    label,
                    damage,
                    hits,
                })
                .collect()
        }
        None => {
            let counts = class_counts(details.enemy_targets().map(TargetEntry::raw_label));
            let total: usize = counts.values().sum();
            counts
                .into_iter()
                .map(|(label, n)| TargetFocusSlice {
                    label,
                    damage: 0.0,
                    hits: 0.0,
                    share: n as f64 / total.max(1) as f64,
                })
                .collect()
        }
    };
    slices.sort_by(|a, b| b.share.total_cmp(&a.share).then_with(|| a.label.cmp(&b.label)));
    slices
}

fn metric(id: &str, label: &str, higher_is_better: bool, value: f64) -> SquadMetric {
    SquadMetric {
        metric_id: id.to_string(),
        metric_label: label.to_string(),
        higher_is_better,
        value: if value.is_finite() { value } else { 0.0 },
    }
}

/// Squad-level totals compared side by side in diff mode.
pub fn squad_metrics(fight: &FightView<'_>) -> Vec<SquadMetric> {
    let details = fight.details;
    let defenses = |p: &PlayerEntry| p.defenses.clone().unwrap_or_default();
    let support = |p: &PlayerEntry| p.support.clone().unwrap_or_default();
    let tally = &fight.tally;
    vec![
        metric(
            "outgoingDamage",
            "Outgoing Damage",
            true,
            squad_sum(details, |p| p.dps_all.as_ref().map_or(0.0, |d| d.damage)),
        ),
        metric(
            "incomingDamage",
            "Incoming Damage",
            false,
            squad_sum(details, |p| defenses(p).damage_taken),
        ),
        metric(
            "squadKdr",
            "Squad KDR",
            true,
            tally.enemy_deaths / tally.squad_deaths.max(1.0),
        ),
        metric("enemyDowns", "Enemy Downs", true, tally.enemy_downs()),
        metric("enemyDeaths", "Enemy Deaths", true, tally.enemy_deaths),
        metric("alliesDown", "Allies Down", false, squad_sum(details, |p| defenses(p).down_count)),
        metric("alliesDead", "Allies Dead", false, tally.squad_deaths),
        metric(
            "downContribution",
            "Down Contribution",
            true,
            squad_sum(details, |p| p.stats_targets.iter().map(|s| s.down_contribution).sum()),
        ),
        metric("strips", "Strips", true, squad_sum(details, |p| support(p).boon_strips)),
        metric(
            "cleanses",
            "Cleanses",
            true,
            squad_sum(details, |p| support(p).condi_cleanse + support(p).condi_cleanse_self),
        ),
        metric("healing", "Healing", true, squad_sum(details, outgoing_healing)),
        metric("barrier", "Barrier", true, squad_sum(details, outgoing_barrier)),
        metric(
            "cc",
            "Crowd Control",
            true,
            squad_sum(details, |p| p.stats_all.as_ref().map_or(0.0, |s| s.applied_crowd_control)),
        ),
    ]
}

/// Diff-mode rows for every valid fight.
pub fn fight_diff(fights: &[FightView<'_>]) -> Vec<FightDiffRow> {
    fights
        .iter()
        .map(|fight| FightDiffRow {
            id: fight.fight_id.clone(),
            short_label: fight.short_label.clone(),
            full_label: fight.full_label.clone(),
            timestamp: fight.timestamp,
            target_focus: target_focus(fight.details),
            squad_metrics: squad_metrics(fight),
        })
        .collect()
}
