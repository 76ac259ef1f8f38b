//! Fight-level derivations shared by every pass: ordering, outcome,
//! downs/deaths, map label, permalink and the squad overview.

use std::collections::HashMap;

use serde_json::Value;

use super::timestamp;
use crate::format::{build_fight_label, normalize_map_name, sanitize_wvw_label};
use crate::models::{FightDetails, FightRecord, StatsAggregate};

/// A valid fight prepared for the accumulation passes.
#[derive(Debug, Clone)]
pub struct FightView<'a> {
    pub record: &'a FightRecord,
    pub details: &'a FightDetails,
    /// Position in the input collection
    pub input_index: usize,
    /// Position among valid fights in fight order
    pub order: usize,
    pub timestamp: f64,
    pub duration_ms: f64,
    pub map_name: String,
    pub fight_id: String,
    /// `F{n}`
    pub short_label: String,
    pub full_label: String,
    pub squad_count: usize,
    /// Squad head-count per sub-group (missing group reads as 0)
    pub group_counts: HashMap<i64, usize>,
    pub tally: FightTally,
}

impl<'a> FightView<'a> {
    pub fn group_count(&self, group: Option<i64>) -> usize {
        self.group_counts
            .get(&group.unwrap_or(0))
            .copied()
            .unwrap_or(1)
    }
}

/// Squad and enemy downs/deaths for one fight.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FightTally {
    pub squad_downs_deaths: f64,
    pub squad_deaths: f64,
    pub enemy_downs_deaths: f64,
    pub enemy_deaths: f64,
}

impl FightTally {
    pub fn enemy_downs(&self) -> f64 {
        (self.enemy_downs_deaths - self.enemy_deaths).max(0.0)
    }
}

pub fn fight_tally(details: &FightDetails) -> FightTally {
    let mut tally = FightTally::default();
    for player in details.squad_players() {
        if let Some(defenses) = &player.defenses {
            tally.squad_downs_deaths += defenses.down_count + defenses.dead_count;
            tally.squad_deaths += defenses.dead_count;
        }
        for stats in &player.stats_targets {
            tally.enemy_downs_deaths += stats.downed + stats.killed;
            tally.enemy_deaths += stats.killed;
        }
    }
    tally
}

/// Win when the enemy lost more bodies; the log's own flag breaks a 0-0.
pub fn fight_outcome(details: &FightDetails, tally: &FightTally) -> bool {
    if tally.squad_downs_deaths > 0.0 || tally.enemy_downs_deaths > 0.0 {
        return tally.enemy_downs_deaths > tally.squad_downs_deaths;
    }
    details.success.unwrap_or(false)
}

pub fn resolve_map_name(record: &FightRecord) -> String {
    let raw = record
        .details
        .as_ref()
        .and_then(FightDetails::raw_map_label)
        .or(record.fight_name.as_deref())
        .or(record.encounter_name.as_deref());
    normalize_map_name(raw)
}

fn link_from_value(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => Some(s.as_str()),
        Value::Object(obj) => ["permalink", "link", "url", "reportLink"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_str).filter(|s| !s.trim().is_empty())),
        _ => None,
    }?;
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

pub fn resolve_permalink(record: &FightRecord) -> Option<String> {
    record
        .permalink
        .clone()
        .or_else(|| record.details.as_ref().and_then(|d| d.permalink.clone()))
        .or_else(|| {
            record
                .details
                .as_ref()
                .and_then(|d| d.upload_links.iter().find_map(link_from_value))
        })
}

/// Fight name merged with its map, unless one already names the other.
pub fn resolve_fight_label(record: &FightRecord, map_name: &str, order: usize) -> String {
    let fight_name = record
        .details
        .as_ref()
        .and_then(|d| d.fight_name.as_deref())
        .or(record.fight_name.as_deref())
        .map(sanitize_wvw_label)
        .unwrap_or_else(|| format!("Fight {}", order + 1));
    build_fight_label(&fight_name, map_name)
}

/// Valid fights in fight order.
pub fn prepare_fights(records: &[FightRecord]) -> Vec<FightView<'_>> {
    let mut views = Vec::new();
    for (input_index, ts) in timestamp::order_records(records) {
        let record = &records[input_index];
        let Some(details) = record.valid_details() else {
            continue;
        };
        let order = views.len();
        let map_name = resolve_map_name(record);
        let full_label = resolve_fight_label(record, &map_name, order);
        let mut group_counts: HashMap<i64, usize> = HashMap::new();
        let mut squad_count = 0;
        for player in details.squad_players() {
            squad_count += 1;
            *group_counts.entry(player.group.unwrap_or(0)).or_default() += 1;
        }
        views.push(FightView {
            record,
            details,
            input_index,
            order,
            timestamp: ts,
            duration_ms: details.duration_ms.max(0.0),
            map_name,
            fight_id: record
                .record_id()
                .map(str::to_string)
                .unwrap_or_else(|| format!("fight-{}", order + 1)),
            short_label: format!("F{}", order + 1),
            full_label,
            squad_count,
            group_counts,
            tally: fight_tally(details),
        });
    }
    views
}

fn kdr_label(kills: f64, deaths: f64) -> String {
    if deaths > 0.0 {
        format!("{:.2}", kills / deaths)
    } else if kills > 0.0 {
        // no deaths: ratio is unbounded
        String::new()
    } else {
        "0.00".to_string()
    }
}

/// Wins, losses, averages and kill/death ratios.
pub fn apply_overview(fights: &[FightView<'_>], stats: &mut StatsAggregate) {
    let mut squad_size = 0.0;
    let mut enemies = 0.0;
    for fight in fights {
        if fight_outcome(fight.details, &fight.tally) {
            stats.wins += 1;
        } else {
            stats.losses += 1;
        }
        squad_size += fight.squad_count as f64;
        enemies += fight.details.enemy_targets().count() as f64;
        stats.total_squad_kills += fight.tally.enemy_deaths;
        stats.total_enemy_deaths += fight.tally.enemy_deaths;
        stats.total_squad_deaths += fight.tally.squad_deaths;
        stats.total_enemy_kills += fight.tally.squad_deaths;
    }
    stats.total = fights.len();
    if !fights.is_empty() {
        stats.avg_squad_size = (squad_size / fights.len() as f64).round();
        stats.avg_enemies = (enemies / fights.len() as f64).round();
    }
    stats.squad_kdr = kdr_label(stats.total_squad_kills, stats.total_squad_deaths);
    stats.enemy_kdr = kdr_label(stats.total_enemy_kills, stats.total_enemy_deaths);
}
