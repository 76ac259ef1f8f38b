//! Outgoing and incoming condition ledgers.
//!
//! Damaging conditions are read from the damage distributions; stack-on
//! transitions observed on enemy targets add `applicationsFromBuffs`, and
//! non-damaging conditions are folded in from buff uptime by the player pass.

use std::collections::{BTreeMap, HashMap};

use super::fights::FightView;
use super::players::PlayerTable;
use crate::models::{
    ConditionLedgerEntry, ConditionPlayerRow, ConditionSkill, ConditionSummary, DamageEntry, FightDetails,
};

/// Conditions that never deal damage, so only uptime can account for them.
pub const NON_DAMAGING_CONDITIONS: &[&str] = &[
    "Vulnerability",
    "Weakness",
    "Blind",
    "Cripple",
    "Chill",
    "Immobilize",
    "Slow",
    "Fear",
    "Taunt",
];

const CONDITION_NAMES: &[(&str, &str)] = &[
    ("bleeding", "Bleeding"),
    ("burning", "Burning"),
    ("confusion", "Confusion"),
    ("poison", "Poison"),
    ("torment", "Torment"),
    ("vulnerability", "Vulnerability"),
    ("weakness", "Weakness"),
    ("blind", "Blind"),
    ("crippled", "Cripple"),
    ("chilled", "Chill"),
    ("immobilized", "Immobilize"),
    ("slow", "Slow"),
    ("fear", "Fear"),
    ("taunt", "Taunt"),
];

pub type ConditionLedger = BTreeMap<String, ConditionLedgerEntry>;

/// Canonical condition name for a raw buff or skill label.
pub fn condition_name(raw: Option<&str>) -> Option<&'static str> {
    let cleaned = raw?.trim().to_lowercase();
    CONDITION_NAMES
        .iter()
        .find(|(key, _)| *key == cleaned)
        .map(|(_, name)| *name)
}

/// Condition named by the buff sharing this id, else by the skill label.
pub fn condition_for_entry(skill_name: &str, id: i64, details: &FightDetails) -> Option<&'static str> {
    condition_name(details.buff_name(id)).or_else(|| condition_name(Some(skill_name)))
}

pub fn is_non_damaging(name: &str) -> bool {
    NON_DAMAGING_CONDITIONS.contains(&name)
}

/// Squad-wide condition summaries.
#[derive(Debug, Default)]
pub struct ConditionTotals {
    pub outgoing: BTreeMap<String, ConditionSummary>,
    pub incoming: BTreeMap<String, ConditionSummary>,
}

impl ConditionTotals {
    pub fn outgoing_summary(&self) -> Vec<ConditionSummary> {
        sorted_by_damage(&self.outgoing)
    }

    pub fn incoming_summary(&self) -> Vec<ConditionSummary> {
        sorted_by_damage(&self.incoming)
    }
}

fn sorted_by_damage(map: &BTreeMap<String, ConditionSummary>) -> Vec<ConditionSummary> {
    let mut rows: Vec<ConditionSummary> = map.values().cloned().collect();
    rows.sort_by(|a, b| b.damage.total_cmp(&a.damage));
    rows
}

pub fn summary_entry<'a>(
    map: &'a mut BTreeMap<String, ConditionSummary>,
    name: &str,
    icon: Option<&str>,
) -> &'a mut ConditionSummary {
    let entry = map.entry(name.to_string()).or_insert_with(|| ConditionSummary {
        name: name.to_string(),
        icon: icon.map(str::to_string),
        ..Default::default()
    });
    if entry.icon.is_none() {
        entry.icon = icon.map(str::to_string);
    }
    entry
}

pub fn ledger_entry<'a>(
    ledger: &'a mut ConditionLedger,
    name: &str,
    icon: Option<&str>,
) -> &'a mut ConditionLedgerEntry {
    let entry = ledger.entry(name.to_string()).or_insert_with(|| ConditionLedgerEntry {
        icon: icon.map(str::to_string),
        ..Default::default()
    });
    if entry.icon.is_none() {
        entry.icon = icon.map(str::to_string);
    }
    entry
}

fn add_skill(entry: &mut ConditionLedgerEntry, label: &str, icon: Option<&str>, hits: f64, damage: f64) {
    let skill = entry
        .skills
        .entry(label.to_string())
        .or_insert_with(|| ConditionSkill {
            name: label.to_string(),
            icon: icon.map(str::to_string),
            ..Default::default()
        });
    skill.hits += hits;
    skill.damage += damage;
    if skill.icon.is_none() {
        skill.icon = icon.map(str::to_string);
    }
}

fn finite(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

/// Condition name -> icon, from the fight's buff table.
fn condition_icons(details: &FightDetails) -> HashMap<&'static str, String> {
    let mut icons = HashMap::new();
    for meta in details.buff_map.values() {
        let (Some(name), Some(icon)) = (condition_name(meta.name.as_deref()), meta.icon.as_ref()) else {
            continue;
        };
        icons.entry(name).or_insert_with(|| icon.clone());
    }
    icons
}

struct ResolvedEntry<'a> {
    condition: &'static str,
    label: String,
    skill_icon: Option<&'a str>,
    condition_icon: Option<&'a str>,
}

fn resolve_entry<'a>(
    entry: &DamageEntry,
    details: &'a FightDetails,
    icons: &'a HashMap<&'static str, String>,
) -> Option<ResolvedEntry<'a>> {
    if entry.id == 0 {
        return None;
    }
    let skill = details.skill(entry.id);
    let skill_name = skill
        .and_then(|s| s.name.clone())
        .unwrap_or_else(|| format!("Skill {}", entry.id));
    let condition = condition_for_entry(&skill_name, entry.id, details)?;
    let buff = details.buff(entry.id);
    let condition_icon = icons
        .get(condition)
        .map(String::as_str)
        .or_else(|| buff.and_then(|b| b.icon.as_deref()));
    let label = if skill_name.starts_with("Skill ") {
        buff.and_then(|b| b.name.clone()).unwrap_or(skill_name)
    } else {
        skill_name
    };
    Some(ResolvedEntry {
        condition,
        label,
        skill_icon: skill.and_then(|s| s.icon.as_deref()).or(condition_icon),
        condition_icon,
    })
}

/// Stack-on transitions (0 -> >0) in a state timeline. The state at t=0
/// seeds the previous value without counting.
pub fn count_applications(states: &[(f64, f64)]) -> f64 {
    let mut applied = 0.0;
    let mut prev = 0.0;
    for &(time, value) in states {
        if !time.is_finite() || !value.is_finite() {
            continue;
        }
        if time == 0.0 {
            prev = value;
            continue;
        }
        if prev == 0.0 && value > 0.0 {
            applied += 1.0;
        }
        prev = value;
    }
    applied
}

/// Conditions the squad applied in one fight.
pub fn accumulate_outgoing(fight: &FightView<'_>, totals: &mut ConditionTotals, players: &mut PlayerTable) {
    let details = fight.details;
    let icons = condition_icons(details);

    for player in details.squad_players() {
        let key = player.key();
        for entry in player.total_damage_dist.iter().flatten() {
            let Some(resolved) = resolve_entry(entry, details, &icons) else {
                continue;
            };
            let hits = finite(entry.effective_hits());
            let damage = finite(entry.total_damage);

            let summary = summary_entry(&mut totals.outgoing, resolved.condition, resolved.condition_icon);
            summary.applications += hits;
            summary.damage += damage;

            if let Some(stats) = players.get_mut(&key) {
                let ledger = ledger_entry(&mut stats.outgoing_conditions, resolved.condition, resolved.condition_icon);
                ledger.applications += hits;
                ledger.damage += damage;
                add_skill(ledger, &resolved.label, resolved.skill_icon, hits, damage);
            }
        }
    }

    let name_to_key: HashMap<&str, String> = details
        .squad_players()
        .filter_map(|p| p.name.as_deref().map(|name| (name, p.key())))
        .collect();

    for target in &details.targets {
        for buff in &target.buffs {
            let Some(meta) = details.buff(buff.id) else {
                continue;
            };
            if !meta.is_condition() {
                continue;
            }
            let Some(condition) = meta.name.as_deref().filter(|n| !n.is_empty()) else {
                continue;
            };
            let icon = meta.icon.as_deref();
            for (source, states) in &buff.states_per_source {
                let Some(key) = name_to_key.get(source.as_str()) else {
                    continue;
                };
                let applied = count_applications(states);
                if applied == 0.0 {
                    continue;
                }
                summary_entry(&mut totals.outgoing, condition, icon).applications_from_buffs += applied;
                if let Some(stats) = players.get_mut(key) {
                    ledger_entry(&mut stats.outgoing_conditions, condition, icon).applications_from_buffs += applied;
                }
            }
        }
    }
}

/// Conditions the squad received in one fight.
pub fn accumulate_incoming(fight: &FightView<'_>, totals: &mut ConditionTotals, players: &mut PlayerTable) {
    let details = fight.details;
    let icons = condition_icons(details);

    for player in details.squad_players() {
        let key = player.key();
        let Some(stats) = players.get_mut(&key) else {
            continue;
        };
        for entry in player.total_damage_taken.iter().flatten() {
            let Some(resolved) = resolve_entry(entry, details, &icons) else {
                continue;
            };
            let hits = finite(entry.hits);
            let damage = finite(entry.total_damage);

            let summary = summary_entry(&mut totals.incoming, resolved.condition, resolved.condition_icon);
            summary.applications += hits;
            summary.damage += damage;

            let ledger = ledger_entry(&mut stats.incoming_conditions, resolved.condition, resolved.condition_icon);
            ledger.applications += hits;
            ledger.damage += damage;
            add_skill(ledger, &resolved.label, resolved.skill_icon, hits, damage);
        }
    }
}

/// Fold seconds of a non-damaging condition's uptime into both directions.
pub fn fold_uptime(
    totals: &mut ConditionTotals,
    outgoing: &mut ConditionLedger,
    incoming: &mut ConditionLedger,
    condition: &str,
    icon: Option<&str>,
    seconds: f64,
) {
    summary_entry(&mut totals.outgoing, condition, icon).applications_from_uptime += seconds;
    ledger_entry(outgoing, condition, icon).applications_from_uptime += seconds;
    summary_entry(&mut totals.incoming, condition, icon).applications_from_uptime += seconds;
    ledger_entry(incoming, condition, icon).applications_from_uptime += seconds;
}

/// Per-player ledgers in one direction; players without any condition
/// activity are left out.
pub fn condition_player_rows(table: &PlayerTable, incoming: bool) -> Vec<ConditionPlayerRow> {
    table
        .iter()
        .filter_map(|player| {
            let ledger = if incoming {
                &player.incoming_conditions
            } else {
                &player.outgoing_conditions
            };
            (!ledger.is_empty()).then(|| ConditionPlayerRow {
                account: player.account.clone(),
                profession: player.primary_profession(),
                profession_list: player.profession_list(),
                conditions: ledger.clone(),
            })
        })
        .collect()
}
