//! Skill-level damage attribution.
//!
//! The parser reports outgoing damage twice: per enemy target and as a
//! fight total. With the target source preferred, the total distribution
//! only tops up what the per-target rows missed, so a skill's attributed
//! damage is the larger of the two sources and never their sum.

use std::collections::BTreeMap;

use super::conditions::condition_for_entry;
use super::fights::FightView;
use crate::models::{
    DamageEntry, FightDetails, PlayerEntry, PlayerSkillBreakdown, PlayerSkillEntry,
    SkillDamageRow, SkillDamageSource, TopSkillsMetric,
};

pub const TOP_SKILLS_CAP: usize = 25;

pub fn placeholder_name(id: i64) -> String {
    format!("Skill {id}")
}

pub fn is_placeholder(name: &str) -> bool {
    name.starts_with("Skill ")
}

/// Display name and icon for a skill id. Unnamed ids that share their id
/// with a condition take the condition's name and buff icon.
pub fn resolve_skill_meta(id: i64, details: &FightDetails) -> (String, Option<String>) {
    let mapped = details.skill(id);
    let mut icon = mapped.and_then(|s| s.icon.clone());
    let mut name = mapped
        .and_then(|s| s.name.clone())
        .unwrap_or_else(|| placeholder_name(id));
    if is_placeholder(&name) {
        if let Some(condition) = condition_for_entry(&name, id, details) {
            name = condition.to_string();
            icon = details.buff(id).and_then(|b| b.icon.clone()).or(icon);
        }
    }
    (name, icon)
}

/// Damage credited to one skill by one player.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SkillContribution {
    pub id: i64,
    pub damage: f64,
    pub hits: f64,
    pub down_contribution: f64,
}

impl SkillContribution {
    fn from_entry(entry: &DamageEntry) -> Self {
        Self {
            id: entry.id,
            damage: finite(entry.total_damage),
            hits: finite(entry.connected_hits),
            down_contribution: finite(entry.down_contribution),
        }
    }

    fn add(&mut self, other: &SkillContribution) {
        self.damage += other.damage;
        self.hits += other.hits;
        self.down_contribution += other.down_contribution;
    }
}

fn finite(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

fn phase_zero_entries(phases: &[Vec<DamageEntry>]) -> impl Iterator<Item = &DamageEntry> {
    phases.first().into_iter().flatten().filter(|e| e.id != 0)
}

/// Per-skill contributions for one player, reconciled across sources.
pub fn reconciled_contributions(
    player: &PlayerEntry,
    details: &FightDetails,
    source: SkillDamageSource,
) -> Vec<SkillContribution> {
    let total_entries: Vec<SkillContribution> = phase_zero_entries(&player.total_damage_dist)
        .map(SkillContribution::from_entry)
        .collect();
    if source == SkillDamageSource::Total {
        return total_entries;
    }

    let mut out: Vec<SkillContribution> = player
        .target_damage_dist
        .iter()
        .flat_map(|phases| phase_zero_entries(phases))
        .map(SkillContribution::from_entry)
        .collect();

    // detailed logs carry inflated total-only rows for channelled skills
    if details.detailed_wvw {
        return out;
    }

    let mut attributed: BTreeMap<i64, SkillContribution> = BTreeMap::new();
    for c in &out {
        attributed.entry(c.id).or_default().add(c);
    }
    let mut totals: Vec<SkillContribution> = Vec::new();
    for c in &total_entries {
        match totals.iter_mut().find(|t| t.id == c.id) {
            Some(t) => t.add(c),
            None => totals.push(*c),
        }
    }
    for total in totals {
        let seen = attributed.get(&total.id).copied().unwrap_or_default();
        let delta = SkillContribution {
            id: total.id,
            damage: (total.damage - seen.damage).max(0.0),
            hits: (total.hits - seen.hits).max(0.0),
            down_contribution: (total.down_contribution - seen.down_contribution).max(0.0),
        };
        if delta.damage > 0.0 || delta.hits > 0.0 || delta.down_contribution > 0.0 {
            out.push(delta);
        }
    }
    out
}

#[derive(Debug, Default)]
struct BreakdownAccount {
    account: String,
    profession: String,
    profession_list: Vec<String>,
    total_fight_ms: f64,
    skills: BTreeMap<String, PlayerSkillEntry>,
}

/// Global outgoing/incoming skill tables and per-player breakdowns.
#[derive(Debug, Default)]
pub struct SkillTables {
    outgoing: BTreeMap<i64, SkillDamageRow>,
    incoming: BTreeMap<i64, SkillDamageRow>,
    breakdowns: BTreeMap<String, BreakdownAccount>,
}

impl SkillTables {
    pub fn add_fight(&mut self, fight: &FightView<'_>, source: SkillDamageSource) {
        let details = fight.details;
        for player in details.squad_players() {
            let key = player.breakdown_key();
            let profession = player.profession_or_unknown().to_string();
            let breakdown = self.breakdowns.entry(key).or_insert_with(|| BreakdownAccount {
                account: player.display_account(),
                profession: profession.clone(),
                ..Default::default()
            });
            if !breakdown.profession_list.contains(&profession) {
                breakdown.profession_list.push(profession);
            }
            breakdown.total_fight_ms += fight.duration_ms;

            for c in reconciled_contributions(player, details, source) {
                let (name, icon) = resolve_skill_meta(c.id, details);

                let row = self.outgoing.entry(c.id).or_insert_with(|| SkillDamageRow {
                    id: c.id,
                    name: name.clone(),
                    icon: icon.clone(),
                    ..Default::default()
                });
                if is_placeholder(&row.name) && !is_placeholder(&name) {
                    row.name = name.clone();
                }
                if row.icon.is_none() {
                    row.icon = icon.clone();
                }
                row.damage += c.damage;
                row.hits += c.hits;
                row.down_contribution += c.down_contribution;

                let skill_id = format!("s{}", c.id);
                let entry = breakdown
                    .skills
                    .entry(skill_id.clone())
                    .or_insert_with(|| PlayerSkillEntry {
                        id: skill_id,
                        name: name.clone(),
                        icon: icon.clone(),
                        ..Default::default()
                    });
                if is_placeholder(&entry.name) && !is_placeholder(&name) {
                    entry.name = name;
                }
                if entry.icon.is_none() {
                    entry.icon = icon;
                }
                entry.damage += c.damage;
                entry.down_contribution += c.down_contribution;
            }

            self.add_incoming(player, details);
        }
    }

    fn add_incoming(&mut self, player: &PlayerEntry, details: &FightDetails) {
        for entry in player.total_damage_taken.iter().flatten() {
            if entry.id == 0 {
                continue;
            }
            let (name, icon) = resolve_skill_meta(entry.id, details);
            let row = self.incoming.entry(entry.id).or_insert_with(|| SkillDamageRow {
                id: entry.id,
                name: name.clone(),
                icon: icon.clone(),
                ..Default::default()
            });
            if is_placeholder(&row.name) && !is_placeholder(&name) {
                row.name = name;
            }
            if row.icon.is_none() {
                row.icon = icon;
            }
            row.damage += finite(entry.total_damage);
            row.hits += finite(entry.hits);
        }
    }

    pub fn top_skills(&self, metric: TopSkillsMetric) -> Vec<SkillDamageRow> {
        let value = |row: &SkillDamageRow| match metric {
            TopSkillsMetric::Damage => row.damage,
            TopSkillsMetric::DownContribution => row.down_contribution,
        };
        let mut rows: Vec<SkillDamageRow> = self.outgoing.values().cloned().collect();
        rows.sort_by(|a, b| value(b).total_cmp(&value(a)));
        rows.truncate(TOP_SKILLS_CAP);
        rows
    }

    pub fn top_incoming_skills(&self) -> Vec<SkillDamageRow> {
        let mut rows: Vec<SkillDamageRow> = self.incoming.values().cloned().collect();
        rows.sort_by(|a, b| b.damage.total_cmp(&a.damage));
        rows.truncate(TOP_SKILLS_CAP);
        rows
    }

    pub fn player_breakdowns(&self, retain_skill_map: bool) -> Vec<PlayerSkillBreakdown> {
        let mut out: Vec<PlayerSkillBreakdown> = self
            .breakdowns
            .iter()
            .map(|(key, acc)| {
                let mut skills: Vec<PlayerSkillEntry> = acc.skills.values().cloned().collect();
                skills.sort_by(|a, b| b.damage.total_cmp(&a.damage));
                let skill_map = retain_skill_map.then(|| {
                    skills
                        .iter()
                        .map(|s| (s.id.clone(), s.clone()))
                        .collect::<BTreeMap<_, _>>()
                });
                PlayerSkillBreakdown {
                    key: key.clone(),
                    account: acc.account.clone(),
                    display_name: acc.account.clone(),
                    profession: acc.profession.clone(),
                    profession_list: acc.profession_list.clone(),
                    total_fight_ms: acc.total_fight_ms,
                    skills,
                    skill_map,
                }
            })
            .collect();
        out.sort_by(|a, b| a.display_name.cmp(&b.display_name).then_with(|| a.key.cmp(&b.key)));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculate::fights::prepare_fights;
    use crate::models::FightRecord;
    use serde_json::json;

    fn player(value: serde_json::Value) -> PlayerEntry {
        serde_json::from_value(value).unwrap()
    }

    fn details(value: serde_json::Value) -> FightDetails {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_total_source_supplements_target() {
        let p = player(json!({
            "targetDamageDist": [[[{ "id": 9, "totalDamage": 1000, "connectedHits": 1 }]]],
            "totalDamageDist": [[{ "id": 9, "totalDamage": 494819, "connectedHits": 1 }]]
        }));
        let d = details(json!({}));
        let rows = reconciled_contributions(&p, &d, SkillDamageSource::Target);
        let total: f64 = rows.iter().filter(|r| r.id == 9).map(|r| r.damage).sum();
        assert_eq!(total, 494819.0);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].hits, 0.0);
    }

    #[test]
    fn test_matching_sources_emit_no_delta() {
        let p = player(json!({
            "targetDamageDist": [
                [[{ "id": 9, "totalDamage": 600, "connectedHits": 2 }]],
                [[{ "id": 9, "totalDamage": 400, "connectedHits": 1 }]]
            ],
            "totalDamageDist": [[{ "id": 9, "totalDamage": 1000, "connectedHits": 3 }]]
        }));
        let rows = reconciled_contributions(&p, &details(json!({})), SkillDamageSource::Target);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows.iter().map(|r| r.damage).sum::<f64>(), 1000.0);
    }

    #[test]
    fn test_detailed_logs_trust_targets_only() {
        let p = player(json!({
            "targetDamageDist": [[[{ "id": 9, "totalDamage": 1000 }]]],
            "totalDamageDist": [[{ "id": 9, "totalDamage": 494819 }, { "id": 10, "totalDamage": 50 }]]
        }));
        let rows = reconciled_contributions(&p, &details(json!({ "detailedWvW": true })), SkillDamageSource::Target);
        assert_eq!(rows, vec![SkillContribution { id: 9, damage: 1000.0, ..Default::default() }]);
        let rows = reconciled_contributions(&p, &details(json!({ "detailedWvW": true })), SkillDamageSource::Total);
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_skill_meta_falls_back_to_condition() {
        let d = details(json!({
            "skillMap": { "s100": { "name": "Cleave", "icon": "cleave.png" } },
            "buffMap": { "b736": { "name": "Bleeding", "icon": "bleed.png", "classification": "Condition" } }
        }));
        assert_eq!(resolve_skill_meta(100, &d), ("Cleave".to_string(), Some("cleave.png".to_string())));
        assert_eq!(resolve_skill_meta(736, &d), ("Bleeding".to_string(), Some("bleed.png".to_string())));
        assert_eq!(resolve_skill_meta(5, &d), ("Skill 5".to_string(), None));
    }

    #[test]
    fn test_tables_and_breakdowns() {
        let records: Vec<FightRecord> = vec![
            serde_json::from_value(json!({ "uploadTime": 1, "details": {
                "durationMS": 30000,
                "players": [
                    { "account": "b.2", "profession": "Scourge",
                      "targetDamageDist": [[[{ "id": 1, "totalDamage": 500, "connectedHits": 5, "downContribution": 50 }]]],
                      "totalDamageTaken": [[{ "id": 7, "totalDamage": 300, "hits": 3 }]] },
                    { "account": "a.1", "profession": "Firebrand",
                      "targetDamageDist": [[[{ "id": 2, "totalDamage": 800, "connectedHits": 2, "downContribution": 10 }]]] }
                ]
            } })).unwrap(),
            serde_json::from_value(json!({ "uploadTime": 2, "details": {
                "durationMS": 30000,
                "skillMap": { "s1": { "name": "Putrid Explosion" }, "s7": { "name": "Arcing Slice" } },
                "players": [
                    { "account": "b.2", "profession": "Scourge",
                      "targetDamageDist": [[[{ "id": 1, "totalDamage": 500, "connectedHits": 5 }]]],
                      "totalDamageTaken": [[{ "id": 7, "totalDamage": 100, "hits": 1 }]] }
                ]
            } })).unwrap(),
        ];
        let fights = prepare_fights(&records);
        let mut tables = SkillTables::default();
        for fight in &fights {
            tables.add_fight(fight, SkillDamageSource::Target);
        }

        let top = tables.top_skills(TopSkillsMetric::Damage);
        assert_eq!(top[0].id, 1);
        assert_eq!(top[0].name, "Putrid Explosion");
        assert_eq!(top[0].damage, 1000.0);
        let top = tables.top_skills(TopSkillsMetric::DownContribution);
        assert_eq!(top[0].id, 1);

        let incoming = tables.top_incoming_skills();
        assert_eq!(incoming[0].name, "Arcing Slice");
        assert_eq!(incoming[0].hits, 4.0);

        let breakdowns = tables.player_breakdowns(false);
        assert_eq!(breakdowns.len(), 2);
        assert_eq!(breakdowns[0].key, "a.1|Firebrand");
        assert_eq!(breakdowns[1].total_fight_ms, 60000.0);
        assert_eq!(breakdowns[1].skills[0].id, "s1");
        assert!(breakdowns[1].skill_map.is_none());
        assert!(tables.player_breakdowns(true)[0].skill_map.is_some());
    }
}
