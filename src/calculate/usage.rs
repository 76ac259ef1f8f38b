//! Skill cast counts per player and per fight, from rotation data.

use std::collections::BTreeMap;

use super::fights::FightView;
use super::players::is_res_utility_skill;
use crate::models::{
    ResUtilitySkill, SkillOption, SkillUsageEntry, SkillUsageLogRecord, SkillUsagePlayer,
    SkillUsageSummary,
};

fn skill_key(id: i64) -> String {
    format!("s{id}")
}

#[derive(Debug, Default)]
struct SkillInfo {
    name: String,
    icon: Option<String>,
    total: f64,
}

/// Cross-fight skill usage accumulator. Players are keyed by
/// `account|profession` so a swap shows up as a separate row.
#[derive(Debug, Default)]
pub struct SkillUsageTracker {
    records: Vec<SkillUsageLogRecord>,
    players: BTreeMap<String, SkillUsagePlayer>,
    skills: BTreeMap<String, SkillInfo>,
    res_utility: BTreeMap<String, String>,
}

impl SkillUsageTracker {
    pub fn add_fight(&mut self, fight: &FightView<'_>) {
        let details = fight.details;
        let mut record = SkillUsageLogRecord {
            id: fight.fight_id.clone(),
            label: details
                .fight_name
                .clone()
                .unwrap_or_else(|| fight.full_label.clone()),
            timestamp: fight.timestamp,
            duration_seconds: fight.duration_ms / 1000.0,
            ..Default::default()
        };

        for player in details.squad_players() {
            let key = player.breakdown_key();
            let account = player.key();
            let profession = player.profession_or_unknown().to_string();
            let row = self
                .players
                .entry(key.clone())
                .or_insert_with(|| SkillUsagePlayer {
                    key: key.clone(),
                    display_name: account.clone(),
                    account,
                    profession_list: vec![profession.clone()],
                    profession,
                    ..Default::default()
                });
            row.logs += 1;
            let active_seconds = player.active_times.first().copied().unwrap_or(0.0) / 1000.0;
            row.total_active_seconds += active_seconds;
            record.player_active_seconds.insert(key.clone(), active_seconds);

            for rotation in player.rotation.iter().filter(|r| r.id != 0 && r.casts > 0) {
                let casts = rotation.casts as f64;
                let skill_id = skill_key(rotation.id);
                let meta = details.skill(rotation.id);
                let name = meta
                    .and_then(|m| m.name.clone())
                    .unwrap_or_else(|| format!("Skill {}", rotation.id));
                let icon = meta.and_then(|m| m.icon.clone());

                *row.skill_totals.entry(skill_id.clone()).or_default() += casts;

                let info = self.skills.entry(skill_id.clone()).or_default();
                info.total += casts;
                info.name = name.clone();
                if info.icon.is_none() {
                    info.icon = icon.clone();
                }

                let entry = record
                    .skill_entries
                    .entry(skill_id.clone())
                    .or_insert_with(|| SkillUsageEntry {
                        name: name.clone(),
                        icon: None,
                        players: BTreeMap::new(),
                    });
                if entry.icon.is_none() {
                    entry.icon = icon;
                }
                *entry.players.entry(key.clone()).or_default() += casts;

                if is_res_utility_skill(rotation.id, details) {
                    self.res_utility.entry(skill_id).or_insert(name);
                }
            }
        }
        self.records.push(record);
    }

    pub fn finish(self) -> SkillUsageSummary {
        let mut skill_options: Vec<SkillOption> = self
            .skills
            .into_iter()
            .map(|(id, info)| SkillOption {
                id,
                name: info.name,
                total: info.total,
                icon: info.icon,
            })
            .collect();
        // Stable: equal totals stay in id order.
        skill_options.sort_by(|a, b| b.total.total_cmp(&a.total));

        SkillUsageSummary {
            log_records: self.records,
            players: self.players.into_values().collect(),
            skill_options,
            res_utility_skills: self
                .res_utility
                .into_iter()
                .map(|(id, name)| ResUtilitySkill { id, name })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculate::fights::prepare_fights;
    use crate::models::FightRecord;
    use serde_json::json;

    #[test]
    fn test_counts_casts_per_player_and_fight() {
        let records: Vec<FightRecord> = vec![serde_json::from_value(json!({
            "filePath": "usage-1",
            "details": {
                "fightName": "Detailed WvW - Eternal Battlegrounds",
                "durationMS": 90000,
                "skillMap": {
                    "s10244": { "name": "Signet of Mercy", "icon": "mercy.png" },
                    "s5": { "name": "Mantra of Solace" }
                },
                "players": [
                    {
                        "account": "a.1", "profession": "Firebrand", "activeTimes": [60000],
                        "rotation": [
                            { "id": 5, "skills": [{}, {}, {}] },
                            { "id": 10244, "skills": [{}] },
                            { "id": 0, "skills": [{}] }
                        ]
                    },
                    {
                        "account": "b.1", "profession": "Scourge", "activeTimes": [30000],
                        "rotation": [{ "id": 5, "skills": [{}] }]
                    },
                    {
                        "account": "c.1", "notInSquad": true,
                        "rotation": [{ "id": 5, "skills": [{}] }]
                    }
                ]
            }
        }))
        .unwrap()];
        let fights = prepare_fights(&records);
        let mut tracker = SkillUsageTracker::default();
        for fight in &fights {
            tracker.add_fight(fight);
        }
        let summary = tracker.finish();

        assert_eq!(summary.players.len(), 2);
        let alpha = &summary.players[0];
        assert_eq!(alpha.key, "a.1|Firebrand");
        assert!((alpha.skill_totals["s5"] - 3.0).abs() < 0.001);
        assert!((alpha.total_active_seconds - 60.0).abs() < 0.001);

        assert_eq!(summary.skill_options[0].id, "s5");
        assert!((summary.skill_options[0].total - 4.0).abs() < 0.001);
        assert_eq!(summary.skill_options[1].icon.as_deref(), Some("mercy.png"));

        let record = &summary.log_records[0];
        assert!((record.duration_seconds - 90.0).abs() < 0.001);
        assert_eq!(record.skill_entries["s5"].players.len(), 2);
        assert_eq!(summary.res_utility_skills.len(), 1);
        assert_eq!(summary.res_utility_skills[0].name, "Signet of Mercy");
    }
}
