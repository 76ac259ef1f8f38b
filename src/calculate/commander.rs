//! Commander-centric analytics.
//!
//! Each fight's commander is the tagged squad member with the longest active
//! time. Their incoming damage, barrier, strips, CC and boon coverage are
//! folded per account, with a per-fight row carrying 5-second series in the
//! same shape as the burst profiles.

use std::collections::BTreeMap;

use super::boons::uptime_buckets;
use super::fights::{fight_outcome, FightView};
use super::players::primary_profession;
use super::skills::resolve_skill_meta;
use super::spike::{
    all_replay_starts, bucket_count, marker_indices, padded_buckets, replay_events,
};
use crate::format::format_duration_ms;
use crate::models::{
    phase_zero, BuffUptime, CommanderBoonUptime, CommanderFight, CommanderRow, DamageBySkill, FightDetails,
    PlayerEntry, UNKNOWN,
};

/// Tagged squad member with the longest active time; account breaks ties.
pub fn select_commander<'a>(details: &'a FightDetails) -> Option<&'a PlayerEntry> {
    let duration = details.duration_ms;
    details
        .squad_players()
        .filter(|p| p.has_commander_tag)
        .max_by(|a, b| {
            a.active_ms(duration)
                .total_cmp(&b.active_ms(duration))
                .then_with(|| b.key().cmp(&a.key()))
        })
}

fn per_minute(value: f64, duration_ms: f64) -> f64 {
    let minutes = duration_ms / 60_000.0;
    if minutes > 0.0 && value.is_finite() {
        value / minutes
    } else {
        0.0
    }
}

fn mean(values: impl ExactSizeIterator<Item = f64>) -> f64 {
    let len = values.len();
    if len == 0 {
        0.0
    } else {
        values.sum::<f64>() / len as f64
    }
}

/// Share of the fight a boon was on the commander, in percent. Stacking
/// boons report presence, the rest report uptime.
fn boon_pct(buff: &BuffUptime, stacking: bool) -> f64 {
    let data = buff.buff_data.clone().unwrap_or_default();
    let pct = if stacking { data.presence } else { data.uptime };
    if pct.is_finite() {
        pct.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

fn commander_boons(
    commander: &PlayerEntry,
    details: &FightDetails,
    count: usize,
) -> Vec<CommanderBoonUptime> {
    let mut boons: Vec<CommanderBoonUptime> = commander
        .buff_uptimes
        .iter()
        .filter_map(|buff| {
            let meta = details.buff(buff.id).filter(|m| m.is_boon())?;
            let uptime_pct = boon_pct(buff, meta.stacking);
            let buckets_5s = if buff.states.is_empty() && buff.states_per_source.is_empty() {
                vec![uptime_pct; count]
            } else {
                // presence per bucket, whether or not the boon stacks
                uptime_buckets(buff, false, count)
            };
            Some(CommanderBoonUptime {
                id: buff.id,
                name: meta
                    .name
                    .clone()
                    .unwrap_or_else(|| format!("Boon {}", buff.id)),
                icon: meta.icon.clone(),
                stacking: meta.stacking,
                uptime_pct,
                uptime_ms: uptime_pct / 100.0 * details.duration_ms,
                buckets_5s,
            })
        })
        .collect();
    boons.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
    boons
}

fn incoming_by_skill(commander: &PlayerEntry, details: &FightDetails) -> Vec<DamageBySkill> {
    let mut skills: BTreeMap<i64, DamageBySkill> = BTreeMap::new();
    let entries = commander.total_damage_taken.first().into_iter().flatten();
    for entry in entries.filter(|e| e.id != 0) {
        let row = skills.entry(entry.id).or_insert_with(|| {
            let (name, icon) = resolve_skill_meta(entry.id, details);
            DamageBySkill {
                id: entry.id,
                name,
                icon,
                ..Default::default()
            }
        });
        row.damage += entry.total_damage;
        row.hits += entry.effective_hits();
    }
    sorted_skills(skills.into_values())
}

fn sorted_skills(rows: impl IntoIterator<Item = DamageBySkill>) -> Vec<DamageBySkill> {
    let mut rows: Vec<DamageBySkill> = rows.into_iter().filter(|r| r.damage > 0.0).collect();
    rows.sort_by(|a, b| {
        b.damage
            .total_cmp(&a.damage)
            .then_with(|| a.name.cmp(&b.name))
    });
    rows
}

/// One fight from the commander's point of view.
pub fn commander_fight(fight: &FightView<'_>, commander: &PlayerEntry) -> CommanderFight {
    let details = fight.details;
    let duration_ms = fight.duration_ms;
    let incoming = phase_zero(&commander.damage_taken_1s)
        .map(|s| s.per_second())
        .unwrap_or_default();
    let count = bucket_count(duration_ms, incoming.len());

    let (starts, downs, deaths) = replay_events(commander);
    let all_starts = all_replay_starts(details);

    let boons = commander_boons(commander, details, count);
    let boon_buckets: Vec<f64> = (0..count)
        .map(|i| mean(boons.iter().map(|b| b.buckets_5s.get(i).copied().unwrap_or(0.0))))
        .collect();

    let defenses = commander.defenses.clone().unwrap_or_default();
    let (allies_down, allies_dead) = details
        .squad_players()
        .filter_map(|p| p.defenses.as_ref())
        .fold((0.0, 0.0), |(down, dead), d| {
            (down + d.down_count, dead + d.dead_count)
        });

    CommanderFight {
        id: fight.fight_id.clone(),
        short_label: fight.short_label.clone(),
        full_label: fight.full_label.clone(),
        timestamp: fight.timestamp,
        duration_ms,
        duration: format_duration_ms(duration_ms),
        map_name: fight.map_name.clone(),
        is_win: fight_outcome(details, &fight.tally),
        squad_count: fight.squad_count,
        enemy_count: details.enemy_targets().count(),
        kills: fight.tally.enemy_deaths,
        downs: fight.tally.enemy_downs(),
        commander_downs: defenses.down_count,
        commander_deaths: defenses.dead_count,
        allies_down,
        allies_dead,
        damage_taken: defenses.damage_taken,
        damage_taken_per_minute: per_minute(defenses.damage_taken, duration_ms),
        incoming_barrier_absorbed: defenses.damage_barrier,
        incoming_barrier_absorbed_per_minute: per_minute(defenses.damage_barrier, duration_ms),
        incoming_strips: defenses.boon_strips,
        incoming_strips_per_minute: per_minute(defenses.boon_strips, duration_ms),
        incoming_cc: defenses.received_crowd_control,
        incoming_cc_per_minute: per_minute(defenses.received_crowd_control, duration_ms),
        boon_uptime_pct: mean(boons.iter().map(|b| b.uptime_pct)),
        boon_entries: boons.len(),
        incoming_damage_by_skill: incoming_by_skill(commander, details),
        incoming_damage_buckets_5s: padded_buckets(&incoming, count),
        incoming_boon_buckets_5s: boon_buckets,
        down_indices_5s: marker_indices(&downs, &starts, &all_starts, count, duration_ms),
        death_indices_5s: marker_indices(&deaths, &starts, &all_starts, count, duration_ms),
        incoming_boon_uptimes: boons,
    }
}

#[derive(Debug, Default)]
struct BoonTotal {
    meta: CommanderBoonUptime,
    weighted_pct: f64,
    weight_ms: f64,
}

#[derive(Debug, Default)]
struct CommanderTotals {
    account: String,
    character_names: Vec<String>,
    fallback_profession: String,
    professions: Vec<String>,
    profession_time_ms: BTreeMap<String, f64>,
    fights: Vec<CommanderFight>,
    skills: BTreeMap<i64, DamageBySkill>,
    boons: BTreeMap<i64, BoonTotal>,
}

impl CommanderTotals {
    fn note_player(&mut self, player: &PlayerEntry, active_ms: f64) {
        if let Some(name) = player.name.as_deref().filter(|n| !n.is_empty()) {
            if !self.character_names.iter().any(|n| n == name) {
                self.character_names.push(name.to_string());
            }
        }
        if let Some(prof) = player.profession.as_deref().filter(|p| *p != UNKNOWN) {
            if !self.professions.iter().any(|p| p == prof) {
                self.professions.push(prof.to_string());
            }
            *self.profession_time_ms.entry(prof.to_string()).or_default() += active_ms;
        }
    }

    fn add(&mut self, fight: CommanderFight) {
        for skill in &fight.incoming_damage_by_skill {
            let row = self.skills.entry(skill.id).or_insert_with(|| DamageBySkill {
                id: skill.id,
                name: skill.name.clone(),
                icon: skill.icon.clone(),
                ..Default::default()
            });
            row.damage += skill.damage;
            row.hits += skill.hits;
        }
        for boon in &fight.incoming_boon_uptimes {
            let total = self.boons.entry(boon.id).or_insert_with(|| BoonTotal {
                meta: CommanderBoonUptime {
                    buckets_5s: Vec::new(),
                    uptime_pct: 0.0,
                    uptime_ms: 0.0,
                    ..boon.clone()
                },
                ..Default::default()
            });
            total.weighted_pct += boon.uptime_pct * fight.duration_ms;
            total.weight_ms += fight.duration_ms;
            total.meta.uptime_ms += boon.uptime_ms;
        }
        self.fights.push(fight);
    }

    fn into_row(self) -> CommanderRow {
        let fights = self.fights.len();
        let sum = |f: fn(&CommanderFight) -> f64| self.fights.iter().map(f).sum::<f64>();

        let wins = self.fights.iter().filter(|f| f.is_win).count();
        let total_duration_ms = sum(|f| f.duration_ms);
        let kills = sum(|f| f.kills);
        let commander_deaths = sum(|f| f.commander_deaths);
        let damage_taken = sum(|f| f.damage_taken);
        let barrier = sum(|f| f.incoming_barrier_absorbed);
        let strips = sum(|f| f.incoming_strips);
        let cc = sum(|f| f.incoming_cc);

        let (boon_weighted, boon_weight) = self
            .fights
            .iter()
            .filter(|f| f.boon_entries > 0)
            .fold((0.0, 0.0), |(w, t), f| {
                (w + f.boon_uptime_pct * f.duration_ms, t + f.duration_ms)
            });

        let incoming_boon_breakdown: Vec<CommanderBoonUptime> = self
            .boons
            .into_values()
            .map(|total| CommanderBoonUptime {
                uptime_pct: if total.weight_ms > 0.0 {
                    total.weighted_pct / total.weight_ms
                } else {
                    0.0
                },
                ..total.meta
            })
            .collect();

        CommanderRow {
            key: self.account.clone(),
            profession: primary_profession(
                &self.professions,
                &self.profession_time_ms,
                &self.fallback_profession,
            ),
            profession_list: self.professions,
            character_names: self.character_names,
            fights,
            wins,
            losses: fights - wins,
            win_rate_pct: if fights > 0 {
                wins as f64 / fights as f64 * 100.0
            } else {
                0.0
            },
            total_duration_ms,
            avg_squad_size: mean(self.fights.iter().map(|f| f.squad_count as f64)),
            avg_enemy_size: mean(self.fights.iter().map(|f| f.enemy_count as f64)),
            kills,
            downs: sum(|f| f.downs),
            commander_downs: sum(|f| f.commander_downs),
            commander_deaths,
            allies_down: sum(|f| f.allies_down),
            allies_dead: sum(|f| f.allies_dead),
            kdr: kills / commander_deaths.max(1.0),
            damage_taken,
            damage_taken_per_minute: per_minute(damage_taken, total_duration_ms),
            incoming_barrier_absorbed: barrier,
            incoming_barrier_absorbed_per_minute: per_minute(barrier, total_duration_ms),
            incoming_strips: strips,
            incoming_strips_per_minute: per_minute(strips, total_duration_ms),
            incoming_cc: cc,
            incoming_cc_per_minute: per_minute(cc, total_duration_ms),
            boon_uptime_pct: if boon_weight > 0.0 {
                boon_weighted / boon_weight
            } else {
                0.0
            },
            boon_entries: incoming_boon_breakdown.len(),
            incoming_skill_breakdown: sorted_skills(self.skills.into_values()),
            incoming_boon_breakdown,
            account: self.account,
            fights_data: self.fights,
        }
    }
}

/// Cross-fight commander accumulator.
#[derive(Debug, Default)]
pub struct CommanderTracker {
    commanders: BTreeMap<String, CommanderTotals>,
}

impl CommanderTracker {
    pub fn add_fight(&mut self, fight: &FightView<'_>) {
        let Some(commander) = select_commander(fight.details) else {
            return;
        };
        let account = commander.key();
        let totals = self
            .commanders
            .entry(account.clone())
            .or_insert_with(|| CommanderTotals {
                account,
                fallback_profession: commander.profession_or_unknown().to_string(),
                ..Default::default()
            });
        totals.note_player(commander, commander.active_ms(fight.duration_ms));
        totals.add(commander_fight(fight, commander));
    }

    /// Rows ordered by fights led, then account.
    pub fn finish(self) -> Vec<CommanderRow> {
        let mut rows: Vec<CommanderRow> = self
            .commanders
            .into_values()
            .filter(|c| !c.fights.is_empty())
            .map(CommanderTotals::into_row)
            .collect();
        rows.sort_by(|a, b| b.fights.cmp(&a.fights).then_with(|| a.account.cmp(&b.account)));
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculate::fights::prepare_fights;
    use crate::models::FightRecord;
    use serde_json::{json, Value};

    fn record(path: &str, details: Value) -> FightRecord {
        serde_json::from_value(json!({ "filePath": path, "details": details })).unwrap()
    }

    fn run(records: &[FightRecord]) -> Vec<CommanderRow> {
        let fights = prepare_fights(records);
        let mut tracker = CommanderTracker::default();
        for fight in &fights {
            tracker.add_fight(fight);
        }
        tracker.finish()
    }

    fn tagged_fight(start: &str, duration: f64, killed: f64, dead: f64, uptime: f64, ally: Value) -> Value {
        json!({
            "timeStartStd": start,
            "durationMS": duration,
            "buffMap": { "b1": { "name": "Might", "classification": "Boon", "stacking": false } },
            "players": [
                {
                    "account": "tag.1234", "name": "Tag One", "profession": "Firebrand",
                    "hasCommanderTag": true, "activeTimes": [duration],
                    "defenses": [{ "downCount": dead, "deadCount": dead, "damageTaken": 12000 }],
                    "statsTargets": [[{ "downed": killed + 1.0, "killed": killed }]],
                    "buffUptimes": [{ "id": 1, "buffData": [{ "uptime": uptime, "presence": uptime }] }]
                },
                ally
            ],
            "targets": [{ "profession": "Necromancer" }]
        })
    }

    #[test]
    fn test_aggregates_commander_fights() {
        let records = vec![
            record(
                "commander-1",
                tagged_fight(
                    "2026-02-10T01:00:00Z",
                    60_000.0,
                    2.0,
                    1.0,
                    50.0,
                    json!({ "account": "ally.1", "profession": "Guardian",
                            "defenses": [{ "downCount": 2, "deadCount": 2 }] }),
                ),
            ),
            record(
                "commander-2",
                tagged_fight(
                    "2026-02-10T01:05:00Z",
                    120_000.0,
                    1.0,
                    0.0,
                    100.0,
                    json!({ "account": "ally.2", "profession": "Mesmer",
                            "defenses": [{ "downCount": 1, "deadCount": 1 }] }),
                ),
            ),
        ];
        let rows = run(&records);
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.account, "tag.1234");
        assert_eq!(row.fights, 2);
        assert!((row.kills - 3.0).abs() < 0.001);
        assert!((row.commander_deaths - 1.0).abs() < 0.001);
        assert!((row.kdr - 3.0).abs() < 0.001);
        assert!((row.allies_down - 4.0).abs() < 0.001);
        assert!((row.allies_dead - 4.0).abs() < 0.001);
        assert!((row.boon_uptime_pct - 83.333).abs() < 0.01);
        // 24000 taken over three minutes
        assert!((row.damage_taken_per_minute - 8000.0).abs() < 0.001);
        assert_eq!(row.fights_data.len(), 2);
        assert!(row.fights_data[0].damage_taken_per_minute > 0.0);
        assert!((row.fights_data[1].boon_uptime_pct - 100.0).abs() < 0.001);
        assert_eq!(row.fights_data[0].incoming_boon_buckets_5s, vec![50.0; 12]);
        assert_eq!(row.incoming_boon_breakdown.len(), 1);
        assert_eq!(row.incoming_boon_breakdown[0].name, "Might");
    }

    #[test]
    fn test_kdr_floors_deaths_at_one() {
        let records = vec![record(
            "solo",
            tagged_fight(
                "2026-02-10T01:00:00Z",
                30_000.0,
                4.0,
                0.0,
                0.0,
                json!({ "account": "ally.1", "profession": "Guardian" }),
            ),
        )];
        let rows = run(&records);
        assert!((rows[0].kdr - 4.0).abs() < 0.001);
        assert_eq!(rows[0].fights_data[0].duration, "0:30");
    }

    #[test]
    fn test_untagged_fights_have_no_commander() {
        let records = vec![record(
            "untagged",
            json!({
                "durationMS": 10000,
                "players": [{ "account": "a.1", "profession": "Scrapper" }]
            }),
        )];
        assert!(run(&records).is_empty());
    }

    #[test]
    fn test_commander_tie_breaks() {
        let details: FightDetails = serde_json::from_value(json!({
            "durationMS": 10000,
            "players": [
                { "account": "zed.1", "hasCommanderTag": true, "activeTimes": [9000] },
                { "account": "amy.1", "hasCommanderTag": true, "activeTimes": [9000] },
                { "account": "bob.1", "hasCommanderTag": true, "activeTimes": [4000] },
                { "account": "out.1", "hasCommanderTag": true, "notInSquad": true, "activeTimes": [10000] }
            ]
        }))
        .unwrap();
        let commander = select_commander(&details).map(PlayerEntry::key);
        assert_eq!(commander.as_deref(), Some("amy.1"));
    }
}
