//! Per-fight player and target records as emitted by the log parser.
//!
//! Every struct here is `#[serde(default)]` and every field goes through a
//! [`lenient`](super::lenient) reader, so a malformed field degrades to its
//! documented default instead of rejecting the fight.

use std::collections::HashMap;

use serde::Deserialize;

use super::lenient;

/// Identifier of the account a parser could not resolve.
pub const UNKNOWN: &str = "Unknown";

/// Team marker: numeric id or colour name depending on parser version.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum TeamValue {
    Id(i64),
    Name(String),
}

/// One squad member (or off-squad ally) in one fight.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlayerEntry {
    #[serde(deserialize_with = "lenient::opt_string")]
    pub account: Option<String>,

    /// Character name
    #[serde(deserialize_with = "lenient::opt_string")]
    pub name: Option<String>,

    #[serde(deserialize_with = "lenient::opt_string")]
    pub profession: Option<String>,

    /// Squad sub-group
    #[serde(deserialize_with = "lenient::opt_int")]
    pub group: Option<i64>,

    #[serde(deserialize_with = "lenient::flag")]
    pub has_commander_tag: bool,

    /// Ally outside the tracked squad
    #[serde(deserialize_with = "lenient::flag")]
    pub not_in_squad: bool,

    #[serde(deserialize_with = "lenient::numbers")]
    pub active_times: Vec<f64>,

    #[serde(rename = "teamID", alias = "teamId", deserialize_with = "lenient_team")]
    pub team: Option<TeamValue>,

    #[serde(deserialize_with = "lenient::first")]
    pub dps_all: Option<DpsStats>,

    #[serde(deserialize_with = "lenient::first")]
    pub stats_all: Option<GeneralStats>,

    #[serde(deserialize_with = "lenient::first")]
    pub defenses: Option<DefenseStats>,

    #[serde(deserialize_with = "lenient::first")]
    pub support: Option<SupportStats>,

    /// Phase-0 stats against each target
    #[serde(deserialize_with = "lenient::firsts")]
    pub stats_targets: Vec<TargetStats>,

    /// Phase-0 damage against each target
    #[serde(deserialize_with = "lenient::firsts")]
    pub dps_targets: Vec<DpsStats>,

    /// `[target][phase][entry]`
    #[serde(deserialize_with = "lenient::nested3")]
    pub target_damage_dist: Vec<Vec<Vec<DamageEntry>>>,

    /// `[phase][entry]`
    #[serde(deserialize_with = "lenient::nested")]
    pub total_damage_dist: Vec<Vec<DamageEntry>>,

    /// `[phase][entry]`
    #[serde(deserialize_with = "lenient::nested")]
    pub total_damage_taken: Vec<Vec<DamageEntry>>,

    /// Raw cumulative per-target series; nesting order varies.
    #[serde(rename = "targetDamage1S", deserialize_with = "lenient::numbers3")]
    pub target_damage_1s: Vec<Vec<Vec<f64>>>,

    /// `[phase][time]` cumulative outgoing damage
    #[serde(rename = "damage1S", deserialize_with = "lenient::numbers2")]
    pub damage_1s: Vec<Vec<f64>>,

    /// `[phase][time]` cumulative incoming damage
    #[serde(rename = "damageTaken1S", deserialize_with = "lenient::numbers2")]
    pub damage_taken_1s: Vec<Vec<f64>>,

    #[serde(deserialize_with = "lenient::seq")]
    pub buff_uptimes: Vec<BuffUptime>,

    #[serde(deserialize_with = "lenient::seq")]
    pub self_buffs: Vec<BuffGeneration>,

    #[serde(deserialize_with = "lenient::seq")]
    pub group_buffs: Vec<BuffGeneration>,

    #[serde(deserialize_with = "lenient::seq")]
    pub squad_buffs: Vec<BuffGeneration>,

    #[serde(deserialize_with = "lenient::opt_struct")]
    pub ext_healing_stats: Option<HealingStats>,

    #[serde(deserialize_with = "lenient::opt_struct")]
    pub ext_barrier_stats: Option<BarrierStats>,

    #[serde(deserialize_with = "lenient::seq")]
    pub rotation: Vec<RotationEntry>,

    #[serde(deserialize_with = "lenient::seq")]
    pub minions: Vec<MinionEntry>,

    #[serde(deserialize_with = "lenient::one_or_many")]
    pub combat_replay_data: Vec<ReplaySegment>,
}

impl PlayerEntry {
    /// Aggregation key: account, or character name when the account is unknown.
    pub fn key(&self) -> String {
        match self.account.as_deref() {
            Some(account) if account != UNKNOWN => account.to_string(),
            _ => self.name.clone().unwrap_or_else(|| UNKNOWN.to_string()),
        }
    }

    /// Account, falling back to character name, for display keys.
    pub fn display_account(&self) -> String {
        self.account
            .clone()
            .or_else(|| self.name.clone())
            .unwrap_or_else(|| UNKNOWN.to_string())
    }

    pub fn profession_or_unknown(&self) -> &str {
        self.profession.as_deref().unwrap_or(UNKNOWN)
    }

    /// `account|profession`, the key used by per-player breakdowns.
    pub fn breakdown_key(&self) -> String {
        format!("{}|{}", self.display_account(), self.profession_or_unknown())
    }

    /// Active time in this fight, falling back to the fight duration.
    pub fn active_ms(&self, fight_duration_ms: f64) -> f64 {
        match self.active_times.first() {
            Some(&ms) if ms > 0.0 => ms,
            _ => fight_duration_ms,
        }
    }

    pub fn is_squad(&self) -> bool {
        !self.not_in_squad
    }
}

fn lenient_team<'de, D>(d: D) -> Result<Option<TeamValue>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(d)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_i64().map(TeamValue::Id),
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(TeamValue::Name(s)),
        _ => None,
    })
}

/// `dpsAll[0]` / `dpsTargets[t][0]`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DpsStats {
    #[serde(deserialize_with = "lenient::number")]
    pub damage: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub dps: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub power_damage: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub condi_damage: f64,
}

/// `statsAll[0]`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GeneralStats {
    /// Average distance to the commander; `"Infinity"` reads as absent.
    #[serde(deserialize_with = "lenient::opt_number")]
    pub dist_to_com: Option<f64>,
    #[serde(deserialize_with = "lenient::opt_number")]
    pub stack_dist: Option<f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub applied_crowd_control: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub applied_crowd_control_duration: f64,
    /// Times this player was rescued from downed state
    #[serde(deserialize_with = "lenient::number")]
    pub saved: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub connected_damage_count: f64,
}

/// `defenses[0]`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DefenseStats {
    #[serde(deserialize_with = "lenient::number")]
    pub damage_taken: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub damage_taken_count: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub condition_damage_taken: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub condition_damage_taken_count: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub power_damage_taken: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub power_damage_taken_count: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub downed_damage_taken: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub downed_damage_taken_count: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub damage_barrier: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub damage_barrier_count: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub blocked_count: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub evaded_count: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub missed_count: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub dodge_count: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub invulned_count: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub interrupted_count: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub down_count: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub dead_count: f64,
    /// Boons stripped from this player
    #[serde(deserialize_with = "lenient::number")]
    pub boon_strips: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub boon_strips_time: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub condition_cleanses: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub received_crowd_control: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub received_crowd_control_duration: f64,
}

/// `support[0]`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SupportStats {
    #[serde(deserialize_with = "lenient::number")]
    pub condi_cleanse: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub condi_cleanse_time: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub condi_cleanse_self: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub condi_cleanse_time_self: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub boon_strips: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub boon_strips_time: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub boon_strip_down_contribution: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub boon_strip_down_contribution_time: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub stun_break: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub removed_stun_duration: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub resurrects: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub resurrect_time: f64,
}

/// `statsTargets[t][0]`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TargetStats {
    #[serde(deserialize_with = "lenient::number")]
    pub direct_dmg: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub connected_damage_count: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub connected_direct_damage_count: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub critable_direct_damage_count: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub critical_rate: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub critical_dmg: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub flanking_rate: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub glance_rate: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub missed: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub evaded: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub blocked: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub interrupts: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub invulned: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub killed: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub downed: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub down_contribution: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub against_downed_damage: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub applied_crowd_control: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub applied_crowd_control_duration: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub applied_crowd_control_down_contribution: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub applied_crowd_control_duration_down_contribution: f64,
}

/// One skill row of a damage distribution (dealt or taken).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DamageEntry {
    #[serde(deserialize_with = "lenient::int")]
    pub id: i64,
    #[serde(deserialize_with = "lenient::number")]
    pub total_damage: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub connected_hits: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub hits: f64,
    #[serde(deserialize_with = "lenient::opt_number")]
    pub min: Option<f64>,
    #[serde(deserialize_with = "lenient::opt_number")]
    pub max: Option<f64>,
    #[serde(deserialize_with = "lenient::opt_number")]
    pub max_damage: Option<f64>,
    #[serde(deserialize_with = "lenient::opt_number")]
    pub max_hit: Option<f64>,
    #[serde(deserialize_with = "lenient::number")]
    pub down_contribution: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub blocked: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub evaded: f64,
    #[serde(alias = "glanced", deserialize_with = "lenient::number")]
    pub glance: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub missed: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub invulned: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub interrupted: f64,
}

impl DamageEntry {
    /// Largest recorded single hit. Never derived from damage ÷ hits.
    pub fn peak_hit(&self) -> f64 {
        [self.max, self.max_damage, self.max_hit]
            .into_iter()
            .flatten()
            .fold(0.0, f64::max)
    }

    /// Connected hits when recorded, else raw hits.
    pub fn effective_hits(&self) -> f64 {
        if self.connected_hits > 0.0 {
            self.connected_hits
        } else {
            self.hits
        }
    }
}

/// Phase-0 buff presence on a player, with optional state timelines.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BuffUptime {
    #[serde(deserialize_with = "lenient::int")]
    pub id: i64,
    #[serde(deserialize_with = "lenient::first")]
    pub buff_data: Option<UptimeData>,
    /// Summed `(time_ms, stacks)` state changes
    #[serde(deserialize_with = "lenient::pairs")]
    pub states: Vec<(f64, f64)>,
    /// `(time_ms, stacks)` state changes per source name
    #[serde(deserialize_with = "lenient::pairs_map")]
    pub states_per_source: HashMap<String, Vec<(f64, f64)>>,
}

impl BuffUptime {
    pub fn uptime(&self) -> f64 {
        self.buff_data.as_ref().map(|d| d.uptime).unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UptimeData {
    #[serde(deserialize_with = "lenient::number")]
    pub uptime: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub presence: f64,
}

/// Boon output toward one recipient category (self/group/squad).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BuffGeneration {
    #[serde(deserialize_with = "lenient::int")]
    pub id: i64,
    #[serde(deserialize_with = "lenient::first")]
    pub buff_data: Option<GenerationData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GenerationData {
    #[serde(deserialize_with = "lenient::number")]
    pub generation: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub wasted: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HealingStats {
    /// `[ally_index][phase]`
    #[serde(deserialize_with = "lenient::nested")]
    pub outgoing_healing_allies: Vec<Vec<HealingPhase>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HealingPhase {
    #[serde(deserialize_with = "lenient::number")]
    pub healing: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub downed_healing: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BarrierStats {
    /// `[ally_index][phase]`
    #[serde(deserialize_with = "lenient::nested")]
    pub outgoing_barrier_allies: Vec<Vec<BarrierPhase>>,
    #[serde(deserialize_with = "lenient::seq")]
    pub outgoing_barrier: Vec<BarrierPhase>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BarrierPhase {
    #[serde(deserialize_with = "lenient::number")]
    pub barrier: f64,
}

/// Casts of one skill.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RotationEntry {
    #[serde(deserialize_with = "lenient::int")]
    pub id: i64,
    #[serde(rename = "skills", deserialize_with = "lenient::count")]
    pub casts: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MinionEntry {
    #[serde(deserialize_with = "lenient::opt_string")]
    pub name: Option<String>,
    /// `[phase][entry]` damage taken by the minion
    #[serde(deserialize_with = "lenient::nested")]
    pub total_damage_taken_dist: Vec<Vec<DamageEntry>>,
}

/// One combat-replay segment: positions and life events.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReplaySegment {
    #[serde(deserialize_with = "lenient::opt_number")]
    pub start: Option<f64>,
    #[serde(deserialize_with = "lenient::pairs")]
    pub down: Vec<(f64, f64)>,
    #[serde(deserialize_with = "lenient::pairs")]
    pub dead: Vec<(f64, f64)>,
    #[serde(deserialize_with = "lenient::pairs")]
    pub positions: Vec<(f64, f64)>,
}

/// Enemy (or fake/structure) target in one fight.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TargetEntry {
    #[serde(deserialize_with = "lenient::opt_string")]
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub profession: Option<String>,
    #[serde(deserialize_with = "lenient::flag")]
    pub is_fake: bool,
    #[serde(rename = "teamID", alias = "teamId", deserialize_with = "lenient_team")]
    pub team: Option<TeamValue>,
    /// `[phase][entry]` damage dealt by the target
    #[serde(deserialize_with = "lenient::nested")]
    pub total_damage_dist: Vec<Vec<DamageEntry>>,
    /// `[phase][entry]` damage taken by the target
    #[serde(deserialize_with = "lenient::nested")]
    pub total_damage_taken: Vec<Vec<DamageEntry>>,
    /// `[phase][time]` cumulative damage dealt by the target
    #[serde(rename = "damage1S", deserialize_with = "lenient::numbers2")]
    pub damage_1s: Vec<Vec<f64>>,
    #[serde(deserialize_with = "lenient::seq")]
    pub buffs: Vec<BuffUptime>,
}

impl TargetEntry {
    /// Raw label used for profession resolution.
    pub fn raw_label(&self) -> Option<&str> {
        match self.profession.as_deref() {
            Some(p) if p != UNKNOWN => Some(p),
            _ => self.name.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_player_key_falls_back_to_name() {
        let p: PlayerEntry = serde_json::from_value(json!({
            "account": "Unknown",
            "name": "Char Name"
        }))
        .unwrap();
        assert_eq!(p.key(), "Char Name");

        let p: PlayerEntry = serde_json::from_value(json!({ "account": "acct.1234" })).unwrap();
        assert_eq!(p.key(), "acct.1234");
    }

    #[test]
    fn test_player_parses_first_phase_slices() {
        let p: PlayerEntry = serde_json::from_value(json!({
            "account": "a.1",
            "profession": "Firebrand",
            "activeTimes": [42000],
            "defenses": [{ "downCount": 2, "deadCount": "1" }],
            "statsTargets": [[{ "downContribution": 10 }], null, [{ "killed": 1 }]],
            "statsAll": [{ "distToCom": "Infinity", "stackDist": 120 }],
            "teamID": 705
        }))
        .unwrap();
        assert_eq!(p.active_ms(60000.0), 42000.0);
        let defenses = p.defenses.unwrap();
        assert_eq!(defenses.down_count, 2.0);
        assert_eq!(defenses.dead_count, 1.0);
        assert_eq!(p.stats_targets.len(), 3);
        assert_eq!(p.stats_targets[2].killed, 1.0);
        let stats = p.stats_all.unwrap();
        assert_eq!(stats.dist_to_com, None);
        assert_eq!(stats.stack_dist, Some(120.0));
        assert_eq!(p.team, Some(TeamValue::Id(705)));
    }

    #[test]
    fn test_peak_hit_ignores_average() {
        let entry: DamageEntry = serde_json::from_value(json!({
            "id": 1, "totalDamage": 494819, "connectedHits": 1
        }))
        .unwrap();
        assert_eq!(entry.peak_hit(), 0.0);

        let entry: DamageEntry = serde_json::from_value(json!({
            "id": 1, "totalDamage": 300, "connectedHits": 3, "maxDamage": 150, "max": 120
        }))
        .unwrap();
        assert_eq!(entry.peak_hit(), 150.0);
    }

    #[test]
    fn test_replay_data_object_or_array() {
        let p: PlayerEntry = serde_json::from_value(json!({
            "combatReplayData": { "start": 500, "down": [[3000, 4000]], "dead": [[4000, 9000]] }
        }))
        .unwrap();
        assert_eq!(p.combat_replay_data.len(), 1);
        assert_eq!(p.combat_replay_data[0].down, vec![(3000.0, 4000.0)]);

        let p: PlayerEntry = serde_json::from_value(json!({
            "combatReplayData": [{ "start": 0 }, { "start": 1000 }]
        }))
        .unwrap();
        assert_eq!(p.combat_replay_data.len(), 2);
    }
}
