//! Output shapes of the aggregation engine.
//!
//! Everything serializes as camelCase JSON and deserializes leniently
//! (`#[serde(default)]`), so a previously produced aggregate can be fed back
//! in as a precomputed passthrough.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::options::TopSkillsMetric;

/// Result of one aggregation call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AggregateResult {
    /// Fights carrying a non-empty roster
    pub valid_fight_count: usize,
    pub stats: StatsAggregate,
    pub skill_usage_data: SkillUsageSummary,
}

/// Cross-fight statistics for a collection of fights.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StatsAggregate {
    pub total: usize,
    pub wins: usize,
    pub losses: usize,
    pub avg_squad_size: f64,
    pub avg_enemies: f64,
    #[serde(rename = "squadKDR")]
    pub squad_kdr: String,
    #[serde(rename = "enemyKDR")]
    pub enemy_kdr: String,
    pub total_squad_kills: f64,
    pub total_squad_deaths: f64,
    pub total_enemy_kills: f64,
    pub total_enemy_deaths: f64,

    pub leaderboards: BTreeMap<String, Vec<LeaderboardRow>>,
    pub top_stats: TopStats,
    pub top_stats_per_second: TopStats,
    pub top_stats_leaderboards_per_second: BTreeMap<String, Vec<LeaderboardRow>>,

    pub mvp: MvpPlacement,
    pub silver: Option<MvpPlacement>,
    pub bronze: Option<MvpPlacement>,
    pub avg_mvp_score: f64,

    pub outgoing_condition_summary: Vec<ConditionSummary>,
    pub incoming_condition_summary: Vec<ConditionSummary>,
    pub outgoing_condition_players: Vec<ConditionPlayerRow>,
    pub incoming_condition_players: Vec<ConditionPlayerRow>,

    pub top_skills: Vec<SkillDamageRow>,
    pub top_incoming_skills: Vec<SkillDamageRow>,
    pub player_skill_breakdowns: Vec<PlayerSkillBreakdown>,
    pub top_skills_metric: TopSkillsMetric,

    pub map_data: Vec<ChartSlice>,
    pub timeline_data: Vec<TimelinePoint>,
    pub squad_class_data: Vec<ChartSlice>,
    pub enemy_class_data: Vec<ChartSlice>,

    pub boon_tables: Vec<BoonTable>,
    pub boon_timeline: Vec<BoonTimeline>,
    pub boon_uptime_timeline: Vec<BoonUptimeTimeline>,
    pub special_tables: Vec<SpecialBuffTable>,

    pub offense_players: Vec<OffensePlayerRow>,
    pub defense_players: Vec<DefensePlayerRow>,
    pub support_players: Vec<SupportPlayerRow>,
    pub healing_players: Vec<HealingPlayerRow>,

    pub damage_mitigation_players: Vec<MitigationRow>,
    pub damage_mitigation_minions: Vec<MitigationRow>,

    pub fight_breakdown: Vec<FightBreakdownRow>,
    pub fight_diff: Vec<FightDiffRow>,
    pub spike_damage: SpikeDamage,
    pub incoming_strike_damage: IncomingStrikeDamage,
    pub commander_stats: Vec<CommanderRow>,
    pub attendance: Vec<AttendanceRow>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LeaderboardRow {
    pub rank: usize,
    pub account: String,
    pub profession: String,
    pub profession_list: Vec<String>,
    pub value: f64,
    /// Fights joined
    pub count: usize,
}

/// Best entry of one leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TopStat {
    pub value: f64,
    pub player: String,
    pub count: usize,
    pub profession: String,
    pub profession_list: Vec<String>,
}

impl Default for TopStat {
    fn default() -> Self {
        Self {
            value: 0.0,
            player: "-".to_string(),
            count: 0,
            profession: "Unknown".to_string(),
            profession_list: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TopStats {
    pub max_down_contrib: TopStat,
    pub max_barrier: TopStat,
    pub max_healing: TopStat,
    pub max_dodges: TopStat,
    pub max_strips: TopStat,
    pub max_cleanses: TopStat,
    #[serde(rename = "maxCC")]
    pub max_cc: TopStat,
    pub max_stab: TopStat,
    pub closest_to_tag: TopStat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MvpPlacement {
    pub player: String,
    pub account: String,
    pub score: f64,
    pub profession: String,
    pub profession_list: Vec<String>,
    pub color: String,
    pub reason: String,
    pub top_stats: Vec<MvpContribution>,
}

impl Default for MvpPlacement {
    fn default() -> Self {
        Self {
            player: "None".to_string(),
            account: "None".to_string(),
            score: -1.0,
            profession: "Unknown".to_string(),
            profession_list: Vec::new(),
            color: "#64748b".to_string(),
            reason: String::new(),
            top_stats: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MvpContribution {
    pub name: String,
    pub ratio: f64,
    pub val: f64,
    pub rank: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConditionSummary {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub applications: f64,
    pub damage: f64,
    pub applications_from_buffs: f64,
    pub applications_from_uptime: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConditionSkill {
    pub name: String,
    pub hits: f64,
    pub damage: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

/// One condition in one player's ledger.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConditionLedgerEntry {
    pub applications: f64,
    pub damage: f64,
    pub skills: BTreeMap<String, ConditionSkill>,
    /// Stack-on transitions observed on targets
    pub applications_from_buffs: f64,
    /// Seconds of uptime folded from non-damaging conditions
    pub applications_from_uptime: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConditionPlayerRow {
    pub account: String,
    pub profession: String,
    pub profession_list: Vec<String>,
    pub conditions: BTreeMap<String, ConditionLedgerEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SkillDamageRow {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub damage: f64,
    pub hits: f64,
    pub down_contribution: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlayerSkillEntry {
    /// `s{id}`
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub damage: f64,
    pub down_contribution: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlayerSkillBreakdown {
    /// `account|profession`
    pub key: String,
    pub account: String,
    pub display_name: String,
    pub profession: String,
    pub profession_list: Vec<String>,
    pub total_fight_ms: f64,
    pub skills: Vec<PlayerSkillEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skill_map: Option<BTreeMap<String, PlayerSkillEntry>>,
}

/// Named count with a display colour (maps, class compositions).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartSlice {
    pub name: String,
    pub value: f64,
    pub color: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TimelinePoint {
    pub index: usize,
    pub label: String,
    pub timestamp: f64,
    pub squad_count: f64,
    pub friendly_count: f64,
    pub enemies: f64,
    pub is_win: Option<bool>,
}

/// Generation and waste toward one recipient category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BoonCategoryTotals {
    pub generation_ms: f64,
    pub wasted_ms: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BoonRow {
    pub account: String,
    pub profession: String,
    pub active_time_ms: f64,
    pub num_fights: usize,
    pub group_supported: f64,
    pub squad_supported: f64,
    #[serde(rename = "self")]
    pub self_totals: BoonCategoryTotals,
    #[serde(rename = "group")]
    pub group_totals: BoonCategoryTotals,
    #[serde(rename = "squad")]
    pub squad_totals: BoonCategoryTotals,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BoonTable {
    /// `b{id}`
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub stacking: bool,
    pub rows: Vec<BoonRow>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BoonTimeline {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub stacking: bool,
    pub players: Vec<BoonTimelinePlayer>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BoonTimelinePlayer {
    pub key: String,
    pub account: String,
    pub display_name: String,
    pub profession: String,
    pub profession_list: Vec<String>,
    pub logs: usize,
    pub self_ms: f64,
    pub group_ms: f64,
    pub squad_ms: f64,
    pub total_ms: f64,
    pub fights: Vec<BoonTimelineFight>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BoonTimelineFight {
    pub fight_id: String,
    pub index: usize,
    pub short_label: String,
    pub full_label: String,
    pub timestamp: f64,
    pub self_ms: f64,
    pub group_ms: f64,
    pub squad_ms: f64,
    pub total_ms: f64,
    #[serde(rename = "buckets5s")]
    pub buckets_5s: Vec<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BoonUptimeTimeline {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub stacking: bool,
    pub players: Vec<BoonUptimePlayer>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BoonUptimePlayer {
    pub key: String,
    pub account: String,
    pub display_name: String,
    pub profession: String,
    pub profession_list: Vec<String>,
    pub logs: usize,
    /// Mean of all sampled buckets across fights
    pub average_uptime: f64,
    pub fights: Vec<BoonUptimeFight>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BoonUptimeFight {
    pub fight_id: String,
    pub index: usize,
    pub short_label: String,
    pub full_label: String,
    pub timestamp: f64,
    pub average_uptime: f64,
    #[serde(rename = "buckets5s")]
    pub buckets_5s: Vec<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SpecialBuffRow {
    pub account: String,
    pub profession: String,
    pub profession_list: Vec<String>,
    /// Seconds
    pub total: f64,
    pub per_second: f64,
    /// Seconds of fight time observed
    pub duration: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SpecialBuffTable {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub rows: Vec<SpecialBuffRow>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OffensePlayerRow {
    pub account: String,
    pub profession: String,
    pub profession_list: Vec<String>,
    pub offense_totals: BTreeMap<String, f64>,
    pub offense_rate_weights: BTreeMap<String, f64>,
    pub total_fight_ms: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DefensePlayerRow {
    pub account: String,
    pub profession: String,
    pub profession_list: Vec<String>,
    pub defense_totals: BTreeMap<String, f64>,
    pub active_ms: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SupportPlayerRow {
    pub account: String,
    pub profession: String,
    pub profession_list: Vec<String>,
    pub support_totals: BTreeMap<String, f64>,
    pub active_ms: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HealingPlayerRow {
    pub account: String,
    pub profession: String,
    pub profession_list: Vec<String>,
    pub healing_totals: BTreeMap<String, f64>,
    pub active_ms: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MitigationTotals {
    pub total_hits: f64,
    pub blocked: f64,
    pub evaded: f64,
    pub glanced: f64,
    pub missed: f64,
    pub invulned: f64,
    pub interrupted: f64,
    pub total_mitigation: f64,
    pub min_mitigation: f64,
}

impl MitigationTotals {
    pub fn any_positive(&self) -> bool {
        [
            self.total_hits,
            self.blocked,
            self.evaded,
            self.glanced,
            self.missed,
            self.invulned,
            self.interrupted,
            self.total_mitigation,
            self.min_mitigation,
        ]
        .iter()
        .any(|v| *v > 0.0)
    }
}

/// Player (or player minion) mitigation estimate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MitigationRow {
    pub account: String,
    pub name: String,
    pub profession: String,
    pub profession_list: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minion: Option<String>,
    pub active_ms: f64,
    pub mitigation_totals: MitigationTotals,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamCounts {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
}

impl TeamCounts {
    pub fn total(&self) -> f64 {
        self.red + self.green + self.blue
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FightBreakdownRow {
    pub id: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permalink: Option<String>,
    pub timestamp: f64,
    pub map_name: String,
    pub duration: String,
    pub is_win: Option<bool>,
    pub squad_count: f64,
    pub ally_count: f64,
    pub enemy_count: f64,
    pub team_counts: TeamCounts,
    pub allies_down: f64,
    pub allies_dead: f64,
    pub allies_revived: f64,
    pub rallies: f64,
    pub enemy_deaths: f64,
    pub enemy_downs: f64,
    pub total_outgoing_damage: f64,
    pub total_incoming_damage: f64,
    pub incoming_barrier_absorbed: f64,
    pub outgoing_barrier_absorbed: f64,
    pub squad_class_counts_fight: BTreeMap<String, usize>,
    pub ally_class_counts_fight: BTreeMap<String, usize>,
    pub enemy_class_counts: BTreeMap<String, usize>,
    /// Highest enemy team buckets, largest first
    pub top_enemy_teams: Vec<TeamBucket>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamBucket {
    pub team: String,
    pub count: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetFocusSlice {
    pub label: String,
    pub damage: f64,
    pub hits: f64,
    pub share: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SquadMetric {
    pub metric_id: String,
    pub metric_label: String,
    pub higher_is_better: bool,
    pub value: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FightDiffRow {
    pub id: String,
    pub short_label: String,
    pub full_label: String,
    pub timestamp: f64,
    pub target_focus: Vec<TargetFocusSlice>,
    pub squad_metrics: Vec<SquadMetric>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SpikeSkillRow {
    pub id: i64,
    pub skill_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub damage: f64,
    pub hits: f64,
    pub peak_hit: f64,
    pub down_contribution: f64,
}

/// One player's (or one enemy profession's) burst profile in one fight.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SpikeValue {
    pub hit: f64,
    #[serde(rename = "burst1s")]
    pub burst_1s: f64,
    #[serde(rename = "burst5s")]
    pub burst_5s: f64,
    #[serde(rename = "burst30s")]
    pub burst_30s: f64,
    pub down_contribution_hit: f64,
    #[serde(rename = "downContributionBurst1s")]
    pub down_contribution_burst_1s: f64,
    #[serde(rename = "downContributionBurst5s")]
    pub down_contribution_burst_5s: f64,
    #[serde(rename = "downContributionBurst30s")]
    pub down_contribution_burst_30s: f64,
    pub skill_name: String,
    #[serde(rename = "buckets5s")]
    pub buckets_5s: Vec<f64>,
    #[serde(rename = "downIndices5s")]
    pub down_indices_5s: Vec<usize>,
    #[serde(rename = "deathIndices5s")]
    pub death_indices_5s: Vec<usize>,
    pub skill_rows: Vec<SpikeSkillRow>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SpikeFight {
    pub id: String,
    pub short_label: String,
    pub full_label: String,
    pub timestamp: f64,
    pub values: BTreeMap<String, SpikeValue>,
    pub max_hit: f64,
    #[serde(rename = "max1s")]
    pub max_1s: f64,
    #[serde(rename = "max5s")]
    pub max_5s: f64,
    #[serde(rename = "max30s")]
    pub max_30s: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SpikePlayer {
    /// `account|profession`
    pub key: String,
    pub account: String,
    pub display_name: String,
    pub character_name: String,
    pub profession: String,
    pub profession_list: Vec<String>,
    pub logs: usize,
    pub peak_hit: f64,
    #[serde(rename = "peak1s")]
    pub peak_1s: f64,
    #[serde(rename = "peak5s")]
    pub peak_5s: f64,
    #[serde(rename = "peak30s")]
    pub peak_30s: f64,
    pub peak_fight_label: String,
    pub peak_skill_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpikeDamage {
    pub fights: Vec<SpikeFight>,
    pub players: Vec<SpikePlayer>,
}

/// Incoming burst per enemy profession.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IncomingStrikeProfession {
    pub profession: String,
    pub color: String,
    pub logs: usize,
    pub peak_hit: f64,
    #[serde(rename = "peak1s")]
    pub peak_1s: f64,
    #[serde(rename = "peak5s")]
    pub peak_5s: f64,
    #[serde(rename = "peak30s")]
    pub peak_30s: f64,
    pub peak_fight_label: String,
    pub peak_skill_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IncomingStrikeDamage {
    /// Fight values are keyed by enemy profession
    pub fights: Vec<SpikeFight>,
    pub professions: Vec<IncomingStrikeProfession>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DamageBySkill {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub damage: f64,
    pub hits: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CommanderFight {
    pub id: String,
    pub short_label: String,
    pub full_label: String,
    pub timestamp: f64,
    pub duration_ms: f64,
    /// `m:ss` label
    pub duration: String,
    pub map_name: String,
    pub is_win: bool,
    pub squad_count: usize,
    pub enemy_count: usize,
    pub kills: f64,
    pub downs: f64,
    pub commander_downs: f64,
    pub commander_deaths: f64,
    pub allies_down: f64,
    pub allies_dead: f64,
    pub damage_taken: f64,
    pub damage_taken_per_minute: f64,
    pub incoming_barrier_absorbed: f64,
    pub incoming_barrier_absorbed_per_minute: f64,
    pub incoming_strips: f64,
    pub incoming_strips_per_minute: f64,
    #[serde(rename = "incomingCC")]
    pub incoming_cc: f64,
    #[serde(rename = "incomingCCPerMinute")]
    pub incoming_cc_per_minute: f64,
    pub boon_uptime_pct: f64,
    /// Boons present on the commander this fight
    pub boon_entries: usize,
    pub incoming_damage_by_skill: Vec<DamageBySkill>,
    pub incoming_boon_uptimes: Vec<CommanderBoonUptime>,
    #[serde(rename = "incomingDamageBuckets5s")]
    pub incoming_damage_buckets_5s: Vec<f64>,
    #[serde(rename = "incomingBoonBuckets5s")]
    pub incoming_boon_buckets_5s: Vec<f64>,
    #[serde(rename = "downIndices5s")]
    pub down_indices_5s: Vec<usize>,
    #[serde(rename = "deathIndices5s")]
    pub death_indices_5s: Vec<usize>,
}

/// One boon's presence on the commander.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CommanderBoonUptime {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub stacking: bool,
    pub uptime_pct: f64,
    pub uptime_ms: f64,
    #[serde(rename = "buckets5s")]
    pub buckets_5s: Vec<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CommanderRow {
    pub key: String,
    pub account: String,
    pub character_names: Vec<String>,
    pub profession: String,
    pub profession_list: Vec<String>,
    pub fights: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate_pct: f64,
    pub total_duration_ms: f64,
    pub avg_squad_size: f64,
    pub avg_enemy_size: f64,
    pub kills: f64,
    pub downs: f64,
    pub commander_downs: f64,
    pub commander_deaths: f64,
    pub allies_down: f64,
    pub allies_dead: f64,
    /// Kills per commander death, deaths floored at one
    pub kdr: f64,
    pub damage_taken: f64,
    pub damage_taken_per_minute: f64,
    pub incoming_barrier_absorbed: f64,
    pub incoming_barrier_absorbed_per_minute: f64,
    pub incoming_strips: f64,
    pub incoming_strips_per_minute: f64,
    #[serde(rename = "incomingCC")]
    pub incoming_cc: f64,
    #[serde(rename = "incomingCCPerMinute")]
    pub incoming_cc_per_minute: f64,
    /// Duration-weighted across fights with boon data
    pub boon_uptime_pct: f64,
    pub boon_entries: usize,
    pub incoming_skill_breakdown: Vec<DamageBySkill>,
    pub incoming_boon_breakdown: Vec<CommanderBoonUptime>,
    pub fights_data: Vec<CommanderFight>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AttendanceRow {
    pub account: String,
    pub character_names: Vec<String>,
    pub profession: String,
    pub profession_list: Vec<String>,
    pub profession_time_ms: BTreeMap<String, f64>,
    pub combat_time_ms: f64,
    pub squad_time_ms: f64,
    pub fights: usize,
    pub first_seen: f64,
    pub last_seen: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SkillUsageEntry {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub players: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SkillUsageLogRecord {
    pub id: String,
    pub label: String,
    pub timestamp: f64,
    pub skill_entries: BTreeMap<String, SkillUsageEntry>,
    pub player_active_seconds: BTreeMap<String, f64>,
    pub duration_seconds: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SkillUsagePlayer {
    pub key: String,
    pub account: String,
    pub display_name: String,
    pub profession: String,
    pub profession_list: Vec<String>,
    pub logs: usize,
    pub total_active_seconds: f64,
    pub skill_totals: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SkillOption {
    pub id: String,
    pub name: String,
    pub total: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResUtilitySkill {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SkillUsageSummary {
    pub log_records: Vec<SkillUsageLogRecord>,
    pub players: Vec<SkillUsagePlayer>,
    pub skill_options: Vec<SkillOption>,
    pub res_utility_skills: Vec<ResUtilitySkill>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_aggregate_field_names() {
        let stats = StatsAggregate {
            squad_kdr: "2.00".to_string(),
            ..Default::default()
        };
        let value = serde_json::to_value(&stats).unwrap();
        assert_eq!(value["squadKDR"], json!("2.00"));
        assert!(value.get("topStatsPerSecond").is_some());
        assert_eq!(value["mvp"]["player"], json!("None"));
        assert_eq!(value["topStats"]["maxCC"]["player"], json!("-"));
    }

    #[test]
    fn test_partial_aggregate_deserializes() {
        let stats: StatsAggregate = serde_json::from_value(json!({
            "total": 4,
            "fightBreakdown": [{ "id": "log-1", "timestamp": 0 }]
        }))
        .unwrap();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.fight_breakdown.len(), 1);
        assert_eq!(stats.fight_breakdown[0].id, "log-1");
        assert_eq!(stats.mvp.score, -1.0);
    }

    #[test]
    fn test_boon_row_category_names() {
        let row = BoonRow {
            account: "a.1".to_string(),
            ..Default::default()
        };
        let value = serde_json::to_value(&row).unwrap();
        assert!(value.get("self").is_some());
        assert!(value.get("group").is_some());
        assert!(value.get("squad").is_some());
    }

    #[test]
    fn test_mitigation_totals_any_positive() {
        let mut totals = MitigationTotals::default();
        assert!(!totals.any_positive());
        totals.glanced = 1.0;
        assert!(totals.any_positive());
    }
}
