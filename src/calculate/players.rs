//! Cross-fight player accumulator.
//!
//! Every squad member of every valid fight folds into one
//! [`PlayerAggregate`] keyed by account (character name when the account is
//! unknown). The leaderboard, MVP and player-table passes only read the
//! finished [`PlayerTable`].

use std::collections::BTreeMap;

use super::boons::{self, BoonCategory};
use super::conditions::{self, ConditionLedger, ConditionTotals};
use super::fights::FightView;
use crate::models::{
    AggregateOptions, DefenseStats, DefensePlayerRow, DisruptionMethod, DisruptionTiers,
    FightDetails, HealingPlayerRow, OffensePlayerRow, PlayerEntry, SpecialBuffRow,
    SpecialBuffTable, SupportPlayerRow, SupportStats, TargetStats, UNKNOWN,
};

/// Distance samples beyond this are players running back, not stacking.
pub const RUN_BACK_RANGE: f64 = 5000.0;

/// Support time fields above this are parser garbage.
const SUPPORT_TIME_SANITY_MS: f64 = 999_999.0;

const RES_UTILITY_IDS: &[i64] = &[10244];

const RES_UTILITY_NAMES: &[&str] = &[
    "battle standard",
    "glyph of renewal",
    "glyph of the stars",
    "illusion of life",
    "spirit of nature",
    "nature spirit",
    "search and rescue",
    "signet of mercy",
];

pub fn is_res_utility_skill(id: i64, details: &FightDetails) -> bool {
    if RES_UTILITY_IDS.contains(&id) {
        return true;
    }
    let name = details.skill_name(id).unwrap_or_default().to_lowercase();
    RES_UTILITY_NAMES.iter().any(|m| name.contains(m))
}

/// Score one disruption stat (CC, strips, cleanses) under `method`.
pub fn disruption_value(
    count: f64,
    duration_ms: f64,
    method: DisruptionMethod,
    tiers: &DisruptionTiers,
) -> f64 {
    match method {
        DisruptionMethod::Count => count,
        DisruptionMethod::Duration => duration_ms / 1000.0,
        DisruptionMethod::Tiered => {
            if count == 0.0 {
                return 0.0;
            }
            let average = duration_ms / count.max(1.0);
            if average <= tiers.short_ms {
                count * tiers.short_weight
            } else if average <= tiers.medium_ms {
                count * tiers.medium_weight
            } else {
                count * tiers.long_weight
            }
        }
    }
}

/// Profession with the most accumulated time; the first listed wins ties.
pub fn primary_profession(
    list: &[String],
    times: &BTreeMap<String, f64>,
    fallback: &str,
) -> String {
    let mut iter = list.iter();
    let Some(first) = iter.next() else {
        return fallback.to_string();
    };
    let mut primary = first;
    let mut best = times.get(first).copied().unwrap_or(0.0);
    for prof in iter {
        let t = times.get(prof).copied().unwrap_or(0.0);
        if t > best {
            best = t;
            primary = prof;
        }
    }
    primary.clone()
}

/// Running totals for one account across every fight it joined.
#[derive(Debug, Clone, Default)]
pub struct PlayerAggregate {
    pub account: String,
    pub name: String,
    /// Last seen profession
    pub profession: String,
    /// Known professions in first-seen order
    pub professions: Vec<String>,
    pub profession_time_ms: BTreeMap<String, f64>,
    pub is_commander: bool,
    pub logs_joined: usize,

    pub down_contrib: f64,
    pub cleanses: f64,
    pub strips: f64,
    pub stab: f64,
    pub healing: f64,
    pub barrier: f64,
    pub cc: f64,
    pub total_dist: f64,
    pub dist_count: usize,
    pub dodges: f64,
    pub downs: f64,
    pub deaths: f64,
    pub damage: f64,
    pub dps: f64,
    pub revives: f64,

    pub total_fight_ms: f64,
    pub active_ms: f64,

    pub offense_totals: BTreeMap<String, f64>,
    pub offense_rate_weights: BTreeMap<String, f64>,
    pub defense_totals: BTreeMap<String, f64>,
    pub support_totals: BTreeMap<String, f64>,
    pub healing_totals: BTreeMap<String, f64>,

    pub outgoing_conditions: ConditionLedger,
    pub incoming_conditions: ConditionLedger,
}

impl PlayerAggregate {
    fn new(key: String, player: &PlayerEntry) -> Self {
        Self {
            account: key,
            name: player.name.clone().unwrap_or_else(|| UNKNOWN.to_string()),
            profession: player.profession_or_unknown().to_string(),
            ..Default::default()
        }
    }

    pub fn primary_profession(&self) -> String {
        primary_profession(&self.professions, &self.profession_time_ms, &self.profession)
    }

    pub fn profession_list(&self) -> Vec<String> {
        self.professions.clone()
    }

    /// Mean distance to the commander; commanders and players without
    /// samples read as infinitely far.
    pub fn closest_to_tag(&self) -> f64 {
        if !self.is_commander && self.dist_count > 0 {
            self.total_dist / self.dist_count as f64
        } else {
            f64::INFINITY
        }
    }

    /// Active seconds for per-second normalisation, never below one.
    pub fn active_seconds(&self) -> f64 {
        (self.active_ms / 1000.0).max(1.0)
    }
}

/// Keyed player aggregates with explicit insert-if-absent.
#[derive(Debug, Default)]
pub struct PlayerTable {
    entries: BTreeMap<String, PlayerAggregate>,
}

impl PlayerTable {
    pub fn get_or_insert(&mut self, player: &PlayerEntry) -> &mut PlayerAggregate {
        let key = player.key();
        self.entries
            .entry(key.clone())
            .or_insert_with(|| PlayerAggregate::new(key, player))
    }

    pub fn get(&self, key: &str) -> Option<&PlayerAggregate> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut PlayerAggregate> {
        self.entries.get_mut(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlayerAggregate> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
struct SpecialBuffAccount {
    profession: String,
    professions: Vec<String>,
    profession_time_ms: BTreeMap<String, f64>,
    total_ms: f64,
    duration_ms: f64,
}

#[derive(Debug, Clone, Default)]
struct SpecialBuffMeta {
    name: Option<String>,
    icon: Option<String>,
}

/// Non-boon buff uptime per account.
#[derive(Debug, Default)]
pub struct SpecialBuffs {
    meta: BTreeMap<String, SpecialBuffMeta>,
    accounts: BTreeMap<String, BTreeMap<String, SpecialBuffAccount>>,
}

impl SpecialBuffs {
    fn add(&mut self, buff_id: &str, meta: SpecialBuffMeta, account: &str, profession: Option<&str>, total_ms: f64, active_ms: f64) {
        self.meta.entry(buff_id.to_string()).or_insert(meta);
        let entry = self
            .accounts
            .entry(buff_id.to_string())
            .or_default()
            .entry(account.to_string())
            .or_insert_with(|| SpecialBuffAccount {
                profession: profession.unwrap_or(UNKNOWN).to_string(),
                ..Default::default()
            });
        if let Some(prof) = profession.filter(|p| *p != UNKNOWN) {
            if !entry.professions.iter().any(|p| p == prof) {
                entry.professions.push(prof.to_string());
            }
            *entry.profession_time_ms.entry(prof.to_string()).or_default() += active_ms;
            entry.profession = prof.to_string();
        }
        entry.total_ms += total_ms;
        entry.duration_ms += active_ms;
    }

    pub fn tables(&self) -> Vec<SpecialBuffTable> {
        self.accounts
            .iter()
            .filter_map(|(buff_id, accounts)| {
                let rows: Vec<SpecialBuffRow> = accounts
                    .iter()
                    .map(|(account, entry)| SpecialBuffRow {
                        account: account.clone(),
                        profession: primary_profession(&entry.professions, &entry.profession_time_ms, &entry.profession),
                        profession_list: entry.professions.clone(),
                        total: entry.total_ms / 1000.0,
                        per_second: if entry.duration_ms > 0.0 {
                            entry.total_ms / entry.duration_ms
                        } else {
                            0.0
                        },
                        duration: entry.duration_ms / 1000.0,
                    })
                    .filter(|row| row.total > 0.0 || row.per_second > 0.0)
                    .collect();
                if rows.is_empty() {
                    return None;
                }
                let meta = self.meta.get(buff_id).cloned().unwrap_or_default();
                Some(SpecialBuffTable {
                    id: buff_id.clone(),
                    name: meta.name.unwrap_or_else(|| buff_id.clone()),
                    icon: meta.icon,
                    rows,
                })
            })
            .collect()
    }
}

/// Commander position track used for replay-derived distances.
struct TagTrack<'a> {
    positions: &'a [(f64, f64)],
    /// Earliest commander death, when it happened inside the fight
    dead_at: Option<f64>,
}

impl<'a> TagTrack<'a> {
    fn find(fight: &FightView<'a>) -> Option<TagTrack<'a>> {
        let commander = fight
            .details
            .squad_players()
            .find(|p| p.has_commander_tag)?;
        let segment = commander.combat_replay_data.first()?;
        let dead_at = segment
            .dead
            .iter()
            .map(|(t, _)| *t)
            .filter(|t| *t > 0.0)
            .fold(None, |acc: Option<f64>, t| Some(acc.map_or(t, |a| a.min(t))));
        Some(TagTrack {
            positions: &segment.positions,
            dead_at,
        })
    }
}

fn positive_or_one(v: f64) -> f64 {
    if v > 0.0 && v.is_finite() {
        v
    } else {
        1.0
    }
}

/// Mean replay distance to the commander, cut at the player's last death
/// (or the commander's, when the tag fell first).
fn replay_distance(player: &PlayerEntry, tag: &TagTrack<'_>, details: &FightDetails) -> f64 {
    let Some(segment) = player.combat_replay_data.first() else {
        return 0.0;
    };
    if segment.positions.is_empty() || tag.positions.is_empty() {
        return 0.0;
    }
    let meta = details.combat_replay_meta_data.clone().unwrap_or_default();
    let inch_to_pixel = positive_or_one(meta.inch_to_pixel);
    let polling_rate = positive_or_one(meta.polling_rate);
    let offset = (segment.start.unwrap_or(0.0) / polling_rate).floor();

    let full = segment.positions.len().min(tag.positions.len()) as f64;
    // Every death closed by a matching down yields a cut; the last usable one wins.
    let cuts: Vec<f64> = segment
        .dead
        .iter()
        .map(|(t, _)| *t)
        .filter(|death| *death >= 0.0)
        .flat_map(move |death| {
            segment
                .down
                .iter()
                .filter(move |(_, end)| *end == death)
                .map(move |(down_start, _)| {
                    let mark = match tag.dead_at {
                        Some(tag_dead) if *down_start > tag_dead => {
                            (tag_dead / polling_rate).floor().max(1.0)
                        }
                        _ => (death / polling_rate).floor().max(0.0) - offset,
                    };
                    mark.min(full).max(0.0)
                })
        })
        .collect();
    let limit = if cuts.is_empty() {
        full
    } else {
        cuts.iter().rev().copied().find(|c| *c >= 1.0).unwrap_or(0.0)
    };
    let limit = limit as usize;
    if limit == 0 {
        return 0.0;
    }
    let sum: f64 = segment.positions[..limit]
        .iter()
        .zip(&tag.positions[..limit])
        .map(|((px, py), (tx, ty))| (px - tx).hypot(py - ty))
        .sum();
    (sum / limit as f64 / inch_to_pixel).round()
}

fn distance_to_tag(player: &PlayerEntry, tag: Option<&TagTrack<'_>>, details: &FightDetails) -> f64 {
    if let Some(stats) = &player.stats_all {
        if let Some(d) = stats.dist_to_com.filter(|d| d.is_finite()) {
            return d.round();
        }
        if let Some(d) = stats.stack_dist.filter(|d| d.is_finite()) {
            return d.round();
        }
    }
    if player.has_commander_tag {
        return 0.0;
    }
    tag.map(|t| replay_distance(player, t, details)).unwrap_or(0.0)
}

fn cleanses(support: Option<&SupportStats>, options: &AggregateOptions) -> f64 {
    let Some(s) = support else {
        return 0.0;
    };
    disruption_value(
        s.condi_cleanse + s.condi_cleanse_self,
        s.condi_cleanse_time + s.condi_cleanse_time_self,
        options.view.disruption_method,
        &options.tiers,
    )
}

fn strips(support: Option<&SupportStats>, options: &AggregateOptions) -> f64 {
    let Some(s) = support else {
        return 0.0;
    };
    disruption_value(s.boon_strips, s.boon_strips_time, options.view.disruption_method, &options.tiers)
}

fn outgoing_cc(player: &PlayerEntry, options: &AggregateOptions) -> f64 {
    let Some(s) = &player.stats_all else {
        return 0.0;
    };
    disruption_value(
        s.applied_crowd_control,
        s.applied_crowd_control_duration,
        options.view.disruption_method,
        &options.tiers,
    )
}

fn squad_healing(player: &PlayerEntry) -> f64 {
    player
        .ext_healing_stats
        .iter()
        .flat_map(|h| h.outgoing_healing_allies.iter().flatten())
        .map(|phase| phase.healing)
        .sum()
}

fn squad_barrier(player: &PlayerEntry) -> f64 {
    player
        .ext_barrier_stats
        .iter()
        .flat_map(|b| b.outgoing_barrier_allies.iter().flatten())
        .map(|phase| phase.barrier)
        .sum()
}

/// Stability generated for the player's own squad, in seconds.
pub fn stability_seconds(player: &PlayerEntry, fight: &FightView<'_>) -> f64 {
    let own = boons::player_generation_ms(player, BoonCategory::SelfBuffs, boons::STABILITY_ID, fight);
    let squad = boons::player_generation_ms(player, BoonCategory::SquadBuffs, boons::STABILITY_ID, fight);
    (own.generation_ms + squad.generation_ms) / 1000.0
}

fn add(map: &mut BTreeMap<String, f64>, key: &str, value: f64) {
    if value.is_finite() {
        *map.entry(key.to_string()).or_default() += value;
    }
}

fn target_metric_values(t: &TargetStats) -> [(&'static str, f64); 19] {
    [
        ("directDmg", t.direct_dmg),
        ("connectedDamageCount", t.connected_damage_count),
        ("connectedDirectDamageCount", t.connected_direct_damage_count),
        ("criticalRate", t.critical_rate),
        ("criticalDmg", t.critical_dmg),
        ("flankingRate", t.flanking_rate),
        ("glanceRate", t.glance_rate),
        ("missed", t.missed),
        ("evaded", t.evaded),
        ("blocked", t.blocked),
        ("interrupts", t.interrupts),
        ("invulned", t.invulned),
        ("killed", t.killed),
        ("downed", t.downed),
        ("downContribution", t.down_contribution),
        ("againstDownedDamage", t.against_downed_damage),
        ("appliedCrowdControl", t.applied_crowd_control),
        ("appliedCrowdControlDuration", t.applied_crowd_control_duration),
        ("appliedCrowdControlDownContribution", t.applied_crowd_control_down_contribution),
    ]
}

/// Weight for rate metrics, which are averaged rather than summed.
fn rate_denominator(metric: &str, t: &TargetStats) -> Option<f64> {
    match metric {
        "criticalRate" => Some(t.critable_direct_damage_count),
        "flankingRate" | "glanceRate" => Some(t.connected_direct_damage_count),
        _ => None,
    }
}

fn defense_metric_values(d: &DefenseStats) -> [(&'static str, f64); 21] {
    [
        ("damageTaken", d.damage_taken),
        ("damageTakenCount", d.damage_taken_count),
        ("conditionDamageTaken", d.condition_damage_taken),
        ("conditionDamageTakenCount", d.condition_damage_taken_count),
        ("powerDamageTaken", d.power_damage_taken),
        ("powerDamageTakenCount", d.power_damage_taken_count),
        ("downedDamageTaken", d.downed_damage_taken),
        ("downedDamageTakenCount", d.downed_damage_taken_count),
        ("damageBarrier", d.damage_barrier),
        ("damageBarrierCount", d.damage_barrier_count),
        ("blockedCount", d.blocked_count),
        ("evadedCount", d.evaded_count),
        ("missedCount", d.missed_count),
        ("dodgeCount", d.dodge_count),
        ("invulnedCount", d.invulned_count),
        ("interruptedCount", d.interrupted_count),
        ("downCount", d.down_count),
        ("deadCount", d.dead_count),
        ("boonStrips", d.boon_strips),
        ("conditionCleanses", d.condition_cleanses),
        ("receivedCrowdControl", d.received_crowd_control),
    ]
}

/// `(id, value, is_time)`
fn support_metric_values(s: &SupportStats) -> [(&'static str, f64, bool); 12] {
    [
        ("condiCleanse", s.condi_cleanse, false),
        ("condiCleanseTime", s.condi_cleanse_time, true),
        ("condiCleanseSelf", s.condi_cleanse_self, false),
        ("condiCleanseTimeSelf", s.condi_cleanse_time_self, true),
        ("boonStrips", s.boon_strips, false),
        ("boonStripsTime", s.boon_strips_time, true),
        ("boonStripDownContribution", s.boon_strip_down_contribution, false),
        ("boonStripDownContributionTime", s.boon_strip_down_contribution_time, true),
        ("stunBreak", s.stun_break, false),
        ("removedStunDuration", s.removed_stun_duration, true),
        ("resurrects", s.resurrects, false),
        ("resurrectTime", s.resurrect_time, true),
    ]
}

fn capitalized(base: &str) -> String {
    let mut chars = base.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Healing/barrier split by recipient relative to the acting player.
fn add_healing_split(
    totals: &mut BTreeMap<String, f64>,
    details: &FightDetails,
    player_index: usize,
    player: &PlayerEntry,
    base: &str,
    ally_index: usize,
    value: f64,
) {
    if !value.is_finite() || value <= 0.0 {
        return;
    }
    let ally = details.players.get(ally_index);
    let off_squad = ally.is_some_and(|a| a.not_in_squad);
    let in_squad = !off_squad;
    let same_group = in_squad
        && ally
            .and_then(|a| a.group)
            .is_some_and(|g| Some(g) == player.group);
    let suffix = capitalized(base);

    add(totals, base, value);
    if in_squad {
        add(totals, &format!("squad{suffix}"), value);
    }
    if same_group {
        add(totals, &format!("group{suffix}"), value);
    }
    if ally_index == player_index {
        add(totals, &format!("self{suffix}"), value);
    }
    if off_squad {
        add(totals, &format!("offSquad{suffix}"), value);
    }
}

fn accumulate_healing(stats: &mut PlayerAggregate, details: &FightDetails, player_index: usize, player: &PlayerEntry) {
    let mut res_casts = 0usize;
    for rot in &player.rotation {
        if rot.id == 0 || rot.casts == 0 || !is_res_utility_skill(rot.id, details) {
            continue;
        }
        res_casts += rot.casts;
        add(&mut stats.healing_totals, &format!("resUtility_s{}", rot.id), rot.casts as f64);
    }
    if res_casts > 0 {
        add(&mut stats.healing_totals, "resUtility", res_casts as f64);
    }

    if let Some(healing) = &player.ext_healing_stats {
        for (ally_index, phases) in healing.outgoing_healing_allies.iter().enumerate() {
            let heal: f64 = phases.iter().map(|p| p.healing).sum();
            let downed: f64 = phases.iter().map(|p| p.downed_healing).sum();
            add_healing_split(&mut stats.healing_totals, details, player_index, player, "healing", ally_index, heal);
            add_healing_split(&mut stats.healing_totals, details, player_index, player, "downedHealing", ally_index, downed);
        }
    }
    if let Some(barrier) = &player.ext_barrier_stats {
        for (ally_index, phases) in barrier.outgoing_barrier_allies.iter().enumerate() {
            let value: f64 = phases.iter().map(|p| p.barrier).sum();
            add_healing_split(&mut stats.healing_totals, details, player_index, player, "barrier", ally_index, value);
        }
    }
}

fn accumulate_offense(stats: &mut PlayerAggregate, details: &FightDetails, player: &PlayerEntry) {
    if let Some(dps) = &player.dps_all {
        add(&mut stats.offense_totals, "damage", dps.damage);
    }
    for t in &player.stats_targets {
        for (id, value) in target_metric_values(t) {
            add(&mut stats.offense_totals, id, value);
            if let Some(denom) = rate_denominator(id, t).filter(|d| *d > 0.0) {
                add(&mut stats.offense_rate_weights, id, denom);
            }
        }
    }
    let battle_standard = details
        .skill_map
        .iter()
        .find(|(_, meta)| meta.name.as_deref() == Some("Battle Standard"))
        .and_then(|(key, _)| key.trim_start_matches('s').parse::<i64>().ok());
    if let Some(id) = battle_standard {
        let hits: f64 = player
            .target_damage_dist
            .iter()
            .filter_map(|phases| phases.first())
            .flatten()
            .filter(|e| e.id == id)
            .map(|e| e.connected_hits)
            .sum();
        add(&mut stats.offense_totals, "battleStandardHits", hits);
    }
}

fn accumulate_special_buffs(
    stats: &mut PlayerAggregate,
    fight: &FightView<'_>,
    player: &PlayerEntry,
    active_ms: f64,
    specials: &mut SpecialBuffs,
    conditions_totals: &mut ConditionTotals,
) {
    let details = fight.details;
    for buff in &player.buff_uptimes {
        let Some(meta) = details.buff(buff.id) else {
            continue;
        };
        if meta.is_boon() {
            continue;
        }
        let uptime = buff.uptime();
        if !uptime.is_finite() || uptime <= 0.0 {
            continue;
        }
        let factor = if meta.stacking { uptime } else { uptime / 100.0 };
        let total_ms = factor * active_ms;
        if !total_ms.is_finite() || total_ms <= 0.0 {
            continue;
        }

        if let Some(condition) = conditions::condition_name(meta.name.as_deref()) {
            let classified_ok = meta.classification.is_none() || meta.is_condition();
            if conditions::is_non_damaging(condition) && classified_ok {
                conditions::fold_uptime(
                    conditions_totals,
                    &mut stats.outgoing_conditions,
                    &mut stats.incoming_conditions,
                    condition,
                    meta.icon.as_deref(),
                    total_ms / 1000.0,
                );
            }
        }

        let profession = player
            .profession
            .as_deref()
            .or(Some(stats.profession.as_str()));
        specials.add(
            &format!("b{}", buff.id),
            SpecialBuffMeta {
                name: meta.name.clone(),
                icon: meta.icon.clone(),
            },
            &stats.account,
            profession,
            total_ms,
            active_ms,
        );
    }
}

/// Fold every squad member of one fight into the table.
pub fn accumulate_fight(
    fight: &FightView<'_>,
    options: &AggregateOptions,
    table: &mut PlayerTable,
    specials: &mut SpecialBuffs,
    conditions_totals: &mut ConditionTotals,
) {
    let details = fight.details;
    let tag = TagTrack::find(fight);

    for (player_index, player) in details.players.iter().enumerate() {
        if player.not_in_squad {
            continue;
        }
        let active_ms = player.active_ms(fight.duration_ms);
        let stability = stability_seconds(player, fight);
        let dist = distance_to_tag(player, tag.as_ref(), details);

        let stats = table.get_or_insert(player);
        if player.has_commander_tag {
            stats.is_commander = true;
        }
        if let Some(prof) = player.profession.as_deref().filter(|p| *p != UNKNOWN) {
            stats.profession = prof.to_string();
            if !stats.professions.iter().any(|p| p == prof) {
                stats.professions.push(prof.to_string());
            }
            *stats.profession_time_ms.entry(prof.to_string()).or_default() += active_ms;
        }

        stats.logs_joined += 1;
        stats.down_contrib += player.stats_targets.iter().map(|t| t.down_contribution).sum::<f64>();
        stats.cleanses += cleanses(player.support.as_ref(), options);
        stats.strips += strips(player.support.as_ref(), options);
        stats.healing += squad_healing(player);
        stats.barrier += squad_barrier(player);
        stats.cc += outgoing_cc(player, options);
        stats.stab += stability;

        if dist <= RUN_BACK_RANGE {
            stats.total_dist += dist;
            stats.dist_count += 1;
        }
        if let Some(d) = &player.defenses {
            stats.dodges += d.dodge_count;
            stats.downs += d.down_count;
            stats.deaths += d.dead_count;
            for (id, value) in defense_metric_values(d) {
                add(&mut stats.defense_totals, id, value);
            }
        }
        stats.total_fight_ms += fight.duration_ms;
        stats.active_ms += active_ms;

        if let Some(s) = &player.support {
            for (id, value, is_time) in support_metric_values(s) {
                let value = if is_time && value > SUPPORT_TIME_SANITY_MS { 0.0 } else { value };
                add(&mut stats.support_totals, id, value);
            }
            stats.revives += s.resurrects;
        }
        if let Some(dps) = &player.dps_all {
            stats.damage += dps.damage;
            stats.dps += dps.dps;
        }

        accumulate_healing(stats, details, player_index, player);
        accumulate_offense(stats, details, player);
        accumulate_special_buffs(stats, fight, player, active_ms, specials, conditions_totals);
    }
}

pub fn offense_rows(table: &PlayerTable) -> Vec<OffensePlayerRow> {
    table
        .iter()
        .map(|s| OffensePlayerRow {
            account: s.account.clone(),
            profession: s.primary_profession(),
            profession_list: s.profession_list(),
            offense_totals: s.offense_totals.clone(),
            offense_rate_weights: s.offense_rate_weights.clone(),
            total_fight_ms: s.total_fight_ms,
        })
        .collect()
}

pub fn defense_rows(table: &PlayerTable) -> Vec<DefensePlayerRow> {
    table
        .iter()
        .map(|s| DefensePlayerRow {
            account: s.account.clone(),
            profession: s.primary_profession(),
            profession_list: s.profession_list(),
            defense_totals: s.defense_totals.clone(),
            active_ms: s.active_ms,
        })
        .collect()
}

pub fn support_rows(table: &PlayerTable) -> Vec<SupportPlayerRow> {
    table
        .iter()
        .map(|s| SupportPlayerRow {
            account: s.account.clone(),
            profession: s.primary_profession(),
            profession_list: s.profession_list(),
            support_totals: s.support_totals.clone(),
            active_ms: s.active_ms,
        })
        .collect()
}

pub fn healing_rows(table: &PlayerTable) -> Vec<HealingPlayerRow> {
    table
        .iter()
        .map(|s| HealingPlayerRow {
            account: s.account.clone(),
            profession: s.primary_profession(),
            profession_list: s.profession_list(),
            healing_totals: s.healing_totals.clone(),
            active_ms: s.active_ms,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculate::fights::prepare_fights;
    use crate::models::FightRecord;
    use serde_json::json;

    fn run(records: &[FightRecord], options: &AggregateOptions) -> (PlayerTable, SpecialBuffs, ConditionTotals) {
        let fights = prepare_fights(records);
        let mut table = PlayerTable::default();
        let mut specials = SpecialBuffs::default();
        let mut totals = ConditionTotals::default();
        for fight in &fights {
            accumulate_fight(fight, options, &mut table, &mut specials, &mut totals);
        }
        (table, specials, totals)
    }

    fn record(value: serde_json::Value) -> FightRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_disruption_methods() {
        let tiers = DisruptionTiers::default();
        assert_eq!(disruption_value(4.0, 2000.0, DisruptionMethod::Count, &tiers), 4.0);
        assert_eq!(disruption_value(4.0, 2000.0, DisruptionMethod::Duration, &tiers), 2.0);
        // 500ms average: short tier
        assert_eq!(disruption_value(4.0, 2000.0, DisruptionMethod::Tiered, &tiers), 2.0);
        // 2s average: medium tier
        assert_eq!(disruption_value(2.0, 4000.0, DisruptionMethod::Tiered, &tiers), 2.0);
        // 5s average: long tier
        assert_eq!(disruption_value(2.0, 10000.0, DisruptionMethod::Tiered, &tiers), 3.0);
        assert_eq!(disruption_value(0.0, 10000.0, DisruptionMethod::Tiered, &tiers), 0.0);
    }

    #[test]
    fn test_primary_profession_by_time() {
        let list = vec!["Firebrand".to_string(), "Scourge".to_string()];
        let mut times = BTreeMap::new();
        times.insert("Firebrand".to_string(), 1000.0);
        times.insert("Scourge".to_string(), 5000.0);
        assert_eq!(primary_profession(&list, &times, "Unknown"), "Scourge");
        assert_eq!(primary_profession(&[], &times, "Unknown"), "Unknown");
    }

    #[test]
    fn test_accumulates_across_fights() {
        let records = vec![
            record(json!({ "uploadTime": 100, "details": { "durationMS": 60000, "players": [{
                "account": "a.1", "name": "Alpha", "profession": "Firebrand", "activeTimes": [60000],
                "statsTargets": [[{ "downContribution": 1000 }], [{ "downContribution": 500 }]],
                "support": [{ "condiCleanse": 10, "condiCleanseSelf": 2, "boonStrips": 3, "resurrects": 1, "resurrectTime": 5000000 }],
                "defenses": [{ "dodgeCount": 4, "downCount": 1, "deadCount": 1 }],
                "statsAll": [{ "stackDist": 120.4, "appliedCrowdControl": 6 }],
                "dpsAll": [{ "damage": 50000, "dps": 833 }]
            }, { "account": "x.9", "notInSquad": true }] } })),
            record(json!({ "uploadTime": 200, "details": { "durationMS": 30000, "players": [{
                "account": "a.1", "name": "Alpha", "profession": "Scourge", "activeTimes": [30000],
                "support": [{ "condiCleanse": 1 }],
                "statsAll": [{ "distToCom": 6000 }]
            }] } })),
        ];
        let (table, _, _) = run(&records, &AggregateOptions::default());
        assert_eq!(table.len(), 1);
        let stats = table.get("a.1").unwrap();
        assert_eq!(stats.logs_joined, 2);
        assert_eq!(stats.down_contrib, 1500.0);
        assert_eq!(stats.cleanses, 13.0);
        assert_eq!(stats.strips, 3.0);
        assert_eq!(stats.cc, 6.0);
        assert_eq!(stats.dodges, 4.0);
        assert_eq!(stats.revives, 1.0);
        // second sample is beyond the run-back cutoff
        assert_eq!(stats.dist_count, 1);
        assert_eq!(stats.closest_to_tag(), 120.0);
        assert_eq!(stats.total_fight_ms, 90000.0);
        assert_eq!(stats.primary_profession(), "Firebrand");
        assert_eq!(stats.profession_list(), vec!["Firebrand", "Scourge"]);
        assert_eq!(stats.support_totals["resurrectTime"], 0.0);
        assert_eq!(stats.offense_totals["downContribution"], 1500.0);
    }

    #[test]
    fn test_healing_splits_by_recipient() {
        let records = vec![record(json!({ "details": { "durationMS": 10000, "players": [
            { "account": "a.1", "group": 1, "extHealingStats": { "outgoingHealingAllies": [
                [{ "healing": 100 }], [{ "healing": 50, "downedHealing": 5 }], [{ "healing": 20 }], [{ "healing": 7 }]
            ] } },
            { "account": "b.2", "group": 1 },
            { "account": "c.3", "group": 2 },
            { "account": "x.9", "notInSquad": true }
        ] } }))];
        let (table, _, _) = run(&records, &AggregateOptions::default());
        let healing = &table.get("a.1").unwrap().healing_totals;
        assert_eq!(healing["healing"], 177.0);
        assert_eq!(healing["squadHealing"], 170.0);
        assert_eq!(healing["groupHealing"], 150.0);
        assert_eq!(healing["selfHealing"], 100.0);
        assert_eq!(healing["offSquadHealing"], 7.0);
        assert_eq!(healing["downedHealing"], 5.0);
        assert_eq!(table.get("a.1").unwrap().healing, 177.0);
    }

    #[test]
    fn test_special_buffs_and_uptime_conditions() {
        let records = vec![record(json!({ "details": { "durationMS": 10000,
            "buffMap": {
                "b742": { "name": "Weakness", "classification": "Condition", "icon": "weak.png" },
                "b5974": { "name": "Superspeed", "classification": "Support" },
                "b740": { "name": "Might", "classification": "Boon", "stacking": true }
            },
            "players": [{ "account": "a.1", "profession": "Herald", "activeTimes": [10000], "buffUptimes": [
                { "id": 742, "buffData": [{ "uptime": 50 }] },
                { "id": 5974, "buffData": [{ "uptime": 20 }] },
                { "id": 740, "buffData": [{ "uptime": 12 }] }
            ] }]
        } }))];
        let (table, specials, totals) = run(&records, &AggregateOptions::default());
        let tables = specials.tables();
        assert_eq!(tables.len(), 2);
        let speed = tables.iter().find(|t| t.id == "b5974").unwrap();
        assert_eq!(speed.name, "Superspeed");
        assert!((speed.rows[0].total - 2.0).abs() < 1e-9);
        assert!((speed.rows[0].per_second - 0.2).abs() < 1e-9);
        assert_eq!(speed.rows[0].profession, "Herald");

        assert!((totals.outgoing["Weakness"].applications_from_uptime - 5.0).abs() < 1e-9);
        assert!((totals.incoming["Weakness"].applications_from_uptime - 5.0).abs() < 1e-9);
        let stats = table.get("a.1").unwrap();
        assert_eq!(stats.outgoing_conditions["Weakness"].icon.as_deref(), Some("weak.png"));
    }

    #[test]
    fn test_replay_distance_fallback() {
        let records = vec![record(json!({ "details": {
            "durationMS": 10000,
            "combatReplayMetaData": { "inchToPixel": 2, "pollingRate": 1000 },
            "players": [
                { "account": "cmd.1", "hasCommanderTag": true,
                  "combatReplayData": { "start": 0, "positions": [[0, 0], [0, 0], [0, 0]] } },
                { "account": "a.1",
                  "combatReplayData": { "start": 0, "positions": [[30, 40], [60, 80], [0, 100]] } }
            ]
        } }))];
        let (table, _, _) = run(&records, &AggregateOptions::default());
        // hypot 50, 100, 100 -> mean 83.33 / 2
        assert_eq!(table.get("a.1").unwrap().closest_to_tag(), 42.0);
        assert!(table.get("cmd.1").unwrap().closest_to_tag().is_infinite());
    }

    #[test]
    fn test_replay_distance_cuts_at_last_death() {
        let records = vec![record(json!({ "details": {
            "durationMS": 10000,
            "combatReplayMetaData": { "inchToPixel": 1, "pollingRate": 1000 },
            "players": [
                { "account": "cmd.1", "hasCommanderTag": true,
                  "combatReplayData": { "start": 0, "positions": [[0, 0], [0, 0], [0, 0], [0, 0]] } },
                { "account": "a.1",
                  "combatReplayData": {
                      "start": 0,
                      "positions": [[10, 0], [10, 0], [30, 0], [30, 0]],
                      "down": [[500, 1000], [2500, 3000]],
                      "dead": [[1000, 1500], [3000, 3500]]
                  } }
            ]
        } }))];
        let (table, _, _) = run(&records, &AggregateOptions::default());
        // second death cuts at poll 3: (10 + 10 + 30) / 3
        assert_eq!(table.get("a.1").unwrap().closest_to_tag(), 17.0);
    }
}
