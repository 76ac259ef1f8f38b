//! Boon generation tables and the two per-fight boon timelines.
//!
//! Generation is estimated from the parser's `selfBuffs`/`groupBuffs`/
//! `squadBuffs` percentages scaled by fight duration and recipient count.
//! The generation timeline spreads that total over 5-second buckets using
//! the recipients' per-source state timelines; the uptime timeline samples
//! the state timelines directly.

use std::collections::{BTreeMap, HashMap};

use super::fights::FightView;
use super::players::primary_profession;
use crate::models::{
    BoonCategoryTotals, BoonRow, BoonTable, BoonTimeline, BoonTimelineFight, BoonTimelinePlayer,
    BoonUptimeFight, BoonUptimePlayer, BoonUptimeTimeline, BuffGeneration, BuffMeta, BuffUptime,
    FightDetails, PlayerEntry, UNKNOWN,
};

pub const STABILITY_ID: i64 = 1122;
/// Stack cap for stacking boons.
pub const STACK_CAP: f64 = 25.0;
pub const BUCKET_MS: f64 = 5000.0;
/// Upper bound on 5-second buckets per fight (24 hours).
pub const MAX_BUCKETS: usize = 17_280;
/// Key of the synthetic whole-squad timeline row.
pub const ALL_KEY: &str = "__all__";

/// Recipient category of a generation record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoonCategory {
    SelfBuffs,
    GroupBuffs,
    SquadBuffs,
    /// Self plus squad, for metric helpers only
    TotalBuffs,
}

impl BoonCategory {
    pub const GENERATED: [BoonCategory; 3] = [Self::SelfBuffs, Self::GroupBuffs, Self::SquadBuffs];

    pub fn entries(self, player: &PlayerEntry) -> &[BuffGeneration] {
        match self {
            Self::SelfBuffs => &player.self_buffs,
            Self::GroupBuffs => &player.group_buffs,
            Self::SquadBuffs => &player.squad_buffs,
            Self::TotalBuffs => &[],
        }
    }

    /// Players other than the generator that receive the boon.
    pub fn recipients(self, group_count: usize, squad_count: usize) -> usize {
        match self {
            Self::SelfBuffs => 1,
            Self::GroupBuffs => group_count.saturating_sub(1),
            Self::SquadBuffs | Self::TotalBuffs => squad_count.saturating_sub(1),
        }
    }
}

/// 5-second buckets covering a fight, capped at [`MAX_BUCKETS`].
pub fn number_of_buckets(duration_ms: f64) -> usize {
    if duration_ms.is_finite() && duration_ms > 0.0 {
        ((duration_ms / BUCKET_MS).ceil() as usize).min(MAX_BUCKETS)
    } else {
        0
    }
}

fn is_boon_id(details: &FightDetails, id: i64) -> bool {
    details.buff(id).map_or(true, BuffMeta::is_boon)
}

fn is_stacking(details: &FightDetails, id: i64) -> bool {
    details.buff(id).is_some_and(|b| b.stacking)
}

/// Generated and wasted milliseconds for one category record.
#[allow(clippy::too_many_arguments)]
pub fn generation_ms(
    category: BoonCategory,
    stacking: bool,
    generation: f64,
    wasted: f64,
    duration_ms: f64,
    group_count: usize,
    squad_count: usize,
) -> BoonCategoryTotals {
    let count = category.recipients(group_count, squad_count) as f64;
    if count == 0.0 || duration_ms == 0.0 {
        return BoonCategoryTotals::default();
    }
    let scale = if stacking { 1.0 } else { 0.01 };
    let totals = BoonCategoryTotals {
        generation_ms: generation * scale * duration_ms * count,
        wasted_ms: wasted * scale * duration_ms * count,
    };
    if totals.generation_ms.is_finite() && totals.wasted_ms.is_finite() {
        totals
    } else {
        BoonCategoryTotals::default()
    }
}

fn entry_generation_ms(
    entry: &BuffGeneration,
    category: BoonCategory,
    player: &PlayerEntry,
    fight: &FightView<'_>,
) -> BoonCategoryTotals {
    let data = entry.buff_data.clone().unwrap_or_default();
    generation_ms(
        category,
        is_stacking(fight.details, entry.id),
        data.generation,
        data.wasted,
        fight.duration_ms,
        fight.group_count(player.group),
        fight.squad_count,
    )
}

/// One player's generation of a single boon in one fight.
pub fn player_generation_ms(
    player: &PlayerEntry,
    category: BoonCategory,
    boon_id: i64,
    fight: &FightView<'_>,
) -> BoonCategoryTotals {
    category
        .entries(player)
        .iter()
        .find(|b| b.id == boon_id)
        .map(|entry| entry_generation_ms(entry, category, player, fight))
        .unwrap_or_default()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoonMetric {
    /// Generated seconds
    Total,
    /// Generated ms per active ms
    Average,
    /// Uptime contributed per recipient
    Uptime,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BoonMetrics {
    pub generation_ms: f64,
    pub wasted_ms: f64,
    pub uptime_raw: f64,
    pub wasted_raw: f64,
}

fn safe_div(a: f64, b: f64, fallback: f64) -> f64 {
    if b != 0.0 {
        a / b
    } else {
        fallback
    }
}

fn or_one(v: f64) -> f64 {
    if v != 0.0 {
        v
    } else {
        1.0
    }
}

pub fn boon_metrics(row: &BoonRow, category: BoonCategory, stacking: bool) -> BoonMetrics {
    let active = or_one(row.active_time_ms);
    let fights = or_one(row.num_fights as f64);
    let group_supported = or_one(row.group_supported);
    let squad_supported = or_one(row.squad_supported);

    let source = match category {
        BoonCategory::SelfBuffs => row.self_totals.clone(),
        BoonCategory::GroupBuffs => row.group_totals.clone(),
        BoonCategory::SquadBuffs => row.squad_totals.clone(),
        BoonCategory::TotalBuffs => BoonCategoryTotals {
            generation_ms: row.self_totals.generation_ms + row.squad_totals.generation_ms,
            wasted_ms: row.self_totals.wasted_ms + row.squad_totals.wasted_ms,
        },
    };
    let denom = match category {
        BoonCategory::SelfBuffs => 1.0,
        BoonCategory::GroupBuffs => safe_div(group_supported - fights, fights, 1.0),
        BoonCategory::SquadBuffs => safe_div(squad_supported - fights, fights, 1.0),
        BoonCategory::TotalBuffs => squad_supported,
    };
    let denom = or_one(denom);
    let pct = if stacking { 1.0 } else { 100.0 };
    BoonMetrics {
        generation_ms: source.generation_ms,
        wasted_ms: source.wasted_ms,
        uptime_raw: safe_div(source.generation_ms, active, 0.0) / denom * pct,
        wasted_raw: safe_div(source.wasted_ms, active, 0.0) / denom * pct,
    }
}

pub fn boon_metric_value(row: &BoonRow, category: BoonCategory, stacking: bool, metric: BoonMetric) -> f64 {
    let metrics = boon_metrics(row, category, stacking);
    match metric {
        BoonMetric::Total => metrics.generation_ms / 1000.0,
        BoonMetric::Average => safe_div(metrics.generation_ms, or_one(row.active_time_ms), 0.0),
        BoonMetric::Uptime => metrics.uptime_raw,
    }
}

#[derive(Debug, Clone, Default)]
struct BoonInfo {
    name: Option<String>,
    icon: Option<String>,
    stacking: bool,
    classification: Option<String>,
}

impl BoonInfo {
    fn merge(&mut self, meta: &BuffMeta) {
        if self.name.is_none() {
            self.name = meta.name.clone();
        }
        if self.icon.is_none() {
            self.icon = meta.icon.clone();
        }
        if self.classification.is_none() {
            self.classification = meta.classification.clone();
        }
    }

    fn is_boon(&self) -> bool {
        self.classification.as_deref().map_or(true, |c| c == "Boon")
    }
}

fn note_meta(meta: &mut BTreeMap<i64, BoonInfo>, details: &FightDetails) {
    for (key, buff) in &details.buff_map {
        let Ok(id) = key.trim_start_matches('b').parse::<i64>() else {
            continue;
        };
        meta.entry(id)
            .or_insert_with(|| BoonInfo {
                stacking: buff.stacking,
                ..Default::default()
            })
            .merge(buff);
    }
}

#[derive(Debug, Default)]
struct GenerationAccount {
    profession: String,
    active_time_ms: f64,
    num_fights: usize,
    group_supported: f64,
    squad_supported: f64,
    /// boon id -> self/group/squad totals
    boons: BTreeMap<i64, [BoonCategoryTotals; 3]>,
}

/// Cross-fight generation per account and boon.
#[derive(Debug, Default)]
pub struct BoonTableBuilder {
    meta: BTreeMap<i64, BoonInfo>,
    accounts: BTreeMap<String, GenerationAccount>,
}

impl BoonTableBuilder {
    pub fn add_fight(&mut self, fight: &FightView<'_>) {
        let details = fight.details;
        note_meta(&mut self.meta, details);

        for player in details.squad_players() {
            let profession = player.profession_or_unknown().to_string();
            let agg = self
                .accounts
                .entry(player.display_account())
                .or_insert_with(|| GenerationAccount {
                    profession: profession.clone(),
                    ..Default::default()
                });
            if agg.profession != profession {
                agg.profession = "Multiple".to_string();
            }
            agg.active_time_ms += player.active_ms(fight.duration_ms);
            agg.num_fights += 1;
            agg.group_supported += fight.group_count(player.group) as f64;
            agg.squad_supported += fight.squad_count as f64;

            for (slot, category) in BoonCategory::GENERATED.into_iter().enumerate() {
                for entry in category.entries(player) {
                    if !is_boon_id(details, entry.id) {
                        continue;
                    }
                    let totals = entry_generation_ms(entry, category, player, fight);
                    if totals.generation_ms == 0.0 && totals.wasted_ms == 0.0 {
                        continue;
                    }
                    self.meta.entry(entry.id).or_default();
                    let boon = agg.boons.entry(entry.id).or_default();
                    boon[slot].generation_ms += totals.generation_ms;
                    boon[slot].wasted_ms += totals.wasted_ms;
                }
            }
        }
    }

    pub fn tables(&self) -> Vec<BoonTable> {
        self.meta
            .iter()
            .filter(|(_, info)| info.is_boon())
            .filter_map(|(id, info)| {
                let rows: Vec<BoonRow> = self
                    .accounts
                    .iter()
                    .filter_map(|(account, agg)| {
                        let [own, group, squad] = agg.boons.get(id)?.clone();
                        let has_data = [&own, &group, &squad]
                            .iter()
                            .any(|c| c.generation_ms > 0.0 || c.wasted_ms > 0.0);
                        has_data.then(|| BoonRow {
                            account: account.clone(),
                            profession: agg.profession.clone(),
                            active_time_ms: or_one(agg.active_time_ms),
                            num_fights: agg.num_fights.max(1),
                            group_supported: or_one(agg.group_supported),
                            squad_supported: or_one(agg.squad_supported),
                            self_totals: own,
                            group_totals: group,
                            squad_totals: squad,
                        })
                    })
                    .collect();
                if rows.is_empty() {
                    return None;
                }
                let boon_id = format!("b{id}");
                Some(BoonTable {
                    name: info.name.clone().unwrap_or_else(|| boon_id.clone()),
                    id: boon_id,
                    icon: info.icon.clone(),
                    stacking: info.stacking,
                    rows,
                })
            })
            .collect()
    }
}

/// Stack value in effect at `time`: the last state at or before it.
pub fn state_at(states: &[(f64, f64)], time: f64) -> f64 {
    states
        .iter()
        .take_while(|(t, _)| *t <= time)
        .last()
        .map(|(_, v)| *v)
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Stack-milliseconds of a state timeline falling inside each bucket.
pub fn state_weights(states: &[(f64, f64)], bucket_count: usize) -> Vec<f64> {
    let mut weights = vec![0.0; bucket_count];
    let end_of_fight = bucket_count as f64 * BUCKET_MS;
    for (i, &(start, value)) in states.iter().enumerate() {
        let end = states.get(i + 1).map_or(end_of_fight, |(t, _)| *t).min(end_of_fight);
        if !value.is_finite() || value <= 0.0 || !start.is_finite() || end <= start {
            continue;
        }
        let mut bucket = (start.max(0.0) / BUCKET_MS).floor() as usize;
        while bucket < bucket_count {
            let lo = bucket as f64 * BUCKET_MS;
            let hi = lo + BUCKET_MS;
            if lo >= end {
                break;
            }
            let overlap = hi.min(end) - lo.max(start);
            if overlap > 0.0 {
                weights[bucket] += overlap * value;
            }
            bucket += 1;
        }
    }
    weights
}

/// Spread `total` over buckets proportionally to `weights`, evenly when
/// there is no weight to follow.
pub fn distribute(total: f64, weights: Option<&[f64]>, bucket_count: usize) -> Vec<f64> {
    if bucket_count == 0 {
        return Vec::new();
    }
    let weight_sum: f64 = weights.map_or(0.0, |w| w.iter().sum());
    match weights {
        Some(w) if weight_sum > 0.0 && w.len() == bucket_count => {
            w.iter().map(|x| total * x / weight_sum).collect()
        }
        _ => vec![total / bucket_count as f64; bucket_count],
    }
}

/// Uptime sampled at each bucket boundary: stacks (capped) for stacking
/// boons, 0/100 presence for the rest. Without state data the phase uptime
/// is used as a flat line.
pub fn uptime_buckets(buff: &BuffUptime, stacking: bool, bucket_count: usize) -> Vec<f64> {
    let sources: Vec<&[(f64, f64)]> = if buff.states_per_source.is_empty() {
        if buff.states.is_empty() {
            Vec::new()
        } else {
            vec![buff.states.as_slice()]
        }
    } else {
        buff.states_per_source.values().map(Vec::as_slice).collect()
    };
    if sources.is_empty() {
        let flat = if stacking {
            buff.uptime().clamp(0.0, STACK_CAP)
        } else {
            buff.uptime().clamp(0.0, 100.0)
        };
        return vec![flat; bucket_count];
    }
    (0..bucket_count)
        .map(|i| {
            let time = i as f64 * BUCKET_MS;
            let stacks: f64 = sources.iter().map(|s| state_at(s, time)).sum();
            if stacking {
                stacks.clamp(0.0, STACK_CAP)
            } else if stacks > 0.0 {
                100.0
            } else {
                0.0
            }
        })
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[derive(Debug, Default)]
struct TrackedPlayer<F> {
    account: String,
    fallback_profession: String,
    professions: Vec<String>,
    profession_time_ms: BTreeMap<String, f64>,
    fights: Vec<F>,
}

impl<F> TrackedPlayer<F> {
    fn new(player: &PlayerEntry) -> Self {
        Self {
            account: player.key(),
            fallback_profession: player.profession_or_unknown().to_string(),
            professions: Vec::new(),
            profession_time_ms: BTreeMap::new(),
            fights: Vec::new(),
        }
    }

    fn note_profession(&mut self, player: &PlayerEntry, active_ms: f64) {
        if let Some(prof) = player.profession.as_deref().filter(|p| *p != UNKNOWN) {
            if !self.professions.iter().any(|p| p == prof) {
                self.professions.push(prof.to_string());
            }
            *self.profession_time_ms.entry(prof.to_string()).or_default() += active_ms;
        }
    }

    fn profession(&self) -> String {
        primary_profession(&self.professions, &self.profession_time_ms, &self.fallback_profession)
    }
}

type Track<F> = BTreeMap<String, TrackedPlayer<F>>;

/// Generation and uptime timelines across all fights.
#[derive(Debug, Default)]
pub struct BoonTimelines {
    meta: BTreeMap<i64, BoonInfo>,
    generation: BTreeMap<i64, Track<BoonTimelineFight>>,
    uptime: BTreeMap<i64, Track<BoonUptimeFight>>,
}

impl BoonTimelines {
    pub fn add_fight(&mut self, fight: &FightView<'_>) {
        let details = fight.details;
        let bucket_count = number_of_buckets(fight.duration_ms);
        if bucket_count == 0 {
            return;
        }
        note_meta(&mut self.meta, details);

        // boon -> source name -> stack-ms per bucket over every recipient
        let mut source_weights: HashMap<i64, HashMap<&str, Vec<f64>>> = HashMap::new();
        for recipient in details.squad_players() {
            for buff in &recipient.buff_uptimes {
                if !is_boon_id(details, buff.id) {
                    continue;
                }
                for (source, states) in &buff.states_per_source {
                    let weights = state_weights(states, bucket_count);
                    let slot = source_weights
                        .entry(buff.id)
                        .or_default()
                        .entry(source.as_str())
                        .or_insert_with(|| vec![0.0; bucket_count]);
                    for (acc, w) in slot.iter_mut().zip(weights) {
                        *acc += w;
                    }
                }
            }
        }

        for player in details.squad_players() {
            let active_ms = player.active_ms(fight.duration_ms);
            self.add_generation(fight, player, active_ms, bucket_count, &source_weights);
            self.add_uptime(fight, player, active_ms, bucket_count);
        }
    }

    fn add_generation(
        &mut self,
        fight: &FightView<'_>,
        player: &PlayerEntry,
        active_ms: f64,
        bucket_count: usize,
        source_weights: &HashMap<i64, HashMap<&str, Vec<f64>>>,
    ) {
        let details = fight.details;
        let mut per_boon: BTreeMap<i64, [f64; 3]> = BTreeMap::new();
        for (slot, category) in BoonCategory::GENERATED.into_iter().enumerate() {
            for entry in category.entries(player) {
                if !is_boon_id(details, entry.id) {
                    continue;
                }
                let totals = entry_generation_ms(entry, category, player, fight);
                per_boon.entry(entry.id).or_default()[slot] += totals.generation_ms;
            }
        }

        for (id, [own, group, squad]) in per_boon {
            let total = own + group + squad;
            if !total.is_finite() || total <= 0.0 {
                continue;
            }
            let weights = player
                .name
                .as_deref()
                .and_then(|name| source_weights.get(&id)?.get(name))
                .map(Vec::as_slice);
            let tracked = self
                .generation
                .entry(id)
                .or_default()
                .entry(player.key())
                .or_insert_with(|| TrackedPlayer::new(player));
            tracked.note_profession(player, active_ms);
            tracked.fights.push(BoonTimelineFight {
                fight_id: fight.fight_id.clone(),
                index: fight.order,
                short_label: fight.short_label.clone(),
                full_label: fight.full_label.clone(),
                timestamp: fight.timestamp,
                self_ms: own,
                group_ms: group,
                squad_ms: squad,
                total_ms: total,
                buckets_5s: distribute(total, weights, bucket_count),
            });
        }
    }

    fn add_uptime(&mut self, fight: &FightView<'_>, player: &PlayerEntry, active_ms: f64, bucket_count: usize) {
        let details = fight.details;
        for buff in &player.buff_uptimes {
            if !is_boon_id(details, buff.id) {
                continue;
            }
            let buckets = uptime_buckets(buff, is_stacking(details, buff.id), bucket_count);
            let tracked = self
                .uptime
                .entry(buff.id)
                .or_default()
                .entry(player.key())
                .or_insert_with(|| TrackedPlayer::new(player));
            tracked.note_profession(player, active_ms);
            tracked.fights.push(BoonUptimeFight {
                fight_id: fight.fight_id.clone(),
                index: fight.order,
                short_label: fight.short_label.clone(),
                full_label: fight.full_label.clone(),
                timestamp: fight.timestamp,
                average_uptime: mean(&buckets),
                buckets_5s: buckets,
            });
        }
    }

    fn info(&self, id: i64) -> (String, Option<String>, bool) {
        let info = self.meta.get(&id).cloned().unwrap_or_default();
        (
            info.name.unwrap_or_else(|| format!("b{id}")),
            info.icon,
            info.stacking,
        )
    }

    pub fn generation_timelines(&self) -> Vec<BoonTimeline> {
        self.generation
            .iter()
            .map(|(id, track)| {
                let (name, icon, stacking) = self.info(*id);
                let mut players: Vec<BoonTimelinePlayer> = track
                    .values()
                    .map(|t| {
                        let sum = |f: fn(&BoonTimelineFight) -> f64| t.fights.iter().map(f).sum::<f64>();
                        BoonTimelinePlayer {
                            key: t.account.clone(),
                            account: t.account.clone(),
                            display_name: t.account.clone(),
                            profession: t.profession(),
                            profession_list: t.professions.clone(),
                            logs: t.fights.len(),
                            self_ms: sum(|f| f.self_ms),
                            group_ms: sum(|f| f.group_ms),
                            squad_ms: sum(|f| f.squad_ms),
                            total_ms: sum(|f| f.total_ms),
                            fights: t.fights.clone(),
                        }
                    })
                    .collect();
                players.sort_by(|a, b| b.total_ms.total_cmp(&a.total_ms).then_with(|| a.account.cmp(&b.account)));
                players.insert(0, squad_generation_row(&players));
                BoonTimeline {
                    id: format!("b{id}"),
                    name,
                    icon,
                    stacking,
                    players,
                }
            })
            .collect()
    }

    pub fn uptime_timelines(&self) -> Vec<BoonUptimeTimeline> {
        self.uptime
            .iter()
            .map(|(id, track)| {
                let (name, icon, stacking) = self.info(*id);
                let mut players: Vec<BoonUptimePlayer> = track
                    .values()
                    .map(|t| {
                        let samples: Vec<f64> = t.fights.iter().flat_map(|f| f.buckets_5s.iter().copied()).collect();
                        BoonUptimePlayer {
                            key: t.account.clone(),
                            account: t.account.clone(),
                            display_name: t.account.clone(),
                            profession: t.profession(),
                            profession_list: t.professions.clone(),
                            logs: t.fights.len(),
                            average_uptime: mean(&samples),
                            fights: t.fights.clone(),
                        }
                    })
                    .collect();
                players.sort_by(|a, b| {
                    b.average_uptime
                        .total_cmp(&a.average_uptime)
                        .then_with(|| a.account.cmp(&b.account))
                });
                players.insert(0, squad_uptime_row(&players));
                BoonUptimeTimeline {
                    id: format!("b{id}"),
                    name,
                    icon,
                    stacking,
                    players,
                }
            })
            .collect()
    }
}

fn add_into(acc: &mut Vec<f64>, values: &[f64]) {
    if acc.len() < values.len() {
        acc.resize(values.len(), 0.0);
    }
    for (a, v) in acc.iter_mut().zip(values) {
        *a += v;
    }
}

/// Whole-squad generation: per-fight sums over every player.
fn squad_generation_row(players: &[BoonTimelinePlayer]) -> BoonTimelinePlayer {
    let mut fights: BTreeMap<usize, BoonTimelineFight> = BTreeMap::new();
    for fight in players.iter().flat_map(|p| &p.fights) {
        let row = fights.entry(fight.index).or_insert_with(|| BoonTimelineFight {
            fight_id: fight.fight_id.clone(),
            index: fight.index,
            short_label: fight.short_label.clone(),
            full_label: fight.full_label.clone(),
            timestamp: fight.timestamp,
            ..Default::default()
        });
        row.self_ms += fight.self_ms;
        row.group_ms += fight.group_ms;
        row.squad_ms += fight.squad_ms;
        row.total_ms += fight.total_ms;
        add_into(&mut row.buckets_5s, &fight.buckets_5s);
    }
    let fights: Vec<BoonTimelineFight> = fights.into_values().collect();
    BoonTimelinePlayer {
        key: ALL_KEY.to_string(),
        account: ALL_KEY.to_string(),
        display_name: "Squad".to_string(),
        profession: "All".to_string(),
        profession_list: Vec::new(),
        logs: fights.len(),
        self_ms: fights.iter().map(|f| f.self_ms).sum(),
        group_ms: fights.iter().map(|f| f.group_ms).sum(),
        squad_ms: fights.iter().map(|f| f.squad_ms).sum(),
        total_ms: fights.iter().map(|f| f.total_ms).sum(),
        fights,
    }
}

/// Whole-squad uptime: per-fight bucket means over the players present.
fn squad_uptime_row(players: &[BoonUptimePlayer]) -> BoonUptimePlayer {
    let mut fights: BTreeMap<usize, (BoonUptimeFight, usize)> = BTreeMap::new();
    for fight in players.iter().flat_map(|p| &p.fights) {
        let (row, count) = fights.entry(fight.index).or_insert_with(|| {
            (
                BoonUptimeFight {
                    fight_id: fight.fight_id.clone(),
                    index: fight.index,
                    short_label: fight.short_label.clone(),
                    full_label: fight.full_label.clone(),
                    timestamp: fight.timestamp,
                    ..Default::default()
                },
                0,
            )
        });
        add_into(&mut row.buckets_5s, &fight.buckets_5s);
        *count += 1;
    }
    let fights: Vec<BoonUptimeFight> = fights
        .into_values()
        .map(|(mut row, count)| {
            let n = count.max(1) as f64;
            row.buckets_5s.iter_mut().for_each(|b| *b /= n);
            row.average_uptime = mean(&row.buckets_5s);
            row
        })
        .collect();
    let samples: Vec<f64> = fights.iter().flat_map(|f| f.buckets_5s.iter().copied()).collect();
    BoonUptimePlayer {
        key: ALL_KEY.to_string(),
        account: ALL_KEY.to_string(),
        display_name: "Squad".to_string(),
        profession: "All".to_string(),
        profession_list: Vec::new(),
        logs: fights.len(),
        average_uptime: mean(&samples),
        fights,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculate::fights::prepare_fights;
    use crate::models::FightRecord;
    use serde_json::json;

    fn records() -> Vec<FightRecord> {
        vec![serde_json::from_value(json!({ "details": {
            "durationMS": 10000,
            "buffMap": {
                "b1122": { "name": "Stability", "stacking": true, "classification": "Boon" },
                "b717": { "name": "Protection", "classification": "Boon" },
                "b5974": { "name": "Superspeed", "classification": "Support" }
            },
            "players": [
                { "account": "a.1", "name": "Alpha", "profession": "Firebrand", "group": 1,
                  "selfBuffs": [{ "id": 1122, "buffData": [{ "generation": 2 }] }],
                  "squadBuffs": [
                      { "id": 1122, "buffData": [{ "generation": 1, "wasted": 0.5 }] },
                      { "id": 717, "buffData": [{ "generation": 50 }] },
                      { "id": 5974, "buffData": [{ "generation": 80 }] }
                  ],
                  "buffUptimes": [{ "id": 717, "statesPerSource": { "Alpha": [[0, 1], [5000, 0]] } }] },
                { "account": "b.2", "name": "Beta", "profession": "Scrapper", "group": 1,
                  "buffUptimes": [
                      { "id": 717, "statesPerSource": { "Alpha": [[0, 1], [6000, 0]] } },
                      { "id": 1122, "statesPerSource": { "Alpha": [[0, 10], [5000, 30]] } }
                  ] }
            ]
        } })).unwrap()]
    }

    #[test]
    fn test_generation_formula() {
        let stacking = generation_ms(BoonCategory::SquadBuffs, true, 1.0, 0.5, 10000.0, 2, 5);
        assert_eq!(stacking.generation_ms, 40000.0);
        assert_eq!(stacking.wasted_ms, 20000.0);
        let flat = generation_ms(BoonCategory::GroupBuffs, false, 50.0, 0.0, 10000.0, 3, 5);
        assert_eq!(flat.generation_ms, 10000.0);
        let alone = generation_ms(BoonCategory::SquadBuffs, false, 50.0, 0.0, 10000.0, 1, 1);
        assert_eq!(alone, BoonCategoryTotals::default());
    }

    #[test]
    fn test_bucket_count_boundaries() {
        assert_eq!(number_of_buckets(10000.0), 2);
        assert_eq!(number_of_buckets(10001.0), 3);
        assert_eq!(number_of_buckets(MAX_BUCKETS as f64 * BUCKET_MS), MAX_BUCKETS);
        assert_eq!(number_of_buckets(1e15), MAX_BUCKETS);
        assert_eq!(number_of_buckets(-5.0), 0);
        assert_eq!(number_of_buckets(f64::INFINITY), 0);

        let buff = BuffUptime::default();
        assert_eq!(uptime_buckets(&buff, false, number_of_buckets(10001.0)).len(), 3);
    }

    #[test]
    fn test_boon_tables_skip_non_boons() {
        let records = records();
        let fights = prepare_fights(&records);
        let mut builder = BoonTableBuilder::default();
        for fight in &fights {
            builder.add_fight(fight);
        }
        let tables = builder.tables();
        let ids: Vec<&str> = tables.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["b717", "b1122"]);
        let stab = tables.iter().find(|t| t.id == "b1122").unwrap();
        assert_eq!(stab.rows.len(), 1);
        assert_eq!(stab.rows[0].self_totals.generation_ms, 20000.0);
        assert_eq!(stab.rows[0].squad_totals.generation_ms, 10000.0);
        assert_eq!(stab.rows[0].squad_supported, 2.0);
    }

    #[test]
    fn test_boon_metric_helpers() {
        let row = BoonRow {
            account: "a.1".to_string(),
            active_time_ms: 10000.0,
            num_fights: 1,
            group_supported: 3.0,
            squad_supported: 5.0,
            self_totals: BoonCategoryTotals { generation_ms: 5000.0, wasted_ms: 0.0 },
            squad_totals: BoonCategoryTotals { generation_ms: 20000.0, wasted_ms: 0.0 },
            ..Default::default()
        };
        assert!((boon_metric_value(&row, BoonCategory::SelfBuffs, false, BoonMetric::Uptime) - 50.0).abs() < 1e-9);
        // four recipients share the squad generation
        assert!((boon_metric_value(&row, BoonCategory::SquadBuffs, false, BoonMetric::Uptime) - 50.0).abs() < 1e-9);
        assert!((boon_metric_value(&row, BoonCategory::TotalBuffs, true, BoonMetric::Total) - 25.0).abs() < 1e-9);
        assert!((boon_metric_value(&row, BoonCategory::SquadBuffs, true, BoonMetric::Average) - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_state_weights_and_sampling() {
        let states = vec![(0.0, 2.0), (2500.0, 0.0), (7500.0, 1.0)];
        let weights = state_weights(&states, 2);
        assert_eq!(weights, vec![5000.0, 2500.0]);
        assert_eq!(state_at(&states, 5000.0), 0.0);
        assert_eq!(state_at(&states, 7500.0), 1.0);
        assert_eq!(distribute(9.0, None, 3), vec![3.0, 3.0, 3.0]);
        assert_eq!(distribute(9.0, Some(&[1.0, 2.0]), 2), vec![3.0, 6.0]);
    }

    #[test]
    fn test_timelines() {
        let records = records();
        let fights = prepare_fights(&records);
        let mut timelines = BoonTimelines::default();
        for fight in &fights {
            timelines.add_fight(fight);
        }

        let generation = timelines.generation_timelines();
        let protection = generation.iter().find(|t| t.id == "b717").unwrap();
        assert_eq!(protection.players[0].key, ALL_KEY);
        let alpha = &protection.players[1];
        assert_eq!(alpha.account, "a.1");
        assert_eq!(alpha.total_ms, 5000.0);
        // 5000 + 5000 stack-ms in the first bucket, 1000 in the second
        let buckets = &alpha.fights[0].buckets_5s;
        assert!((buckets[0] - 5000.0 * 10.0 / 11.0).abs() < 1e-6);
        assert!((buckets[1] - 5000.0 / 11.0).abs() < 1e-6);
        assert!(generation.iter().all(|t| t.id != "b5974"));

        let uptime = timelines.uptime_timelines();
        let stab = uptime.iter().find(|t| t.id == "b1122").unwrap();
        let beta = stab.players.iter().find(|p| p.account == "b.2").unwrap();
        assert_eq!(beta.fights[0].buckets_5s, vec![10.0, 25.0]);
        let protection = uptime.iter().find(|t| t.id == "b717").unwrap();
        let all = &protection.players[0];
        assert_eq!(all.fights[0].buckets_5s, vec![100.0, 50.0]);
        assert!((all.average_uptime - 75.0).abs() < 1e-9);
    }
}
