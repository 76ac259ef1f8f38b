//! Burst-damage profiles per squad player per fight.
//!
//! A profile holds the largest recorded single hit, the best rolling
//! 1s/5s/30s damage sums, a 5-second bucketed damage series with down and
//! death markers, and the top contributing skills.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::boons::{number_of_buckets, MAX_BUCKETS};
use super::fights::FightView;
use super::skills::{reconciled_contributions, resolve_skill_meta};
use crate::models::{
    bucket_sums, max_rolling_sum, phase_zero, CumulativeSeries, DamageEntry, FightDetails,
    PlayerEntry, SeriesShape, SkillDamageSource, SpikeDamage, SpikeFight, SpikePlayer,
    SpikeSkillRow, SpikeValue,
};

pub const SPIKE_SKILL_ROWS_CAP: usize = 12;
pub const BUCKET_SECONDS: usize = 5;
const BUCKET_MS: f64 = 5000.0;
const UNKNOWN_SKILL: &str = "Unknown Skill";

/// Largest recorded hit and the skill that landed it.
#[derive(Debug, Clone, PartialEq)]
pub struct PeakHit {
    pub value: f64,
    pub skill_name: String,
    /// Peak scaled by the skill's share of damage that contributed to downs
    pub down_contribution_value: f64,
}

impl Default for PeakHit {
    fn default() -> Self {
        Self {
            value: 0.0,
            skill_name: UNKNOWN_SKILL.to_string(),
            down_contribution_value: 0.0,
        }
    }
}

fn down_share(entry: &DamageEntry) -> f64 {
    if entry.total_damage > 0.0 && entry.down_contribution > 0.0 {
        (entry.down_contribution / entry.total_damage).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Fold entries into a peak. Only recorded max fields count; an average
/// derived from total damage over hits is never a hit.
pub fn peak_from_entries<'a, I>(entries: I, details: &FightDetails) -> PeakHit
where
    I: IntoIterator<Item = &'a DamageEntry>,
{
    let mut best = PeakHit::default();
    let mut best_id = None;
    for entry in entries {
        let peak = entry.peak_hit();
        if peak > best.value {
            best.value = peak;
            best_id = Some(entry.id);
        }
        let weighted = peak * down_share(entry);
        if weighted > best.down_contribution_value {
            best.down_contribution_value = weighted;
        }
    }
    if let Some(id) = best_id {
        best.skill_name = details
            .skill_name(id)
            .or_else(|| details.buff_name(id))
            .map(str::to_string)
            .unwrap_or_else(|| format!("Skill {id}"));
    }
    best
}

/// Peak hit for a squad player: per-target entries when the player has any,
/// otherwise the fight-total distribution.
pub fn player_peak_hit(player: &PlayerEntry, details: &FightDetails) -> PeakHit {
    let target_entries: Vec<&DamageEntry> = player
        .target_damage_dist
        .iter()
        .flatten()
        .flatten()
        .collect();
    if !target_entries.is_empty() {
        return peak_from_entries(target_entries, details);
    }
    peak_from_entries(player.total_damage_dist.iter().flatten(), details)
}

/// Outgoing per-second damage: summed phase-0 per-target timelines, or the
/// fight-total timeline when no per-target series is present.
pub fn player_damage_per_second(player: &PlayerEntry, details: &FightDetails) -> Vec<f64> {
    let raw = &player.target_damage_1s;
    let per_target = SeriesShape::detect(raw, details.targets.len()).per_target(raw);
    if per_target.iter().any(|s| !s.is_empty()) {
        return CumulativeSeries::sum(&per_target).per_second();
    }
    phase_zero(&player.damage_1s)
        .map(|s| s.per_second())
        .unwrap_or_default()
}

/// Buckets covering both the fight duration and the damage series.
pub fn bucket_count(duration_ms: f64, series_len: usize) -> usize {
    let from_series = series_len.div_ceil(BUCKET_SECONDS);
    number_of_buckets(duration_ms).max(from_series).min(MAX_BUCKETS)
}

/// Pad or trim 5-second buckets to `count` slots.
pub fn padded_buckets(values: &[f64], count: usize) -> Vec<f64> {
    let raw = bucket_sums(values, BUCKET_SECONDS);
    (0..count).map(|i| raw.get(i).copied().unwrap_or(0.0)).collect()
}

/// Bring replay event times onto the fight's millisecond clock.
///
/// Replay times arrive in seconds or milliseconds and may be offset by the
/// replay start. Each unit guess is tried against every candidate offset and
/// the combination landing the most events inside the fight wins; the first
/// candidate wins ties.
pub fn normalize_event_times(
    times: &[f64],
    replay_starts: &[f64],
    all_replay_starts: &[f64],
    bucket_count: usize,
    duration_ms: f64,
) -> Vec<f64> {
    if times.is_empty() || bucket_count == 0 {
        return Vec::new();
    }
    let max_ms = (bucket_count as f64 * BUCKET_MS).max(duration_ms.max(0.0));
    let raw: Vec<f64> = times
        .iter()
        .copied()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .collect();
    if raw.is_empty() {
        return Vec::new();
    }
    let in_range = |values: &[f64], offset: f64| {
        values
            .iter()
            .filter(|v| {
                let shifted = **v - offset;
                shifted >= 0.0 && shifted <= max_ms + 2000.0
            })
            .count()
    };

    let max_raw = raw.iter().copied().fold(0.0, f64::max);
    let min_raw = raw.iter().copied().fold(f64::INFINITY, f64::min);
    let mut variants: Vec<Vec<f64>> = vec![raw.clone()];
    if max_raw > max_ms * 20.0 {
        variants.push(raw.iter().map(|v| v / 1000.0).collect());
    }
    let seconds_ceiling = (bucket_count as f64 * BUCKET_SECONDS as f64 + 10.0).max(120.0);
    if max_raw <= max_ms * 2.0 && min_raw >= 0.0 && max_raw > 0.0 && max_raw < seconds_ceiling {
        variants.push(raw.iter().map(|v| v * 1000.0).collect());
    }

    let mut best_index = 0;
    let mut best_offset = 0.0;
    let mut best_score: Option<usize> = None;
    for (index, variant) in variants.iter().enumerate() {
        let mut offsets: Vec<f64> = vec![0.0];
        for start in replay_starts.iter().chain(all_replay_starts) {
            if !offsets.contains(start) {
                offsets.push(*start);
            }
        }
        let min_time = variant.iter().copied().fold(f64::INFINITY, f64::min);
        if min_time.is_finite() && max_ms > 0.0 && min_time > max_ms {
            let approx = (min_time / max_ms).floor() * max_ms;
            for candidate in [approx, (approx - max_ms).max(0.0)] {
                if !offsets.contains(&candidate) {
                    offsets.push(candidate);
                }
            }
        }
        for offset in offsets {
            let score = in_range(variant, offset);
            if best_score.map_or(true, |best| score > best) {
                best_score = Some(score);
                best_offset = offset;
                best_index = index;
            }
        }
    }

    variants[best_index]
        .iter()
        .map(|v| v - best_offset)
        .filter(|v| v.is_finite() && *v >= 0.0)
        .collect()
}

/// Distinct 5-second bucket indices holding at least one event.
pub fn marker_indices(
    times: &[f64],
    replay_starts: &[f64],
    all_replay_starts: &[f64],
    bucket_count: usize,
    duration_ms: f64,
) -> Vec<usize> {
    let normalized =
        normalize_event_times(times, replay_starts, all_replay_starts, bucket_count, duration_ms);
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    for value in normalized {
        let idx = (value / BUCKET_MS).floor() as usize;
        if idx < bucket_count && seen.insert(idx) {
            out.push(idx);
        }
    }
    out
}

/// Replay segment starts of every player in the fight.
pub fn all_replay_starts(details: &FightDetails) -> Vec<f64> {
    details
        .players
        .iter()
        .flat_map(|p| p.combat_replay_data.iter())
        .filter_map(|seg| seg.start)
        .filter(|s| s.is_finite() && *s >= 0.0)
        .collect()
}

/// Replay starts, down times and death times for one player.
pub fn replay_events(player: &PlayerEntry) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let segments = &player.combat_replay_data;
    let starts = segments
        .iter()
        .filter_map(|seg| seg.start)
        .filter(|s| s.is_finite() && *s >= 0.0)
        .collect();
    let downs = segments
        .iter()
        .flat_map(|seg| seg.down.iter().map(|(t, _)| *t))
        .filter(|t| t.is_finite() && *t >= 0.0)
        .collect();
    let deaths = segments
        .iter()
        .flat_map(|seg| seg.dead.iter().map(|(t, _)| *t))
        .filter(|t| t.is_finite() && *t >= 0.0)
        .collect();
    (starts, downs, deaths)
}

/// Ingredients shared by outgoing and incoming burst profiles.
#[derive(Debug, Clone, Default)]
pub struct BurstInput {
    pub peak: PeakHit,
    pub per_second: Vec<f64>,
    /// Fraction of damage that contributed to downs, in `[0, 1]`
    pub down_share: f64,
    pub bucket_count: usize,
    pub down_indices: Vec<usize>,
    pub death_indices: Vec<usize>,
    pub skill_rows: Vec<SpikeSkillRow>,
}

impl BurstInput {
    pub fn into_value(self) -> SpikeValue {
        let down_series: Vec<f64> = self.per_second.iter().map(|v| v * self.down_share).collect();
        SpikeValue {
            hit: self.peak.value,
            burst_1s: max_rolling_sum(&self.per_second, 1),
            burst_5s: max_rolling_sum(&self.per_second, 5),
            burst_30s: max_rolling_sum(&self.per_second, 30),
            down_contribution_hit: self.peak.down_contribution_value,
            down_contribution_burst_1s: max_rolling_sum(&down_series, 1),
            down_contribution_burst_5s: max_rolling_sum(&down_series, 5),
            down_contribution_burst_30s: max_rolling_sum(&down_series, 30),
            skill_name: self.peak.skill_name,
            buckets_5s: padded_buckets(&self.per_second, self.bucket_count),
            down_indices_5s: self.down_indices,
            death_indices_5s: self.death_indices,
            skill_rows: self.skill_rows,
        }
    }
}

/// Sort by damage, cap, and drop empty rows.
pub fn finish_skill_rows(rows: impl IntoIterator<Item = SpikeSkillRow>) -> Vec<SpikeSkillRow> {
    let mut rows: Vec<SpikeSkillRow> = rows
        .into_iter()
        .filter(|r| r.damage > 0.0 || r.peak_hit > 0.0)
        .collect();
    rows.sort_by(|a, b| {
        b.damage
            .total_cmp(&a.damage)
            .then_with(|| a.skill_name.cmp(&b.skill_name))
    });
    rows.truncate(SPIKE_SKILL_ROWS_CAP);
    rows
}

/// Reconciled skill rows for one player, with per-skill recorded peaks.
pub fn player_skill_rows(
    player: &PlayerEntry,
    details: &FightDetails,
    source: SkillDamageSource,
) -> Vec<SpikeSkillRow> {
    let mut peaks: HashMap<i64, f64> = HashMap::new();
    for entry in player.target_damage_dist.iter().flatten().flatten() {
        let slot = peaks.entry(entry.id).or_default();
        *slot = slot.max(entry.peak_hit());
    }
    if !details.detailed_wvw {
        for entry in player.total_damage_dist.iter().flatten() {
            peaks.entry(entry.id).or_insert_with(|| entry.peak_hit());
        }
    }

    let mut merged: BTreeMap<i64, SpikeSkillRow> = BTreeMap::new();
    for c in reconciled_contributions(player, details, source) {
        let row = merged.entry(c.id).or_insert_with(|| {
            let (skill_name, icon) = resolve_skill_meta(c.id, details);
            SpikeSkillRow {
                id: c.id,
                skill_name,
                icon,
                peak_hit: peaks.get(&c.id).copied().unwrap_or(0.0),
                ..Default::default()
            }
        });
        row.damage += c.damage;
        row.hits += c.hits;
        row.down_contribution += c.down_contribution;
    }
    finish_skill_rows(merged.into_values())
}

/// Burst profile of one squad player in one fight.
pub fn player_burst(
    player: &PlayerEntry,
    details: &FightDetails,
    source: SkillDamageSource,
    all_starts: &[f64],
) -> SpikeValue {
    let per_second = player_damage_per_second(player, details);
    let count = bucket_count(details.duration_ms, per_second.len());
    let (starts, downs, deaths) = replay_events(player);
    let skill_rows = player_skill_rows(player, details, source);
    let damage: f64 = skill_rows.iter().map(|r| r.damage).sum();
    let down: f64 = skill_rows.iter().map(|r| r.down_contribution).sum();
    let share = if damage > 0.0 {
        (down / damage).clamp(0.0, 1.0)
    } else {
        0.0
    };
    BurstInput {
        peak: player_peak_hit(player, details),
        per_second,
        down_share: share,
        bucket_count: count,
        down_indices: marker_indices(&downs, &starts, all_starts, count, details.duration_ms),
        death_indices: marker_indices(&deaths, &starts, all_starts, count, details.duration_ms),
        skill_rows,
    }
    .into_value()
}

/// Per-fight maxima across all values.
pub fn spike_fight(fight: &FightView<'_>, values: BTreeMap<String, SpikeValue>) -> SpikeFight {
    let max_of = |f: fn(&SpikeValue) -> f64| values.values().map(f).fold(0.0, f64::max);
    SpikeFight {
        id: fight.fight_id.clone(),
        short_label: fight.short_label.clone(),
        full_label: fight.full_label.clone(),
        timestamp: fight.timestamp,
        max_hit: max_of(|v| v.hit),
        max_1s: max_of(|v| v.burst_1s),
        max_5s: max_of(|v| v.burst_5s),
        max_30s: max_of(|v| v.burst_30s),
        values,
    }
}

/// Cross-fight spike accumulator for squad players.
#[derive(Debug, Default)]
pub struct SpikeTracker {
    fights: Vec<SpikeFight>,
    players: BTreeMap<String, SpikePlayer>,
}

impl SpikeTracker {
    pub fn add_fight(&mut self, fight: &FightView<'_>, source: SkillDamageSource) {
        let details = fight.details;
        let all_starts = all_replay_starts(details);
        let mut values = BTreeMap::new();

        for player in details.squad_players() {
            let key = player.breakdown_key();
            let account = player.key();
            let profession = player.profession_or_unknown().to_string();
            let character_name = player.name.clone().unwrap_or_default();
            let value = player_burst(player, details, source, &all_starts);

            let entry = self.players.entry(key.clone()).or_insert_with(|| SpikePlayer {
                key: key.clone(),
                display_name: account.clone(),
                account: account.clone(),
                character_name: character_name.clone(),
                profession: profession.clone(),
                profession_list: vec![profession.clone()],
                ..Default::default()
            });
            entry.logs += 1;
            if !entry.profession_list.contains(&profession) {
                entry.profession_list.push(profession);
            }
            if entry.character_name.is_empty() && !character_name.is_empty() {
                entry.character_name = character_name;
            }
            if value.hit > entry.peak_hit {
                entry.peak_hit = value.hit;
                entry.peak_fight_label = fight.full_label.clone();
                entry.peak_skill_name = value.skill_name.clone();
            }
            entry.peak_1s = entry.peak_1s.max(value.burst_1s);
            entry.peak_5s = entry.peak_5s.max(value.burst_5s);
            entry.peak_30s = entry.peak_30s.max(value.burst_30s);

            values.insert(key, value);
        }

        self.fights.push(spike_fight(fight, values));
    }

    /// Players ordered by peak hit, then display name.
    pub fn finish(self) -> SpikeDamage {
        let mut players: Vec<SpikePlayer> = self.players.into_values().collect();
        players.sort_by(|a, b| {
            b.peak_hit
                .total_cmp(&a.peak_hit)
                .then_with(|| a.display_name.cmp(&b.display_name))
        });
        SpikeDamage {
            fights: self.fights,
            players,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculate::fights::prepare_fights;
    use crate::models::FightRecord;
    use serde_json::json;

    fn berserker_fight(player: serde_json::Value, detailed: bool) -> FightRecord {
        serde_json::from_value(json!({
            "filePath": "spike-test",
            "details": {
                "detailedWvW": detailed,
                "durationMS": 5000,
                "skillMap": {
                    "s31710": { "name": "Battle Maul" },
                    "s123": { "name": "Arcing Slice" },
                    "s29852": { "name": "Arc Divider" }
                },
                "players": [player],
                "targets": []
            }
        }))
        .unwrap()
    }

    fn run(record: FightRecord) -> SpikeDamage {
        let records = vec![record];
        let fights = prepare_fights(&records);
        let mut tracker = SpikeTracker::default();
        for fight in &fights {
            tracker.add_fight(fight, SkillDamageSource::Target);
        }
        tracker.finish()
    }

    #[test]
    fn test_rolling_windows_and_buckets() {
        let deltas = CumulativeSeries::new(vec![0.0, 100.0, 300.0, 300.0, 1000.0, 1100.0]).per_second();
        assert_eq!(deltas, vec![0.0, 100.0, 200.0, 0.0, 700.0, 100.0]);
        assert!((max_rolling_sum(&deltas, 1) - 700.0).abs() < 0.001);
        assert!((max_rolling_sum(&deltas, 2) - 800.0).abs() < 0.001);
        assert!((max_rolling_sum(&deltas, 30) - 0.0).abs() < 0.001);
        assert_eq!(bucket_sums(&deltas, 5), vec![1000.0, 100.0]);
        assert_eq!(bucket_count(5000.0, 6), 2);
        assert_eq!(bucket_count(10000.0, 0), 2);
        assert_eq!(bucket_count(10001.0, 0), 3);
        assert_eq!(bucket_count(0.0, 11), 3);
        assert_eq!(bucket_count(1e15, 0), MAX_BUCKETS);
        assert_eq!(bucket_count(f64::NAN, 0), 0);
        assert_eq!(padded_buckets(&deltas, 3), vec![1000.0, 100.0, 0.0]);
    }

    #[test]
    fn test_event_times_pick_unit_and_offset() {
        let idx = marker_indices(&[12_000.0, 50_000.0], &[], &[], 12, 60_000.0);
        assert_eq!(idx, vec![2, 10]);
        // duplicate buckets collapse
        let idx = marker_indices(&[11_000.0, 12_000.0], &[], &[], 12, 60_000.0);
        assert_eq!(idx, vec![2]);
        // replay-start offsets are removed
        let idx = marker_indices(&[1_012_000.0], &[1_000_000.0], &[], 12, 60_000.0);
        assert_eq!(idx, vec![2]);
        // events past the last bucket are dropped
        let idx = marker_indices(&[61_000.0], &[], &[], 12, 60_000.0);
        assert!(idx.is_empty());
    }

    #[test]
    fn test_total_only_skill_reaches_rows_not_peak() {
        let spikes = run(berserker_fight(
            json!({
                "account": "BreakN.5496", "profession": "Berserker",
                "damage1S": [[0, 100, 200, 300, 400, 500]],
                "targetDamage1S": [[[0, 100, 200, 300, 400, 500]]],
                "targetDamageDist": [[[
                    { "id": 123, "totalDamage": 1000, "connectedHits": 1, "max": 1000 }
                ]]],
                "totalDamageDist": [[
                    { "id": 123, "totalDamage": 1000, "connectedHits": 1, "max": 1000 },
                    { "id": 31710, "totalDamage": 494819, "connectedHits": 1, "max": 494819 }
                ]]
            }),
            false,
        ));
        let key = "BreakN.5496|Berserker";
        let player = spikes.players.iter().find(|p| p.key == key).unwrap();
        assert!((player.peak_hit - 1000.0).abs() < 0.001);
        assert_eq!(player.peak_skill_name, "Arcing Slice");
        assert!((player.peak_1s - 100.0).abs() < 0.001);

        let value = &spikes.fights[0].values[key];
        let maul = value
            .skill_rows
            .iter()
            .find(|r| r.skill_name == "Battle Maul")
            .unwrap();
        assert!((maul.damage - 494819.0).abs() < 0.001);
        assert_eq!(value.buckets_5s, vec![400.0, 100.0]);
    }

    #[test]
    fn test_peak_ignores_inferred_hits() {
        let spikes = run(berserker_fight(
            json!({
                "account": "BreakN.5496", "profession": "Berserker",
                "targetDamageDist": [[[
                    { "id": 31710, "totalDamage": 494819, "connectedHits": 1 },
                    { "id": 29852, "totalDamage": 10000, "connectedHits": 1, "max": 10000 }
                ]]],
                "totalDamageDist": [[
                    { "id": 31710, "totalDamage": 494819, "connectedHits": 1 },
                    { "id": 29852, "totalDamage": 10000, "connectedHits": 1, "max": 10000 }
                ]]
            }),
            false,
        ));
        assert!((spikes.players[0].peak_hit - 10000.0).abs() < 0.001);
        assert_eq!(spikes.players[0].peak_skill_name, "Arc Divider");
    }

    #[test]
    fn test_detailed_logs_ignore_total_outliers() {
        let spikes = run(berserker_fight(
            json!({
                "account": "BreakN.5496", "profession": "Berserker",
                "targetDamageDist": [[[
                    { "id": 29852, "totalDamage": 14528, "connectedHits": 1, "max": 14528 }
                ]]],
                "totalDamageDist": [[
                    { "id": 31710, "totalDamage": 494819, "connectedHits": 1, "max": 494819 },
                    { "id": 29852, "totalDamage": 14528, "connectedHits": 1, "max": 14528 }
                ]]
            }),
            true,
        ));
        let fight = &spikes.fights[0];
        assert!((fight.max_hit - 14528.0).abs() < 0.001);
        let value = &fight.values["BreakN.5496|Berserker"];
        assert!(value.skill_rows.iter().all(|r| r.skill_name != "Battle Maul"));
    }

    #[test]
    fn test_down_contribution_weighting() {
        let details = FightDetails::default();
        let entry: DamageEntry = serde_json::from_value(json!({
            "id": 5, "totalDamage": 1000, "downContribution": 250, "max": 400
        }))
        .unwrap();
        let peak = peak_from_entries([&entry], &details);
        assert!((peak.value - 400.0).abs() < 0.001);
        assert!((peak.down_contribution_value - 100.0).abs() < 0.001);
        assert_eq!(peak.skill_name, "Skill 5");
    }
}
