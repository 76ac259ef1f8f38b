//! Incoming burst damage grouped by enemy profession.
//!
//! Every enemy of a profession is folded together. Per-second damage comes
//! from the enemies' own cumulative timelines; when none carry one, the
//! squad's summed incoming timeline is split by each profession's share of
//! enemy damage.

use std::collections::BTreeMap;

use super::fights::FightView;
use super::skills::resolve_skill_meta;
use super::spike::{
    all_replay_starts, bucket_count, finish_skill_rows, marker_indices, peak_from_entries,
    replay_events, spike_fight, BurstInput,
};
use crate::models::{
    phase_zero, CumulativeSeries, DamageEntry, FightDetails, IncomingStrikeDamage, IncomingStrikeProfession, SpikeFight,
    SpikeSkillRow, TargetEntry,
};
use crate::professions::{profession_color, resolve_profession_label};

#[derive(Default)]
struct ProfessionGroup<'a> {
    targets: Vec<&'a TargetEntry>,
}

impl<'a> ProfessionGroup<'a> {
    fn entries(&self) -> impl Iterator<Item = &'a DamageEntry> + '_ {
        self.targets
            .iter()
            .copied()
            .flat_map(|t| t.total_damage_dist.first().into_iter().flatten())
            .filter(|e| e.id != 0)
    }

    fn damage(&self) -> f64 {
        self.entries().map(|e| e.total_damage).sum()
    }

    fn own_series(&self) -> Option<Vec<f64>> {
        let series: Vec<CumulativeSeries> = self
            .targets
            .iter()
            .filter_map(|t| phase_zero(&t.damage_1s))
            .collect();
        if series.is_empty() {
            None
        } else {
            Some(CumulativeSeries::sum(&series).per_second())
        }
    }

    fn skill_rows(&self, details: &FightDetails) -> Vec<SpikeSkillRow> {
        let mut rows: BTreeMap<i64, SpikeSkillRow> = BTreeMap::new();
        for entry in self.entries() {
            let row = rows.entry(entry.id).or_insert_with(|| {
                let (skill_name, icon) = resolve_skill_meta(entry.id, details);
                SpikeSkillRow {
                    id: entry.id,
                    skill_name,
                    icon,
                    ..Default::default()
                }
            });
            row.damage += entry.total_damage;
            row.hits += entry.effective_hits();
            row.down_contribution += entry.down_contribution;
            row.peak_hit = row.peak_hit.max(entry.peak_hit());
        }
        finish_skill_rows(rows.into_values())
    }
}

/// Squad-wide incoming damage per second (phase 0).
fn squad_incoming_per_second(details: &FightDetails) -> Vec<f64> {
    let series: Vec<CumulativeSeries> = details
        .squad_players()
        .filter_map(|p| phase_zero(&p.damage_taken_1s))
        .collect();
    CumulativeSeries::sum(&series).per_second()
}

/// Down and death times of every squad member, with their replay starts.
fn squad_events(details: &FightDetails) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let mut starts = Vec::new();
    let mut downs = Vec::new();
    let mut deaths = Vec::new();
    for player in details.squad_players() {
        let (s, d, x) = replay_events(player);
        starts.extend(s);
        downs.extend(d);
        deaths.extend(x);
    }
    (starts, downs, deaths)
}

/// Cross-fight incoming-strike accumulator.
#[derive(Debug, Default)]
pub struct IncomingStrikeTracker {
    fights: Vec<SpikeFight>,
    professions: BTreeMap<String, IncomingStrikeProfession>,
}

impl IncomingStrikeTracker {
    pub fn add_fight(&mut self, fight: &FightView<'_>) {
        let details = fight.details;
        let mut groups: BTreeMap<String, ProfessionGroup<'_>> = BTreeMap::new();
        for target in details.enemy_targets() {
            let profession = resolve_profession_label(target.raw_label());
            groups.entry(profession).or_default().targets.push(target);
        }

        let squad_series = squad_incoming_per_second(details);
        let total_enemy_damage: f64 = groups.values().map(ProfessionGroup::damage).sum();
        let enemy_count: usize = groups.values().map(|g| g.targets.len()).sum();
        let (starts, downs, deaths) = squad_events(details);
        let all_starts = all_replay_starts(details);

        let mut values = BTreeMap::new();
        for (profession, group) in &groups {
            let per_second = group.own_series().unwrap_or_else(|| {
                let share = if total_enemy_damage > 0.0 {
                    group.damage() / total_enemy_damage
                } else if enemy_count > 0 {
                    group.targets.len() as f64 / enemy_count as f64
                } else {
                    0.0
                };
                squad_series.iter().map(|v| v * share).collect()
            });
            let count = bucket_count(details.duration_ms, per_second.len());
            let skill_rows = group.skill_rows(details);
            let damage: f64 = skill_rows.iter().map(|r| r.damage).sum();
            let down: f64 = skill_rows.iter().map(|r| r.down_contribution).sum();
            let value = BurstInput {
                peak: peak_from_entries(group.entries(), details),
                per_second,
                down_share: if damage > 0.0 {
                    (down / damage).clamp(0.0, 1.0)
                } else {
                    0.0
                },
                bucket_count: count,
                down_indices: marker_indices(&downs, &starts, &all_starts, count, details.duration_ms),
                death_indices: marker_indices(&deaths, &starts, &all_starts, count, details.duration_ms),
                skill_rows,
            }
            .into_value();

            let entry = self
                .professions
                .entry(profession.clone())
                .or_insert_with(|| IncomingStrikeProfession {
                    profession: profession.clone(),
                    color: profession_color(profession).to_string(),
                    ..Default::default()
                });
            entry.logs += 1;
            if value.hit > entry.peak_hit {
                entry.peak_hit = value.hit;
                entry.peak_fight_label = fight.full_label.clone();
                entry.peak_skill_name = value.skill_name.clone();
            }
            entry.peak_1s = entry.peak_1s.max(value.burst_1s);
            entry.peak_5s = entry.peak_5s.max(value.burst_5s);
            entry.peak_30s = entry.peak_30s.max(value.burst_30s);

            values.insert(profession.clone(), value);
        }

        self.fights.push(spike_fight(fight, values));
    }

    pub fn finish(self) -> IncomingStrikeDamage {
        let mut professions: Vec<IncomingStrikeProfession> =
            self.professions.into_values().collect();
        professions.sort_by(|a, b| {
            b.peak_hit
                .total_cmp(&a.peak_hit)
                .then_with(|| a.profession.cmp(&b.profession))
        });
        IncomingStrikeDamage {
            fights: self.fights,
            professions,
        }
    }
}
