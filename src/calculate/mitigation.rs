//! Damage-mitigation estimates for squad players and their minions.
//!
//! Fights that ship a mitigation table are read as-is. Otherwise each
//! avoided hit (block, evade, miss, invuln, interrupt; glances count half)
//! is priced against a baseline of enemy skill damage built once from
//! every fight's target damage distributions.

use std::collections::{BTreeMap, HashMap};

use super::fights::FightView;
use super::players::PlayerTable;
use crate::models::{DamageEntry, MitigationEntry, MitigationRow, MitigationTotals, UNKNOWN};
use crate::professions::resolve_profession_label;

/// Average and minimum damage per enemy skill across all fights.
#[derive(Debug, Clone, Copy, Default)]
struct SkillBaseline {
    total_damage: f64,
    connected_hits: f64,
    min_total: f64,
    min_count: f64,
}

impl SkillBaseline {
    fn average(&self) -> f64 {
        if self.connected_hits > 0.0 {
            self.total_damage / self.connected_hits
        } else {
            0.0
        }
    }

    fn minimum(&self) -> f64 {
        if self.min_count > 0.0 {
            self.min_total / self.min_count
        } else {
            0.0
        }
    }
}

/// Hit-outcome counters accumulated per (row, skill) before pricing.
#[derive(Debug, Clone, Copy, Default)]
struct OutcomeCounts {
    hits: f64,
    blocked: f64,
    evaded: f64,
    glanced: f64,
    missed: f64,
    invulned: f64,
    interrupted: f64,
}

impl OutcomeCounts {
    fn from_entry(entry: &DamageEntry) -> Self {
        Self {
            hits: entry.hits,
            blocked: entry.blocked,
            evaded: entry.evaded,
            glanced: entry.glance,
            missed: entry.missed,
            invulned: entry.invulned,
            interrupted: entry.interrupted,
        }
    }

    fn add(&mut self, other: &OutcomeCounts) {
        self.hits += other.hits;
        self.blocked += other.blocked;
        self.evaded += other.evaded;
        self.glanced += other.glanced;
        self.missed += other.missed;
        self.invulned += other.invulned;
        self.interrupted += other.interrupted;
    }

    /// Damage avoided if every avoided hit had landed for `per_hit`.
    fn avoided(&self, per_hit: f64) -> f64 {
        let full = self.blocked + self.evaded + self.missed + self.invulned + self.interrupted;
        self.glanced * per_hit / 2.0 + full * per_hit
    }
}

fn add_entry(totals: &mut MitigationTotals, entry: &MitigationEntry) {
    totals.total_hits += entry.skill_hits;
    totals.blocked += entry.blocked;
    totals.evaded += entry.evaded;
    totals.glanced += entry.glanced;
    totals.missed += entry.missed;
    totals.invulned += entry.invulned;
    totals.interrupted += entry.interrupted;
    totals.total_mitigation += entry.avoided_damage;
    totals.min_mitigation += entry.min_avoided_damage;
}

/// Identity parsed from a `"name|profession|account"` table key.
#[derive(Debug, Clone, PartialEq)]
struct RowIdentity {
    name: String,
    profession: String,
    account: String,
}

fn parse_key(raw: &str) -> RowIdentity {
    let mut parts = raw.split('|');
    let name = parts
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or(UNKNOWN)
        .to_string();
    let profession = resolve_profession_label(parts.next().filter(|s| !s.is_empty()));
    let account = parts
        .next()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| name.clone());
    RowIdentity { name, profession, account }
}

/// `Juvenile` pets share a row with their adult form.
pub fn normalize_minion_name(raw: Option<&str>) -> String {
    let raw = raw.unwrap_or(UNKNOWN);
    let stripped = match raw.get(..9) {
        Some(prefix) if prefix.eq_ignore_ascii_case("juvenile ") => raw[9..].trim_start(),
        _ => raw,
    };
    if stripped.is_empty() || stripped.to_uppercase().contains("UNKNOWN") {
        UNKNOWN.to_string()
    } else {
        stripped.to_string()
    }
}

fn ensure_row<'m>(
    rows: &'m mut BTreeMap<String, MitigationRow>,
    key: &str,
    identity: &RowIdentity,
    minion: Option<&str>,
) -> &'m mut MitigationRow {
    let row = rows.entry(key.to_string()).or_insert_with(|| MitigationRow {
        account: identity.account.clone(),
        name: identity.name.clone(),
        profession: identity.profession.clone(),
        profession_list: vec![identity.profession.clone()],
        minion: minion.map(str::to_string),
        ..Default::default()
    });
    if !row.profession_list.contains(&identity.profession) {
        row.profession_list.push(identity.profession.clone());
    }
    row
}

/// Folds fights into player and minion mitigation rows.
#[derive(Debug, Default)]
pub struct MitigationAnalyzer {
    baselines: HashMap<i64, SkillBaseline>,
    players: BTreeMap<String, MitigationRow>,
    minions: BTreeMap<String, MitigationRow>,
    player_counts: BTreeMap<String, HashMap<i64, OutcomeCounts>>,
    minion_counts: BTreeMap<String, HashMap<i64, OutcomeCounts>>,
}

impl MitigationAnalyzer {
    /// Build the enemy skill baseline from every fight's targets (phase 0).
    pub fn new(fights: &[FightView<'_>]) -> Self {
        let mut baselines: HashMap<i64, SkillBaseline> = HashMap::new();
        for fight in fights {
            for target in &fight.details.targets {
                let Some(entries) = target.total_damage_dist.first() else {
                    continue;
                };
                for entry in entries.iter().filter(|e| e.id != 0) {
                    let bucket = baselines.entry(entry.id).or_default();
                    bucket.total_damage += entry.total_damage;
                    bucket.connected_hits += entry.connected_hits;
                    bucket.min_total += entry.min.filter(|m| m.is_finite()).unwrap_or(0.0);
                    bucket.min_count += 1.0;
                }
            }
        }
        Self {
            baselines,
            ..Default::default()
        }
    }

    pub fn add_fight(&mut self, fight: &FightView<'_>) {
        let details = fight.details;

        for (raw_key, skills) in &details.player_damage_mitigation {
            let identity = parse_key(raw_key);
            let row = ensure_row(&mut self.players, &identity.account, &identity, None);
            for entry in skills.values().filter(|e| e.avoided_damage > 0.0) {
                add_entry(&mut row.mitigation_totals, entry);
            }
        }

        for (raw_key, minions) in &details.player_minion_damage_mitigation {
            let identity = parse_key(raw_key);
            for (minion, skills) in minions {
                let minion = if minion.is_empty() { UNKNOWN } else { minion.as_str() };
                let key = format!("{}::{}", identity.account, minion);
                let row = ensure_row(&mut self.minions, &key, &identity, Some(minion));
                for entry in skills.values() {
                    add_entry(&mut row.mitigation_totals, entry);
                }
            }
        }

        let derive_players = details.player_damage_mitigation.is_empty();
        let derive_minions = details.player_minion_damage_mitigation.is_empty();
        if !derive_players && !derive_minions {
            return;
        }

        for player in details.squad_players() {
            let account = player.key();
            let identity = RowIdentity {
                name: player.name.clone().unwrap_or_else(|| account.clone()),
                profession: resolve_profession_label(player.profession.as_deref()),
                account: account.clone(),
            };

            if derive_players && !player.total_damage_taken.is_empty() {
                ensure_row(&mut self.players, &account, &identity, None);
                if let Some(entries) = player.total_damage_taken.first() {
                    let counts = self.player_counts.entry(account.clone()).or_default();
                    fold_counts(counts, entries);
                }
            }

            if derive_minions {
                for minion in &player.minions {
                    if minion.total_damage_taken_dist.is_empty() {
                        continue;
                    }
                    let name = normalize_minion_name(minion.name.as_deref());
                    let key = format!("{}::{}", account, name);
                    ensure_row(&mut self.minions, &key, &identity, Some(&name));
                    if let Some(entries) = minion.total_damage_taken_dist.first() {
                        let counts = self.minion_counts.entry(key).or_default();
                        fold_counts(counts, entries);
                    }
                }
            }
        }
    }

    /// Price derived counters, hydrate profession and active time from the
    /// player table, and drop rows with nothing to show.
    pub fn finish(mut self, table: &PlayerTable) -> (Vec<MitigationRow>, Vec<MitigationRow>) {
        price_counts(&self.baselines, &self.player_counts, &mut self.players);
        price_counts(&self.baselines, &self.minion_counts, &mut self.minions);

        let hydrate = |mut row: MitigationRow| -> MitigationRow {
            if let Some(stat) = table.get(&row.account) {
                let list: Vec<String> = stat
                    .profession_list()
                    .into_iter()
                    .filter(|p| p != UNKNOWN)
                    .collect();
                row.profession = stat.primary_profession();
                if !list.is_empty() {
                    row.profession_list = list;
                }
                if stat.active_ms > 0.0 {
                    row.active_ms = stat.active_ms;
                } else if stat.total_fight_ms > 0.0 {
                    row.active_ms = stat.total_fight_ms;
                }
            }
            row
        };

        let mut players: Vec<MitigationRow> = self
            .players
            .into_values()
            .map(hydrate)
            .filter(|row| row.mitigation_totals.any_positive())
            .collect();
        players.sort_by(|a, b| a.account.cmp(&b.account));

        let mut minions: Vec<MitigationRow> = self
            .minions
            .into_values()
            .map(hydrate)
            .filter(|row| row.mitigation_totals.total_mitigation > 0.0)
            .collect();
        minions.sort_by(|a, b| a.account.cmp(&b.account).then_with(|| a.minion.cmp(&b.minion)));

        (players, minions)
    }
}

fn fold_counts(counts: &mut HashMap<i64, OutcomeCounts>, entries: &[DamageEntry]) {
    for entry in entries.iter().filter(|e| e.id != 0) {
        counts
            .entry(entry.id)
            .or_default()
            .add(&OutcomeCounts::from_entry(entry));
    }
}

/// Skills without an observed enemy baseline, or whose estimate is not
/// positive, contribute nothing.
fn price_counts(
    baselines: &HashMap<i64, SkillBaseline>,
    counts: &BTreeMap<String, HashMap<i64, OutcomeCounts>>,
    rows: &mut BTreeMap<String, MitigationRow>,
) {
    for (row_key, skills) in counts {
        let Some(row) = rows.get_mut(row_key) else {
            continue;
        };
        let totals = &mut row.mitigation_totals;
        for (skill_id, c) in skills {
            let Some(baseline) = baselines.get(skill_id) else {
                continue;
            };
            if baseline.connected_hits <= 0.0 {
                continue;
            }
            let avoid = c.avoided(baseline.average());
            if avoid <= 0.0 {
                continue;
            }
            totals.total_hits += c.hits;
            totals.blocked += c.blocked;
            totals.evaded += c.evaded;
            totals.glanced += c.glanced;
            totals.missed += c.missed;
            totals.invulned += c.invulned;
            totals.interrupted += c.interrupted;
            totals.total_mitigation += avoid;
            totals.min_mitigation += c.avoided(baseline.minimum());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculate::fights::prepare_fights;
    use crate::models::FightRecord;
    use serde_json::json;

    fn record(details: serde_json::Value) -> FightRecord {
        serde_json::from_value(json!({ "id": "f", "details": details })).unwrap()
    }

    #[test]
    fn test_parse_key_and_minion_names() {
        let id = parse_key("Guard|Firebrand|guard.1234");
        assert_eq!(id.name, "Guard");
        assert_eq!(id.account, "guard.1234");
        let id = parse_key("Solo");
        assert_eq!(id.account, "Solo");
        assert_eq!(normalize_minion_name(Some("Juvenile Jungle Stalker")), "Jungle Stalker");
        assert_eq!(normalize_minion_name(Some("UNKNOWN minion")), "Unknown");
        assert_eq!(normalize_minion_name(None), "Unknown");
    }

    #[test]
    fn test_derives_from_global_baseline() {
        let records = vec![record(json!({
            "durationMS": 60000,
            "players": [{
                "account": "a.1", "name": "A", "profession": "Scrapper",
                "totalDamageTaken": [[
                    { "id": 10, "hits": 8, "blocked": 2, "evaded": 1, "glance": 2 },
                    { "id": 99, "hits": 3, "blocked": 3 }
                ]],
                "minions": [{
                    "name": "Juvenile Bear",
                    "totalDamageTakenDist": [[{ "id": 10, "hits": 1, "missed": 1 }]]
                }]
            }],
            "targets": [{
                "name": "Enemy",
                "totalDamageDist": [[
                    { "id": 10, "totalDamage": 1000, "connectedHits": 10, "min": 40 },
                    { "id": 99, "totalDamage": 0, "connectedHits": 0, "min": 0 }
                ]]
            }]
        }))];
        let fights = prepare_fights(&records);
        let mut analyzer = MitigationAnalyzer::new(&fights);
        for fight in &fights {
            analyzer.add_fight(fight);
        }
        let (players, minions) = analyzer.finish(&PlayerTable::default());

        assert_eq!(players.len(), 1);
        let totals = &players[0].mitigation_totals;
        // avg 100: (2 + 1) * 100 + 2 * 100 / 2
        assert!((totals.total_mitigation - 400.0).abs() < 0.001);
        // min 40: (2 + 1) * 40 + 2 * 40 / 2
        assert!((totals.min_mitigation - 160.0).abs() < 0.001);
        // skill 99 has no observed hits and adds nothing
        assert!((totals.blocked - 2.0).abs() < 0.001);
        assert!((totals.total_hits - 8.0).abs() < 0.001);

        assert_eq!(minions.len(), 1);
        assert_eq!(minions[0].minion.as_deref(), Some("Bear"));
        assert!((minions[0].mitigation_totals.total_mitigation - 100.0).abs() < 0.001);
    }

    #[test]
    fn test_precomputed_table_is_used_directly() {
        let records = vec![record(json!({
            "durationMS": 30000,
            "players": [{ "account": "a.1", "name": "A", "profession": "Firebrand" }],
            "player_damage_mitigation": {
                "A|Firebrand|a.1": {
                    "s5": { "skill_hits": 4, "blocked": 1, "avoided_damage": 900, "min_avoided_damage": 300 },
                    "s6": { "skill_hits": 9, "avoided_damage": 0 }
                }
            }
        }))];
        let fights = prepare_fights(&records);
        let mut analyzer = MitigationAnalyzer::new(&fights);
        analyzer.add_fight(&fights[0]);
        let (players, minions) = analyzer.finish(&PlayerTable::default());

        assert_eq!(players.len(), 1);
        assert_eq!(players[0].account, "a.1");
        let totals = &players[0].mitigation_totals;
        assert!((totals.total_mitigation - 900.0).abs() < 0.001);
        assert!((totals.min_mitigation - 300.0).abs() < 0.001);
        assert!((totals.total_hits - 4.0).abs() < 0.001);
        assert!(minions.is_empty());
    }
}
