//! Attendance ledger: who showed up, on what, and for how long.

use std::collections::BTreeMap;

use super::fights::FightView;
use super::players::primary_profession;
use crate::models::{AttendanceRow, PlayerEntry, UNKNOWN};

#[derive(Debug, Default)]
struct Attendee {
    account: String,
    fallback_profession: String,
    character_names: Vec<String>,
    professions: Vec<String>,
    profession_time_ms: BTreeMap<String, f64>,
    combat_time_ms: f64,
    /// Summed fight durations, used when timestamps are unknown
    fight_time_ms: f64,
    fights: usize,
    first_seen: f64,
    last_seen: f64,
    last_duration_ms: f64,
}

impl Attendee {
    fn note(&mut self, player: &PlayerEntry, fight: &FightView<'_>) {
        let active_ms = player.active_ms(fight.duration_ms);
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
        self.combat_time_ms += active_ms;
        self.fight_time_ms += fight.duration_ms;
        self.fights += 1;

        if fight.timestamp > 0.0 {
            if self.first_seen <= 0.0 || fight.timestamp < self.first_seen {
                self.first_seen = fight.timestamp;
            }
            if fight.timestamp >= self.last_seen {
                self.last_seen = fight.timestamp;
                self.last_duration_ms = fight.duration_ms;
            }
        }
    }

    /// First fight start to last fight end.
    fn squad_time_ms(&self) -> f64 {
        if self.first_seen > 0.0 {
            (self.last_seen + self.last_duration_ms - self.first_seen).max(0.0)
        } else {
            self.fight_time_ms
        }
    }

    fn into_row(self) -> AttendanceRow {
        AttendanceRow {
            squad_time_ms: self.squad_time_ms(),
            profession: primary_profession(
                &self.professions,
                &self.profession_time_ms,
                &self.fallback_profession,
            ),
            account: self.account,
            character_names: self.character_names,
            profession_list: self.professions,
            profession_time_ms: self.profession_time_ms,
            combat_time_ms: self.combat_time_ms,
            fights: self.fights,
            first_seen: self.first_seen,
            last_seen: self.last_seen,
        }
    }
}

/// Cross-fight attendance accumulator over squad members.
#[derive(Debug, Default)]
pub struct AttendanceLedger {
    attendees: BTreeMap<String, Attendee>,
}

impl AttendanceLedger {
    pub fn add_fight(&mut self, fight: &FightView<'_>) {
        for player in fight.details.squad_players() {
            let key = player.key();
            self.attendees
                .entry(key.clone())
                .or_insert_with(|| Attendee {
                    account: key,
                    fallback_profession: player.profession_or_unknown().to_string(),
                    ..Default::default()
                })
                .note(player, fight);
        }
    }

    /// Rows with the longest squad time first.
    pub fn finish(self) -> Vec<AttendanceRow> {
        let mut rows: Vec<AttendanceRow> =
            self.attendees.into_values().map(Attendee::into_row).collect();
        rows.sort_by(|a, b| {
            b.squad_time_ms
                .total_cmp(&a.squad_time_ms)
                .then_with(|| b.combat_time_ms.total_cmp(&a.combat_time_ms))
                .then_with(|| a.account.cmp(&b.account))
        });
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculate::fights::prepare_fights;
    use crate::models::FightRecord;
    use serde_json::{json, Value};

    const HOUR_MS: f64 = 3_600_000.0;

    fn run(values: Vec<Value>) -> Vec<AttendanceRow> {
        let records: Vec<FightRecord> = values
            .into_iter()
            .map(|v| serde_json::from_value(v).unwrap())
            .collect();
        let fights = prepare_fights(&records);
        let mut ledger = AttendanceLedger::default();
        for fight in &fights {
            ledger.add_fight(fight);
        }
        ledger.finish()
    }

    #[test]
    fn test_back_to_back_fights_span_matches_combat() {
        let rows = run(vec![
            json!({ "details": { "timeStartStd": "2026-01-01T10:00:00Z", "durationMS": HOUR_MS,
                "players": [{ "account": "a.1", "name": "Alpha", "profession": "Firebrand" }] } }),
            json!({ "details": { "timeStartStd": "2026-01-01T11:00:00Z", "durationMS": HOUR_MS,
                "players": [{ "account": "a.1", "name": "Alpha Two", "profession": "Scrapper" }] } }),
        ]);
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert!((row.combat_time_ms - 2.0 * HOUR_MS).abs() < 0.001);
        assert!((row.squad_time_ms - 2.0 * HOUR_MS).abs() < 0.001);
        assert_eq!(row.character_names, vec!["Alpha".to_string(), "Alpha Two".to_string()]);
        assert_eq!(row.profession_list.len(), 2);
        assert_eq!(row.fights, 2);
    }

    #[test]
    fn test_skipped_fights_widen_squad_span() {
        let player = json!({ "account": "a.1", "profession": "Firebrand", "activeTimes": [600000] });
        let rows = run(vec![
            json!({ "details": { "timeStartStd": "2026-01-01T10:00:00Z", "durationMS": 600000, "players": [player] } }),
            json!({ "details": { "timeStartStd": "2026-01-01T10:30:00Z", "durationMS": 600000,
                "players": [{ "account": "b.1" }] } }),
            json!({ "details": { "timeStartStd": "2026-01-01T11:00:00Z", "durationMS": 600000, "players": [player] } }),
        ]);
        let row = rows.iter().find(|r| r.account == "a.1").unwrap();
        assert!((row.combat_time_ms - 1_200_000.0).abs() < 0.001);
        // 10:00 to 11:10
        assert!((row.squad_time_ms - 4_200_000.0).abs() < 0.001);
        assert_eq!(rows[0].account, "a.1");
    }
}
