//! Fight records: the unit of input to the aggregation engine.
//!
//! A [`FightRecord`] wraps one uploaded log. The parsed roster lives in
//! [`FightDetails`]; records whose details are missing (or carry no players)
//! are still accepted and only feed the fight-count views through their
//! [`DashboardSummary`].

use std::collections::HashMap;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::lenient;
use super::player::{PlayerEntry, TargetEntry};

/// A timestamp as found in the log: epoch number or free text.
#[derive(Debug, Clone, PartialEq)]
pub enum RawTime {
    Number(f64),
    Text(String),
}

fn opt_raw_time<'de, D: Deserializer<'de>>(d: D) -> Result<Option<RawTime>, D::Error> {
    let value = Value::deserialize(d)?;
    Ok(match value {
        Value::Number(n) => n.as_f64().map(RawTime::Number),
        Value::String(s) if !s.trim().is_empty() => Some(RawTime::Text(s.trim().to_string())),
        _ => None,
    })
}

/// One uploaded log.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FightRecord {
    #[serde(deserialize_with = "lenient::opt_string")]
    pub id: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub file_path: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub permalink: Option<String>,
    #[serde(deserialize_with = "opt_raw_time")]
    pub upload_time: Option<RawTime>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub encounter_name: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub fight_name: Option<String>,
    /// Pre-formatted duration label, e.g. `"01:30"`
    #[serde(deserialize_with = "lenient::opt_string")]
    pub encounter_duration: Option<String>,
    #[serde(deserialize_with = "lenient::opt_struct")]
    pub details: Option<FightDetails>,
    #[serde(deserialize_with = "lenient::opt_struct")]
    pub dashboard_summary: Option<DashboardSummary>,
}

impl FightRecord {
    /// Stable identifier: file path, then explicit id.
    pub fn record_id(&self) -> Option<&str> {
        self.file_path.as_deref().or(self.id.as_deref())
    }

    /// A fight with a non-empty roster; everything else is a placeholder.
    pub fn is_valid(&self) -> bool {
        self.details
            .as_ref()
            .is_some_and(|details| !details.players.is_empty())
    }

    pub fn valid_details(&self) -> Option<&FightDetails> {
        self.details
            .as_ref()
            .filter(|details| !details.players.is_empty())
    }
}

/// Coarse counts kept for logs uploaded without detailed roster data.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DashboardSummary {
    #[serde(deserialize_with = "lenient::number")]
    pub squad_count: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub enemy_count: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub squad_deaths: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub enemy_deaths: f64,
    #[serde(deserialize_with = "lenient::opt_flag")]
    pub is_win: Option<bool>,
}

/// Parsed log body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FightDetails {
    #[serde(rename = "durationMS", deserialize_with = "lenient::number")]
    pub duration_ms: f64,

    #[serde(deserialize_with = "opt_raw_time")]
    pub time_start_std: Option<RawTime>,
    #[serde(deserialize_with = "opt_raw_time")]
    pub time_start: Option<RawTime>,
    #[serde(deserialize_with = "opt_raw_time")]
    pub time_end_std: Option<RawTime>,
    #[serde(deserialize_with = "opt_raw_time")]
    pub time_end: Option<RawTime>,
    #[serde(deserialize_with = "opt_raw_time")]
    pub time_start_text: Option<RawTime>,
    #[serde(deserialize_with = "opt_raw_time")]
    pub time_end_text: Option<RawTime>,
    #[serde(deserialize_with = "opt_raw_time")]
    pub upload_time: Option<RawTime>,

    #[serde(deserialize_with = "lenient::opt_string")]
    pub fight_name: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub zone: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub map_name: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub map: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub location: Option<String>,

    #[serde(deserialize_with = "lenient::opt_string")]
    pub permalink: Option<String>,
    /// Strings or `{permalink|link|url|reportLink}` objects
    #[serde(deserialize_with = "lenient::seq")]
    pub upload_links: Vec<Value>,

    #[serde(deserialize_with = "lenient::opt_flag")]
    pub success: Option<bool>,
    #[serde(rename = "detailedWvW", alias = "detailedWvw", deserialize_with = "lenient::flag")]
    pub detailed_wvw: bool,

    #[serde(deserialize_with = "lenient::seq")]
    pub players: Vec<PlayerEntry>,
    #[serde(deserialize_with = "lenient::seq")]
    pub targets: Vec<TargetEntry>,

    #[serde(deserialize_with = "lenient::map")]
    pub skill_map: HashMap<String, SkillMeta>,
    #[serde(deserialize_with = "lenient::map")]
    pub buff_map: HashMap<String, BuffMeta>,

    #[serde(deserialize_with = "lenient::opt_struct")]
    pub combat_replay_meta_data: Option<ReplayMeta>,

    #[serde(deserialize_with = "lenient::opt_struct")]
    pub team_counts: Option<TeamCountsRaw>,

    /// `"name|profession|account" -> skill -> entry`
    #[serde(
        rename = "player_damage_mitigation",
        alias = "playerDamageMitigation",
        deserialize_with = "lenient::map"
    )]
    pub player_damage_mitigation: HashMap<String, HashMap<String, MitigationEntry>>,

    /// `"name|profession|account" -> minion -> skill -> entry`
    #[serde(
        rename = "player_minion_damage_mitigation",
        alias = "playerMinionDamageMitigation",
        deserialize_with = "lenient::map"
    )]
    pub player_minion_damage_mitigation:
        HashMap<String, HashMap<String, HashMap<String, MitigationEntry>>>,
}

impl FightDetails {
    pub fn squad_players(&self) -> impl Iterator<Item = &PlayerEntry> {
        self.players.iter().filter(|p| p.is_squad())
    }

    /// Allies outside the tracked squad.
    pub fn allies(&self) -> impl Iterator<Item = &PlayerEntry> {
        self.players.iter().filter(|p| p.not_in_squad)
    }

    pub fn enemy_targets(&self) -> impl Iterator<Item = &TargetEntry> {
        self.targets.iter().filter(|t| !t.is_fake)
    }

    pub fn skill(&self, id: i64) -> Option<&SkillMeta> {
        self.skill_map
            .get(&format!("s{id}"))
            .or_else(|| self.skill_map.get(&id.to_string()))
    }

    pub fn buff(&self, id: i64) -> Option<&BuffMeta> {
        self.buff_map
            .get(&format!("b{id}"))
            .or_else(|| self.buff_map.get(&id.to_string()))
    }

    pub fn skill_name(&self, id: i64) -> Option<&str> {
        self.skill(id).and_then(|s| s.name.as_deref())
    }

    pub fn buff_name(&self, id: i64) -> Option<&str> {
        self.buff(id).and_then(|b| b.name.as_deref())
    }

    /// Map-ish label candidates in priority order.
    pub fn raw_map_label(&self) -> Option<&str> {
        self.zone
            .as_deref()
            .or(self.map_name.as_deref())
            .or(self.map.as_deref())
            .or(self.location.as_deref())
            .or(self.fight_name.as_deref())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SkillMeta {
    #[serde(deserialize_with = "lenient::opt_string")]
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BuffMeta {
    #[serde(deserialize_with = "lenient::opt_string")]
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient::opt_string")]
    pub icon: Option<String>,
    #[serde(deserialize_with = "lenient::flag")]
    pub stacking: bool,
    /// `"Boon"`, `"Condition"`, ... ; absent for older parsers
    #[serde(deserialize_with = "lenient::opt_string")]
    pub classification: Option<String>,
}

impl BuffMeta {
    /// Unclassified buffs count as boons.
    pub fn is_boon(&self) -> bool {
        match self.classification.as_deref() {
            None => true,
            Some(c) => c == "Boon",
        }
    }

    pub fn is_condition(&self) -> bool {
        self.classification.as_deref() == Some("Condition")
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReplayMeta {
    #[serde(deserialize_with = "lenient::number")]
    pub inch_to_pixel: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub polling_rate: f64,
}

/// Explicit per-team enemy counts supplied by the uploader.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TeamCountsRaw {
    #[serde(alias = "r", deserialize_with = "lenient::number")]
    pub red: f64,
    #[serde(alias = "g", deserialize_with = "lenient::number")]
    pub green: f64,
    #[serde(alias = "b", deserialize_with = "lenient::number")]
    pub blue: f64,
}

/// One skill's precomputed avoided-damage record.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MitigationEntry {
    #[serde(alias = "skillHits", deserialize_with = "lenient::number")]
    pub skill_hits: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub blocked: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub evaded: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub glanced: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub missed: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub invulned: f64,
    #[serde(deserialize_with = "lenient::number")]
    pub interrupted: f64,
    #[serde(alias = "avoidedDamage", deserialize_with = "lenient::number")]
    pub avoided_damage: f64,
    #[serde(alias = "minAvoidedDamage", deserialize_with = "lenient::number")]
    pub min_avoided_damage: f64,
}
