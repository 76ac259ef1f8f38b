//! Per-call aggregation options.
//!
//! These double as the `[aggregation]` section of the TOML config, so every
//! field carries a serde default and a partial table is always valid.

use serde::{Deserialize, Serialize};

use super::StatsAggregate;

/// How disruption stats (CC, strips, cleanses) are scored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisruptionMethod {
    /// Raw event count
    #[default]
    Count,
    /// Total duration in seconds
    Duration,
    /// Count weighted by average event duration
    Tiered,
}

impl std::str::FromStr for DisruptionMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "count" => Ok(Self::Count),
            "duration" => Ok(Self::Duration),
            "tiered" => Ok(Self::Tiered),
            other => Err(format!("unknown disruption method: {other}")),
        }
    }
}

/// Which damage distribution is authoritative for skill tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillDamageSource {
    #[default]
    Target,
    Total,
}

impl std::str::FromStr for SkillDamageSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "target" => Ok(Self::Target),
            "total" => Ok(Self::Total),
            other => Err(format!("unknown skill damage source: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TopSkillsMetric {
    #[default]
    Damage,
    DownContribution,
}

/// Toggles for optional output slices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewSettings {
    #[serde(default = "default_true", alias = "show_top_stats")]
    pub show_top_stats: bool,

    #[serde(default = "default_true", alias = "show_mvp")]
    pub show_mvp: bool,

    #[serde(default, alias = "skill_damage_source", alias = "topSkillDamageSource")]
    pub skill_damage_source: SkillDamageSource,

    #[serde(default, alias = "top_skills_metric")]
    pub top_skills_metric: TopSkillsMetric,

    #[serde(default, alias = "disruption_method")]
    pub disruption_method: DisruptionMethod,
}

fn default_true() -> bool {
    true
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            show_top_stats: true,
            show_mvp: true,
            skill_damage_source: SkillDamageSource::default(),
            top_skills_metric: TopSkillsMetric::default(),
            disruption_method: DisruptionMethod::default(),
        }
    }
}

/// MVP metric weights. A weight of zero removes the metric from scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MvpWeights {
    #[serde(default = "default_primary_weight", alias = "down_contribution")]
    pub down_contribution: f64,
    #[serde(default = "default_primary_weight")]
    pub healing: f64,
    #[serde(default = "default_primary_weight")]
    pub cleanses: f64,
    #[serde(default = "default_primary_weight")]
    pub strips: f64,
    #[serde(default = "default_primary_weight")]
    pub stability: f64,
    #[serde(default = "default_secondary_weight")]
    pub cc: f64,
    #[serde(default = "default_secondary_weight")]
    pub revives: f64,
    #[serde(default = "default_secondary_weight", alias = "distance_to_tag")]
    pub distance_to_tag: f64,
    #[serde(default = "default_secondary_weight")]
    pub participation: f64,
    #[serde(default = "default_minor_weight")]
    pub dodging: f64,
    #[serde(default)]
    pub dps: f64,
    #[serde(default)]
    pub damage: f64,
}

fn default_primary_weight() -> f64 {
    1.0
}

fn default_secondary_weight() -> f64 {
    0.7
}

fn default_minor_weight() -> f64 {
    0.4
}

impl Default for MvpWeights {
    fn default() -> Self {
        Self {
            down_contribution: default_primary_weight(),
            healing: default_primary_weight(),
            cleanses: default_primary_weight(),
            strips: default_primary_weight(),
            stability: default_primary_weight(),
            cc: default_secondary_weight(),
            revives: default_secondary_weight(),
            distance_to_tag: default_secondary_weight(),
            participation: default_secondary_weight(),
            dodging: default_minor_weight(),
            dps: 0.0,
            damage: 0.0,
        }
    }
}

impl MvpWeights {
    pub fn values(&self) -> [f64; 12] {
        [
            self.down_contribution,
            self.healing,
            self.cleanses,
            self.strips,
            self.stability,
            self.cc,
            self.revives,
            self.distance_to_tag,
            self.participation,
            self.dodging,
            self.dps,
            self.damage,
        ]
    }
}

/// Average-duration thresholds for [`DisruptionMethod::Tiered`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisruptionTiers {
    #[serde(default = "default_short_ms")]
    pub short_ms: f64,
    #[serde(default = "default_medium_ms")]
    pub medium_ms: f64,
    #[serde(default = "default_short_weight")]
    pub short_weight: f64,
    #[serde(default = "default_medium_weight")]
    pub medium_weight: f64,
    #[serde(default = "default_long_weight")]
    pub long_weight: f64,
}

fn default_short_ms() -> f64 {
    1000.0
}

fn default_medium_ms() -> f64 {
    3000.0
}

fn default_short_weight() -> f64 {
    0.5
}

fn default_medium_weight() -> f64 {
    1.0
}

fn default_long_weight() -> f64 {
    1.5
}

impl Default for DisruptionTiers {
    fn default() -> Self {
        Self {
            short_ms: default_short_ms(),
            medium_ms: default_medium_ms(),
            short_weight: default_short_weight(),
            medium_weight: default_medium_weight(),
            long_weight: default_long_weight(),
        }
    }
}

/// Everything a single aggregation call can be tuned with.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateOptions {
    /// Keep the per-player `skillMap` lookup in skill breakdowns.
    #[serde(default, alias = "retain_skill_map")]
    pub retain_skill_map: bool,

    #[serde(default, alias = "statsViewSettings")]
    pub view: ViewSettings,

    #[serde(default, alias = "mvp_weights")]
    pub mvp_weights: MvpWeights,

    #[serde(default)]
    pub tiers: DisruptionTiers,

    /// Previously computed aggregate to pass through instead of recomputing.
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "precomputed_stats")]
    pub precomputed_stats: Option<Box<StatsAggregate>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = AggregateOptions::default();
        assert!(options.view.show_mvp);
        assert!(options.view.show_top_stats);
        assert_eq!(options.view.skill_damage_source, SkillDamageSource::Target);
        assert_eq!(options.view.disruption_method, DisruptionMethod::Count);
        assert_eq!(options.mvp_weights.dps, 0.0);
        assert_eq!(options.tiers.medium_ms, 3000.0);
    }

    #[test]
    fn test_partial_options_json() {
        let options: AggregateOptions = serde_json::from_str(
            r#"{ "view": { "showMvp": false, "disruptionMethod": "tiered" }, "mvpWeights": { "dps": 0.5 } }"#,
        )
        .unwrap();
        assert!(!options.view.show_mvp);
        assert_eq!(options.view.disruption_method, DisruptionMethod::Tiered);
        assert_eq!(options.mvp_weights.dps, 0.5);
        assert_eq!(options.mvp_weights.healing, 1.0);
    }

    #[test]
    fn test_parse_method_names() {
        assert_eq!("Duration".parse::<DisruptionMethod>(), Ok(DisruptionMethod::Duration));
        assert_eq!("total".parse::<SkillDamageSource>(), Ok(SkillDamageSource::Total));
        assert!("bogus".parse::<DisruptionMethod>().is_err());
    }
}
