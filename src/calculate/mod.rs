//! Statistics aggregation engine.
//!
//! Turns a collection of parsed fight records into one [`StatsAggregate`]:
//! - Fight ordering, outcomes and the squad overview
//! - Cross-fight player totals, leaderboards and MVP scoring
//! - Reconciled skill damage, conditions and boon tables/timelines
//! - Damage mitigation, burst damage and incoming strikes
//! - Commander analytics, fight breakdown/diff rows and attendance
//!
//! Every pass is a pure fold over the ordered valid fights. The only global
//! prerequisite is the enemy skill baseline used by mitigation, built before
//! the main loop.

pub mod attendance;
pub mod boons;
pub mod breakdown;
pub mod commander;
pub mod conditions;
pub mod fights;
pub mod incoming;
pub mod leaderboard;
pub mod mitigation;
pub mod mvp;
pub mod players;
pub mod precomputed;
pub mod skills;
pub mod spike;
pub mod timestamp;
pub mod usage;

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::models::{AggregateOptions, AggregateResult, FightRecord, StatsAggregate};

use attendance::AttendanceLedger;
use boons::{BoonTableBuilder, BoonTimelines};
use commander::CommanderTracker;
use conditions::ConditionTotals;
use fights::{apply_overview, prepare_fights, FightView};
use incoming::IncomingStrikeTracker;
use mitigation::MitigationAnalyzer;
use players::{PlayerTable, SpecialBuffs};
use skills::SkillTables;
use spike::SpikeTracker;
use usage::SkillUsageTracker;

/// Input-contract violations. Malformed optional fields never error; they
/// read as zero or absent.
#[derive(Error, Debug)]
pub enum AggregateError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Fight records from a JSON array, or from an object carrying a `logs`
/// array. Entries that are not objects are skipped.
pub fn records_from_value(value: Value) -> Result<Vec<FightRecord>, AggregateError> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut obj) => match obj.remove("logs") {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(AggregateError::InvalidInput(
                    "expected an array of fight records or an object with a `logs` array".to_string(),
                ))
            }
        },
        other => {
            return Err(AggregateError::InvalidInput(format!(
                "expected an array of fight records, got {}",
                json_kind(&other)
            )))
        }
    };
    let mut records = Vec::with_capacity(items.len());
    for item in items.into_iter().filter(Value::is_object) {
        records.push(serde_json::from_value(item)?);
    }
    Ok(records)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Aggregate a JSON value (see [`records_from_value`]).
pub fn compute_stats_from_value(
    value: Value,
    options: &AggregateOptions,
) -> Result<AggregateResult, AggregateError> {
    let records = records_from_value(value)?;
    Ok(compute_stats(&records, options))
}

/// Aggregate raw JSON text.
pub fn compute_stats_from_str(
    text: &str,
    options: &AggregateOptions,
) -> Result<AggregateResult, AggregateError> {
    let value: Value = serde_json::from_str(text)?;
    compute_stats_from_value(value, options)
}

/// Aggregate a collection of fight records.
///
/// A precomputed aggregate in `options` is passed through with its gaps
/// patched instead of being recomputed. Skill usage is always rebuilt.
pub fn compute_stats(records: &[FightRecord], options: &AggregateOptions) -> AggregateResult {
    let fights = prepare_fights(records);
    info!(
        records = records.len(),
        valid = fights.len(),
        placeholders = records.len() - fights.len(),
        "Aggregating fights"
    );

    let mut usage = SkillUsageTracker::default();
    for fight in &fights {
        usage.add_fight(fight);
    }

    let stats = match &options.precomputed_stats {
        Some(precomputed) => {
            info!("Using precomputed aggregate");
            precomputed::enrich_precomputed((**precomputed).clone(), records)
        }
        None => aggregate(records, &fights, options),
    };

    info!(
        total = stats.total,
        players = stats.attendance.len(),
        mvp = %stats.mvp.account,
        "Aggregation complete"
    );

    AggregateResult {
        valid_fight_count: fights.len(),
        stats,
        skill_usage_data: usage.finish(),
    }
}

fn aggregate(records: &[FightRecord], fights: &[FightView<'_>], options: &AggregateOptions) -> StatsAggregate {
    let view = &options.view;
    let source = view.skill_damage_source;

    let mut table = PlayerTable::default();
    let mut specials = SpecialBuffs::default();
    let mut condition_totals = ConditionTotals::default();
    let mut skills = SkillTables::default();
    let mut boon_tables = BoonTableBuilder::default();
    let mut boon_timelines = BoonTimelines::default();
    let mut mitigation = MitigationAnalyzer::new(fights);
    let mut spikes = SpikeTracker::default();
    let mut incoming = IncomingStrikeTracker::default();
    let mut commanders = CommanderTracker::default();
    let mut attendance = AttendanceLedger::default();

    for fight in fights {
        debug!(
            fight = %fight.fight_id,
            squad = fight.squad_count,
            duration_ms = fight.duration_ms,
            "Accumulating fight"
        );
        players::accumulate_fight(fight, options, &mut table, &mut specials, &mut condition_totals);
        conditions::accumulate_outgoing(fight, &mut condition_totals, &mut table);
        conditions::accumulate_incoming(fight, &mut condition_totals, &mut table);
        skills.add_fight(fight, source);
        boon_tables.add_fight(fight);
        boon_timelines.add_fight(fight);
        mitigation.add_fight(fight);
        spikes.add_fight(fight, source);
        incoming.add_fight(fight);
        commanders.add_fight(fight);
        attendance.add_fight(fight);
    }

    let mut stats = StatsAggregate::default();
    apply_overview(fights, &mut stats);

    let boards = leaderboard::total_leaderboards(&table);
    let per_second = leaderboard::per_second_leaderboards(&table);
    if view.show_top_stats {
        stats.top_stats = leaderboard::top_stats(&boards);
        stats.top_stats_per_second = leaderboard::top_stats(&per_second);
    }
    if view.show_mvp {
        let result = mvp::compute_mvp(&table, &boards, &options.mvp_weights);
        stats.mvp = result.mvp;
        stats.silver = result.silver;
        stats.bronze = result.bronze;
        stats.avg_mvp_score = result.avg_mvp_score;
    }
    stats.leaderboards = boards;
    stats.top_stats_leaderboards_per_second = per_second;

    stats.outgoing_condition_summary = condition_totals.outgoing_summary();
    stats.incoming_condition_summary = condition_totals.incoming_summary();
    stats.outgoing_condition_players = conditions::condition_player_rows(&table, false);
    stats.incoming_condition_players = conditions::condition_player_rows(&table, true);

    stats.top_skills = skills.top_skills(view.top_skills_metric);
    stats.top_incoming_skills = skills.top_incoming_skills();
    stats.player_skill_breakdowns = skills.player_breakdowns(options.retain_skill_map);
    stats.top_skills_metric = view.top_skills_metric;

    stats.map_data = breakdown::map_data(fights);
    stats.timeline_data = breakdown::timeline(records, fights);
    stats.squad_class_data = breakdown::squad_class_data(&table);
    stats.enemy_class_data = breakdown::enemy_class_data(fights);

    stats.boon_tables = boon_tables.tables();
    stats.boon_timeline = boon_timelines.generation_timelines();
    stats.boon_uptime_timeline = boon_timelines.uptime_timelines();
    stats.special_tables = specials.tables();

    stats.offense_players = players::offense_rows(&table);
    stats.defense_players = players::defense_rows(&table);
    stats.support_players = players::support_rows(&table);
    stats.healing_players = players::healing_rows(&table);

    let (mitigation_players, mitigation_minions) = mitigation.finish(&table);
    stats.damage_mitigation_players = mitigation_players;
    stats.damage_mitigation_minions = mitigation_minions;

    stats.fight_breakdown = breakdown::fight_breakdown(records, fights);
    stats.fight_diff = breakdown::fight_diff(fights);
    stats.spike_damage = spikes.finish();
    stats.incoming_strike_damage = incoming.finish();
    stats.commander_stats = commanders.finish();
    stats.attendance = attendance.finish();

    stats
}
