//! # Squad Stats
//!
//! Cross-fight statistics for squad PvP combat logs: leaderboards, MVP
//! scoring, skill and boon tables, damage mitigation, commander analytics
//! and attendance, computed from a collection of parsed fight records.
//!
//! ## Architecture
//!
//! - **models**: Input records (lenient deserialization) and the output aggregate
//! - **calculate**: The aggregation engine, one module per pass
//! - **batch**: Concurrent aggregation of independent collections
//! - **format**: Label normalization and number/duration formatting
//! - **professions**: Profession names, colours and label resolution
//! - **storage**: Loading fight records and writing aggregates (JSON, JSONL)
//! - **api**: REST API endpoints
//! - **config**: Configuration loading and validation

pub mod api;
pub mod batch;
pub mod calculate;
pub mod config;
pub mod format;
pub mod models;
pub mod professions;
pub mod storage;

pub use calculate::{compute_stats, compute_stats_from_str, compute_stats_from_value, AggregateError};
pub use models::*;
