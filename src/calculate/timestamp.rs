//! Fight timestamp resolution and global fight ordering.
//!
//! All timestamps are epoch milliseconds; `0.0` means unknown.

use std::cmp::Ordering;
use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;

use crate::models::{FightRecord, RawTime};

/// Values at or below this are epoch seconds.
const SECONDS_CUTOFF: f64 = 1e12;

fn from_number(n: f64) -> f64 {
    if !n.is_finite() || n <= 0.0 {
        return 0.0;
    }
    if n > SECONDS_CUTOFF {
        n
    } else {
        n * 1000.0
    }
}

fn truncated_offset() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([+-]\d{2})$").unwrap())
}

fn parse_date_text(text: &str) -> Option<f64> {
    const ZONED: &[&str] = &[
        "%Y-%m-%d %H:%M:%S %:z",
        "%Y-%m-%d %H:%M:%S%:z",
        "%Y-%m-%d %H:%M:%S %z",
        "%Y-%m-%dT%H:%M:%S%.f%:z",
        "%Y-%m-%dT%H:%M:%S%.f%z",
    ];
    const NAIVE: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
    ];

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.timestamp_millis() as f64);
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt.timestamp_millis() as f64);
    }
    for fmt in ZONED {
        if let Ok(dt) = DateTime::parse_from_str(text, fmt) {
            return Some(dt.timestamp_millis() as f64);
        }
    }
    for fmt in NAIVE {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(dt.and_utc().timestamp_millis() as f64);
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis() as f64)
}

/// Normalize one raw timestamp to epoch milliseconds.
pub fn parse_timestamp(raw: &RawTime) -> f64 {
    match raw {
        RawTime::Number(n) => from_number(*n),
        RawTime::Text(text) => {
            let text = text.trim();
            if text.is_empty() {
                return 0.0;
            }
            if let Ok(n) = text.parse::<f64>() {
                if n.is_finite() && n > 0.0 {
                    return from_number(n);
                }
            }
            let parsed = parse_date_text(text).or_else(|| {
                let repaired = truncated_offset().replace(text, "$1:00");
                parse_date_text(&repaired)
            });
            match parsed {
                Some(ms) if ms.is_finite() && ms > 0.0 => ms,
                _ => 0.0,
            }
        }
    }
}

/// Start → end → text → upload time, first one that resolves wins.
pub fn resolve_fight_timestamp(record: &FightRecord) -> f64 {
    let details = record.details.as_ref();
    let candidates = [
        details.and_then(|d| d.time_start_std.as_ref()),
        details.and_then(|d| d.time_start.as_ref()),
        details.and_then(|d| d.time_end_std.as_ref()),
        details.and_then(|d| d.time_end.as_ref()),
        details.and_then(|d| d.time_start_text.as_ref()),
        details.and_then(|d| d.time_end_text.as_ref()),
        details.and_then(|d| d.upload_time.as_ref()),
        record.upload_time.as_ref(),
    ];
    candidates
        .into_iter()
        .flatten()
        .map(parse_timestamp)
        .find(|ms| *ms > 0.0)
        .unwrap_or(0.0)
}

/// Known timestamps ascending; known before unknown; otherwise input order.
pub fn compare_fight_order(a: (usize, f64), b: (usize, f64)) -> Ordering {
    match (a.1 > 0.0, b.1 > 0.0) {
        (true, true) => a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)),
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a.0.cmp(&b.0),
    }
}

/// `(input_index, timestamp)` for every record, in fight order.
pub fn order_records(records: &[FightRecord]) -> Vec<(usize, f64)> {
    let mut ordered: Vec<(usize, f64)> = records
        .iter()
        .enumerate()
        .map(|(i, r)| (i, resolve_fight_timestamp(r)))
        .collect();
    ordered.sort_by(|a, b| compare_fight_order(*a, *b));
    ordered
}
