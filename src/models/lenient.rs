//! Forgiving field deserializers for parser-produced JSON.
//!
//! Fight records come from an external log parser whose output drifts
//! between versions: numbers sometimes arrive as strings, arrays carry
//! `null` holes and whole sub-records can be missing. None of these
//! helpers fail. Anything unreadable becomes the field's default, and
//! array holes become defaulted entries so index positions survive
//! (ally and target indices are meaningful).

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Read a finite number out of an arbitrary JSON value.
pub fn to_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        Value::Bool(b) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn parse_or_default<T: DeserializeOwned + Default>(value: Value) -> T {
    serde_json::from_value(value).unwrap_or_default()
}

pub fn number<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    let value = Value::deserialize(d)?;
    Ok(to_number(&value).unwrap_or(0.0))
}

/// Like [`number`] but keeps "absent" distinct from zero.
pub fn opt_number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    let value = Value::deserialize(d)?;
    Ok(to_number(&value))
}

pub fn int<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
    let value = Value::deserialize(d)?;
    Ok(to_number(&value).map(|n| n as i64).unwrap_or(0))
}

pub fn opt_int<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    let value = Value::deserialize(d)?;
    Ok(to_number(&value).map(|n| n as i64))
}

/// Non-empty trimmed text; numbers are stringified.
pub fn opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    let value = Value::deserialize(d)?;
    Ok(match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

pub fn flag<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
    let value = Value::deserialize(d)?;
    Ok(match value {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        Value::String(s) => s.eq_ignore_ascii_case("true"),
        _ => false,
    })
}

/// Only genuine booleans count; `null` and anything else is "unknown".
pub fn opt_flag<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
    let value = Value::deserialize(d)?;
    Ok(value.as_bool())
}

pub fn opt_struct<'de, D, T>(d: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(d)?;
    if !value.is_object() {
        return Ok(None);
    }
    Ok(serde_json::from_value(value).ok())
}

pub fn seq<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(d)?;
    Ok(seq_from_value(value))
}

pub fn seq_from_value<T: DeserializeOwned + Default>(value: Value) -> Vec<T> {
    match value {
        Value::Array(items) => items.into_iter().map(parse_or_default).collect(),
        _ => Vec::new(),
    }
}

fn nested_from_value<T: DeserializeOwned + Default>(value: Value) -> Vec<Vec<T>> {
    match value {
        Value::Array(items) => items.into_iter().map(seq_from_value).collect(),
        _ => Vec::new(),
    }
}

/// `[outer][inner]` arrays, lenient at both levels.
pub fn nested<'de, D, T>(d: D) -> Result<Vec<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(d)?;
    Ok(nested_from_value(value))
}

/// `[a][b][c]` arrays, lenient at every level.
pub fn nested3<'de, D, T>(d: D) -> Result<Vec<Vec<Vec<T>>>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(d)?;
    Ok(match value {
        Value::Array(items) => items.into_iter().map(nested_from_value).collect(),
        _ => Vec::new(),
    })
}

/// First element of an array (the "all phases" slice in parser output).
pub fn first<'de, D, T>(d: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(d)?;
    Ok(match value {
        Value::Array(items) => items.into_iter().next().map(parse_or_default),
        _ => None,
    })
}

/// First element of every inner array: `[target][phase]` → `[target]`.
pub fn firsts<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(d)?;
    Ok(match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Array(inner) => inner
                    .into_iter()
                    .next()
                    .map(parse_or_default)
                    .unwrap_or_default(),
                _ => T::default(),
            })
            .collect(),
        _ => Vec::new(),
    })
}

fn numbers_from_value(value: Value) -> Vec<f64> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(|v| to_number(v).unwrap_or(0.0))
            .collect(),
        _ => Vec::new(),
    }
}

fn numbers2_from_value(value: Value) -> Vec<Vec<f64>> {
    match value {
        Value::Array(items) => items.into_iter().map(numbers_from_value).collect(),
        _ => Vec::new(),
    }
}

pub fn numbers<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<f64>, D::Error> {
    let value = Value::deserialize(d)?;
    Ok(numbers_from_value(value))
}

pub fn numbers2<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Vec<f64>>, D::Error> {
    let value = Value::deserialize(d)?;
    Ok(numbers2_from_value(value))
}

pub fn numbers3<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Vec<Vec<f64>>>, D::Error> {
    let value = Value::deserialize(d)?;
    Ok(match value {
        Value::Array(items) => items.into_iter().map(numbers2_from_value).collect(),
        _ => Vec::new(),
    })
}

/// Length of an array field, used where only the count matters.
pub fn count<'de, D: Deserializer<'de>>(d: D) -> Result<usize, D::Error> {
    let value = Value::deserialize(d)?;
    Ok(value.as_array().map(Vec::len).unwrap_or(0))
}

/// Keyed table; entries that fail to parse are defaulted.
pub fn map<'de, D, T>(d: D) -> Result<HashMap<String, T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(d)?;
    Ok(match value {
        Value::Object(entries) => entries
            .into_iter()
            .map(|(k, v)| (k, parse_or_default(v)))
            .collect(),
        _ => HashMap::new(),
    })
}

/// Time/value pairs given either as `[t, v]` arrays or `{time, value}` objects.
pub fn pairs_from_value(value: &Value) -> Vec<(f64, f64)> {
    let Some(items) = value.as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let (t, v) = match item {
                Value::Array(pair) => (pair.first()?, pair.get(1)),
                Value::Object(obj) => (obj.get("time")?, obj.get("value")),
                _ => return None,
            };
            let time = to_number(t)?;
            let value = v.and_then(to_number).unwrap_or(0.0);
            Some((time, value))
        })
        .collect()
}

pub fn pairs<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<(f64, f64)>, D::Error> {
    let value = Value::deserialize(d)?;
    Ok(pairs_from_value(&value))
}

pub fn pairs_map<'de, D: Deserializer<'de>>(
    d: D,
) -> Result<HashMap<String, Vec<(f64, f64)>>, D::Error> {
    let value = Value::deserialize(d)?;
    Ok(match value {
        Value::Object(entries) => entries
            .iter()
            .map(|(k, v)| (k.clone(), pairs_from_value(v)))
            .collect(),
        _ => HashMap::new(),
    })
}

/// An object or an array of objects, normalized to a list.
pub fn one_or_many<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(d)?;
    Ok(match value {
        Value::Array(items) => items
            .into_iter()
            .filter(Value::is_object)
            .map(parse_or_default)
            .collect(),
        Value::Object(_) => vec![parse_or_default(value)],
        _ => Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    struct Probe {
        #[serde(deserialize_with = "number")]
        amount: f64,
        #[serde(deserialize_with = "opt_number")]
        distance: Option<f64>,
        #[serde(deserialize_with = "opt_string")]
        label: Option<String>,
        #[serde(deserialize_with = "flag")]
        enabled: bool,
        #[serde(deserialize_with = "nested")]
        grid: Vec<Vec<Cell>>,
        #[serde(deserialize_with = "firsts")]
        heads: Vec<Cell>,
    }

    #[derive(Debug, Default, Deserialize, PartialEq)]
    #[serde(default)]
    struct Cell {
        #[serde(deserialize_with = "number")]
        v: f64,
    }

    #[test]
    fn test_numbers_from_strings_and_nulls() {
        let probe: Probe = serde_json::from_value(json!({
            "amount": "12.5",
            "distance": "Infinity",
            "label": "  ",
            "enabled": 1
        }))
        .unwrap();
        assert_eq!(probe.amount, 12.5);
        assert_eq!(probe.distance, None);
        assert_eq!(probe.label, None);
        assert!(probe.enabled);

        let probe: Probe = serde_json::from_value(json!({ "amount": null })).unwrap();
        assert_eq!(probe.amount, 0.0);
    }

    #[test]
    fn test_array_holes_keep_positions() {
        let probe: Probe = serde_json::from_value(json!({
            "grid": [[{ "v": 1 }], null, [null, { "v": 3 }]],
            "heads": [[{ "v": 7 }, { "v": 8 }], null, []]
        }))
        .unwrap();
        assert_eq!(probe.grid.len(), 3);
        assert!(probe.grid[1].is_empty());
        assert_eq!(probe.grid[2][0], Cell::default());
        assert_eq!(probe.grid[2][1].v, 3.0);
        assert_eq!(probe.heads.len(), 3);
        assert_eq!(probe.heads[0].v, 7.0);
        assert_eq!(probe.heads[2].v, 0.0);
    }

    #[test]
    fn test_pairs_accept_both_shapes() {
        let pairs = pairs_from_value(&json!([[1000, 1], { "time": 2000, "value": 0 }, "x", [null]]));
        assert_eq!(pairs, vec![(1000.0, 1.0), (2000.0, 0.0)]);
    }
}
