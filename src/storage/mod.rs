//! Filesystem input and output.
//!
//! Fight records arrive as:
//! - A JSON array of records, or an object carrying a `logs` array
//! - A single-fight JSON object
//! - A directory of `*.json` files, one or more fights each
//! - A `.jsonl` file, one record per line
//! - A glob pattern over any of the above
//!
//! Aggregates leave as pretty or compact JSON, or as JSONL when a run
//! covers several independent collections.

pub mod jsonl;

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::FightRecord;
use jsonl::JsonlReader;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Invalid glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Unsupported content in {path:?}: {reason}")]
    InvalidFormat { path: PathBuf, reason: String },
}

/// Where outputs land when no explicit path is given.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl StorageConfig {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    pub fn output_dir(&self) -> PathBuf {
        self.data_dir.join("aggregates")
    }

    /// `aggregates/<input stem>.stats.json`
    pub fn default_output_path(&self, input: &str) -> PathBuf {
        let stem = Path::new(input)
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty() && !is_pattern(s))
            .unwrap_or("fights");
        self.output_dir().join(format!("{stem}.stats.json"))
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::new(PathBuf::from("./data"))
    }
}

fn is_pattern(input: &str) -> bool {
    input.contains(['*', '?', '['])
}

/// Records held by one parsed JSON document.
fn records_in_value(value: Value, path: &Path) -> Result<Vec<FightRecord>, StorageError> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut obj) => match obj.remove("logs") {
            Some(Value::Array(items)) => items,
            Some(_) => {
                return Err(StorageError::InvalidFormat {
                    path: path.to_path_buf(),
                    reason: "`logs` is not an array".to_string(),
                })
            }
            None => vec![Value::Object(obj)],
        },
        _ => {
            return Err(StorageError::InvalidFormat {
                path: path.to_path_buf(),
                reason: "expected a fight record, an array of records or a `logs` object".to_string(),
            })
        }
    };

    let mut records = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        if !item.is_object() {
            warn!("Skipping non-object entry {} in {:?}", index, path);
            continue;
        }
        records.push(serde_json::from_value(item)?);
    }
    Ok(records)
}

/// Load the records in one JSON or JSONL file.
pub fn load_file(path: &Path) -> Result<Vec<FightRecord>, StorageError> {
    if !path.exists() {
        return Err(StorageError::PathNotFound(path.to_path_buf()));
    }
    let is_jsonl = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("jsonl"));
    let records = if is_jsonl {
        JsonlReader::<FightRecord>::new(path.to_path_buf()).read_all()?
    } else {
        let contents = fs::read_to_string(path)?;
        records_in_value(serde_json::from_str(&contents)?, path)?
    };
    debug!("Loaded {} records from {:?}", records.len(), path);
    Ok(records)
}

/// Load every `*.json` / `*.jsonl` file in a directory, in file name order.
pub fn load_dir(dir: &Path) -> Result<Vec<FightRecord>, StorageError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_log = path.is_file()
            && path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("json") || e.eq_ignore_ascii_case("jsonl"));
        if is_log {
            files.push(path);
        }
    }
    files.sort();

    let mut records = Vec::new();
    for path in &files {
        records.extend(load_file(path)?);
    }
    Ok(records)
}

/// Load fight records from a file, a directory or a glob pattern.
pub fn load_records(input: &str) -> Result<Vec<FightRecord>, StorageError> {
    if input.trim().is_empty() {
        return Err(StorageError::InvalidPath("empty input path".to_string()));
    }

    let records = if is_pattern(input) {
        let mut paths = Vec::new();
        for entry in glob::glob(input)? {
            match entry {
                Ok(path) if path.is_file() => paths.push(path),
                Ok(_) => {}
                Err(e) => warn!("Skipping unreadable match: {}", e),
            }
        }
        if paths.is_empty() {
            return Err(StorageError::PathNotFound(PathBuf::from(input)));
        }
        paths.sort();
        let mut records = Vec::new();
        for path in &paths {
            records.extend(load_file(path)?);
        }
        records
    } else {
        let path = Path::new(input);
        if path.is_dir() {
            load_dir(path)?
        } else {
            load_file(path)?
        }
    };

    info!("Loaded {} fight records from {}", records.len(), input);
    Ok(records)
}

/// Write a value as JSON, creating parent directories.
pub fn write_json<T: Serialize>(path: &Path, value: &T, pretty: bool) -> Result<(), StorageError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    if pretty {
        serde_json::to_writer_pretty(&mut writer, value)?;
    } else {
        serde_json::to_writer(&mut writer, value)?;
    }
    writeln!(writer)?;
    writer.flush()?;

    info!("Wrote {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, value: &Value) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, serde_json::to_string(value).unwrap()).unwrap();
        path
    }

    fn ids(records: &[FightRecord]) -> Vec<String> {
        records
            .iter()
            .map(|r| r.record_id().unwrap_or_default().to_string())
            .collect()
    }

    #[test]
    fn test_storage_config_paths() {
        let config = StorageConfig::new(PathBuf::from("/data"));

        assert_eq!(config.output_dir(), PathBuf::from("/data/aggregates"));
        assert_eq!(
            config.default_output_path("logs/raid.json"),
            PathBuf::from("/data/aggregates/raid.stats.json")
        );
        assert_eq!(
            config.default_output_path("logs/*.json"),
            PathBuf::from("/data/aggregates/fights.stats.json")
        );
    }

    #[test]
    fn test_load_array_and_logs_object() {
        let dir = TempDir::new().unwrap();
        let array = write(&dir, "array.json", &json!([{ "id": "a" }, 7, { "id": "b" }]));
        let logs = write(&dir, "logs.json", &json!({ "logs": [{ "id": "c" }] }));

        assert_eq!(ids(&load_file(&array).unwrap()), vec!["a", "b"]);
        assert_eq!(ids(&load_file(&logs).unwrap()), vec!["c"]);
    }

    #[test]
    fn test_load_directory_in_name_order() {
        let dir = TempDir::new().unwrap();
        write(&dir, "02.json", &json!({ "filePath": "second" }));
        write(&dir, "01.json", &json!({ "filePath": "first" }));
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let records = load_records(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(ids(&records), vec!["first", "second"]);
    }

    #[test]
    fn test_load_jsonl_and_glob() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("fights.jsonl"),
            "{\"id\":\"x\"}\n\n{\"id\":\"y\"}\n",
        )
        .unwrap();
        write(&dir, "single.json", &json!({ "id": "z" }));

        let pattern = format!("{}/*.json*", dir.path().display());
        let records = load_records(&pattern).unwrap();
        assert_eq!(ids(&records), vec!["x", "y", "z"]);
    }

    #[test]
    fn test_load_errors() {
        let dir = TempDir::new().unwrap();
        let scalar = write(&dir, "scalar.json", &json!(42));

        assert!(matches!(
            load_records("/nonexistent/fights.json"),
            Err(StorageError::PathNotFound(_))
        ));
        assert!(matches!(load_file(&scalar), Err(StorageError::InvalidFormat { .. })));
        assert!(matches!(load_records(""), Err(StorageError::InvalidPath(_))));
        assert!(matches!(load_records("logs/***.json"), Err(StorageError::Pattern(_))));
    }

    #[test]
    fn test_write_json_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/out.json");

        write_json(&path, &json!({ "total": 3 }), true).unwrap();
        let read: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(read, json!({ "total": 3 }));
    }
}
