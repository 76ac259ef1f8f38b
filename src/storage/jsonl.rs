//! JSONL (JSON Lines) input and output.
//!
//! Each line is one JSON value: a fight record on the way in, one
//! aggregation result on the way out.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::marker::PhantomData;
use std::path::PathBuf;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

use super::StorageError;

/// Streaming JSONL writer. The file is truncated on creation.
pub struct JsonlWriter<T> {
    path: PathBuf,
    writer: BufWriter<File>,
    count: usize,
    _marker: PhantomData<T>,
}

impl<T: Serialize> JsonlWriter<T> {
    pub fn create(path: PathBuf) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(&path)?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
            count: 0,
            _marker: PhantomData,
        })
    }

    /// Write one entry as a line.
    pub fn write(&mut self, entry: &T) -> Result<(), StorageError> {
        let json = serde_json::to_string(entry)?;
        writeln!(self.writer, "{}", json)?;
        self.count += 1;
        Ok(())
    }

    /// Flush and return how many lines were written.
    pub fn finish(mut self) -> Result<usize, StorageError> {
        self.writer.flush()?;
        info!("Wrote {} lines to {:?}", self.count, self.path);
        Ok(self.count)
    }
}

/// JSONL file reader. Lines that fail to parse are skipped with a warning.
pub struct JsonlReader<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T: DeserializeOwned> JsonlReader<T> {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _marker: PhantomData,
        }
    }

    /// Read all entries from the file.
    pub fn read_all(&self) -> Result<Vec<T>, StorageError> {
        if !self.path.exists() {
            return Err(StorageError::PathNotFound(self.path.clone()));
        }

        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        let mut entries = Vec::new();

        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str(&line) {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    warn!("Failed to parse line {} in {:?}: {}", index + 1, self.path, e);
                }
            }
        }

        debug!("Read {} entries from {:?}", entries.len(), self.path);
        Ok(entries)
    }
}
