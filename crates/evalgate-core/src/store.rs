//! C3: append-only, day-partitioned record persistence with run-scoped
//! reads. One file per UTC date: `<log-dir>/YYYYMMDD.jsonl`.

use crate::errors::StoreError;
use crate::model::Record;
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// A record store rooted at a log directory. Carries no other state; a
/// fresh value is cheap to construct per command invocation.
#[derive(Debug, Clone)]
pub struct RecordStore {
    log_dir: PathBuf,
}

impl RecordStore {
    /// Opens a store rooted at `log_dir`, creating the directory if absent.
    pub fn open(log_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let log_dir = log_dir.into();
        std::fs::create_dir_all(&log_dir).map_err(|source| StoreError::Io {
            path: log_dir.display().to_string(),
            source,
        })?;
        Ok(Self { log_dir })
    }

    fn partition_path(&self, date: chrono::NaiveDate) -> PathBuf {
        self.log_dir.join(format!("{}.jsonl", date.format("%Y%m%d")))
    }

    /// Appends one record to its date partition.
    pub fn append(&self, record: &Record) -> Result<(), StoreError> {
        let date = record.timestamp.date_naive();
        let path = self.partition_path(date);
        let line = serde_json::to_string(record).map_err(StoreError::Serialize)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| StoreError::Io {
                path: path.display().to_string(),
                source,
            })?;
        writeln!(file, "{line}").map_err(|source| StoreError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(())
    }

    fn partition_files(&self) -> Result<Vec<PathBuf>, StoreError> {
        let mut files = Vec::new();
        let entries = std::fs::read_dir(&self.log_dir).map_err(|source| StoreError::Io {
            path: self.log_dir.display().to_string(),
            source,
        })?;
        for entry in entries {
            let entry = entry.map_err(|source| StoreError::Io {
                path: self.log_dir.display().to_string(),
                source,
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("jsonl") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Reads every record across every partition file. A malformed line is
    /// discarded; only the very last line of the very last file is treated
    /// as a silent crash artifact (no warning), every other malformed line
    /// logs a `tracing::warn!` before being skipped.
    fn read_all(&self) -> Result<Vec<Record>, StoreError> {
        let files = self.partition_files()?;
        let mut out = Vec::new();

        for (file_idx, path) in files.iter().enumerate() {
            let contents = std::fs::read_to_string(path).map_err(|source| StoreError::Io {
                path: path.display().to_string(),
                source,
            })?;
            let lines: Vec<&str> = contents.lines().collect();
            let is_last_file = file_idx + 1 == files.len();

            for (line_idx, line) in lines.iter().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<Record>(line) {
                    Ok(record) => out.push(record),
                    Err(err) => {
                        let is_last_line = is_last_file && line_idx + 1 == lines.len();
                        if !is_last_line {
                            tracing::warn!(
                                path = %path.display(),
                                line = line_idx + 1,
                                error = %err,
                                "discarding malformed record line"
                            );
                        }
                    }
                }
            }
        }
        Ok(out)
    }

    /// Returns every record whose `run_id` matches.
    pub fn read_run(&self, run_id: &str) -> Result<Vec<Record>, StoreError> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|r| r.run_id == run_id)
            .collect())
    }

    /// Returns every record with `timestamp` in `[start, end)`.
    pub fn read_window(
        &self,
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    ) -> Result<Vec<Record>, StoreError> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|r| {
                let d = r.timestamp.date_naive();
                d >= start && d < end
            })
            .collect())
    }

    /// Groups all records by `run_id` and returns the records for whichever
    /// run contains the most recent timestamp.
    pub fn read_latest_run(&self) -> Result<Vec<Record>, StoreError> {
        let all = self.read_all()?;
        let mut by_run: HashMap<String, Vec<Record>> = HashMap::new();
        for record in all {
            by_run.entry(record.run_id.clone()).or_default().push(record);
        }

        let latest_run_id = by_run
            .iter()
            .max_by_key(|(_, records)| records.iter().map(|r| r.timestamp).max())
            .map(|(run_id, _)| run_id.clone());

        Ok(latest_run_id
            .and_then(|id| by_run.remove(&id))
            .unwrap_or_default())
    }
}

/// Reads every record under a directory, ignoring `run_id` (used for
/// directory-mode baseline resolution; the directory need not be a live
/// `RecordStore`'s own log-dir, just a directory of `*.jsonl` partitions).
pub fn read_directory(dir: &Path) -> Result<Vec<Record>, StoreError> {
    RecordStore::open(dir)?.read_all()
}
