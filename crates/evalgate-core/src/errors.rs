//! Typed error taxonomy. Each variant maps to exactly one exit code in the
//! CLI (see `SPEC_FULL.md` §7): usage/parse errors -> 2, I/O-during-read -> 3.

use thiserror::Error;

/// Errors raised while loading and validating the case file (C1).
#[derive(Debug, Error)]
pub enum CaseLoadError {
    /// The file could not be read.
    #[error("failed to read cases file {path}: {source}")]
    Io {
        /// Path that failed to read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The header row was missing a required column.
    #[error("cases file missing required column: {0}")]
    MissingColumn(String),
    /// A row failed to parse as valid CSV.
    #[error("cases file malformed at row {row}: {source}")]
    Csv {
        /// 1-based row number.
        row: usize,
        /// Underlying CSV error.
        #[source]
        source: csv::Error,
    },
    /// `case_id` was empty.
    #[error("row {row}: case_id must not be empty")]
    EmptyCaseId {
        /// 1-based row number.
        row: usize,
    },
    /// Two rows declared the same `case_id`.
    #[error("duplicate case_id '{case_id}' at row {row}")]
    DuplicateCaseId {
        /// The repeated identifier.
        case_id: String,
        /// 1-based row number of the second occurrence.
        row: usize,
    },
    /// `severity` was not `S1` or `S2`.
    #[error("row {row}: unknown severity '{value}'")]
    UnknownSeverity {
        /// 1-based row number.
        row: usize,
        /// The offending raw value.
        value: String,
    },
    /// `min_pass_rate` parsed but fell outside `[0, 1]`.
    #[error("row {row}: min_pass_rate {value} out of range [0,1]")]
    MinPassRateOutOfRange {
        /// 1-based row number.
        row: usize,
        /// The offending parsed value.
        value: f64,
    },
    /// `min_pass_rate` did not parse as a float.
    #[error("row {row}: min_pass_rate '{value}' is not a number")]
    MinPassRateNotNumeric {
        /// 1-based row number.
        row: usize,
        /// The offending raw value.
        value: String,
    },
}

/// Errors raised while loading and resolving the ruleset (C2).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config document could not be read.
    #[error("failed to read config {path}: {source}")]
    Io {
        /// Path that failed to read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The config document failed to parse as YAML.
    #[error("failed to parse config as YAML: {0}")]
    Parse(#[source] serde_yaml::Error),
    /// An override's `paths` glob failed to compile.
    #[error("override '{label}' has invalid glob '{glob}': {source}")]
    InvalidGlob {
        /// The override entry's label (its position, since overrides are unlabeled).
        label: String,
        /// The offending glob pattern.
        glob: String,
        /// Underlying glob compilation error.
        #[source]
        source: globset::Error,
    },
}

/// Errors raised by the append-only record store (C3).
#[derive(Debug, Error)]
pub enum StoreError {
    /// A read or write against the log directory failed.
    #[error("record store I/O error at {path}: {source}")]
    Io {
        /// Path involved in the failing operation.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// A record failed to serialize to JSON.
    #[error("failed to serialize record: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Errors raised while evaluating the gate (C8), beyond a plain FAIL verdict.
#[derive(Debug, Error)]
pub enum GateError {
    /// `check` found no records for the given `run_id`.
    #[error("no records for run_id '{0}'")]
    EmptyCurrentRun(String),
}
