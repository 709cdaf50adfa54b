//! Core data model: cases, records, and the summaries/diffs/rulesets
//! derived from them. See `SPEC_FULL.md` §3 for the authoritative shapes.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

/// Severity tier. S1 is blocking; S2 is advisory by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// Must-pass, blocking.
    S1,
    /// Advisory.
    S2,
}

impl Severity {
    /// Parses a severity from its upper-cased wire form.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "S1" => Some(Self::S1),
            "S2" => Some(Self::S2),
            _ => None,
        }
    }

    /// Default per-case pass-rate floor when the case doesn't declare one.
    #[must_use]
    pub const fn default_min_pass_rate(self) -> f64 {
        match self {
            Self::S1 => 1.0,
            Self::S2 => 0.0,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::S1 => "S1",
            Self::S2 => "S2",
        })
    }
}

/// A declarative input case loaded from the suite file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Case {
    /// Stable identifier, unique within a suite.
    pub case_id: String,
    /// Human-readable name.
    pub name: String,
    /// Prompt handed to the agent invoker verbatim.
    pub input_prompt: String,
    /// Expected output: a literal match target or schema fragment.
    pub expected_output: ExpectedOutput,
    /// Blocking vs. advisory.
    pub severity: Severity,
    /// Optional owning team or individual.
    pub owner: Option<String>,
    /// Free-form tags, lower-cased and deduplicated.
    pub tags: BTreeSet<String>,
    /// Per-case pass-rate floor; defaults by severity when absent.
    pub min_pass_rate: f64,
    /// Optional grouping category.
    pub category: Option<String>,
}

impl Case {
    /// Stable content fingerprint, used only to flag "case content changed
    /// without a case_id bump" as a diagnostic note — never a gate input.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.case_id.as_bytes());
        hasher.update(b"|");
        hasher.update(self.input_prompt.as_bytes());
        hasher.update(b"|");
        hasher.update(self.expected_output.fingerprint_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Expected output: either a literal string match or a JSON schema fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExpectedOutput {
    /// Exact string match against the agent's raw text output.
    Literal {
        /// The literal text the output must equal.
        value: String,
    },
    /// A JSON schema the output's parsed JSON must satisfy.
    Schema {
        /// JSON schema fragment (keys: `required`, `properties` types).
        schema: serde_json::Value,
    },
}

impl ExpectedOutput {
    fn fingerprint_bytes(&self) -> Vec<u8> {
        match self {
            Self::Literal { value } => value.as_bytes().to_vec(),
            Self::Schema { schema } => schema.to_string().into_bytes(),
        }
    }
}

/// Closed enumeration of why a case execution failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureType {
    /// Expected output declared a schema; returned text wasn't valid JSON.
    BadJson,
    /// A metric/equality check against the expected output failed.
    QualityFail,
    /// The per-item deadline elapsed before the invoker responded.
    Timeout,
    /// The invoker raised a non-deadline failure.
    ProviderError,
    /// Returned JSON parsed but didn't satisfy the expected schema.
    SchemaMismatch,
    /// Any other classified failure (e.g. a write failure at summary time).
    Other,
}

impl std::fmt::Display for FailureType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::BadJson => "bad_json",
            Self::QualityFail => "quality_fail",
            Self::Timeout => "timeout",
            Self::ProviderError => "provider_error",
            Self::SchemaMismatch => "schema_mismatch",
            Self::Other => "other",
        };
        f.write_str(s)
    }
}

/// One row per case execution. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Schema version of this on-disk record. Readers default missing to 1.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    /// Opaque identifier of the batch this execution belongs to.
    pub run_id: String,
    /// The case this execution ran.
    pub case_id: String,
    /// Severity copied from the case at execution time.
    pub severity: Severity,
    /// UTC timestamp of the execution, RFC3339.
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Whether the case passed.
    pub passed: bool,
    /// Classified failure, `None` iff `passed`.
    #[serde(default)]
    pub failure_type: Option<FailureType>,
    /// Wall-clock latency in milliseconds.
    pub latency_ms: f64,
    /// Cost of the invocation, in whatever unit the invoker reports.
    pub cost: f64,
    /// Total tokens consumed.
    pub tokens_total: u64,
    /// Raw text output, possibly empty.
    #[serde(default)]
    pub output_text: String,
    /// Parsed JSON output, if the invoker returned any.
    #[serde(default)]
    pub output_json: Option<serde_json::Value>,
    /// 0-based repetition index; 0 for a single-shot run.
    #[serde(default)]
    pub attempt_index: u32,
}

fn default_schema_version() -> u32 {
    1
}

impl Record {
    /// Enforces `passed ⇒ failure_type = None` at construction time.
    #[must_use]
    pub fn invariant_holds(&self) -> bool {
        !self.passed || self.failure_type.is_none()
    }
}

/// Per-case statistics folded from one or more records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaseStats {
    /// Number of executions observed.
    pub attempts: u32,
    /// Number of passing executions.
    pub passes: u32,
    /// `passes / attempts`, 0 if no attempts.
    pub pass_rate: f64,
    /// Mode of non-null failure types, ties broken alphabetically.
    pub dominant_failure_type: Option<FailureType>,
    /// Median latency across attempts.
    pub median_latency_ms: f64,
    /// Median cost across attempts.
    pub median_cost: f64,
    /// Median tokens across attempts (used for token-inflation comparison).
    pub median_tokens: f64,
    /// Coefficient of variation of latency (`stddev / mean`, 0 if mean is 0).
    pub latency_cv: f64,
}

/// Pass/fail counts and rate over a set of records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    /// Attempts observed.
    pub n_attempts: u32,
    /// Passing attempts.
    pub n_pass: u32,
    /// `n_pass / n_attempts`, 0 if no attempts.
    pub pass_rate: f64,
}

/// Derived summary for a single run or a baseline window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Totals over every case.
    pub overall: Totals,
    /// Totals restricted to S1 cases.
    pub s1: Totals,
    /// Totals restricted to S2 cases.
    pub s2: Totals,
    /// p50 latency across all attempts, milliseconds.
    pub latency_p50_ms: f64,
    /// p95 latency across all attempts, milliseconds.
    pub latency_p95_ms: f64,
    /// Sum of cost across all attempts.
    pub total_cost: f64,
    /// Per-case breakdown, keyed by `case_id`.
    pub per_case: std::collections::BTreeMap<String, CaseStats>,
}

/// Describes which window a `BaselineSummary` was computed from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineWindow {
    /// Baseline assembled from an explicit set of prior run ids.
    BaselineRunIds {
        /// The run ids that were folded together.
        baseline_run_ids: Vec<String>,
    },
    /// Baseline assembled from a trailing N-day window.
    Days {
        /// Width of the trailing window, in days.
        days: u32,
        /// The exclusive end date of the window (UTC).
        end_date: chrono::NaiveDate,
    },
}

/// A `RunSummary` plus the window it was computed over, or an explicit
/// absence sentinel when no prior records exist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BaselineSummary {
    /// A real baseline summary.
    Present {
        /// The folded summary.
        summary: RunSummary,
        /// The window the summary was computed from.
        window: BaselineWindow,
    },
    /// No baseline records were found.
    Absent,
}

impl BaselineSummary {
    /// Returns the inner summary, if present.
    #[must_use]
    pub const fn summary(&self) -> Option<&RunSummary> {
        match self {
            Self::Present { summary, .. } => Some(summary),
            Self::Absent => None,
        }
    }

    /// True iff no baseline records were found.
    #[must_use]
    pub const fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }
}

/// Categorical label describing a case's change relative to baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffStatus {
    /// Case passed 100% in baseline, has >=1 failure now.
    RegressedNew,
    /// Dominant failure type differs between baseline and current.
    RegressedTypeChange,
    /// Current failure is schema-related and baseline had none.
    SchemaDiverged,
    /// Current p95 latency exceeds the configured ratio over baseline.
    LatencySpike,
    /// Current median tokens exceed the configured ratio over baseline.
    TokenInflation,
    /// Current pass rate improved over baseline by at least one attempt.
    Improved,
    /// Case is absent from the baseline.
    Unseen,
    /// None of the above applied.
    Stable,
}

/// Per-case diff result: every status that applied, plus the deterministic
/// explanation string assembled from them (§4.7).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseDiff {
    /// The case this diff describes.
    pub case_id: String,
    /// Severity, copied from the current run (or baseline, if unseen now).
    pub severity: Severity,
    /// Every status that applied to this case, in canonical order.
    pub statuses: Vec<DiffStatus>,
    /// Deterministic, human-readable explanation joining the statuses.
    pub explanation: String,
}

/// A fully-resolved threshold block for one `check`/`report` invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ruleset {
    /// S1 pass-rate floor.
    pub s1_min_pass_rate: f64,
    /// Overall pass-rate floor.
    pub overall_min_pass_rate: f64,
    /// Maximum tolerated drop for the worst-case per-case pass rate.
    pub max_worst_case_delta: f64,
    /// Maximum current/baseline p95 latency ratio.
    pub latency_p95_max_ratio: f64,
    /// Maximum current/baseline median-token ratio.
    pub token_delta_max_ratio: f64,
    /// Whether any `regressed_new` case vetoes the gate.
    pub fail_on_new_regression: bool,
}

impl Default for Ruleset {
    fn default() -> Self {
        Self {
            s1_min_pass_rate: 1.0,
            overall_min_pass_rate: 0.8,
            max_worst_case_delta: 0.0,
            latency_p95_max_ratio: 1.5,
            token_delta_max_ratio: 1.25,
            fail_on_new_regression: true,
        }
    }
}
