//! C9: per-case stability metrics from repeated runs. Informational only —
//! never a gate FAIL condition on its own.

use crate::engine::aggregator::coefficient_of_variation;
use crate::model::Record;
use std::collections::HashMap;

/// Stability metrics for one `(run_id, case_id)` group with `attempts > 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct FlakinessReport {
    /// The case this report describes.
    pub case_id: String,
    /// Number of repeated attempts observed.
    pub attempts: u32,
    /// `passes / attempts`.
    pub pass_rate: f64,
    /// True iff `0 < pass_rate < 1`.
    pub flaky: bool,
    /// Coefficient of variation of latency across the attempts.
    pub latency_cv: f64,
}

/// Computes flakiness reports for every `(run_id, case_id)` group in
/// `records` with more than one attempt, restricted to `run_id`.
#[must_use]
pub fn analyze(records: &[Record], run_id: &str) -> Vec<FlakinessReport> {
    let mut groups: HashMap<(String, String), Vec<&Record>> = HashMap::new();
    for record in records {
        if record.run_id != run_id {
            continue;
        }
        groups
            .entry((record.run_id.clone(), record.case_id.clone()))
            .or_default()
            .push(record);
    }

    let mut reports: Vec<FlakinessReport> = groups
        .into_iter()
        .filter(|(_, recs)| recs.len() > 1)
        .map(|((_, case_id), recs)| {
            let attempts = u32::try_from(recs.len()).unwrap_or(u32::MAX);
            let passes = u32::try_from(recs.iter().filter(|r| r.passed).count()).unwrap_or(u32::MAX);
            let pass_rate = f64::from(passes) / f64::from(attempts);
            let latencies: Vec<f64> = recs.iter().map(|r| r.latency_ms).collect();
            FlakinessReport {
                case_id,
                attempts,
                pass_rate,
                flaky: pass_rate > 0.0 && pass_rate < 1.0,
                latency_cv: coefficient_of_variation(&latencies),
            }
        })
        .collect();

    reports.sort_by(|a, b| a.case_id.cmp(&b.case_id));
    reports
}
