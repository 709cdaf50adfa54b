//! C5: pure folds over `&[Record]`. No I/O, no async.

use crate::model::{CaseStats, FailureType, Record, RunSummary, Severity, Totals};
use std::collections::BTreeMap;

/// Folds `records` into a `RunSummary`. Order-independent: callers may hand
/// in records from any number of partition files in any order.
#[must_use]
pub fn summarize(records: &[Record]) -> RunSummary {
    let overall = totals(records);
    let s1 = totals_for(records, Severity::S1);
    let s2 = totals_for(records, Severity::S2);

    let latencies = sorted_latencies(records);
    let latency_p50_ms = quantile(&latencies, 0.50);
    let latency_p95_ms = quantile(&latencies, 0.95);
    let total_cost = records.iter().map(|r| r.cost).sum();

    let mut by_case: BTreeMap<String, Vec<&Record>> = BTreeMap::new();
    for record in records {
        by_case.entry(record.case_id.clone()).or_default().push(record);
    }
    let per_case = by_case
        .into_iter()
        .map(|(case_id, recs)| (case_id, case_stats(&recs)))
        .collect();

    RunSummary {
        overall,
        s1,
        s2,
        latency_p50_ms,
        latency_p95_ms,
        total_cost,
        per_case,
    }
}

fn totals(records: &[Record]) -> Totals {
    let n_attempts = u32::try_from(records.len()).unwrap_or(u32::MAX);
    let n_pass = u32::try_from(records.iter().filter(|r| r.passed).count()).unwrap_or(u32::MAX);
    Totals {
        n_attempts,
        n_pass,
        pass_rate: pass_rate(n_pass, n_attempts),
    }
}

fn totals_for(records: &[Record], severity: Severity) -> Totals {
    let filtered: Vec<&Record> = records.iter().filter(|r| r.severity == severity).collect();
    let n_attempts = u32::try_from(filtered.len()).unwrap_or(u32::MAX);
    let n_pass = u32::try_from(filtered.iter().filter(|r| r.passed).count()).unwrap_or(u32::MAX);
    Totals {
        n_attempts,
        n_pass,
        pass_rate: pass_rate(n_pass, n_attempts),
    }
}

fn pass_rate(n_pass: u32, n_attempts: u32) -> f64 {
    if n_attempts == 0 {
        0.0
    } else {
        f64::from(n_pass) / f64::from(n_attempts)
    }
}

fn sorted_latencies(records: &[Record]) -> Vec<f64> {
    let mut v: Vec<f64> = records.iter().map(|r| r.latency_ms).collect();
    v.sort_by(|a, b| a.partial_cmp(b).unwrap());
    v
}

/// Nearest-rank quantile over an already-sorted slice.
#[must_use]
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (q * sorted.len() as f64).ceil() as usize;
    let idx = rank.saturating_sub(1).min(sorted.len() - 1);
    sorted[idx]
}

fn case_stats(records: &[&Record]) -> CaseStats {
    let attempts = u32::try_from(records.len()).unwrap_or(u32::MAX);
    let passes = u32::try_from(records.iter().filter(|r| r.passed).count()).unwrap_or(u32::MAX);
    let pass_rate = pass_rate(passes, attempts);

    let dominant_failure_type = dominant_failure_type(records);
    let latencies: Vec<f64> = records.iter().map(|r| r.latency_ms).collect();
    let costs: Vec<f64> = records.iter().map(|r| r.cost).collect();
    let tokens: Vec<f64> = records.iter().map(|r| r.tokens_total as f64).collect();

    CaseStats {
        attempts,
        passes,
        pass_rate,
        dominant_failure_type,
        median_latency_ms: median(&latencies),
        median_cost: median(&costs),
        median_tokens: median(&tokens),
        latency_cv: coefficient_of_variation(&latencies),
    }
}

fn dominant_failure_type(records: &[&Record]) -> Option<FailureType> {
    let mut counts: BTreeMap<&'static str, (FailureType, usize)> = BTreeMap::new();
    for record in records {
        if let Some(ft) = record.failure_type {
            let key = failure_type_key(ft);
            let entry = counts.entry(key).or_insert((ft, 0));
            entry.1 += 1;
        }
    }
    counts
        .into_values()
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| failure_type_key(b.0).cmp(failure_type_key(a.0))))
        .map(|(ft, _)| ft)
}

fn failure_type_key(ft: FailureType) -> &'static str {
    match ft {
        FailureType::BadJson => "bad_json",
        FailureType::Other => "other",
        FailureType::ProviderError => "provider_error",
        FailureType::QualityFail => "quality_fail",
        FailureType::SchemaMismatch => "schema_mismatch",
        FailureType::Timeout => "timeout",
    }
}

fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let mid = sorted.len() / 2;
    if sorted.len().is_multiple_of(2) {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// `stddev / mean`, `0.0` if mean is `0.0` (population stddev, matching
/// spec.md §4.5's single-pass definition over the group's own latencies).
#[must_use]
pub fn coefficient_of_variation(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    if mean == 0.0 {
        return 0.0;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt() / mean
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Record;

    fn rec(case_id: &str, passed: bool, severity: Severity, latency_ms: f64) -> Record {
        Record {
            schema_version: 1,
            run_id: "r1".into(),
            case_id: case_id.into(),
            severity,
            timestamp: chrono::Utc::now(),
            passed,
            failure_type: if passed { None } else { Some(FailureType::QualityFail) },
            latency_ms,
            cost: 0.01,
            tokens_total: 100,
            output_text: String::new(),
            output_json: None,
            attempt_index: 0,
        }
    }

    #[test]
    fn empty_records_yield_zeroed_summary() {
        let summary = summarize(&[]);
        assert_eq!(summary.overall.pass_rate, 0.0);
        assert!(summary.per_case.is_empty());
    }

    #[test]
    fn severity_split_sums_to_total() {
        let records = vec![
            rec("TC001", true, Severity::S1, 10.0),
            rec("TC002", false, Severity::S2, 20.0),
        ];
        let summary = summarize(&records);
        assert_eq!(summary.s1.n_attempts + summary.s2.n_attempts, summary.overall.n_attempts);
    }

    #[test]
    fn quantile_nearest_rank_p95() {
        let sorted: Vec<f64> = (1..=100).map(f64::from).collect();
        assert_eq!(quantile(&sorted, 0.95), 95.0);
    }

    #[test]
    fn dominant_failure_type_ties_break_alphabetically() {
        let mut records = vec![
            rec("TC001", false, Severity::S1, 1.0),
            rec("TC001", false, Severity::S1, 1.0),
        ];
        records[0].failure_type = Some(FailureType::Timeout);
        records[1].failure_type = Some(FailureType::BadJson);
        let summary = summarize(&records);
        assert_eq!(
            summary.per_case["TC001"].dominant_failure_type,
            Some(FailureType::BadJson)
        );
    }

    #[test]
    fn latency_cv_zero_for_identical_latencies() {
        let records = vec![
            rec("TC001", true, Severity::S1, 50.0),
            rec("TC001", true, Severity::S1, 50.0),
        ];
        let summary = summarize(&records);
        assert_eq!(summary.per_case["TC001"].latency_cv, 0.0);
    }
}
