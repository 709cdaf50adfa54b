//! C7: per-case regression categorization and deterministic explanation text.

use crate::model::{CaseDiff, DiffStatus, FailureType, RunSummary, Severity};
use std::collections::BTreeMap;

/// Facts a `Ruleset` contributes to diff computation, decoupled from the
/// full `Ruleset` type so this module stays a pure function of its inputs.
#[derive(Debug, Clone, Copy)]
pub struct DiffThresholds {
    /// See `Ruleset::latency_p95_max_ratio`.
    pub latency_p95_max_ratio: f64,
    /// See `Ruleset::token_delta_max_ratio`.
    pub token_delta_max_ratio: f64,
}

/// Computes a `CaseDiff` for every case appearing in either summary.
/// `severities` maps `case_id` to its declared severity (from the loaded
/// case suite); a case with no entry defaults to `S1`.
#[must_use]
pub fn diff_cases(
    current: &RunSummary,
    baseline: Option<&RunSummary>,
    severities: &BTreeMap<String, Severity>,
    thresholds: DiffThresholds,
) -> Vec<CaseDiff> {
    let mut case_ids: std::collections::BTreeSet<&String> = current.per_case.keys().collect();
    if let Some(baseline) = baseline {
        case_ids.extend(baseline.per_case.keys());
    }

    case_ids
        .into_iter()
        .map(|case_id| diff_one_case(case_id, current, baseline, severities, thresholds))
        .collect()
}

fn diff_one_case(
    case_id: &str,
    current: &RunSummary,
    baseline: Option<&RunSummary>,
    severities: &BTreeMap<String, Severity>,
    thresholds: DiffThresholds,
) -> CaseDiff {
    let cur = current.per_case.get(case_id);
    let base = baseline.and_then(|b| b.per_case.get(case_id));

    let mut statuses = Vec::new();
    let mut sentences = Vec::new();

    if let (Some(cur), Some(base)) = (cur, base) {
        if base.pass_rate >= 1.0 && cur.pass_rate < 1.0 && base.attempts > 0 {
            statuses.push(DiffStatus::RegressedNew);
            sentences.push(format!(
                "{case_id} passed 100% at baseline but has at least one failure now"
            ));
        }

        if let (Some(cur_ft), Some(base_ft)) = (cur.dominant_failure_type, base.dominant_failure_type) {
            if cur_ft != base_ft {
                statuses.push(DiffStatus::RegressedTypeChange);
                sentences.push(format!(
                    "{case_id} dominant failure type changed from {base_ft} to {cur_ft}"
                ));
            }
        }

        let cur_schema_like = matches!(
            cur.dominant_failure_type,
            Some(FailureType::SchemaMismatch) | Some(FailureType::BadJson)
        );
        let base_schema_like = matches!(
            base.dominant_failure_type,
            Some(FailureType::SchemaMismatch) | Some(FailureType::BadJson)
        );
        if cur_schema_like && !base_schema_like {
            statuses.push(DiffStatus::SchemaDiverged);
            sentences.push(format!(
                "{case_id} now fails on schema/JSON validity where baseline did not"
            ));
        }
    }

    if let Some(baseline) = baseline {
        let base_p95 = baseline.latency_p95_ms;
        if base_p95 > 0.0 && current.latency_p95_ms > 0.0 {
            let ratio = current.latency_p95_ms / base_p95;
            if ratio > thresholds.latency_p95_max_ratio {
                statuses.push(DiffStatus::LatencySpike);
                sentences.push(format!(
                    "run latency p95 rose from {base_p95:.1}ms to {:.1}ms (ratio {ratio:.2} > {:.2})",
                    current.latency_p95_ms, thresholds.latency_p95_max_ratio
                ));
            }
        }
    }

    if let (Some(cur), Some(base)) = (cur, base) {
        if base.median_tokens > 0.0 {
            let ratio = cur.median_tokens / base.median_tokens;
            if ratio > thresholds.token_delta_max_ratio {
                statuses.push(DiffStatus::TokenInflation);
                sentences.push(format!(
                    "{case_id} median tokens rose from {:.0} to {:.0} (ratio {ratio:.2} > {:.2})",
                    base.median_tokens, cur.median_tokens, thresholds.token_delta_max_ratio
                ));
            }
        }
    }

    if let (Some(cur), Some(base)) = (cur, base) {
        let extra_passes = f64::from(cur.passes) - f64::from(cur.attempts) * base.pass_rate;
        if cur.pass_rate > base.pass_rate && extra_passes >= 1.0 - 1e-9 {
            statuses.push(DiffStatus::Improved);
            sentences.push(format!("{case_id} pass rate improved over baseline"));
        }
    }

    if cur.is_some() && base.is_none() {
        statuses.push(DiffStatus::Unseen);
        sentences.push(format!("{case_id} is new, absent from baseline"));
    }

    if statuses.is_empty() {
        statuses.push(DiffStatus::Stable);
    }

    statuses.sort_by_key(canonical_order);
    dedup_preserve_order(&mut statuses);

    CaseDiff {
        case_id: case_id.to_string(),
        severity: severities.get(case_id).copied().unwrap_or(Severity::S1),
        statuses,
        explanation: sentences.join("; "),
    }
}

fn canonical_order(status: &DiffStatus) -> u8 {
    match status {
        DiffStatus::RegressedNew => 0,
        DiffStatus::RegressedTypeChange => 1,
        DiffStatus::SchemaDiverged => 2,
        DiffStatus::LatencySpike => 3,
        DiffStatus::TokenInflation => 4,
        DiffStatus::Improved => 5,
        DiffStatus::Unseen => 6,
        DiffStatus::Stable => 7,
    }
}

fn dedup_preserve_order(statuses: &mut Vec<DiffStatus>) {
    let mut seen = std::collections::HashSet::new();
    statuses.retain(|s| seen.insert(*s));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CaseStats, Totals};

    fn summary_with(case_id: &str, stats: CaseStats) -> RunSummary {
        let mut per_case = std::collections::BTreeMap::new();
        per_case.insert(case_id.to_string(), stats);
        RunSummary {
            overall: Totals::default(),
            s1: Totals::default(),
            s2: Totals::default(),
            latency_p50_ms: 0.0,
            latency_p95_ms: 0.0,
            total_cost: 0.0,
            per_case,
        }
    }

    fn thresholds() -> DiffThresholds {
        DiffThresholds {
            latency_p95_max_ratio: 1.5,
            token_delta_max_ratio: 1.25,
        }
    }

    #[test]
    fn unseen_case_has_no_baseline_entry() {
        let current = summary_with(
            "TC999",
            CaseStats {
                attempts: 1,
                passes: 1,
                pass_rate: 1.0,
                ..Default::default()
            },
        );
        let diffs = diff_cases(&current, None, &BTreeMap::new(), thresholds());
        assert_eq!(diffs[0].statuses, vec![DiffStatus::Unseen]);
    }

    #[test]
    fn regressed_new_when_baseline_all_pass_and_current_has_failure() {
        let current = summary_with(
            "TC004",
            CaseStats {
                attempts: 1,
                passes: 0,
                pass_rate: 0.0,
                dominant_failure_type: Some(FailureType::QualityFail),
                ..Default::default()
            },
        );
        let baseline = summary_with(
            "TC004",
            CaseStats {
                attempts: 1,
                passes: 1,
                pass_rate: 1.0,
                ..Default::default()
            },
        );
        let diffs = diff_cases(&current, Some(&baseline), &BTreeMap::new(), thresholds());
        assert!(diffs[0].statuses.contains(&DiffStatus::RegressedNew));
        assert_eq!(diffs[0].statuses[0], DiffStatus::RegressedNew);
    }

    #[test]
    fn stable_when_nothing_changed() {
        let stats = CaseStats {
            attempts: 1,
            passes: 1,
            pass_rate: 1.0,
            ..Default::default()
        };
        let current = summary_with("TC001", stats.clone());
        let baseline = summary_with("TC001", stats);
        let diffs = diff_cases(&current, Some(&baseline), &BTreeMap::new(), thresholds());
        assert_eq!(diffs[0].statuses, vec![DiffStatus::Stable]);
    }

    #[test]
    fn latency_spike_compares_run_level_p95() {
        let mut current = summary_with(
            "TC001",
            CaseStats {
                attempts: 1,
                passes: 1,
                pass_rate: 1.0,
                ..Default::default()
            },
        );
        current.latency_p95_ms = 200.0;
        let mut baseline = summary_with(
            "TC001",
            CaseStats {
                attempts: 1,
                passes: 1,
                pass_rate: 1.0,
                ..Default::default()
            },
        );
        baseline.latency_p95_ms = 100.0;
        let diffs = diff_cases(&current, Some(&baseline), &BTreeMap::new(), thresholds());
        assert!(diffs[0].statuses.contains(&DiffStatus::LatencySpike));
    }
}
