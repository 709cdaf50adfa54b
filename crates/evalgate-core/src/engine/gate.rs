//! C8: thresholds + per-case minima -> verdict.

use crate::errors::GateError;
use crate::model::{BaselineSummary, Case, CaseDiff, DiffStatus, Ruleset, RunSummary};

/// One row of the verdict's checks table.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckResult {
    /// Short name shown in the Markdown table.
    pub name: String,
    /// Whether this check passed.
    pub passed: bool,
    /// Human-readable detail (values compared, threshold used).
    pub detail: String,
}

/// Outcome of evaluating the gate against one current run.
#[derive(Debug, Clone, PartialEq)]
pub struct GateVerdict {
    /// Overall pass/fail; `false` iff any enabled check failed.
    pub passed: bool,
    /// Every check that was evaluated, in evaluation order.
    pub checks: Vec<CheckResult>,
    /// True iff no baseline was available (baseline-dependent checks skipped).
    pub baseline_absent: bool,
}

/// Evaluates the gate. `current` must be non-empty; callers check for an
/// empty current run (exit via `GateError::EmptyCurrentRun`) before calling.
pub fn evaluate(
    run_id: &str,
    current: &RunSummary,
    baseline: &BaselineSummary,
    ruleset: &Ruleset,
    cases: &[Case],
    diffs: &[CaseDiff],
) -> Result<GateVerdict, GateError> {
    if current.overall.n_attempts == 0 {
        return Err(GateError::EmptyCurrentRun(run_id.to_string()));
    }

    let mut checks = Vec::new();

    checks.push(CheckResult {
        name: "S1 floor".to_string(),
        passed: current.s1.pass_rate >= ruleset.s1_min_pass_rate,
        detail: format!(
            "S1 pass rate {:.3} >= {:.3}",
            current.s1.pass_rate, ruleset.s1_min_pass_rate
        ),
    });

    checks.push(CheckResult {
        name: "Overall floor".to_string(),
        passed: current.overall.pass_rate >= ruleset.overall_min_pass_rate,
        detail: format!(
            "overall pass rate {:.3} >= {:.3}",
            current.overall.pass_rate, ruleset.overall_min_pass_rate
        ),
    });

    for case in cases {
        if case.min_pass_rate <= 0.0 {
            continue;
        }
        let actual = current
            .per_case
            .get(&case.case_id)
            .map_or(0.0, |stats| stats.pass_rate);
        checks.push(CheckResult {
            name: format!("Per-case floor: {}", case.case_id),
            passed: actual >= case.min_pass_rate,
            detail: format!("{} pass rate {:.3} >= {:.3}", case.case_id, actual, case.min_pass_rate),
        });
    }

    let baseline_absent = baseline.is_absent();

    if !baseline_absent {
        if let Some(baseline_summary) = baseline.summary() {
            let worst: Vec<(&str, f64)> = current
                .per_case
                .iter()
                .filter_map(|(case_id, stats)| {
                    let baseline_stats = baseline_summary.per_case.get(case_id)?;
                    let delta = baseline_stats.pass_rate - stats.pass_rate;
                    (delta > ruleset.max_worst_case_delta).then_some((case_id.as_str(), delta))
                })
                .collect();
            checks.push(CheckResult {
                name: "Worst-case delta ceiling".to_string(),
                passed: worst.is_empty(),
                detail: if worst.is_empty() {
                    format!("no per-case drop exceeds {:.3}", ruleset.max_worst_case_delta)
                } else {
                    let names: Vec<&str> = worst.iter().map(|(case_id, _)| *case_id).collect();
                    format!("worst_case_delta: {}", names.join(", "))
                },
            });
        }

        if ruleset.fail_on_new_regression {
            let regressed: Vec<&str> = diffs
                .iter()
                .filter(|d| d.statuses.contains(&DiffStatus::RegressedNew))
                .map(|d| d.case_id.as_str())
                .collect();
            checks.push(CheckResult {
                name: "New-regression veto".to_string(),
                passed: regressed.is_empty(),
                detail: if regressed.is_empty() {
                    "no new regressions".to_string()
                } else {
                    format!("regressed_new: {}", regressed.join(", "))
                },
            });
        }

        let latency_offenders: Vec<&str> = diffs
            .iter()
            .filter(|d| d.statuses.contains(&DiffStatus::LatencySpike))
            .map(|d| d.case_id.as_str())
            .collect();
        checks.push(CheckResult {
            name: "Latency ceiling".to_string(),
            passed: latency_offenders.is_empty(),
            detail: if latency_offenders.is_empty() {
                format!(
                    "p95 within {:.2}x baseline",
                    ruleset.latency_p95_max_ratio
                )
            } else {
                format!("latency_spike: {}", latency_offenders.join(", "))
            },
        });

        let token_offenders: Vec<&str> = diffs
            .iter()
            .filter(|d| d.statuses.contains(&DiffStatus::TokenInflation))
            .map(|d| d.case_id.as_str())
            .collect();
        checks.push(CheckResult {
            name: "Token ceiling".to_string(),
            passed: token_offenders.is_empty(),
            detail: if token_offenders.is_empty() {
                format!("tokens within {:.2}x baseline", ruleset.token_delta_max_ratio)
            } else {
                format!("token_inflation: {}", token_offenders.join(", "))
            },
        });
    }

    let passed = checks.iter().all(|c| c.passed);

    Ok(GateVerdict {
        passed,
        checks,
        baseline_absent,
    })
}
