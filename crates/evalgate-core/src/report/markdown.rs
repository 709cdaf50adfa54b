//! Hand-built Markdown rendering: `String` + `push_str`, no templating
//! engine, matching the teacher's `report::junit`/`report::console` style.

use crate::engine::flakiness::FlakinessReport;
use crate::engine::gate::GateVerdict;
use crate::model::{CaseDiff, DiffStatus};

/// Renders the full gate report for one `run_id`.
#[must_use]
pub fn render(
    run_id: &str,
    verdict: &GateVerdict,
    diffs: &[CaseDiff],
    flakiness: &[FlakinessReport],
) -> String {
    let mut out = String::new();

    render_header(&mut out, run_id, verdict);
    render_checks_table(&mut out, verdict);
    render_explanations_table(&mut out, diffs);
    render_stability_report(&mut out, flakiness);

    if verdict.baseline_absent {
        out.push_str("\n> No baseline was available; only baseline-independent checks ran.\n");
    }

    out
}

fn render_header(out: &mut String, run_id: &str, verdict: &GateVerdict) {
    let verdict_word = if verdict.passed { "PASS" } else { "FAIL" };
    out.push_str(&format!("# Gate verdict: **{verdict_word}**\n\n"));
    out.push_str(&format!("Run: `{run_id}`\n\n"));
}

fn render_checks_table(out: &mut String, verdict: &GateVerdict) {
    out.push_str("| Check | Result | Detail |\n");
    out.push_str("|---|---|---|\n");
    for check in &verdict.checks {
        let mark = if check.passed { "\u{2705}" } else { "\u{274c}" };
        out.push_str(&format!("| {} | {mark} | {} |\n", check.name, check.detail));
    }
    out.push('\n');
}

fn render_explanations_table(out: &mut String, diffs: &[CaseDiff]) {
    let mut notable: Vec<&CaseDiff> = diffs
        .iter()
        .filter(|d| !matches!(d.statuses.as_slice(), [DiffStatus::Stable] | [DiffStatus::Improved]))
        .collect();
    if notable.is_empty() {
        return;
    }
    notable.sort_by(|a, b| a.severity.cmp(&b.severity).then_with(|| a.case_id.cmp(&b.case_id)));

    out.push_str("## Failure Explanations\n\n");
    out.push_str("| Severity | Case | Status | Explanation |\n");
    out.push_str("|---|---|---|---|\n");
    for diff in notable {
        let statuses = diff
            .statuses
            .iter()
            .map(status_label)
            .collect::<Vec<_>>()
            .join(", ");
        out.push_str(&format!(
            "| {} | {} | {statuses} | {} |\n",
            diff.severity, diff.case_id, diff.explanation
        ));
    }
    out.push('\n');
}

fn status_label(status: &DiffStatus) -> &'static str {
    match status {
        DiffStatus::RegressedNew => "regressed_new",
        DiffStatus::RegressedTypeChange => "regressed_type_change",
        DiffStatus::SchemaDiverged => "schema_diverged",
        DiffStatus::LatencySpike => "latency_spike",
        DiffStatus::TokenInflation => "token_inflation",
        DiffStatus::Improved => "improved",
        DiffStatus::Unseen => "unseen",
        DiffStatus::Stable => "stable",
    }
}

fn render_stability_report(out: &mut String, flakiness: &[FlakinessReport]) {
    if flakiness.is_empty() {
        return;
    }
    out.push_str("## Stability Report\n\n");
    out.push_str("| Case | Attempts | Pass rate | Flaky | Latency CV |\n");
    out.push_str("|---|---|---|---|---|\n");
    for report in flakiness {
        let flag = if report.flaky { "\u{1f3b2}" } else { "" };
        out.push_str(&format!(
            "| {} | {} | {:.3} | {flag} | {:.3} |\n",
            report.case_id, report.attempts, report.pass_rate, report.latency_cv
        ));
    }
    out.push('\n');
}
