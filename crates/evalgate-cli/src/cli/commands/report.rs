use crate::cli::args::ReportArgs;
use crate::exit_codes::{EXIT_FAILURE, EXIT_IO, EXIT_SUCCESS};
use evalgate_core::engine::{aggregator, baseline, diff, flakiness, gate};
use evalgate_core::model::Ruleset;
use evalgate_core::store::RecordStore;
use std::collections::BTreeMap;

pub async fn run(args: ReportArgs) -> anyhow::Result<i32> {
    let store = match RecordStore::open(&args.log_dir) {
        Ok(store) => store,
        Err(err) => {
            eprintln!("error: {err}");
            return Ok(EXIT_IO);
        }
    };

    let current_end = chrono::Utc::now().date_naive() + chrono::Duration::days(1);
    let current_start = current_end - chrono::Duration::days(i64::from(args.days));

    let current_records = match store.read_window(current_start, current_end) {
        Ok(records) => records,
        Err(err) => {
            eprintln!("error: {err}");
            return Ok(EXIT_IO);
        }
    };

    let baseline_summary = match baseline::resolve_from_window(&store, args.baseline_days, current_start, "") {
        Ok(summary) => summary,
        Err(err) => {
            eprintln!("error: {err}");
            return Ok(EXIT_IO);
        }
    };

    let current_summary = aggregator::summarize(&current_records);
    let ruleset = Ruleset::default();
    let thresholds = diff::DiffThresholds {
        latency_p95_max_ratio: ruleset.latency_p95_max_ratio,
        token_delta_max_ratio: ruleset.token_delta_max_ratio,
    };
    let diffs = diff::diff_cases(
        &current_summary,
        baseline_summary.summary(),
        &BTreeMap::new(),
        thresholds,
    );
    let flakiness_reports = flakiness::analyze(&current_records, "");

    let label = format!("trailing {}d window", args.days);
    let verdict = match gate::evaluate(&label, &current_summary, &baseline_summary, &ruleset, &[], &diffs) {
        Ok(verdict) => verdict,
        Err(err) => {
            let markdown = format!("# Gate verdict: **FAIL**\n\n{err}\n");
            emit(&args.output_file, &markdown)?;
            return Ok(EXIT_FAILURE);
        }
    };

    let markdown = evalgate_core::report::markdown::render(&label, &verdict, &diffs, &flakiness_reports);
    emit(&args.output_file, &markdown)?;

    Ok(if verdict.passed { EXIT_SUCCESS } else { EXIT_FAILURE })
}

fn emit(output_file: &Option<std::path::PathBuf>, markdown: &str) -> anyhow::Result<()> {
    match output_file {
        Some(path) => std::fs::write(path, markdown)?,
        None => println!("{markdown}"),
    }
    Ok(())
}
