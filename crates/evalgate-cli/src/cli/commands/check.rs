use crate::cli::args::CheckArgs;
use crate::exit_codes::{EXIT_FAILURE, EXIT_IO, EXIT_SUCCESS, EXIT_USAGE};
use evalgate_core::config::{CliOverrides, ConfigDocument, SelectionContext};
use evalgate_core::engine::{aggregator, baseline, diff, flakiness, gate};
use evalgate_core::model::Severity;
use evalgate_core::store::RecordStore;
use std::collections::BTreeMap;

pub async fn run(args: CheckArgs) -> anyhow::Result<i32> {
    let store = match RecordStore::open(&args.log_dir) {
        Ok(store) => store,
        Err(err) => {
            eprintln!("error: {err}");
            return Ok(EXIT_IO);
        }
    };

    let run_records = match &args.run_id {
        Some(run_id) => match store.read_run(run_id) {
            Ok(records) => records,
            Err(err) => {
                eprintln!("error: {err}");
                return Ok(EXIT_IO);
            }
        },
        None => match store.read_latest_run() {
            Ok(records) => records,
            Err(err) => {
                eprintln!("error: {err}");
                return Ok(EXIT_IO);
            }
        },
    };

    let run_id = args
        .run_id
        .clone()
        .or_else(|| run_records.first().map(|r| r.run_id.clone()))
        .unwrap_or_default();

    let config_doc = match &args.config {
        Some(path) => match evalgate_core::config::load_config(path) {
            Ok(doc) => doc,
            Err(err) => {
                eprintln!("error: {err}");
                return Ok(EXIT_USAGE);
            }
        },
        None => ConfigDocument::default(),
    };

    let selection = SelectionContext {
        labels: args.labels.clone(),
        changed_files: args.changed_files.clone(),
    };
    let cli_overrides = CliOverrides {
        s1_threshold: args.s1_threshold,
        overall_threshold: args.overall_threshold,
    };
    let ruleset = match evalgate_core::config::resolve_ruleset(&config_doc, &selection, &cli_overrides) {
        Ok(ruleset) => ruleset,
        Err(err) => {
            eprintln!("error: {err}");
            return Ok(EXIT_USAGE);
        }
    };

    let cases = match &args.cases_file {
        Some(path) => match evalgate_core::case_loader::load_cases(path) {
            Ok(cases) => cases,
            Err(err) => {
                eprintln!("error: {err}");
                return Ok(EXIT_USAGE);
            }
        },
        None => Vec::new(),
    };
    let severities: BTreeMap<String, Severity> =
        cases.iter().map(|c| (c.case_id.clone(), c.severity)).collect();

    let baseline_summary = match (&args.baseline_dir, args.baseline_days) {
        (Some(dir), _) => match baseline::resolve_from_directory(dir) {
            Ok(summary) => summary,
            Err(err) => {
                eprintln!("error: {err}");
                return Ok(EXIT_IO);
            }
        },
        (None, Some(days)) => {
            let end_date = chrono::Utc::now().date_naive() + chrono::Duration::days(1);
            match baseline::resolve_from_window(&store, days, end_date, &run_id) {
                Ok(summary) => summary,
                Err(err) => {
                    eprintln!("error: {err}");
                    return Ok(EXIT_IO);
                }
            }
        }
        (None, None) => evalgate_core::model::BaselineSummary::Absent,
    };

    let current_summary = aggregator::summarize(&run_records);
    let thresholds = diff::DiffThresholds {
        latency_p95_max_ratio: ruleset.latency_p95_max_ratio,
        token_delta_max_ratio: ruleset.token_delta_max_ratio,
    };
    let diffs = diff::diff_cases(&current_summary, baseline_summary.summary(), &severities, thresholds);
    let flakiness_reports = flakiness::analyze(&run_records, &run_id);

    let verdict = match gate::evaluate(&run_id, &current_summary, &baseline_summary, &ruleset, &cases, &diffs) {
        Ok(verdict) => verdict,
        Err(err) => {
            let markdown = format!("# Gate verdict: **FAIL**\n\n{err}\n");
            emit(&args.output_file, &markdown)?;
            return Ok(EXIT_FAILURE);
        }
    };

    let markdown = evalgate_core::report::markdown::render(&run_id, &verdict, &diffs, &flakiness_reports);
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
