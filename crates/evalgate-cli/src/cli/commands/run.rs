use crate::cli::args::RunArgs;
use crate::exit_codes::{EXIT_FAILURE, EXIT_IO, EXIT_SUCCESS, EXIT_USAGE};
use crate::process_invoker::ProcessInvoker;
use evalgate_core::engine::runner::{self, RunOptions};
use evalgate_core::store::RecordStore;
use std::sync::Arc;
use std::time::Duration;

pub async fn run(args: RunArgs) -> anyhow::Result<i32> {
    let cases = match evalgate_core::case_loader::load_cases(&args.cases_file) {
        Ok(cases) => cases,
        Err(err) => {
            eprintln!("error: {err}");
            return Ok(EXIT_USAGE);
        }
    };

    let store = match RecordStore::open(&args.log_dir) {
        Ok(store) => store,
        Err(err) => {
            eprintln!("error: {err}");
            return Ok(EXIT_IO);
        }
    };

    let run_id = args
        .run_id
        .clone()
        .unwrap_or_else(|| chrono::Utc::now().format("%Y%m%dT%H%M%S%.fZ").to_string());

    let invoker = Arc::new(ProcessInvoker::new(args.agent_command.clone()));

    let report = runner::run(
        &cases,
        invoker,
        &store,
        RunOptions {
            run_id: run_id.clone(),
            repeat_n: args.repeat.max(1),
            concurrency: args.concurrency,
            timeout: Duration::from_secs(args.timeout),
        },
    )
    .await;

    let passed = report.records.iter().filter(|r| r.passed).count();
    let total = report.records.len();
    println!("run {run_id}: {passed}/{total} passed ({} write failures)", report.write_failures);

    Ok(if report.all_passed() { EXIT_SUCCESS } else { EXIT_FAILURE })
}
