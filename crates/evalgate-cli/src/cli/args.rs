use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "evalgate",
    version,
    about = "CI-native regression gate for agent/LLM pipelines"
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,

    /// Raise the log filter to `debug` for this invocation.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Execute a case suite against the configured agent and persist records.
    Run(RunArgs),
    /// Evaluate the gate for a run_id against a baseline; exit 0/1.
    Check(CheckArgs),
    /// Render a Markdown report over a window, without evaluating a verdict.
    Report(ReportArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct RunArgs {
    /// Path to the tabular case file.
    pub cases_file: PathBuf,

    /// Directory the record store writes day-partitioned JSONL files into.
    #[arg(long)]
    pub log_dir: PathBuf,

    /// Batch identifier shared by every record this invocation writes.
    #[arg(long)]
    pub run_id: Option<String>,

    /// Repetitions per case.
    #[arg(long, default_value_t = 1)]
    pub repeat: u32,

    /// Maximum concurrently in-flight invocations.
    #[arg(long, default_value_t = 4)]
    pub concurrency: usize,

    /// Per-item deadline, in seconds.
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,

    /// Agent command: invoked once per case, fed the case as JSON on stdin,
    /// expected to print `{text, json, tokens_total, cost}` JSON on stdout.
    #[arg(long)]
    pub agent_command: String,
}

#[derive(clap::Args, Debug, Clone)]
pub struct CheckArgs {
    /// Directory the record store reads day-partitioned JSONL files from.
    #[arg(long)]
    pub log_dir: PathBuf,

    /// Directory of prior records to use as the baseline (directory mode).
    #[arg(long, conflicts_with = "baseline_days")]
    pub baseline_dir: Option<PathBuf>,

    /// Width of a trailing baseline window, in days (trailing-window mode).
    #[arg(long, conflicts_with = "baseline_dir")]
    pub baseline_days: Option<u32>,

    /// Path to the ruleset/override configuration document (YAML).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Path to the case file, used for per-case `min_pass_rate` floors.
    #[arg(long)]
    pub cases_file: Option<PathBuf>,

    /// Comma-separated PR labels, used to select config overrides.
    #[arg(long, value_delimiter = ',')]
    pub labels: Vec<String>,

    /// Comma-separated changed file paths, used to select config overrides.
    #[arg(long, value_delimiter = ',')]
    pub changed_files: Vec<String>,

    /// Write the Markdown report here instead of stdout.
    #[arg(long, short = 'o')]
    pub output_file: Option<PathBuf>,

    /// Overrides the resolved S1 pass-rate floor; applied last, always wins.
    #[arg(long)]
    pub s1_threshold: Option<f64>,

    /// Overrides the resolved overall pass-rate floor; applied last, always wins.
    #[arg(long)]
    pub overall_threshold: Option<f64>,

    /// The run_id to evaluate; defaults to the most recent run in `log_dir`.
    #[arg(long)]
    pub run_id: Option<String>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ReportArgs {
    /// Directory the record store reads day-partitioned JSONL files from.
    #[arg(long)]
    pub log_dir: PathBuf,

    /// Width of the current window, in days.
    #[arg(long)]
    pub days: u32,

    /// Width of the trailing baseline window, in days.
    #[arg(long)]
    pub baseline_days: u32,

    /// Write the Markdown report here instead of stdout.
    #[arg(long, short = 'o')]
    pub output_file: Option<PathBuf>,
}
