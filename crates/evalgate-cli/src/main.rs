use clap::Parser;

mod cli;
pub mod exit_codes;
mod process_invoker;

use cli::args::Cli;
use cli::commands::dispatch;

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .init();

    let code = match dispatch(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("fatal: {err:?}");
            exit_codes::EXIT_USAGE
        }
    };
    std::process::exit(code);
}
