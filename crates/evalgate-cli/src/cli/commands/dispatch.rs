use super::super::args::{Cli, Command};

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Run(args) => super::run::run(args).await,
        Command::Check(args) => super::check::run(args).await,
        Command::Report(args) => super::report::run(args).await,
    }
}
