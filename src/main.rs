use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use cashflow::api::{Cli, Command, run_calculate, run_http_server};
use cashflow::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    cashflow::logging::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Serve { port } => {
            let config = Config::from_env().context("invalid configuration")?;
            run_http_server(port, &config)
                .await
                .with_context(|| format!("server error on port {port}"))?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Calculate(args) => match run_calculate(args) {
            Ok(report) => {
                print!("{report}");
                Ok(ExitCode::SUCCESS)
            }
            Err(err) => {
                eprintln!("No result: {err}");
                Ok(ExitCode::FAILURE)
            }
        },
    }
}
