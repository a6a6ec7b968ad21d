use clap::Parser;
use rollgate::cli::{run_cli, Cli};
use rollgate::logging::{init_logging, LogConfig};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = init_logging(&LogConfig::from_env()) {
        eprintln!("Error: {e:#}");
        return ExitCode::FAILURE;
    }

    match run_cli(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "rollgate exited with an error");
            // The non-blocking writer is not flushed on exit; repeat on stderr.
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
