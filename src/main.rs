//! Application entry point.
//!
//! Parses command-line arguments and delegates execution to [`runner::run`].

use clap::Parser;
use karakuri::{cli::Cli, runner, runner::RunnerError};
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::fmt;

/// Exit code for parse, expansion, and planning failures, distinct from any
/// recipe's own status.
const PLANNING_FAILURE: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let max_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::ERROR
    };
    fmt()
        .with_max_level(max_level)
        .with_writer(std::io::stderr)
        .init();
    match runner::run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "run failed");
            exit_code_for(&err)
        }
    }
}

/// Propagate the first failing recipe's exit status; everything else is a
/// planning-phase failure.
fn exit_code_for(err: &anyhow::Error) -> ExitCode {
    match err.downcast_ref::<RunnerError>() {
        Some(RunnerError::Recipe {
            code: Some(code), ..
        }) => u8::try_from(*code).map_or(ExitCode::FAILURE, ExitCode::from),
        _ => ExitCode::from(PLANNING_FAILURE),
    }
}
