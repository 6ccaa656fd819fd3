//! Error types for the runner module.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised during plan execution.
#[derive(Debug, Error, Diagnostic)]
pub enum RunnerError {
    /// The control file does not exist at the expected path.
    #[error("control file not found at {path}")]
    #[diagnostic(
        code(karakuri::runner::control_file_not_found),
        help("create a Makefile or point --file at one")
    )]
    ControlFileNotFound {
        /// The path that was attempted.
        path: PathBuf,
    },

    /// A recipe line exited with a non-zero status.
    #[error("target `{target}`: command `{command}` failed{}", fmt_status(.code))]
    #[diagnostic(code(karakuri::runner::recipe_failed))]
    Recipe {
        /// The target whose recipe failed.
        target: String,
        /// The expanded command that failed.
        command: String,
        /// The subprocess exit code, absent when killed by a signal.
        code: Option<i32>,
    },
}

fn fmt_status(code: &Option<i32>) -> String {
    code.map_or_else(
        || " (terminated by signal)".to_owned(),
        |c| format!(" with exit code {c}"),
    )
}
