//! Control-file loading helpers.
//!
//! This module reads a `Makefile`-style control file and parses it into the
//! [`ControlFile`](crate::ast::ControlFile) AST. Each physical line is
//! classified as a recipe line, conditional directive, export directive,
//! variable assignment, rule header, or comment; anything else is a fatal
//! [`ParseError`] naming the offending line. Classification is purely
//! syntactic: variable references are preserved verbatim and resolved later
//! by the `vars` module.

use crate::ast::ControlFile;
use anyhow::{Context, Result};
use miette::Diagnostic;
use std::{fs, path::Path};
use thiserror::Error;

mod parse;

/// Errors raised while classifying control-file lines.
#[derive(Debug, Error, Diagnostic, PartialEq, Eq)]
pub enum ParseError {
    /// The line is not a recognised declaration form.
    #[error("line {line}: cannot classify declaration: {text}")]
    #[diagnostic(code(karakuri::makefile::unclassified))]
    Unclassified {
        /// One-based line number.
        line: usize,
        /// The offending line text.
        text: String,
    },

    /// A tab-indented line appeared before any rule header.
    #[error("line {line}: recipe line appears before any target")]
    #[diagnostic(
        code(karakuri::makefile::recipe_outside_rule),
        help("recipe lines must follow a `target: prerequisites` header")
    )]
    RecipeOutsideRule {
        /// One-based line number.
        line: usize,
    },

    /// An `ifeq`/`ifneq` directive is not of the form `ifeq (A,B)`.
    #[error("line {line}: malformed conditional: {text}")]
    #[diagnostic(code(karakuri::makefile::malformed_conditional))]
    MalformedConditional {
        /// One-based line number.
        line: usize,
        /// The offending line text.
        text: String,
    },

    /// An `else` or `endif` with no matching open conditional.
    #[error("line {line}: `{directive}` without an open conditional")]
    #[diagnostic(code(karakuri::makefile::unexpected_directive))]
    UnexpectedDirective {
        /// One-based line number.
        line: usize,
        /// The directive keyword.
        directive: String,
    },

    /// A conditional block was still open at end of file.
    #[error("line {line}: conditional is never closed with `endif`")]
    #[diagnostic(code(karakuri::makefile::unterminated_conditional))]
    UnterminatedConditional {
        /// Line of the opening `ifeq`/`ifneq`.
        line: usize,
    },

    /// A rule header with no target names before the colon.
    #[error("line {line}: rule header has no target name")]
    #[diagnostic(code(karakuri::makefile::missing_target))]
    MissingTargetName {
        /// One-based line number.
        line: usize,
    },

    /// An `export` directive naming no variable.
    #[error("line {line}: `export` requires at least one variable name")]
    #[diagnostic(code(karakuri::makefile::export_missing_name))]
    ExportMissingName {
        /// One-based line number.
        line: usize,
    },
}

/// Parse a control file from a string.
///
/// # Errors
///
/// Returns a [`ParseError`] when a line cannot be classified or a
/// conditional block is unbalanced.
pub fn from_str(source: &str) -> std::result::Result<ControlFile, ParseError> {
    parse::parse(source)
}

/// Load a [`ControlFile`] from the given path.
///
/// # Errors
///
/// Returns an error if the file cannot be read or fails to parse.
pub fn from_path(path: impl AsRef<Path>) -> Result<ControlFile> {
    let path_ref = path.as_ref();
    let data = fs::read_to_string(path_ref)
        .with_context(|| format!("failed to read control file {}", path_ref.display()))?;
    from_str(&data).with_context(|| format!("failed to parse {}", path_ref.display()))
}

#[cfg(test)]
mod tests;
