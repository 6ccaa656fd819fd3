//! Command line interface definition using clap.

use clap::Parser;
use std::path::PathBuf;

/// A small, strict Make-style build-graph executor.
#[derive(Debug, Parser, Clone, PartialEq, Eq)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the control file to execute.
    #[arg(short, long, value_name = "FILE", default_value = "Makefile")]
    pub file: PathBuf,

    /// Run as if started in this directory.
    ///
    /// This fixes the invocation root: recipe working directories, artifact
    /// staleness checks, and a relative --file are all resolved against it.
    #[arg(short = 'C', long, value_name = "DIR")]
    pub directory: Option<PathBuf>,

    /// Print recipe commands without running them.
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Enable verbose diagnostic logging.
    #[arg(short, long)]
    pub verbose: bool,

    /// Goals to build; arguments of the form NAME=VALUE are variable
    /// overrides instead.
    #[arg(value_name = "GOAL")]
    pub goals: Vec<String>,
}

impl Cli {
    /// Partition positional arguments into goals and `NAME=VALUE`
    /// overrides, preserving order within each group.
    #[must_use]
    pub fn split_goals(&self) -> (Vec<String>, Vec<(String, String)>) {
        let mut goals = Vec::new();
        let mut overrides = Vec::new();
        for arg in &self.goals {
            match parse_override(arg) {
                Some(pair) => overrides.push(pair),
                None => goals.push(arg.clone()),
            }
        }
        (goals, overrides)
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            file: PathBuf::from("Makefile"),
            directory: None,
            dry_run: false,
            verbose: false,
            goals: Vec::new(),
        }
    }
}

/// Interpret `arg` as a variable override when it looks like `NAME=VALUE`
/// with a plausible variable name.
fn parse_override(arg: &str) -> Option<(String, String)> {
    let (name, value) = arg.split_once('=')?;
    if name.is_empty()
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-')
    {
        return None;
    }
    Some((name.to_owned(), value.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("PACKAGE=bar", Some(("PACKAGE", "bar")))]
    #[case("EMPTY=", Some(("EMPTY", "")))]
    #[case("with spaces=x", None)]
    #[case("=oops", None)]
    #[case("plain-goal", None)]
    fn override_detection(#[case] arg: &str, #[case] expected: Option<(&str, &str)>) {
        let expected = expected.map(|(n, v)| (n.to_owned(), v.to_owned()));
        assert_eq!(parse_override(arg), expected);
    }

    #[rstest]
    fn split_goals_preserves_order() {
        let cli = Cli {
            goals: vec![
                "test".to_owned(),
                "PACKAGE=bar".to_owned(),
                "publish".to_owned(),
            ],
            ..Cli::default()
        };
        let (goals, overrides) = cli.split_goals();
        assert_eq!(goals, ["test", "publish"]);
        assert_eq!(overrides, [("PACKAGE".to_owned(), "bar".to_owned())]);
    }
}
