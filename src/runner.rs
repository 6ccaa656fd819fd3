//! CLI execution and plan dispatch logic.
//!
//! This module keeps `main` minimal by providing a single entry point that
//! loads the control file, resolves variables, plans the requested goals,
//! and executes each plan entry's recipe, short-circuiting on the first
//! fatal failure.

mod error;

pub use error::RunnerError;

use crate::cli::Cli;
use crate::graph::{BuildGraph, Target};
use crate::plan::{self, ExecutionPlan};
use crate::vars::{self, EnvPair, VarTable};
use crate::makefile;
use anyhow::{Context, Result, anyhow};
use camino::{Utf8Path, Utf8PathBuf};
use std::path::PathBuf;
use std::{env, fs};
use tracing::{debug, info, warn};

mod process;

/// Default shell interpreter for recipe lines.
///
/// A `SHELL` variable declared in the control file or on the command line
/// overrides this; one merely inherited from the environment deliberately
/// does not, so a user's login shell cannot change recipe semantics.
pub const SHELL_PROGRAM: &str = "sh";

/// Execute the parsed [`Cli`] invocation.
///
/// # Errors
///
/// Returns an error when parsing, resolution, planning, or any recipe
/// fails. Recipe failures surface as [`RunnerError::Recipe`] so callers
/// can propagate the subprocess exit status.
pub fn run(cli: &Cli) -> Result<()> {
    let root = resolve_root(cli)?;
    let control_path = resolve_control_path(cli, &root);
    if !control_path.exists() {
        return Err(RunnerError::ControlFileNotFound { path: control_path }.into());
    }

    let file = makefile::from_path(&control_path)?;
    let (goals, overrides) = cli.split_goals();
    let resolved = vars::resolve(&file, &overrides)
        .with_context(|| format!("resolving variables in {}", control_path.display()))?;
    let graph = BuildGraph::from_resolved(&resolved)
        .with_context(|| format!("building target graph from {}", control_path.display()))?;
    let execution_plan = plan::plan(&graph, &root, &goals)?;
    debug!(plan = ?execution_plan.entries(), "execution plan computed");

    let overlay = resolved
        .table
        .env_overlay()
        .context("materialising exported environment")?;
    let shell = resolved
        .table
        .get_declared("SHELL")
        .context("expanding SHELL")?
        .unwrap_or_else(|| SHELL_PROGRAM.to_owned());

    execute(&execution_plan, &graph, &resolved.table, &ExecContext {
        root: &root,
        shell: &shell,
        overlay: &overlay,
        dry_run: cli.dry_run,
    })
}

/// Shared, read-only settings for one run.
struct ExecContext<'a> {
    root: &'a Utf8Path,
    shell: &'a str,
    overlay: &'a [EnvPair],
    dry_run: bool,
}

fn execute(
    execution_plan: &ExecutionPlan,
    graph: &BuildGraph,
    table: &VarTable,
    ctx: &ExecContext<'_>,
) -> Result<()> {
    let mut ran_any = false;
    for name in execution_plan.entries() {
        let Some(target) = graph.targets.get(name) else {
            debug!(goal = %name, "plan entry has no declared target; skipping");
            continue;
        };
        if !needs_run(graph, target, ctx.root) {
            info!(goal = %name, "up to date");
            continue;
        }
        ran_any = true;
        run_recipe(target, table, ctx)?;
    }
    if !ran_any {
        info!("nothing to be done");
    }
    Ok(())
}

/// Decide whether a plan entry must execute.
///
/// Phony targets always run. A file target runs when its artifact is
/// missing, any prerequisite is itself phony, any prerequisite artifact is
/// missing, or any prerequisite artifact is newer than the target's.
fn needs_run(graph: &BuildGraph, target: &Target, root: &Utf8Path) -> bool {
    if target.phony {
        return true;
    }
    let Some(own_mtime) = process::artifact_mtime(root, &target.name) else {
        debug!(goal = %target.name, "artifact missing; rebuilding");
        return true;
    };
    for prereq in &target.prereqs {
        if graph.targets.get(prereq).is_some_and(|t| t.phony) {
            debug!(goal = %target.name, prereq = %prereq, "phony prerequisite forces rebuild");
            return true;
        }
        match process::artifact_mtime(root, prereq) {
            None => {
                debug!(goal = %target.name, prereq = %prereq, "prerequisite artifact missing; rebuilding");
                return true;
            }
            Some(mtime) if mtime > own_mtime => {
                debug!(goal = %target.name, prereq = %prereq, "prerequisite is newer; rebuilding");
                return true;
            }
            Some(_) => {}
        }
    }
    false
}

fn run_recipe(target: &Target, table: &VarTable, ctx: &ExecContext<'_>) -> Result<()> {
    for line in &target.recipe {
        let command = table
            .expand(&line.command)
            .with_context(|| format!("expanding recipe of target `{}`", target.name))?;
        if !line.silent || ctx.dry_run {
            println!("{command}");
        }
        if ctx.dry_run {
            continue;
        }
        let status = process::run_shell(ctx.shell, &command, ctx.root, ctx.overlay)
            .with_context(|| format!("spawning `{}` for target `{}`", ctx.shell, target.name))?;
        if status.success() {
            continue;
        }
        if line.ignore_error {
            warn!(goal = %target.name, command = %command, status = %status, "ignoring recipe failure");
            continue;
        }
        return Err(RunnerError::Recipe {
            target: target.name.clone(),
            command,
            code: status.code(),
        }
        .into());
    }
    Ok(())
}

/// Resolve the invocation root: `--directory` when given, the current
/// directory otherwise. The root must be valid UTF-8 because target names
/// double as artifact paths beneath it.
fn resolve_root(cli: &Cli) -> Result<Utf8PathBuf> {
    let root = match &cli.directory {
        Some(dir) => fs::canonicalize(dir)
            .with_context(|| format!("entering directory {}", dir.display()))?,
        None => env::current_dir().context("resolving current directory")?,
    };
    Utf8PathBuf::from_path_buf(root)
        .map_err(|bad| anyhow!("invocation root {} is not valid UTF-8", bad.display()))
}

/// Locate the control file relative to the invocation root.
fn resolve_control_path(cli: &Cli, root: &Utf8Path) -> PathBuf {
    if cli.file.is_absolute() {
        cli.file.clone()
    } else {
        root.as_std_path().join(&cli.file)
    }
}
