//! Execution planning: prerequisite-first linearisation of the graph.
//!
//! Planning is a depth-first traversal from the requested goals. Each
//! target enters the plan exactly once, after all of its prerequisites, so
//! a target shared by two branches of the graph is executed once per
//! invocation. A target encountered while still on the traversal path is a
//! dependency cycle; an undeclared prerequisite is either a filesystem leaf
//! (its artifact exists and needs no execution) or a fatal unknown-target
//! error.

use crate::graph::BuildGraph;
use camino::Utf8Path;
use itertools::Itertools;
use miette::Diagnostic;
use std::collections::HashMap;
use thiserror::Error;

/// Errors raised while planning an invocation.
#[derive(Debug, Error, Diagnostic, PartialEq, Eq)]
pub enum PlanError {
    /// The prerequisite graph contains a cycle.
    #[error("dependency cycle detected: {}", .cycle.iter().join(" -> "))]
    #[diagnostic(code(karakuri::plan::cyclic_dependency))]
    CyclicDependency {
        /// The offending path; first and last entries repeat the cycle head.
        cycle: Vec<String>,
    },

    /// A name is neither a declared target nor an existing artifact.
    #[error("no rule to make target `{name}`{}", .wanted_by.as_ref().map(|by| format!(", needed by `{by}`")).unwrap_or_default())]
    #[diagnostic(code(karakuri::plan::unknown_target))]
    UnknownTarget {
        /// The missing name.
        name: String,
        /// The target that listed it, when reached as a prerequisite.
        wanted_by: Option<String>,
    },

    /// No goal was requested and the file declares no targets.
    #[error("no goals requested and the control file declares no targets")]
    #[diagnostic(code(karakuri::plan::no_goal))]
    NoGoal,
}

/// The ordered, deduplicated sequence of targets to run for one
/// invocation. Derived per requested goal set and discarded after the run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionPlan {
    entries: Vec<String>,
}

impl ExecutionPlan {
    /// Target names in execution order.
    #[must_use]
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Whether nothing needs to run.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Tracks the visitation state of a target during planning.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum VisitState {
    Visiting,
    Visited,
}

/// Compute the execution plan for `goals`.
///
/// An empty goal list selects the default goal. A requested goal that is
/// undeclared but backed by an existing artifact under `root` plans
/// nothing, by the same rule applied to prerequisites.
///
/// # Errors
///
/// Returns [`PlanError`] on cycles, unknown names, or a goal-less
/// invocation of an empty file.
pub fn plan(graph: &BuildGraph, root: &Utf8Path, goals: &[String]) -> Result<ExecutionPlan, PlanError> {
    let default;
    let goals: Vec<&str> = if goals.is_empty() {
        default = graph.default_goal().ok_or(PlanError::NoGoal)?;
        vec![default]
    } else {
        goals.iter().map(String::as_str).collect()
    };

    let mut planner = Planner {
        graph,
        root,
        stack: Vec::new(),
        states: HashMap::new(),
        entries: Vec::new(),
    };
    for goal in goals {
        if !graph.targets.contains_key(goal) {
            if planner.artifact_exists(goal) {
                tracing::debug!(goal, "requested goal is an existing artifact; nothing to do");
                continue;
            }
            return Err(PlanError::UnknownTarget {
                name: goal.to_owned(),
                wanted_by: None,
            });
        }
        planner.visit(goal)?;
    }
    Ok(ExecutionPlan {
        entries: planner.entries,
    })
}

struct Planner<'a> {
    graph: &'a BuildGraph,
    root: &'a Utf8Path,
    stack: Vec<String>,
    states: HashMap<String, VisitState>,
    entries: Vec<String>,
}

impl Planner<'_> {
    fn visit(&mut self, name: &str) -> Result<(), PlanError> {
        match self.states.get(name) {
            Some(VisitState::Visited) => return Ok(()),
            Some(VisitState::Visiting) => {
                let idx = self.stack.iter().position(|n| n == name).unwrap_or(0);
                let mut cycle: Vec<String> = self.stack.iter().skip(idx).cloned().collect();
                cycle.push(name.to_owned());
                return Err(PlanError::CyclicDependency {
                    cycle: canonicalize_cycle(cycle),
                });
            }
            None => {
                self.states
                    .insert(name.to_owned(), VisitState::Visiting);
            }
        }
        self.stack.push(name.to_owned());

        // The caller guarantees the name is declared; prerequisites may not be.
        let prereqs = self
            .graph
            .targets
            .get(name)
            .map(|t| t.prereqs.clone())
            .unwrap_or_default();
        for prereq in &prereqs {
            if self.graph.targets.contains_key(prereq) {
                self.visit(prereq)?;
            } else if self.artifact_exists(prereq) {
                tracing::debug!(prereq = %prereq, dependent = name, "prerequisite is a filesystem leaf");
            } else {
                return Err(PlanError::UnknownTarget {
                    name: prereq.clone(),
                    wanted_by: Some(name.to_owned()),
                });
            }
        }

        self.stack.pop();
        self.states.insert(name.to_owned(), VisitState::Visited);
        self.entries.push(name.to_owned());
        Ok(())
    }

    fn artifact_exists(&self, name: &str) -> bool {
        self.root.join(name).as_std_path().exists()
    }
}

/// Rotate a cycle so it starts at its lexicographically smallest node,
/// keeping diagnostics stable regardless of where the traversal entered.
fn canonicalize_cycle(mut cycle: Vec<String>) -> Vec<String> {
    if cycle.len() < 2 {
        return cycle;
    }
    let len = cycle.len() - 1;
    let start = cycle
        .iter()
        .take(len)
        .enumerate()
        .min_by(|(_, a), (_, b)| a.cmp(b))
        .map_or(0, |(idx, _)| idx);
    let (prefix, suffix) = cycle.split_at_mut(len);
    prefix.rotate_left(start);
    if let (Some(first), Some(slot)) = (prefix.first().cloned(), suffix.first_mut()) {
        slot.clone_from(&first);
    }
    cycle
}
