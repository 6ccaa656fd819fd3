//! The target graph constructed after variable resolution.
//!
//! Target and prerequisite names are expanded here, once, against the
//! frozen [`VarTable`]: a name such as `$(PACKAGE).whl` becomes concrete
//! before planning begins. The table preserves declaration order; the
//! first target in the file is the default goal.

use crate::ast::RecipeLine;
use crate::vars::{ExpandError, Resolved, VarTable};
use indexmap::IndexMap;
use miette::Diagnostic;
use std::collections::HashSet;
use thiserror::Error;

/// Errors raised while constructing the target graph.
#[derive(Debug, Error, Diagnostic, PartialEq, Eq)]
pub enum GraphError {
    /// Two rules declare the same target name.
    #[error("target `{name}` is declared more than once")]
    #[diagnostic(code(karakuri::graph::duplicate_target))]
    DuplicateTarget {
        /// The duplicated name.
        name: String,
    },

    /// A rule header's target names all expanded to nothing.
    #[error("a rule's target names expanded to the empty string")]
    #[diagnostic(code(karakuri::graph::empty_target_list))]
    EmptyTargetList,

    /// Variable expansion failed inside a name.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Expand(#[from] ExpandError),
}

/// A single build target: prerequisites, recipe, and phony flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Concrete (expanded) target name; doubles as the artifact path for
    /// non-phony targets.
    pub name: String,
    /// Concrete prerequisite names, in declaration order.
    pub prereqs: Vec<String>,
    /// Recipe lines in file order, still unexpanded.
    pub recipe: Vec<RecipeLine>,
    /// Phony targets have no artifact and always re-run when reached.
    pub phony: bool,
}

/// The immutable prerequisite graph for one invocation.
#[derive(Debug, Clone, Default)]
pub struct BuildGraph {
    /// Targets keyed by name, in declaration order.
    pub targets: IndexMap<String, Target>,
}

impl BuildGraph {
    /// Build the graph from resolved statements.
    ///
    /// Rules with several names before the colon produce one target per
    /// name, sharing the prerequisite list and recipe. `.PHONY` names are
    /// expanded and matched against declared targets; names with no
    /// matching target are logged and ignored.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError`] on duplicate or empty target names, or when
    /// expanding a name fails.
    pub fn from_resolved(resolved: &Resolved) -> Result<Self, GraphError> {
        let mut graph = Self::default();
        for rule in &resolved.rules {
            let names = expand_names(&resolved.table, &rule.targets)?;
            if names.is_empty() {
                return Err(GraphError::EmptyTargetList);
            }
            let prereqs = expand_names(&resolved.table, &rule.prereqs)?;
            for name in names {
                if graph.targets.contains_key(&name) {
                    return Err(GraphError::DuplicateTarget { name });
                }
                let target = Target {
                    name: name.clone(),
                    prereqs: prereqs.clone(),
                    recipe: rule.recipe.clone(),
                    phony: false,
                };
                graph.targets.insert(name, target);
            }
        }
        graph.mark_phony(resolved)?;
        Ok(graph)
    }

    fn mark_phony(&mut self, resolved: &Resolved) -> Result<(), GraphError> {
        let phony: HashSet<String> = expand_names(&resolved.table, &resolved.phony)?
            .into_iter()
            .collect();
        for name in &phony {
            match self.targets.get_mut(name) {
                Some(target) => target.phony = true,
                None => {
                    tracing::debug!(name = %name, "phony declaration names no target");
                }
            }
        }
        Ok(())
    }

    /// The default goal: the first target declared in the file.
    #[must_use]
    pub fn default_goal(&self) -> Option<&str> {
        self.targets.keys().next().map(String::as_str)
    }
}

/// Expand each raw name and split the result on whitespace, so a single
/// `$(WHEELS)` reference may contribute several names.
fn expand_names(table: &VarTable, raw: &[String]) -> Result<Vec<String>, ExpandError> {
    let mut names = Vec::with_capacity(raw.len());
    for item in raw {
        let expanded = table.expand(item)?;
        names.extend(expanded.split_whitespace().map(str::to_owned));
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, reason = "tests assert on graph construction")]

    use super::*;
    use crate::makefile;
    use crate::vars;
    use rstest::rstest;

    fn graph_for(source: &str) -> Result<BuildGraph, GraphError> {
        let file = makefile::from_str(source).expect("parse");
        let resolved = vars::resolve_with_env(&file, &[], []).expect("resolve");
        BuildGraph::from_resolved(&resolved)
    }

    #[rstest]
    fn first_target_is_default_goal() {
        let graph = graph_for("a: b\n\techo a\nb:\n\techo b\n").expect("graph");
        assert_eq!(graph.default_goal(), Some("a"));
    }

    #[rstest]
    fn expands_target_and_prereq_names() {
        let source = "PKG := demo\n$(PKG).whl: $(PKG)/setup.py\n\techo build\n";
        let graph = graph_for(source).expect("graph");
        let target = graph.targets.get("demo.whl").expect("target");
        assert_eq!(target.prereqs, vec!["demo/setup.py".to_owned()]);
    }

    #[rstest]
    fn single_reference_may_yield_several_targets() {
        let source = "BOTH := a b\n$(BOTH):\n\techo hi\n";
        let graph = graph_for(source).expect("graph");
        assert!(graph.targets.contains_key("a"));
        assert!(graph.targets.contains_key("b"));
        assert_eq!(graph.targets["a"].recipe, graph.targets["b"].recipe);
    }

    #[rstest]
    fn duplicate_target_is_rejected() {
        let err = graph_for("a:\n\techo 1\na:\n\techo 2\n").expect_err("duplicate");
        assert_eq!(
            err,
            GraphError::DuplicateTarget {
                name: "a".to_owned()
            }
        );
    }

    #[rstest]
    fn phony_marks_expanded_names() {
        let source = "GOAL := test\n.PHONY: $(GOAL)\ntest:\n\techo t\n";
        let graph = graph_for(source).expect("graph");
        assert!(graph.targets["test"].phony);
    }

    #[rstest]
    fn phony_without_target_is_ignored() {
        let graph = graph_for(".PHONY: ghost\na:\n\techo a\n").expect("graph");
        assert!(!graph.targets["a"].phony);
    }
}
