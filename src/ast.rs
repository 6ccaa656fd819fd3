//! Control-file Abstract Syntax Tree structures.
//!
//! This module defines the data structures produced by the `makefile`
//! parser. The AST preserves declaration order and raw, unexpanded text;
//! variable references inside values, target names, and guard operands are
//! resolved later by the `vars` and `graph` modules.

/// Binding mode of a variable assignment.
///
/// `Immediate` (`:=`) freezes the right-hand side's expansion at definition
/// time. `Deferred` (`=`) stores the raw text and re-expands it at every
/// use, so forward references resolve as long as no cycle exists when the
/// variable is read. `IfUndefined` (`?=`) behaves like `Deferred` but is
/// ignored when the name is already bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    /// `NAME := value`.
    Immediate,
    /// `NAME = value`.
    Deferred,
    /// `NAME ?= value`.
    IfUndefined,
}

/// A single variable assignment, right-hand side unexpanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    /// Variable name.
    pub name: String,
    /// Binding mode.
    pub flavor: Flavor,
    /// Raw right-hand side text.
    pub value: String,
}

/// A conditional block guarded by an equality test.
///
/// The guard's operands are raw text; they are expanded and compared when
/// the block is resolved, before any target runs. Only the selected
/// branch's statements are ever evaluated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conditional {
    /// `true` for `ifneq`, `false` for `ifeq`.
    pub negated: bool,
    /// Left guard operand, unexpanded.
    pub left: String,
    /// Right guard operand, unexpanded.
    pub right: String,
    /// Statements selected when the guard holds.
    pub then_branch: Vec<Stmt>,
    /// Statements selected when the guard fails.
    pub else_branch: Vec<Stmt>,
}

/// One line of a target's recipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeLine {
    /// Shell command text, unexpanded.
    pub command: String,
    /// `-` prefix: a non-zero exit does not abort the run.
    pub ignore_error: bool,
    /// `@` prefix: do not echo the command before running it.
    pub silent: bool,
}

/// A rule: one or more target names, prerequisites, and a recipe.
///
/// Names and prerequisites may contain variable references and are expanded
/// when the build graph is constructed. Every name before the colon shares
/// the same prerequisite list and recipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    /// Target names, unexpanded.
    pub targets: Vec<String>,
    /// Prerequisite names, unexpanded.
    pub prereqs: Vec<String>,
    /// Recipe lines in file order.
    pub recipe: Vec<RecipeLine>,
}

/// A top-level or branch-level statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    /// A variable assignment.
    Assign(Assignment),
    /// An `export` directive, optionally combined with an assignment.
    Export {
        /// The exported variable name.
        name: String,
        /// Present for `export NAME := value` forms.
        assignment: Option<Assignment>,
    },
    /// An `ifeq`/`ifneq` block.
    Conditional(Conditional),
    /// A rule declaration.
    Rule(Rule),
    /// A `.PHONY:` declaration; names are unexpanded.
    Phony(Vec<String>),
}

/// A parsed control file: the ordered statement list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlFile {
    /// Statements in file order.
    pub stmts: Vec<Stmt>,
}
