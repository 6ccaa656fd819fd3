//! Variable table, expansion, and conditional resolution.
//!
//! This module turns a parsed [`ControlFile`] into an immutable
//! [`VarTable`] plus the flat list of rules that survive conditional
//! resolution. Conditional guards are evaluated once, in file order, before
//! any target runs; only the selected branch's statements are ever
//! evaluated, so a discarded branch can reference anything without
//! consequence.
//!
//! Binding origins give the precedence contract: a command-line
//! `NAME=VALUE` override beats the inherited process environment, which
//! beats a file-declared default. File assignments never overwrite a
//! binding of higher origin; they are silently ignored, matching the
//! behaviour of re-invoking with the same overrides.

use crate::ast::{Assignment, ControlFile, Flavor, Rule, Stmt};
use indexmap::{IndexMap, IndexSet};
use miette::Diagnostic;
use thiserror::Error;

/// Maximum recursion depth for variable expansion.
///
/// Deferred variables re-expand their right-hand side at every use, so a
/// self-referential definition recurses without terminating. The bound
/// converts that into a diagnostic naming the variable.
pub const MAX_EXPANSION_DEPTH: usize = 32;

/// Errors raised while expanding variable references.
#[derive(Debug, Error, Diagnostic, PartialEq, Eq)]
pub enum ExpandError {
    /// Expansion recursed past [`MAX_EXPANSION_DEPTH`].
    #[error("expansion of `{name}` exceeded depth {MAX_EXPANSION_DEPTH}; is it defined in terms of itself?")]
    #[diagnostic(code(karakuri::vars::depth_exceeded))]
    DepthExceeded {
        /// The variable whose expansion overflowed.
        name: String,
    },

    /// A `$(` or `${` reference with no matching close.
    #[error("unterminated variable reference in `{text}`")]
    #[diagnostic(code(karakuri::vars::unterminated_reference))]
    UnterminatedReference {
        /// The text containing the open reference.
        text: String,
    },
}

/// Where a binding came from; later variants take precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Origin {
    /// Declared in the control file.
    File,
    /// Inherited from the calling process's environment.
    Environment,
    /// A `NAME=VALUE` argument on the invocation.
    CommandLine,
}

#[derive(Debug, Clone)]
struct Binding {
    value: String,
    flavor: Flavor,
    origin: Origin,
}

/// An immutable name-to-value table with expansion support.
///
/// Immediate bindings hold their final text; deferred bindings hold raw
/// text that [`VarTable::expand`] re-evaluates at each use. The table is
/// constructed once per invocation by [`resolve`] and never mutated during
/// execution.
#[derive(Debug, Clone, Default)]
pub struct VarTable {
    bindings: IndexMap<String, Binding>,
    exports: IndexSet<String>,
}

/// One exported name/value pair of the environment overlay.
pub type EnvPair = (String, String);

impl VarTable {
    /// Expand every variable reference in `text`.
    ///
    /// Supports `$(NAME)`, `${NAME}`, `$$` for a literal dollar, and `$c`
    /// single-character names. Undefined names expand to the empty string.
    /// Reference names are themselves expanded first, so computed names
    /// such as `$(VAR_$(MODE))` resolve.
    ///
    /// # Errors
    ///
    /// Returns [`ExpandError::DepthExceeded`] when deferred re-expansion
    /// recurses past the depth bound, and
    /// [`ExpandError::UnterminatedReference`] for an unclosed reference.
    pub fn expand(&self, text: &str) -> Result<String, ExpandError> {
        self.expand_at(text, 0)
    }

    fn expand_at(&self, text: &str, depth: usize) -> Result<String, ExpandError> {
        let mut out = String::with_capacity(text.len());
        let mut cursor = 0;
        while let Some(offset) = text.get(cursor..).and_then(|tail| tail.find('$')) {
            let dollar = cursor + offset;
            out.push_str(text.get(cursor..dollar).unwrap_or_default());
            let rest = text.get(dollar + 1..).unwrap_or_default();
            match rest.chars().next() {
                // A trailing dollar stands for itself.
                None => {
                    out.push('$');
                    cursor = dollar + 1;
                }
                Some('$') => {
                    out.push('$');
                    cursor = dollar + 2;
                }
                Some(open @ ('(' | '{')) => {
                    let close = if open == '(' { ')' } else { '}' };
                    let inner = scan_reference(text, dollar + 2, open, close).ok_or_else(|| {
                        ExpandError::UnterminatedReference {
                            text: text.to_owned(),
                        }
                    })?;
                    let name = self.expand_at(inner, depth)?;
                    out.push_str(&self.lookup(name.trim(), depth)?);
                    cursor = dollar + 2 + inner.len() + 1;
                }
                Some(single) => {
                    out.push_str(&self.lookup(&single.to_string(), depth)?);
                    cursor = dollar + 1 + single.len_utf8();
                }
            }
        }
        out.push_str(text.get(cursor..).unwrap_or_default());
        Ok(out)
    }

    fn lookup(&self, name: &str, depth: usize) -> Result<String, ExpandError> {
        let Some(binding) = self.bindings.get(name) else {
            return Ok(String::new());
        };
        match binding.flavor {
            Flavor::Immediate => Ok(binding.value.clone()),
            Flavor::Deferred | Flavor::IfUndefined => {
                if depth >= MAX_EXPANSION_DEPTH {
                    return Err(ExpandError::DepthExceeded {
                        name: name.to_owned(),
                    });
                }
                self.expand_at(&binding.value, depth + 1)
            }
        }
    }

    /// Whether `name` has any binding.
    #[must_use]
    pub fn is_defined(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// The fully expanded value of `name`, or `None` when undefined.
    ///
    /// # Errors
    ///
    /// Propagates expansion failures from deferred bindings.
    pub fn get(&self, name: &str) -> Result<Option<String>, ExpandError> {
        if !self.is_defined(name) {
            return Ok(None);
        }
        self.lookup(name, 0).map(Some)
    }

    /// The expanded value of `name` unless it only came from the inherited
    /// environment.
    ///
    /// Used for settings such as `SHELL` where a login-shell value leaking
    /// in from the environment must not change recipe semantics.
    ///
    /// # Errors
    ///
    /// Propagates expansion failures from deferred bindings.
    pub fn get_declared(&self, name: &str) -> Result<Option<String>, ExpandError> {
        match self.bindings.get(name) {
            Some(binding) if binding.origin != Origin::Environment => {
                self.lookup(name, 0).map(Some)
            }
            _ => Ok(None),
        }
    }

    /// Materialise the environment overlay: every exported name paired with
    /// its fully expanded value, in export order.
    ///
    /// Command-line overrides are exported implicitly.
    ///
    /// # Errors
    ///
    /// Propagates expansion failures from deferred bindings.
    pub fn env_overlay(&self) -> Result<Vec<EnvPair>, ExpandError> {
        let mut overlay = Vec::with_capacity(self.exports.len());
        for name in &self.exports {
            let value = self.lookup(name, 0)?;
            overlay.push((name.clone(), value));
        }
        Ok(overlay)
    }

    fn seed_environment(&mut self, env: impl IntoIterator<Item = EnvPair>) {
        for (name, value) in env {
            self.bindings.insert(
                name,
                Binding {
                    value,
                    flavor: Flavor::Immediate,
                    origin: Origin::Environment,
                },
            );
        }
    }

    fn apply_override(&mut self, name: &str, value: &str) {
        self.bindings.insert(
            name.to_owned(),
            Binding {
                value: value.to_owned(),
                flavor: Flavor::Immediate,
                origin: Origin::CommandLine,
            },
        );
        self.exports.insert(name.to_owned());
    }

    fn assign(&mut self, assignment: &Assignment) -> Result<(), ExpandError> {
        if let Some(existing) = self.bindings.get(&assignment.name) {
            if existing.origin > Origin::File {
                tracing::debug!(
                    name = %assignment.name,
                    origin = ?existing.origin,
                    "file assignment shadowed by higher-precedence binding",
                );
                return Ok(());
            }
            if assignment.flavor == Flavor::IfUndefined {
                return Ok(());
            }
        }
        let value = match assignment.flavor {
            Flavor::Immediate => self.expand(&assignment.value)?,
            Flavor::Deferred | Flavor::IfUndefined => assignment.value.clone(),
        };
        self.bindings.insert(
            assignment.name.clone(),
            Binding {
                value,
                flavor: assignment.flavor,
                origin: Origin::File,
            },
        );
        Ok(())
    }

    fn mark_export(&mut self, name: &str) {
        self.exports.insert(name.to_owned());
    }
}

/// Scan from `start` to the delimiter matching `open`, honouring nesting.
fn scan_reference(text: &str, start: usize, open: char, close: char) -> Option<&str> {
    let mut depth = 0usize;
    for (pos, ch) in text.get(start..)?.char_indices() {
        if ch == open {
            depth += 1;
        } else if ch == close {
            if depth == 0 {
                return text.get(start..start + pos);
            }
            depth -= 1;
        }
    }
    None
}

/// The outcome of resolving a control file: the frozen variable table and
/// the statements that survived conditional selection.
#[derive(Debug, Clone, Default)]
pub struct Resolved {
    /// The immutable variable table.
    pub table: VarTable,
    /// Rules in file order, conditional branches already selected.
    pub rules: Vec<Rule>,
    /// `.PHONY` names, unexpanded.
    pub phony: Vec<String>,
}

/// Resolve a control file against the calling process's environment.
///
/// # Errors
///
/// Propagates expansion failures from immediate assignments and guard
/// operands.
pub fn resolve(file: &ControlFile, overrides: &[EnvPair]) -> Result<Resolved, ExpandError> {
    resolve_with_env(file, overrides, std::env::vars())
}

/// Resolve a control file against an explicit environment.
///
/// Seeds the table with `env`, applies command-line `overrides` on top,
/// then walks the statements in file order: assignments honour origin
/// precedence, conditional guards are expanded and compared for exact
/// string equality, and the losing branch is discarded unevaluated.
///
/// # Errors
///
/// Propagates expansion failures from immediate assignments and guard
/// operands.
pub fn resolve_with_env(
    file: &ControlFile,
    overrides: &[EnvPair],
    env: impl IntoIterator<Item = EnvPair>,
) -> Result<Resolved, ExpandError> {
    let mut resolved = Resolved::default();
    resolved.table.seed_environment(env);
    for (name, value) in overrides {
        resolved.table.apply_override(name, value);
    }
    walk(&file.stmts, &mut resolved)?;
    Ok(resolved)
}

fn walk(stmts: &[Stmt], resolved: &mut Resolved) -> Result<(), ExpandError> {
    for stmt in stmts {
        match stmt {
            Stmt::Assign(assignment) => resolved.table.assign(assignment)?,
            Stmt::Export { name, assignment } => {
                if let Some(assignment) = assignment {
                    resolved.table.assign(assignment)?;
                }
                resolved.table.mark_export(name);
            }
            Stmt::Conditional(cond) => {
                let left = resolved.table.expand(&cond.left)?;
                let right = resolved.table.expand(&cond.right)?;
                let taken = (left == right) != cond.negated;
                let branch = if taken {
                    &cond.then_branch
                } else {
                    &cond.else_branch
                };
                walk(branch, resolved)?;
            }
            Stmt::Rule(rule) => resolved.rules.push(rule.clone()),
            Stmt::Phony(names) => resolved.phony.extend(names.iter().cloned()),
        }
    }
    Ok(())
}
