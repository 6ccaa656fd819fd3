//! Line classification for control files.

use super::ParseError;
use crate::ast::{Assignment, Conditional, ControlFile, Flavor, RecipeLine, Rule, Stmt};

/// An open `ifeq`/`ifneq` block being accumulated.
struct Frame {
    negated: bool,
    left: String,
    right: String,
    then_branch: Vec<Stmt>,
    else_branch: Vec<Stmt>,
    in_else: bool,
    line: usize,
}

struct Parser {
    root: Vec<Stmt>,
    frames: Vec<Frame>,
    rule: Option<Rule>,
}

/// Outcome of classifying a non-recipe, non-directive line.
enum Classified {
    Assign(Assignment),
    Rule { targets: String, prereqs: String },
}

pub(crate) fn parse(source: &str) -> Result<ControlFile, ParseError> {
    let mut parser = Parser {
        root: Vec::new(),
        frames: Vec::new(),
        rule: None,
    };

    let physical: Vec<&str> = source.lines().collect();
    let mut idx = 0;
    while idx < physical.len() {
        let line_no = idx + 1;
        let (line, consumed) = join_continuations(&physical, idx);
        idx += consumed;
        parser.handle_line(&line, line_no)?;
    }

    parser.finish()
}

/// Join backslash-continued physical lines into one logical line.
///
/// The backslash-newline pair collapses to a single space, both in plain
/// declarations and in recipe lines handed to the shell.
fn join_continuations(physical: &[&str], start: usize) -> (String, usize) {
    let mut consumed = 1;
    let first = physical.get(start).copied().unwrap_or_default();
    if !first.ends_with('\\') {
        return (first.to_owned(), consumed);
    }
    let mut joined = String::new();
    let mut current = first;
    loop {
        match current.strip_suffix('\\') {
            Some(stripped) => {
                joined.push_str(stripped.trim_end());
                joined.push(' ');
            }
            None => {
                joined.push_str(current);
                break;
            }
        }
        match physical.get(start + consumed) {
            Some(next) => {
                current = next.trim_start();
                consumed += 1;
            }
            None => break,
        }
    }
    (joined, consumed)
}

impl Parser {
    fn handle_line(&mut self, line: &str, line_no: usize) -> Result<(), ParseError> {
        if let Some(body) = line.strip_prefix('\t') {
            return self.handle_recipe(body, line_no);
        }

        let stripped = strip_comment(line);
        let trimmed = stripped.trim();
        if trimmed.is_empty() {
            return Ok(());
        }

        // Any declaration line terminates the recipe of the preceding rule.
        self.flush_rule();

        if let Some(rest) = directive_body(trimmed, "ifeq") {
            return self.open_conditional(false, rest, trimmed, line_no);
        }
        if let Some(rest) = directive_body(trimmed, "ifneq") {
            return self.open_conditional(true, rest, trimmed, line_no);
        }
        if trimmed == "else" {
            return self.handle_else(line_no);
        }
        if trimmed == "endif" {
            return self.handle_endif(line_no);
        }
        if let Some(rest) = directive_body(trimmed, "export") {
            return self.handle_export(rest, line_no);
        }

        match classify(trimmed, line_no)? {
            Classified::Assign(assignment) => {
                self.out().push(Stmt::Assign(assignment));
                Ok(())
            }
            Classified::Rule { targets, prereqs } => self.open_rule(&targets, &prereqs, line_no),
        }
    }

    fn handle_recipe(&mut self, body: &str, line_no: usize) -> Result<(), ParseError> {
        let Some(rule) = self.rule.as_mut() else {
            if body.trim().is_empty() {
                return Ok(());
            }
            return Err(ParseError::RecipeOutsideRule { line: line_no });
        };
        let mut rest = body.trim_start();
        let mut ignore_error = false;
        let mut silent = false;
        loop {
            if let Some(after) = rest.strip_prefix('-') {
                ignore_error = true;
                rest = after.trim_start();
            } else if let Some(after) = rest.strip_prefix('@') {
                silent = true;
                rest = after.trim_start();
            } else {
                break;
            }
        }
        if rest.is_empty() {
            return Ok(());
        }
        rule.recipe.push(RecipeLine {
            command: rest.to_owned(),
            ignore_error,
            silent,
        });
        Ok(())
    }

    fn open_conditional(
        &mut self,
        negated: bool,
        rest: &str,
        full: &str,
        line_no: usize,
    ) -> Result<(), ParseError> {
        let (left, right) =
            split_guard(rest).ok_or_else(|| ParseError::MalformedConditional {
                line: line_no,
                text: full.to_owned(),
            })?;
        self.frames.push(Frame {
            negated,
            left,
            right,
            then_branch: Vec::new(),
            else_branch: Vec::new(),
            in_else: false,
            line: line_no,
        });
        Ok(())
    }

    fn handle_else(&mut self, line_no: usize) -> Result<(), ParseError> {
        let Some(frame) = self.frames.last_mut() else {
            return Err(ParseError::UnexpectedDirective {
                line: line_no,
                directive: "else".to_owned(),
            });
        };
        if frame.in_else {
            return Err(ParseError::UnexpectedDirective {
                line: line_no,
                directive: "else".to_owned(),
            });
        }
        frame.in_else = true;
        Ok(())
    }

    fn handle_endif(&mut self, line_no: usize) -> Result<(), ParseError> {
        let Some(frame) = self.frames.pop() else {
            return Err(ParseError::UnexpectedDirective {
                line: line_no,
                directive: "endif".to_owned(),
            });
        };
        self.out().push(Stmt::Conditional(Conditional {
            negated: frame.negated,
            left: frame.left,
            right: frame.right,
            then_branch: frame.then_branch,
            else_branch: frame.else_branch,
        }));
        Ok(())
    }

    fn handle_export(&mut self, rest: &str, line_no: usize) -> Result<(), ParseError> {
        let rest = rest.trim();
        if rest.is_empty() {
            return Err(ParseError::ExportMissingName { line: line_no });
        }
        if find_assignment_op(rest).is_some() {
            let Classified::Assign(assignment) = classify(rest, line_no)? else {
                return Err(ParseError::Unclassified {
                    line: line_no,
                    text: rest.to_owned(),
                });
            };
            let name = assignment.name.clone();
            self.out().push(Stmt::Export {
                name,
                assignment: Some(assignment),
            });
            return Ok(());
        }
        for name in rest.split_whitespace() {
            self.out().push(Stmt::Export {
                name: name.to_owned(),
                assignment: None,
            });
        }
        Ok(())
    }

    fn open_rule(&mut self, targets: &str, prereqs: &str, line_no: usize) -> Result<(), ParseError> {
        let names: Vec<String> = targets.split_whitespace().map(str::to_owned).collect();
        if names.is_empty() {
            return Err(ParseError::MissingTargetName { line: line_no });
        }
        let prereq_names: Vec<String> = prereqs.split_whitespace().map(str::to_owned).collect();
        if names.len() == 1 && names[0] == ".PHONY" {
            self.out().push(Stmt::Phony(prereq_names));
            return Ok(());
        }
        self.rule = Some(Rule {
            targets: names,
            prereqs: prereq_names,
            recipe: Vec::new(),
        });
        Ok(())
    }

    /// The statement list currently receiving parsed statements: the active
    /// branch of the innermost open conditional, or the file root.
    fn out(&mut self) -> &mut Vec<Stmt> {
        match self.frames.last_mut() {
            Some(frame) if frame.in_else => &mut frame.else_branch,
            Some(frame) => &mut frame.then_branch,
            None => &mut self.root,
        }
    }

    fn flush_rule(&mut self) {
        if let Some(rule) = self.rule.take() {
            self.out().push(Stmt::Rule(rule));
        }
    }

    fn finish(mut self) -> Result<ControlFile, ParseError> {
        self.flush_rule();
        if let Some(frame) = self.frames.first() {
            return Err(ParseError::UnterminatedConditional { line: frame.line });
        }
        Ok(ControlFile { stmts: self.root })
    }
}

/// Return the directive body when `line` starts with `keyword` followed by
/// whitespace or an opening parenthesis.
fn directive_body<'a>(line: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(keyword)?;
    if rest.is_empty() {
        return None;
    }
    if rest.starts_with(char::is_whitespace) || rest.starts_with('(') {
        Some(rest.trim_start())
    } else {
        None
    }
}

/// Split an `(A,B)` guard into its two operands.
///
/// The comma must sit at parenthesis depth zero so that operands may carry
/// `$(...)` references.
fn split_guard(rest: &str) -> Option<(String, String)> {
    let inner = rest.strip_prefix('(')?.strip_suffix(')')?;
    let mut depth = 0usize;
    for (pos, ch) in inner.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.checked_sub(1)?,
            ',' if depth == 0 => {
                let left = inner.get(..pos)?.trim().to_owned();
                let right = inner.get(pos + 1..)?.trim().to_owned();
                return Some((left, right));
            }
            _ => {}
        }
    }
    None
}

/// Locate an assignment operator, returning `(position, length, flavor)`.
///
/// A bare colon earlier in the line means the line is a rule header, not an
/// assignment (`app: config=release` names a prerequisite, not a variable).
fn find_assignment_op(line: &str) -> Option<(usize, usize, Flavor)> {
    let colon = line.find(':');
    if let Some(pos) = line.find(":=") {
        if colon == Some(pos) {
            return Some((pos, 2, Flavor::Immediate));
        }
    }
    if let Some(pos) = line.find("?=") {
        if colon.is_none_or(|c| c > pos) {
            return Some((pos, 2, Flavor::IfUndefined));
        }
    }
    if let Some(pos) = line.find('=') {
        if colon.is_none_or(|c| c > pos) {
            return Some((pos, 1, Flavor::Deferred));
        }
    }
    None
}

fn classify(line: &str, line_no: usize) -> Result<Classified, ParseError> {
    if let Some((pos, len, flavor)) = find_assignment_op(line) {
        let name = line.get(..pos).unwrap_or_default().trim();
        if name.is_empty() || name.contains(char::is_whitespace) {
            return Err(ParseError::Unclassified {
                line: line_no,
                text: line.to_owned(),
            });
        }
        let value = line.get(pos + len..).unwrap_or_default().trim().to_owned();
        return Ok(Classified::Assign(Assignment {
            name: name.to_owned(),
            flavor,
            value,
        }));
    }
    if let Some((targets, prereqs)) = line.split_once(':') {
        return Ok(Classified::Rule {
            targets: targets.to_owned(),
            prereqs: prereqs.to_owned(),
        });
    }
    Err(ParseError::Unclassified {
        line: line_no,
        text: line.to_owned(),
    })
}

/// Strip a trailing comment from a non-recipe line.
///
/// `\#` escapes the hash; recipe lines are never passed through here, the
/// shell owns their comment handling.
fn strip_comment(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' if chars.peek() == Some(&'#') => {
                chars.next();
                out.push('#');
            }
            '#' => break,
            other => out.push(other),
        }
    }
    out
}
