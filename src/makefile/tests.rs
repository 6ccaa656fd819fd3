//! Unit tests for control-file line classification.
#![allow(clippy::expect_used, reason = "tests assert on parse outcomes")]

use super::*;
use crate::ast::{Assignment, Flavor, RecipeLine, Stmt};
use rstest::rstest;

fn assignment(source: &str) -> Assignment {
    let file = from_str(source).expect("parse");
    match file.stmts.first() {
        Some(Stmt::Assign(a)) => a.clone(),
        other => panic!("expected assignment, got {other:?}"),
    }
}

#[rstest]
#[case("PKG := demo", Flavor::Immediate, "demo")]
#[case("PKG = demo", Flavor::Deferred, "demo")]
#[case("PKG ?= demo", Flavor::IfUndefined, "demo")]
#[case("PKG :=", Flavor::Immediate, "")]
fn classifies_assignment_flavors(
    #[case] source: &str,
    #[case] flavor: Flavor,
    #[case] value: &str,
) {
    let a = assignment(source);
    assert_eq!(a.name, "PKG");
    assert_eq!(a.flavor, flavor);
    assert_eq!(a.value, value);
}

#[rstest]
fn rule_collects_recipe_lines_in_order() {
    let source = "build: deps lint\n\techo one\n\techo two\n";
    let file = from_str(source).expect("parse");
    let Some(Stmt::Rule(rule)) = file.stmts.first() else {
        panic!("expected rule");
    };
    assert_eq!(rule.targets, ["build"]);
    assert_eq!(rule.prereqs, ["deps", "lint"]);
    let commands: Vec<&str> = rule.recipe.iter().map(|l| l.command.as_str()).collect();
    assert_eq!(commands, ["echo one", "echo two"]);
}

#[rstest]
#[case("\t-rm -rf build", true, false, "rm -rf build")]
#[case("\t@echo quiet", false, true, "echo quiet")]
#[case("\t-@true", true, true, "true")]
#[case("\t@-true", true, true, "true")]
fn recipe_prefixes(
    #[case] line: &str,
    #[case] ignore_error: bool,
    #[case] silent: bool,
    #[case] command: &str,
) {
    let source = format!("a:\n{line}\n");
    let file = from_str(&source).expect("parse");
    let Some(Stmt::Rule(rule)) = file.stmts.first() else {
        panic!("expected rule");
    };
    assert_eq!(
        rule.recipe,
        [RecipeLine {
            command: command.to_owned(),
            ignore_error,
            silent,
        }]
    );
}

#[rstest]
fn blank_lines_do_not_end_a_recipe() {
    let source = "a:\n\techo one\n\n\techo two\n";
    let file = from_str(source).expect("parse");
    let Some(Stmt::Rule(rule)) = file.stmts.first() else {
        panic!("expected rule");
    };
    assert_eq!(rule.recipe.len(), 2);
}

#[rstest]
fn recipe_before_target_is_rejected() {
    let err = from_str("\techo hi\n").expect_err("recipe outside rule");
    assert_eq!(err, ParseError::RecipeOutsideRule { line: 1 });
}

#[rstest]
fn unclassifiable_line_is_rejected_with_position() {
    let err = from_str("PKG := demo\nwhat is this\n").expect_err("unclassified");
    assert_eq!(
        err,
        ParseError::Unclassified {
            line: 2,
            text: "what is this".to_owned(),
        }
    );
}

#[rstest]
fn conditional_captures_both_branches() {
    let source = "ifeq ($(MODE),release)\nOPT := 3\nelse\nOPT := 0\nendif\n";
    let file = from_str(source).expect("parse");
    let Some(Stmt::Conditional(cond)) = file.stmts.first() else {
        panic!("expected conditional");
    };
    assert!(!cond.negated);
    assert_eq!(cond.left, "$(MODE)");
    assert_eq!(cond.right, "release");
    assert_eq!(cond.then_branch.len(), 1);
    assert_eq!(cond.else_branch.len(), 1);
}

#[rstest]
fn conditionals_nest() {
    let source = "ifeq (a,a)\nifneq (b,c)\nX := 1\nendif\nendif\n";
    let file = from_str(source).expect("parse");
    let Some(Stmt::Conditional(outer)) = file.stmts.first() else {
        panic!("expected conditional");
    };
    assert!(matches!(outer.then_branch.first(), Some(Stmt::Conditional(_))));
}

#[rstest]
fn guard_operands_may_contain_references() {
    let source = "ifeq ($(A),$(B))\nendif\n";
    let file = from_str(source).expect("parse");
    let Some(Stmt::Conditional(cond)) = file.stmts.first() else {
        panic!("expected conditional");
    };
    assert_eq!(cond.left, "$(A)");
    assert_eq!(cond.right, "$(B)");
}

#[rstest]
#[case("else\n", "else")]
#[case("endif\n", "endif")]
fn orphan_directives_are_rejected(#[case] source: &str, #[case] directive: &str) {
    let err = from_str(source).expect_err("orphan directive");
    assert_eq!(
        err,
        ParseError::UnexpectedDirective {
            line: 1,
            directive: directive.to_owned(),
        }
    );
}

#[rstest]
fn double_else_is_rejected() {
    let err = from_str("ifeq (a,a)\nelse\nelse\nendif\n").expect_err("double else");
    assert_eq!(
        err,
        ParseError::UnexpectedDirective {
            line: 3,
            directive: "else".to_owned(),
        }
    );
}

#[rstest]
fn unterminated_conditional_names_opening_line() {
    let err = from_str("X := 1\nifeq (a,a)\nY := 2\n").expect_err("unterminated");
    assert_eq!(err, ParseError::UnterminatedConditional { line: 2 });
}

#[rstest]
fn malformed_guard_is_rejected() {
    let err = from_str("ifeq a b\n").expect_err("malformed");
    assert!(matches!(err, ParseError::MalformedConditional { line: 1, .. }));
}

#[rstest]
fn export_with_assignment() {
    let file = from_str("export WHEEL_DIR := cache\n").expect("parse");
    let Some(Stmt::Export { name, assignment }) = file.stmts.first() else {
        panic!("expected export");
    };
    assert_eq!(name, "WHEEL_DIR");
    let a = assignment.as_ref().expect("assignment");
    assert_eq!(a.flavor, Flavor::Immediate);
    assert_eq!(a.value, "cache");
}

#[rstest]
fn export_of_existing_names() {
    let file = from_str("export PIP_INDEX PIP_CACHE\n").expect("parse");
    let names: Vec<&str> = file
        .stmts
        .iter()
        .map(|s| match s {
            Stmt::Export { name, .. } => name.as_str(),
            other => panic!("expected export, got {other:?}"),
        })
        .collect();
    assert_eq!(names, ["PIP_INDEX", "PIP_CACHE"]);
}

#[rstest]
fn phony_declaration_is_recognised() {
    let file = from_str(".PHONY: test lint shell\n").expect("parse");
    assert_eq!(
        file.stmts,
        [Stmt::Phony(vec![
            "test".to_owned(),
            "lint".to_owned(),
            "shell".to_owned(),
        ])]
    );
}

#[rstest]
fn comments_and_blank_lines_are_skipped() {
    let source = "# header comment\n\nPKG := demo # trailing\n  # indented comment\n";
    let file = from_str(source).expect("parse");
    assert_eq!(file.stmts.len(), 1);
    assert_eq!(assignment(source).value, "demo");
}

#[rstest]
fn escaped_hash_is_kept() {
    let a = assignment("TAG := v1\\#rc\n");
    assert_eq!(a.value, "v1#rc");
}

#[rstest]
fn continuation_lines_join_with_a_space() {
    let source = "DEPS := alpha \\\n\tbeta \\\n\tgamma\n";
    let a = assignment(source);
    assert_eq!(a.value, "alpha beta gamma");
}

#[rstest]
fn continued_recipe_line_stays_one_command() {
    let source = "a:\n\techo one \\\n\t\ttwo\n";
    let file = from_str(source).expect("parse");
    let Some(Stmt::Rule(rule)) = file.stmts.first() else {
        panic!("expected rule");
    };
    assert_eq!(rule.recipe.len(), 1);
    assert_eq!(rule.recipe[0].command, "echo one two");
}

#[rstest]
fn rule_with_assignment_looking_prereq_is_a_rule() {
    let file = from_str("app: config=release\n\techo hi\n").expect("parse");
    let Some(Stmt::Rule(rule)) = file.stmts.first() else {
        panic!("expected rule");
    };
    assert_eq!(rule.prereqs, ["config=release"]);
}

#[rstest]
fn rule_inside_conditional_branch() {
    let source = "ifeq (a,a)\nextra:\n\techo extra\nendif\n";
    let file = from_str(source).expect("parse");
    let Some(Stmt::Conditional(cond)) = file.stmts.first() else {
        panic!("expected conditional");
    };
    assert!(matches!(cond.then_branch.first(), Some(Stmt::Rule(_))));
}
