//! End-to-end tests of the `karakuri` binary.
#![allow(clippy::expect_used, reason = "tests assert on process outcomes")]

use assert_cmd::Command;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use tempfile::TempDir;

fn workspace(control: &str) -> TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("Makefile"), control).expect("write control file");
    dir
}

fn karakuri(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("karakuri").expect("binary");
    cmd.current_dir(dir.path());
    cmd
}

#[rstest]
fn default_goal_runs_and_echoes_commands() {
    let dir = workspace(".PHONY: hello\nhello:\n\techo hi there\n");
    karakuri(&dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("echo hi there"));
}

#[rstest]
fn silent_recipe_lines_are_not_echoed() {
    let dir = workspace(".PHONY: hello\nhello:\n\t@echo only-output\n");
    karakuri(&dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("only-output"))
        .stdout(predicate::str::contains("@echo").not());
}

#[rstest]
fn named_goal_is_selected() {
    let dir = workspace(
        ".PHONY: first second\nfirst:\n\techo first\nsecond:\n\techo second\n",
    );
    karakuri(&dir)
        .arg("second")
        .assert()
        .success()
        .stdout(predicate::str::contains("second"))
        .stdout(predicate::str::contains("first").not());
}

#[rstest]
fn command_line_override_beats_file_default() {
    let dir = workspace(
        "PACKAGE := foo\n.PHONY: name\nname:\n\techo pkg=$(PACKAGE)\n",
    );
    karakuri(&dir)
        .args(["name", "PACKAGE=bar"])
        .assert()
        .success()
        .stdout(predicate::str::contains("pkg=bar"));
}

#[rstest]
fn inherited_environment_beats_file_default() {
    let dir = workspace(
        "PACKAGE := foo\n.PHONY: name\nname:\n\techo pkg=$(PACKAGE)\n",
    );
    karakuri(&dir)
        .env("PACKAGE", "from-env")
        .arg("name")
        .assert()
        .success()
        .stdout(predicate::str::contains("pkg=from-env"));
}

#[rstest]
fn command_line_override_beats_inherited_environment() {
    let dir = workspace(
        "PACKAGE := foo\n.PHONY: name\nname:\n\techo pkg=$(PACKAGE)\n",
    );
    karakuri(&dir)
        .env("PACKAGE", "from-env")
        .args(["name", "PACKAGE=bar"])
        .assert()
        .success()
        .stdout(predicate::str::contains("pkg=bar"));
}

#[rstest]
fn recipe_failure_propagates_exit_code() {
    let dir = workspace(".PHONY: boom\nboom:\n\texit 3\n");
    karakuri(&dir).assert().code(3);
}

#[rstest]
fn cycle_is_a_planning_failure() {
    let dir = workspace("a: b\n\ttrue\nb: a\n\ttrue\n");
    karakuri(&dir)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("dependency cycle detected"));
}

#[rstest]
fn unknown_goal_is_a_planning_failure() {
    let dir = workspace(".PHONY: a\na:\n\ttrue\n");
    karakuri(&dir)
        .arg("ghost")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("no rule to make target"));
}

#[rstest]
fn syntax_error_is_a_planning_failure() {
    let dir = workspace("this line means nothing\n");
    karakuri(&dir)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("cannot classify"));
}

#[rstest]
fn missing_control_file_is_reported() {
    let dir = tempfile::tempdir().expect("tempdir");
    karakuri(&dir)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("control file not found"));
}

#[rstest]
fn dry_run_prints_without_executing() {
    let dir = workspace(".PHONY: touchy\ntouchy:\n\ttouch artifact.txt\n");
    karakuri(&dir)
        .arg("--dry-run")
        .assert()
        .success()
        .stdout(predicate::str::contains("touch artifact.txt"));
    assert!(!dir.path().join("artifact.txt").exists());
}

#[rstest]
fn directory_flag_sets_invocation_root() {
    let dir = workspace(".PHONY: here\nhere:\n\tpwd\n");
    let mut cmd = Command::cargo_bin("karakuri").expect("binary");
    cmd.arg("-C").arg(dir.path());
    cmd.assert().success();
    // The control file is found relative to -C, not to our own cwd.
}

#[rstest]
fn alternate_control_file_name() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(dir.path().join("build.mk"), ".PHONY: ok\nok:\n\ttrue\n").expect("write");
    karakuri(&dir).args(["--file", "build.mk"]).assert().success();
}
