use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::tempdir;

fn rael() -> Command {
    Command::cargo_bin("rael").expect("binary exists")
}

#[test]
fn runs_a_script_file() {
    let dir = tempdir().expect("create temp dir");
    let script = dir.path().join("main.rael");
    fs::write(&script, "log \"Hello\", 1 + 2\n").expect("write script");

    rael()
        .arg(&script)
        .assert()
        .success()
        .stdout("Hello 3\n");
}

#[test]
fn runs_code_given_on_the_command_line() {
    rael()
        .args(["-s", "log 2 * 21"])
        .assert()
        .success()
        .stdout("42\n");
}

#[test]
fn uncaught_blame_reports_file_position_and_caret() {
    let dir = tempdir().expect("create temp dir");
    let script = dir.path().join("broken.rael");
    fs::write(&script, "log 1 / 0\n").expect("write script");

    rael()
        .arg(&script)
        .assert()
        .code(1)
        .stdout("")
        .stderr(predicate::str::contains(format!(
            "Error [{}:1:7]: Division by zero",
            script.display()
        )))
        .stderr(predicate::str::contains("| log 1 / 0\n|       ^"));
}

#[test]
fn parse_errors_are_fatal() {
    rael()
        .args(["-s", "log (1"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Error [<string>:1:5]: Unmatched '('"));
}

#[test]
fn system_exit_sets_the_status() {
    rael()
        .args(["-s", "load :System\nlog \"bye\"\n:System:Exit(4)\nlog \"never\""])
        .assert()
        .code(4)
        .stdout("bye\n")
        .stderr("");
}

#[test]
fn system_exit_without_code_reports_failure() {
    rael()
        .args(["-s", "load :System\n:System:Exit()\nlog \"never\""])
        .assert()
        .code(1)
        .stdout("")
        .stderr("");
}

#[test]
fn program_arguments_follow_the_separator() {
    let dir = tempdir().expect("create temp dir");
    let script = dir.path().join("args.rael");
    fs::write(&script, "log :_Argv, sizeof :_Argv\n").expect("write script");

    rael()
        .arg(&script)
        .args(["--", "first", "second"])
        .assert()
        .success()
        .stdout("{ \"first\", \"second\" } 2\n");
}

#[test]
fn warns_about_undefined_keys_when_asked() {
    rael()
        .args(["--warn-undefined", "-s", "log :missing"])
        .assert()
        .success()
        .stdout("Void\n")
        .stderr(predicate::str::contains(
            "Warning: Tried to get the value of undefined key ':missing'",
        ));
}

#[test]
fn missing_input_is_an_error() {
    rael()
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Expected a file or a string to run"));
}

#[test]
fn unreadable_file_is_an_error() {
    let dir = tempdir().expect("create temp dir");
    rael()
        .arg(dir.path().join("absent.rael"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("I/O error"));
}
