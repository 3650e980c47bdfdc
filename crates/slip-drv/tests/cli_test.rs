//! CLI end-to-end tests for the slip binary.

use std::io::Write;

use assert_cmd::Command;
use predicates::prelude::*;

fn slip() -> Command {
    Command::cargo_bin("slip").expect("binary")
}

#[test]
fn test_eval_expression() {
    slip()
        .args(["-e", "(+ 1 2 3)"])
        .assert()
        .success()
        .stdout(predicate::str::contains("6"));
}

#[test]
fn test_eval_multiple_expressions_in_order() {
    slip()
        .args(["-e", "(define x 4)", "-e", "(* x x)"])
        .assert()
        .success()
        .stdout(predicate::str::contains("16"));
}

#[test]
fn test_factorial_via_file() {
    let mut source = tempfile::NamedTempFile::new().expect("tempfile");
    writeln!(
        source,
        "(define (fact n) (if (= n 1) 1 (* n (fact (- n 1)))))"
    )
    .expect("write");

    slip()
        .arg(source.path())
        .args(["-e", "(fact 5)"])
        .assert()
        .success()
        .stdout(predicate::str::contains("120"));
}

#[test]
fn test_reader_failure_sets_exit_code() {
    slip()
        .args(["-e", "(+ 1 2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unterminated"));
}

#[test]
fn test_missing_file_fails() {
    slip()
        .arg("definitely-not-here.slip")
        .assert()
        .failure();
}

#[test]
fn test_evaluation_error_prints_error_value() {
    slip()
        .args(["-e", "(car)"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ERROR: 'CAR -- Expected one operand'"));
}

#[test]
fn test_stats_flag() {
    slip()
        .args(["-e", "(+ 1 1)", "--stats"])
        .assert()
        .success()
        .stdout(predicate::str::contains("peak memory usage"));
}

#[test]
fn test_stats_json_flag() {
    slip()
        .args(["-e", "(+ 1 1)", "--stats-json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"bytes_allocated\""));
}

#[test]
fn test_repl_banner_and_result() {
    slip()
        .write_stdin("(+ 2 2)\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("== 4"));
}

#[test]
fn test_custom_limits_accepted() {
    slip()
        .args([
            "--soft-limit",
            "524288",
            "--hard-limit",
            "1048576",
            "--timeout",
            "5",
            "-e",
            "(get-cvar 'mem_lim_soft)",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("524288"));
}
