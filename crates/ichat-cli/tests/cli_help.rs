use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

#[test]
fn test_help_shows_all_commands() {
    cargo_bin_cmd!("ichat")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("chat"))
        .stdout(predicate::str::contains("ask"))
        .stdout(predicate::str::contains("login"))
        .stdout(predicate::str::contains("logout"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("--base-url"));
}

#[test]
fn test_ask_help_shows_direct_flag() {
    cargo_bin_cmd!("ichat")
        .args(["ask", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("QUESTION"))
        .stdout(predicate::str::contains("--direct"));
}

#[test]
fn test_ask_requires_question() {
    cargo_bin_cmd!("ichat")
        .arg("ask")
        .assert()
        .failure()
        .stderr(predicate::str::contains("QUESTION"));
}
