//! Checks of the binary's surface: argument validation and happy-path output.

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn stages_lists_every_pipeline_step() {
    Command::cargo_bin("infersim")
        .unwrap()
        .arg("stages")
        .assert()
        .success()
        .stdout(predicate::str::contains("Tokenization"))
        .stdout(predicate::str::contains("Self-Attention"))
        .stdout(predicate::str::contains("Finished"));
}

#[test]
fn run_requires_a_prompt() {
    Command::cargo_bin("infersim")
        .unwrap()
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("PROMPT"));
}

#[test]
fn run_with_scripted_chunks_prints_the_output() {
    Command::cargo_bin("infersim")
        .unwrap()
        .args(["run", "Hi there", "--fast", "--chunks", "All done"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Output"))
        .stdout(predicate::str::contains("All done"));
}
