//! Integration tests for the CLI surface

mod common;

use common::manolobot_bin;
use predicates::prelude::*;

#[test]
fn test_version_flag() {
    manolobot_bin()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("manolobot "));
}

#[test]
fn test_version_short_flag() {
    manolobot_bin()
        .arg("-V")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_help_flag() {
    manolobot_bin()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage: manolobot [OPTIONS]"))
        .stdout(predicate::str::contains("TELEGRAM_BOT_TOKEN"));
}
