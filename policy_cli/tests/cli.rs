use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

fn shipped_catalogue() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../config/catalogue.yaml")
}

#[test]
fn test_validate_shipped_catalogue() {
    Command::cargo_bin("policy-exporter")
        .unwrap()
        .arg("validate")
        .arg(shipped_catalogue())
        .assert()
        .success()
        .stdout(predicate::str::contains("Catalogue is valid!"))
        .stdout(predicate::str::contains("Counter seeds: 15"))
        .stdout(predicate::str::contains("security-root-user"));
}

#[test]
fn test_validate_toml_fixture() {
    Command::cargo_bin("policy-exporter")
        .unwrap()
        .arg("validate")
        .arg(fixture("minimal.toml"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Gauge seeds: 1"));
}

#[test]
fn test_validate_rejects_negative_delta() {
    Command::cargo_bin("policy-exporter")
        .unwrap()
        .arg("validate")
        .arg(fixture("invalid.yaml"))
        .assert()
        .failure()
        .stdout(predicate::str::contains("Catalogue is invalid!"));
}

#[test]
fn test_list_builtin() {
    Command::cargo_bin("policy-exporter")
        .unwrap()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("policy_violations_total"))
        .stdout(predicate::str::contains("vulnerability_scan_status"))
        .stdout(predicate::str::contains("Total metrics: 5"));
}

#[test]
fn test_serve_rejects_bad_period() {
    Command::cargo_bin("policy-exporter")
        .unwrap()
        .args(["serve", "--period", "soon"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--period"));
}
