use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;

/// Every test gets its own config + data dir via TALLY_CONFIG_DIR so
/// nothing leaks into (or out of) the developer's real setup.
fn tally(config_dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("tally").unwrap();
    cmd.env("TALLY_CONFIG_DIR", config_dir);
    cmd.env_remove("TALLY_ACCESS_TOKEN");
    cmd
}

fn init(dir: &tempfile::TempDir) {
    tally(dir.path())
        .args(["init", "--data-dir"])
        .arg(dir.path().join("data"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized"));
}

#[test]
fn init_creates_database() {
    let dir = tempfile::tempdir().unwrap();
    init(&dir);
    assert!(dir.path().join("data").join("tally.db").exists());
    assert!(dir.path().join("settings.json").exists());
}

#[test]
fn rules_add_list_delete() {
    let dir = tempfile::tempdir().unwrap();
    init(&dir);

    tally(dir.path())
        .args(["rules", "add", "%MART%", "--category", "Groceries"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Added rule"));

    tally(dir.path())
        .args(["rules", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("%MART%").and(predicate::str::contains("Groceries")));

    tally(dir.path())
        .args(["rules", "delete", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deleted rule 1"));

    tally(dir.path())
        .args(["rules", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("%MART%").not());
}

#[test]
fn rules_add_rejects_unknown_category() {
    let dir = tempfile::tempdir().unwrap();
    init(&dir);
    tally(dir.path())
        .args(["rules", "add", "X%", "--category", "No Such Category"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown category"));
}

#[test]
fn status_shows_empty_ledger() {
    let dir = tempfile::tempdir().unwrap();
    init(&dir);
    tally(dir.path())
        .args(["status"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Transactions:  0")
                .and(predicate::str::contains("Items:         0")),
        );
}

#[test]
fn categorize_with_nothing_pending() {
    let dir = tempfile::tempdir().unwrap();
    init(&dir);
    tally(dir.path())
        .args(["categorize"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0 categorized"));
}

#[test]
fn sync_without_provider_url_fails_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    init(&dir);
    tally(dir.path())
        .args(["sync"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("provider_url"));
}
