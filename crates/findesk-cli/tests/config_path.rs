use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::tempdir;

#[test]
fn test_config_path_command() {
    let dir = tempdir().unwrap();

    cargo_bin_cmd!("findesk")
        .env("FINDESK_HOME", dir.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_config_init_creates_file() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("config.toml");

    assert!(!config_path.exists());

    cargo_bin_cmd!("findesk")
        .env("FINDESK_HOME", dir.path())
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created config at"));

    let contents = fs::read_to_string(&config_path).unwrap();
    assert!(contents.contains("base_url ="));
    assert!(contents.contains("# export_dir ="));
}

#[test]
fn test_config_init_fails_if_exists() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("config.toml"), "# existing config").unwrap();

    cargo_bin_cmd!("findesk")
        .env("FINDESK_HOME", dir.path())
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_config_set_url_keeps_other_settings() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("config.toml");
    fs::write(&config_path, "# team backend\nsearch_timeout_secs = 5\n").unwrap();

    cargo_bin_cmd!("findesk")
        .env("FINDESK_HOME", dir.path())
        .args(["config", "set-url", "https://dashboard.internal:8443/"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Saved base_url"));

    let contents = fs::read_to_string(&config_path).unwrap();
    assert!(contents.contains("# team backend"));
    assert!(contents.contains("search_timeout_secs = 5"));
    assert!(contents.contains("base_url = \"https://dashboard.internal:8443\""));
}

#[test]
fn test_config_set_url_rejects_non_http() {
    let dir = tempdir().unwrap();

    cargo_bin_cmd!("findesk")
        .env("FINDESK_HOME", dir.path())
        .args(["config", "set-url", "ftp://files.example.com"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("http or https"));

    assert!(!dir.path().join("config.toml").exists());
}
