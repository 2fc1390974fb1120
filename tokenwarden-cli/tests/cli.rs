//! Integration tests for the tokenwarden binary.
//!
//! Every test points `TOKENWARDEN_CONFIG_DIR` at a temporary directory and
//! only runs commands that never reach the keyring or the network.

use std::fs;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

const DEMO: &str = r#"
[demo]
id = "62d51730-37d6-430c-b3c5-d2bcaaf4bdb1"
project = "greenfield"
base_url = "https://greenfield.example.com/"

[demo.tenant]
id = "d144e8ad-92a5-49c7-9e33-02e965f9679e"
name = "example"
"#;

fn tokenwarden(config_dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_tokenwarden"))
        .args(args)
        .env("TOKENWARDEN_CONFIG_DIR", config_dir)
        .env("RUST_LOG", "off")
        .stdin(Stdio::null())
        .output()
        .expect("failed to run tokenwarden")
}

fn config_with(clients: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("clients.toml"), clients).unwrap();
    dir
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn test_list_empty_registry() {
    let dir = TempDir::new().unwrap();
    let output = tokenwarden(dir.path(), &["list"]);

    assert!(output.status.success());
    assert!(stdout(&output).is_empty());
    assert!(stderr(&output).contains("No configured clients"));
}

#[test]
fn test_list_shows_registered_clients() {
    let dir = config_with(DEMO);
    let output = tokenwarden(dir.path(), &["list"]);

    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("demo"));
    assert!(out.contains("greenfield"));
    assert!(out.contains("example"));
    assert!(out.contains("(interactive)"));
}

#[test]
fn test_show_json() {
    let dir = config_with(DEMO);
    let output = tokenwarden(dir.path(), &["show", "demo", "--format", "json"]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let value: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(value["demo"]["id"], "62d51730-37d6-430c-b3c5-d2bcaaf4bdb1");
    assert_eq!(value["demo"]["uses_secret"], false);
}

#[test]
fn test_unknown_name_lists_registered_names() {
    let dir = config_with(DEMO);
    let output = tokenwarden(dir.path(), &["token", "missing"]);

    assert!(!output.status.success());
    let err = stderr(&output);
    assert!(err.contains("client `missing` was not found"), "stderr: {}", err);
    assert!(err.contains("demo"));
    assert!(stdout(&output).is_empty());
}

#[test]
fn test_bare_name_behaves_like_token() {
    let dir = config_with(DEMO);
    let output = tokenwarden(dir.path(), &["missing"]);

    assert!(!output.status.success());
    assert!(stderr(&output).contains("client `missing` was not found"));
}

#[test]
fn test_invalid_registry_reports_every_problem() {
    let dir = config_with(
        r#"
[broken]
id = "not-a-uuid"
base_url = "https://greenfield.example.com"

[broken.tenant]
id = "d144e8ad-92a5-49c7-9e33-02e965f9679e"
"#,
    );
    let output = tokenwarden(dir.path(), &["token", "broken"]);

    assert!(!output.status.success());
    let err = stderr(&output);
    assert!(err.contains("Configuration for `broken` has invalid id: not-a-uuid"));
    assert!(err.contains("invalid base URL"));
}

#[test]
fn test_remove_updates_registry_file() {
    let dir = config_with(DEMO);
    let output = tokenwarden(dir.path(), &["remove", "demo"]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let contents = fs::read_to_string(dir.path().join("clients.toml")).unwrap();
    assert!(!contents.contains("demo"));
}

#[test]
fn test_selection_without_terminal_fails() {
    let dir = config_with(DEMO);
    let output = tokenwarden(dir.path(), &["show"]);

    assert!(!output.status.success());
    assert!(stderr(&output).contains("not an interactive terminal"));
}

#[test]
fn test_invalid_settings_file_is_reported() {
    let dir = config_with(DEMO);
    fs::write(dir.path().join("config.toml"), "redirect_port = \"x\"").unwrap();
    let output = tokenwarden(dir.path(), &["list"]);

    assert!(!output.status.success());
    assert!(stderr(&output).contains("config.toml"));
}
