//! CLI contract tests
//!
//! Runs the attrguard binary against a temp workspace: init, clean, train,
//! check and models. Each test gets its own directory and an explicit
//! --config path so nothing from the caller's environment leaks in.

use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn attrguard_bin() -> &'static str {
    env!("CARGO_BIN_EXE_attrguard")
}

fn attrguard(dir: &Path, args: &[&str]) -> Output {
    Command::new(attrguard_bin())
        .current_dir(dir)
        .env_remove("ATTRGUARD_STORE")
        .env_remove("ATTRGUARD_DATA")
        .env_remove("RUST_LOG")
        .arg("--config")
        .arg(dir.join("attrguard.toml"))
        .args(args)
        .output()
        .expect("Failed to run attrguard")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

/// Workspace with 200 phone listings (weight, camera) in products.jsonl
fn setup_workspace() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let mut lines = String::new();
    for i in 0..200 {
        let offset = (i as f64 * 7.3) % 41.0;
        lines.push_str(&format!(
            "{{\"item_id\":\"P-{}\",\"category\":1,\"is_valid\":true,\"is_blacklisted\":false,\
             \"attributes\":{{\"weight\":{},\"camera_pixel_max\":{}}}}}\n",
            i,
            150.0 + offset,
            (8.0 + offset) * 1_000_000.0
        ));
    }
    std::fs::write(dir.path().join("products.jsonl"), lines).unwrap();
    dir
}

fn train(dir: &Path) {
    let output = attrguard(
        dir,
        &["train", "--data", "products.jsonl", "--store", "store", "--workers", "2"],
    );
    assert!(
        output.status.success(),
        "train failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(dir.join("store").join("models.redb").exists());
}

#[test]
fn test_train_then_check_json() {
    let dir = setup_workspace();
    train(dir.path());

    let output = attrguard(
        dir.path(),
        &[
            "check", "-c", "1", "--attr", "weight=160", "--camera-pixel", "12", "--store",
            "store", "--format", "json",
        ],
    );
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(json["category"], 1);
    assert_eq!(json["outliers"], 0);
    let results = json["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["attribute"], "weight");
    assert_eq!(results[0]["regime"], "low");
    assert_eq!(results[0]["is_normal"], true);
    assert_eq!(results[1]["attribute"], "camera_pixel_max");
    assert_eq!(results[1]["is_normal"], true);
}

#[test]
fn test_fail_on_outlier_exit_code() {
    let dir = setup_workspace();
    train(dir.path());

    let output = attrguard(
        dir.path(),
        &[
            "check",
            "-c",
            "1",
            "--attr",
            "weight=5000",
            "--store",
            "store",
            "--fail-on-outlier",
        ],
    );
    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).contains("outlier"));
}

#[test]
fn test_check_without_store_fails() {
    let dir = tempfile::tempdir().unwrap();
    let output = attrguard(
        dir.path(),
        &["check", "-c", "1", "--attr", "weight=1", "--store", "missing"],
    );
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("attrguard train"));
}

#[test]
fn test_models_lists_trained_ids() {
    let dir = setup_workspace();
    train(dir.path());

    let output = attrguard(dir.path(), &["models", "--store", "store", "--format", "json"]);
    assert!(output.status.success());

    let rows: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    let ids: Vec<&str> = rows
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_str().unwrap())
        .collect();
    assert_eq!(
        ids,
        vec![
            "1_camera_pixel_max_high",
            "1_camera_pixel_max_low",
            "1_weight_high",
            "1_weight_low"
        ]
    );
    assert!(rows[0]["parameters"]["threshold"].as_f64().unwrap() > 0.0);
}

#[test]
fn test_init_then_train_from_config() {
    let dir = setup_workspace();

    let output = attrguard(dir.path(), &["init"]);
    assert!(output.status.success());
    let config = dir.path().join("attrguard.toml");
    assert!(config.exists());

    // Point the generated config at the workspace data
    let content = std::fs::read_to_string(&config)
        .unwrap()
        .replace("data/products.jsonl", "products.jsonl");
    std::fs::write(&config, content).unwrap();

    let output = attrguard(dir.path(), &["train"]);
    assert!(
        output.status.success(),
        "train failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(dir.path().join("store").join("models.redb").exists());
}

#[test]
fn test_clean_command() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("raw.jsonl"),
        "{\"category\":1,\"is_blacklisted\":false,\"attributes\":{\"weight\":150}}\n\
         {\"category\":1,\"is_blacklisted\":false,\"attributes\":{\"weight\":150}}\n\
         {\"category\":1,\"is_blacklisted\":true,\"attributes\":{\"weight\":9}}\n\
         {\"category\":1,\"is_valid\":false,\"is_blacklisted\":false,\"attributes\":{\"weight\":3}}\n",
    )
    .unwrap();

    let output = attrguard(dir.path(), &["clean", "raw.jsonl", "clean.jsonl"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("Kept"));

    let cleaned = std::fs::read_to_string(dir.path().join("clean.jsonl")).unwrap();
    assert_eq!(cleaned.lines().count(), 1);
}
