//! End-to-end tests driving the `csvlock` binary.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

fn csvlock(args: &[&str], stdin: Option<&[u8]>) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_csvlock"))
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    {
        let mut pipe = child.stdin.take().unwrap();
        // The process may exit before reading its input
        if let Some(input) = stdin {
            let _ = pipe.write_all(input);
        }
    }

    child.wait_with_output().unwrap()
}

fn arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

fn entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

#[test]
fn create_update_cat_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("data.csv");

    let out = csvlock(&["create", arg(&path)], Some(b"id,name\n1,alice\n"));
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let out = csvlock(&["update", arg(&path)], Some(b"id,name\n2,bob\n"));
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));

    let out = csvlock(&["cat", arg(&path)], None);
    assert!(out.status.success());
    assert_eq!(out.stdout, b"id,name\n2,bob\n");

    assert_eq!(entries(temp_dir.path()), vec!["data.csv"]);
}

#[test]
fn head_prints_first_bytes() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("data.csv");
    std::fs::write(&path, "id,name\n1,alice\n").unwrap();

    let out = csvlock(&["head", arg(&path), "--bytes", "7"], None);
    assert!(out.status.success());
    assert_eq!(out.stdout, b"id,name");
}

#[test]
fn create_existing_file_is_user_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("data.csv");
    std::fs::write(&path, "x").unwrap();

    let out = csvlock(&["create", arg(&path)], Some(b"y"));
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("already exists"));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "x");
}

#[test]
fn update_times_out_while_locked() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("data.csv");
    std::fs::write(&path, "old").unwrap();
    std::fs::write(temp_dir.path().join(".data.csv.lock"), "").unwrap();

    let out = csvlock(
        &["update", arg(&path), "--timeout-ms", "100", "--retry-delay-ms", "10"],
        Some(b"new"),
    );

    assert_eq!(out.status.code(), Some(3));
    assert!(String::from_utf8_lossy(&out.stderr).contains("lock wait timeout period exceeded"));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "old");
    assert_eq!(entries(temp_dir.path()), vec![".data.csv.lock", "data.csv"]);
}

#[test]
fn locks_lists_and_clear_removes_control_files() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("data.csv");
    std::fs::write(&path, "x").unwrap();
    std::fs::write(temp_dir.path().join(".data.csv.lock"), "").unwrap();

    let out = csvlock(&["locks", arg(&path), "--json"], None);
    assert!(out.status.success());
    let listed: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["kind"], "lock");

    let out = csvlock(&["clear", arg(&path)], None);
    assert_eq!(out.status.code(), Some(1));
    assert!(temp_dir.path().join(".data.csv.lock").exists());

    let out = csvlock(&["clear", arg(&path), "--force"], None);
    assert!(out.status.success());
    assert_eq!(entries(temp_dir.path()), vec!["data.csv"]);
}

#[test]
fn invalid_config_file_is_user_error() {
    let temp_dir = TempDir::new().unwrap();
    let config = temp_dir.path().join("csvlock.yaml");
    std::fs::write(&config, "wait_timeout_ms: 0\n").unwrap();
    let path = temp_dir.path().join("data.csv");
    std::fs::write(&path, "x").unwrap();

    let out = csvlock(&["--config", arg(&config), "cat", arg(&path)], None);
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("wait_timeout_ms"));
}
