//! Integration tests for the `camfleet` CLI binary.
//!
//! Everything here runs offline: inventories mark their cameras as
//! simulated (`isFake`), so batches never open a socket or spawn ffprobe.
//! The one real camera points at a closed localhost port.
#![allow(clippy::unwrap_used)]

use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

// ── Helpers ─────────────────────────────────────────────────────────

const FAKE_INVENTORY: &str = "\
id,ip,port,url,username,password,isFake
2,10.0.0.2,80,,admin,secret,true
1,10.0.0.1,8080,,admin,secret,true
";

/// Build a [`Command`] for the `camfleet` binary with env isolation.
///
/// Clears all `CAMFLEET_*` env vars and points config directories into
/// `home` so tests never touch the user's real configuration.
fn camfleet_cmd(home: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("camfleet");
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env("NO_COLOR", "1")
        .env_remove("CAMFLEET_CONFIG")
        .env_remove("CAMFLEET_INVENTORY")
        .env_remove("CAMFLEET_OUTPUT")
        .env_remove("CAMFLEET_TIMEOUT")
        .env_remove("RUST_LOG");
    cmd
}

/// A temp home with `cameras.csv` written into it.
fn workspace(inventory: &str) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cameras.csv");
    std::fs::write(&path, inventory).unwrap();
    (dir, path)
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let home = tempfile::tempdir().unwrap();
    let output = camfleet_cmd(home.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    let home = tempfile::tempdir().unwrap();
    camfleet_cmd(home.path()).arg("--help").assert().success().stdout(
        predicate::str::contains("camera fleet")
            .and(predicate::str::contains("apply"))
            .and(predicate::str::contains("validate"))
            .and(predicate::str::contains("devices")),
    );
}

#[test]
fn test_version_flag() {
    let home = tempfile::tempdir().unwrap();
    camfleet_cmd(home.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("camfleet"));
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    let home = tempfile::tempdir().unwrap();
    camfleet_cmd(home.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_completions_zsh() {
    let home = tempfile::tempdir().unwrap();
    camfleet_cmd(home.path())
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

// ── Inventory ───────────────────────────────────────────────────────

#[test]
fn test_devices_list_without_inventory() {
    let home = tempfile::tempdir().unwrap();
    camfleet_cmd(home.path())
        .args(["devices", "list"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("No camera inventory configured"));
}

#[test]
fn test_devices_list_sorted_plain() {
    let (home, inventory) = workspace(FAKE_INVENTORY);
    camfleet_cmd(home.path())
        .args(["devices", "list", "-o", "plain", "--inventory"])
        .arg(&inventory)
        .assert()
        .success()
        .stdout("1\n2\n");
}

#[test]
fn test_devices_list_json_hides_passwords() {
    let (home, inventory) = workspace(FAKE_INVENTORY);
    camfleet_cmd(home.path())
        .args(["devices", "list", "-o", "json", "--inventory"])
        .arg(&inventory)
        .assert()
        .success()
        .stdout(
            predicate::str::contains("\"ip\": \"10.0.0.1\"")
                .and(predicate::str::contains("secret").not()),
        );
}

#[test]
fn test_bad_inventory_names_the_row() {
    let (home, inventory) = workspace("id,ip,port\n1,10.0.0.1,80\n2,10.0.0.2,http\n");
    camfleet_cmd(home.path())
        .args(["devices", "list", "--inventory"])
        .arg(&inventory)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("row 3").and(predicate::str::contains("'http'")));
}

#[test]
fn test_devices_check_simulated_camera() {
    let (home, inventory) = workspace(FAKE_INVENTORY);
    camfleet_cmd(home.path())
        .args(["devices", "check", "1", "-o", "plain", "--inventory"])
        .arg(&inventory)
        .assert()
        .success()
        .stdout("1\tonline\n");

    camfleet_cmd(home.path())
        .args(["devices", "check", "2", "--inventory"])
        .arg(&inventory)
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Status:    online")
                .and(predicate::str::contains("Address:   10.0.0.2:80")),
        );
}

#[test]
fn test_devices_check_json() {
    let (home, inventory) = workspace(FAKE_INVENTORY);
    camfleet_cmd(home.path())
        .args(["devices", "check", "2", "-o", "json-compact", "--inventory"])
        .arg(&inventory)
        .assert()
        .success()
        .stdout(
            predicate::str::contains(r#""status":"online""#)
                .and(predicate::str::contains(r#""simulated":true"#))
                .and(predicate::str::contains("secret").not()),
        );
}

#[test]
fn test_devices_check_unknown_camera_exits_4() {
    let (home, inventory) = workspace(FAKE_INVENTORY);
    camfleet_cmd(home.path())
        .args(["devices", "check", "99", "--inventory"])
        .arg(&inventory)
        .assert()
        .code(4)
        .stderr(predicate::str::contains("camera '99' not found"));
}

#[test]
fn test_devices_check_refused_camera_is_error() {
    // Nothing listens on port 1, so both protocols are refused at once.
    let (home, inventory) = workspace(
        "id,ip,port,url,username,password,isFake\n3,127.0.0.1,1,,admin,secret,false\n",
    );
    camfleet_cmd(home.path())
        .args(["devices", "check", "3", "-o", "plain", "--inventory"])
        .arg(&inventory)
        .assert()
        .code(7)
        .stdout("3\terror\n")
        .stderr(predicate::str::contains("Camera '3' check status: error"));
}

// ── Apply / validate ────────────────────────────────────────────────

#[test]
fn test_apply_simulated_cameras_pass() {
    let (home, inventory) = workspace(FAKE_INVENTORY);
    camfleet_cmd(home.path())
        .args(["apply", "--all", "--width", "1920", "--height", "1080", "--fps", "30"])
        .args(["-o", "plain", "--inventory"])
        .arg(&inventory)
        .assert()
        .success()
        .stdout("2\tPASS\n1\tPASS\n");
}

#[test]
fn test_apply_unknown_camera_exits_9() {
    let (home, inventory) = workspace(FAKE_INVENTORY);
    camfleet_cmd(home.path())
        .args(["apply", "--ids", "1,99", "--width", "1280", "--height", "720"])
        .args(["-o", "plain", "--inventory"])
        .arg(&inventory)
        .assert()
        .code(9)
        .stdout(
            predicate::str::contains("1\tPASS").and(predicate::str::contains("99\tCONFIG_ERROR")),
        )
        .stderr(predicate::str::contains("1 of 2 cameras failed"));
}

#[test]
fn test_apply_exports_csv() {
    let (home, inventory) = workspace(FAKE_INVENTORY);
    let csv = home.path().join("results.csv");
    camfleet_cmd(home.path())
        .args(["apply", "--ids", "2,1", "--width", "1280", "--height", "720", "-q"])
        .arg("--inventory")
        .arg(&inventory)
        .arg("--export")
        .arg(&csv)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let text = std::fs::read_to_string(&csv).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3, "header + 2 rows:\n{text}");
    assert!(lines[0].starts_with("device_id,device_address,result"));
    assert!(lines[1].starts_with("1,10.0.0.1:8080,PASS,1280x720"), "{text}");
    assert!(lines[2].starts_with("2,10.0.0.2:80,PASS"), "{text}");
}

#[test]
fn test_apply_requires_a_size() {
    let (home, inventory) = workspace(FAKE_INVENTORY);
    camfleet_cmd(home.path())
        .args(["apply", "--all", "--inventory"])
        .arg(&inventory)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--width and --height"));
}

#[test]
fn test_apply_ids_and_all_conflict() {
    let home = tempfile::tempdir().unwrap();
    let output = camfleet_cmd(home.path())
        .args(["apply", "--ids", "1", "--all", "--width", "640", "--height", "480"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("cannot be used with"));
}

#[test]
fn test_validate_simulated_cameras() {
    let (home, inventory) = workspace(FAKE_INVENTORY);
    camfleet_cmd(home.path())
        .args(["validate", "--ids", "1", "--width", "1920", "--height", "1080"])
        .args(["-o", "plain", "--inventory"])
        .arg(&inventory)
        .assert()
        .success()
        .stdout("1\tPASS\n");
}

#[test]
fn test_zero_concurrency_rejected_by_both_batch_commands() {
    let (home, inventory) = workspace(FAKE_INVENTORY);
    for command in ["apply", "validate"] {
        camfleet_cmd(home.path())
            .args([command, "--ids", "1", "--width", "1920", "--height", "1080"])
            .args(["--concurrency", "0", "--inventory"])
            .arg(&inventory)
            .assert()
            .code(2)
            .stderr(predicate::str::contains("--concurrency"));
    }
}

#[test]
fn test_apply_uses_saved_desired() {
    let (home, inventory) = workspace(FAKE_INVENTORY);
    let config = home.path().join("config.toml");
    std::fs::write(
        &config,
        format!(
            "inventory = {:?}\n\n[desired]\nwidth = 1280\nheight = 720\nfps = 15\n",
            inventory.display().to_string()
        ),
    )
    .unwrap();

    camfleet_cmd(home.path())
        .args(["apply", "--ids", "2", "-o", "json-compact", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            r#""desired":{"resolution":{"width":1280,"height":720},"quality":0,"frame_rate":15,"bitrate_kbps":0}"#,
        ));
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_path_honours_flag() {
    let home = tempfile::tempdir().unwrap();
    let config = home.path().join("elsewhere.toml");
    camfleet_cmd(home.path())
        .args(["config", "path", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("elsewhere.toml"));
}

#[test]
fn test_config_show_defaults() {
    let home = tempfile::tempdir().unwrap();
    camfleet_cmd(home.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("[policy]")
                .and(predicate::str::contains("ratio_tolerance = 0.5"))
                .and(predicate::str::contains("concurrency = 4")),
        );
}

#[test]
fn test_config_import_saves_desired() {
    let home = tempfile::tempdir().unwrap();
    let config = home.path().join("config.toml");
    let csv = home.path().join("desired.csv");
    std::fs::write(&csv, "Width,Height,FPS,Bitrate\n1280,720,15,2048\n").unwrap();

    camfleet_cmd(home.path())
        .args(["config", "import"])
        .arg(&csv)
        .arg("--config")
        .arg(&config)
        .assert()
        .success();

    camfleet_cmd(home.path())
        .args(["config", "show", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "[desired]\nwidth = 1280\nheight = 720\nfps = 15\nbitrate = 2048",
        ));
}

#[test]
fn test_config_import_rejects_missing_column() {
    let home = tempfile::tempdir().unwrap();
    let config = home.path().join("config.toml");
    let csv = home.path().join("desired.csv");
    std::fs::write(&csv, "width,height\n1280,720\n").unwrap();

    camfleet_cmd(home.path())
        .args(["config", "import"])
        .arg(&csv)
        .arg("--config")
        .arg(&config)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("required column 'fps'"));
    assert!(!config.exists());
}
