//! CLI integration tests

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Binary with config and env isolated from the host
fn voice_capture_bin(config_home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("voice-capture").expect("binary built");
    cmd.env("XDG_CONFIG_HOME", config_home.path())
        .env("HOME", config_home.path())
        .env_remove("VOICE_CAPTURE_OUTPUT_DIR")
        .env_remove("VOICE_CAPTURE_DEVICE")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn help_output() {
    let home = TempDir::new().unwrap();
    voice_capture_bin(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("microphone"))
        .stdout(predicate::str::contains("--auto-stop"))
        .stdout(predicate::str::contains("--output-dir"))
        .stdout(predicate::str::contains("--device"))
        .stdout(predicate::str::contains("--no-playback"))
        .stdout(predicate::str::contains("record"))
        .stdout(predicate::str::contains("devices"));
}

#[test]
fn version_output() {
    let home = TempDir::new().unwrap();
    voice_capture_bin(&home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("voice-capture"))
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn config_help() {
    let home = TempDir::new().unwrap();
    voice_capture_bin(&home)
        .args(["config", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("init"))
        .stdout(predicate::str::contains("set"))
        .stdout(predicate::str::contains("get"))
        .stdout(predicate::str::contains("list"))
        .stdout(predicate::str::contains("path"));
}

#[test]
fn config_path_command() {
    let home = TempDir::new().unwrap();
    voice_capture_bin(&home)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("voice-capture"))
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn invalid_auto_stop_is_a_usage_error() {
    let home = TempDir::new().unwrap();
    voice_capture_bin(&home)
        .args(["--auto-stop", "forever", "record"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Invalid auto-stop"));
}

#[test]
fn quiet_conflicts_with_verbose() {
    let home = TempDir::new().unwrap();
    voice_capture_bin(&home)
        .args(["-q", "-v", "devices"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
#[cfg(target_os = "linux")]
fn config_set_then_get() {
    let home = TempDir::new().unwrap();
    voice_capture_bin(&home)
        .args(["config", "set", "auto_stop", "12s"])
        .assert()
        .success()
        .stderr(predicate::str::contains("auto_stop = 12s"));

    voice_capture_bin(&home)
        .args(["config", "get", "auto_stop"])
        .assert()
        .success()
        .stdout("12s\n");

    voice_capture_bin(&home)
        .args(["config", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("auto_stop"))
        .stdout(predicate::str::contains("(not set)"));

    assert!(home.path().join("voice-capture").join("config.toml").exists());
}

#[test]
#[cfg(target_os = "linux")]
fn invalid_auto_stop_in_config_file_is_a_usage_error() {
    let home = TempDir::new().unwrap();
    let dir = home.path().join("voice-capture");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("config.toml"), "auto_stop = \"never\"\n").unwrap();

    voice_capture_bin(&home)
        .arg("record")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Invalid auto-stop"));
}

// Runs that pass validation open the microphone; those paths are covered by
// the component tests with mock devices.
