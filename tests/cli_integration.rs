use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Binary with its preferences directory pointed at a scratch location
fn ecg_link(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("ecg-link").unwrap();
    cmd.env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path())
        .env_remove("ECG_LINK_CONFIG")
        .env_remove("ECG_ANALYSIS_URL");
    cmd
}

// =============================================================================
// GENERAL
// =============================================================================

#[test]
fn test_no_args_shows_help() {
    let home = TempDir::new().unwrap();
    ecg_link(&home)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}

#[test]
fn test_version_flag() {
    let home = TempDir::new().unwrap();
    ecg_link(&home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("ecg-link"));
}

#[test]
fn test_help_flag() {
    let home = TempDir::new().unwrap();
    ecg_link(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("ECG device"))
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("record"));
}

// =============================================================================
// VALIDATE SUBCOMMAND
// =============================================================================

#[test]
fn test_validate_accepts_ipv4() {
    let home = TempDir::new().unwrap();
    ecg_link(&home)
        .args(["validate", "192.168.1.1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ws://192.168.1.1/ws"));
}

#[test]
fn test_validate_rejects_out_of_range_octet() {
    let home = TempDir::new().unwrap();
    ecg_link(&home)
        .args(["validate", "192.168.1.256"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Invalid IP Address"));
}

#[test]
fn test_validate_rejects_hostname() {
    let home = TempDir::new().unwrap();
    ecg_link(&home)
        .args(["validate", "ecg.local"])
        .assert()
        .code(2);
}

#[test]
fn test_validate_json() {
    let home = TempDir::new().unwrap();
    let output = ecg_link(&home)
        .args(["validate", "010.000.000.001", "--json"])
        .assert()
        .success();

    let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(parsed["valid"], true);
    assert_eq!(parsed["normalized"], "10.0.0.1");
    assert_eq!(parsed["url"], "ws://10.0.0.1/ws");
    assert!(parsed["error"].is_null());
}

#[test]
fn test_validate_json_invalid() {
    let home = TempDir::new().unwrap();
    let output = ecg_link(&home)
        .args(["validate", "1.2.3", "--json"])
        .assert()
        .code(2);

    let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(parsed["valid"], false);
    assert!(parsed["url"].is_null());
    assert!(parsed["error"].as_str().unwrap().contains("1.2.3"));
}

// =============================================================================
// DEVICE SUBCOMMANDS (offline paths only)
// =============================================================================

#[test]
fn test_record_without_address_or_preference() {
    let home = TempDir::new().unwrap();
    ecg_link(&home)
        .arg("record")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--address"));
}

#[test]
fn test_monitor_rejects_invalid_address() {
    let home = TempDir::new().unwrap();
    ecg_link(&home)
        .args(["monitor", "--address", "999.0.0.1", "--seconds", "1"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Invalid IP Address"));
}

#[test]
fn test_record_rejects_unknown_lead() {
    let home = TempDir::new().unwrap();
    ecg_link(&home)
        .args(["record", "--address", "192.168.1.50", "--leads", "4"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("4"));
}

// =============================================================================
// CONFIG
// =============================================================================

#[test]
fn test_malformed_config_is_rejected() {
    let home = TempDir::new().unwrap();
    let config = home.path().join("link.json");
    std::fs::write(&config, "{ not json").unwrap();

    ecg_link(&home)
        .args(["--config", config.to_str().unwrap(), "validate", "10.0.0.1"])
        .assert()
        .code(2);
}

#[test]
fn test_partial_config_is_accepted() {
    let home = TempDir::new().unwrap();
    let config = home.path().join("link.json");
    std::fs::write(&config, r#"{ "reconnect_delay_ms": 500 }"#).unwrap();

    ecg_link(&home)
        .args(["--config", config.to_str().unwrap(), "validate", "10.0.0.1"])
        .assert()
        .success();
}

// =============================================================================
// MODEL-INFO SUBCOMMAND
// =============================================================================

#[test]
fn test_model_info_unreachable_service() {
    let home = TempDir::new().unwrap();
    // Bind then release a port so nothing is listening on it
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();

    ecg_link(&home)
        .args(["model-info", "--analysis-url", &format!("http://127.0.0.1:{}", port)])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("Model info request to"));
}

#[test]
fn test_model_info_prints_service_json() {
    use std::io::{Read, Write};

    let home = TempDir::new().unwrap();
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    let server = std::thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut request = [0u8; 4096];
        let n = stream.read(&mut request).unwrap();
        let body = r#"{"model":"resnet50-transformer"}"#;
        write!(
            stream,
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        )
        .unwrap();
        String::from_utf8_lossy(&request[..n]).into_owned()
    });

    ecg_link(&home)
        .args([
            "model-info",
            "--compact",
            "--analysis-url",
            &format!("http://{}", addr),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#"{"model":"resnet50-transformer"}"#));

    assert!(server.join().unwrap().starts_with("GET /model-info "));
}
