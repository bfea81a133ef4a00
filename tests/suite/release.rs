//! Release smoke checks: the built binary reports the version being tagged

use std::io::Write;
use std::process::{Command, Output};

use dyno_types::VERSION;

use crate::common::SAMPLE_CONFIG;

fn dyno(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_dyno"))
        .args(args)
        .env("RUST_LOG", "off")
        .env_remove("DYNO_CONFIG")
        .output()
        .unwrap()
}

#[test]
fn version_flag_prints_the_workspace_version() {
    let output = dyno(&["--version"]);
    assert!(output.status.success());
    assert_eq!(String::from_utf8(output.stdout).unwrap(), format!("dyno {VERSION}\n"));
    assert_eq!(VERSION, env!("CARGO_PKG_VERSION"));
}

#[test]
fn validate_needs_no_connection() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(SAMPLE_CONFIG.as_bytes()).unwrap();
    let config = file.path().to_str().unwrap();

    let output = dyno(&["--config", config, "table", "validate"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report[0]["table"], "sample");
    assert_eq!(report[0]["schemas"], serde_json::json!(["User", "Order"]));
}

#[test]
fn unknown_table_fails_with_a_message() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(SAMPLE_CONFIG.as_bytes()).unwrap();
    let config = file.path().to_str().unwrap();

    let output = dyno(&["--config", config, "table", "validate", "missing"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("table 'missing' is not declared"));
}
