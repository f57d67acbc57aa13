//! # CLI Exit Codes
//!
//! Runs the `en10168` binary against the certificate fixtures of the
//! schema crate and checks exit codes and output.

use std::path::PathBuf;
use std::process::{Command, Output};

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../en10168-schema/tests/fixtures")
        .join(name)
}

fn en10168(args: &[&std::ffi::OsStr]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_en10168"))
        .args(args)
        .env_remove("EN10168_ALLOW_NETWORK")
        .env_remove("EN10168_FETCH_TIMEOUT_SECS")
        .output()
        .expect("binary should run")
}

#[test]
fn valid_certificates_exit_zero() {
    let a = fixture("valid_certificate_1.json");
    let b = fixture("valid_certificate_2.json");
    let output = en10168(&["validate".as_ref(), a.as_os_str(), b.as_os_str()]);

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("2 file(s) checked, 0 invalid"));
}

#[test]
fn invalid_certificate_exits_one_with_json_report() {
    let bad = fixture("invalid_certificate_3.json");
    let output = en10168(&[
        "validate".as_ref(),
        "--format".as_ref(),
        "json".as_ref(),
        bad.as_os_str(),
    ]);

    assert_eq!(output.status.code(), Some(1));
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report[0]["valid"], false);
    assert_eq!(report[0]["errors"].as_array().unwrap().len(), 4);
}

#[test]
fn check_schema_reports_bundled_rule_set() {
    let output = en10168(&["check-schema".as_ref()]);

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("en10168-schemas/v0.1.0/schema.json"));
}

#[test]
fn unreadable_config_exits_one() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.yaml");
    let output = en10168(&["--config".as_ref(), missing.as_os_str(), "check-schema".as_ref()]);

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("cannot read config"));
}
