//! Tests for kubehist::cli — `Args` parsing and NDJSON audit-log ingestion.

use clap::Parser;
use kubehist::cli::{read_audit_log, Args};

// ── Args parsing ──────────────────────────────────────────────────────────────

#[test]
fn parses_required_audit_log_path() {
    let args = Args::parse_from(["kubehist", "audit.log"]);
    assert_eq!(args.audit_log.to_str(), Some("audit.log"));
    assert!(args.config.is_none());
}

#[test]
fn parses_optional_config_flag() {
    let args = Args::parse_from(["kubehist", "audit.log", "--config", "kubehist.toml"]);
    assert_eq!(args.config.as_deref().and_then(|p| p.to_str()), Some("kubehist.toml"));
}

#[test]
fn missing_audit_log_argument_is_rejected() {
    assert!(Args::try_parse_from(["kubehist"]).is_err());
}

// ── read_audit_log ────────────────────────────────────────────────────────────

#[test]
fn read_audit_log_reports_missing_file() {
    let err = read_audit_log(std::path::Path::new("/nonexistent/audit.log")).unwrap_err();
    assert!(err.to_string().contains("opening audit log"));
}

#[test]
fn read_audit_log_parses_a_create_and_a_delete() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audit.log");
    std::fs::write(
        &path,
        [
            r#"{"verb":"create","objectRef":{"resource":"pods","apiVersion":"v1","namespace":"default","name":"nginx"},"stageTimestamp":"2024-01-01T00:00:00Z"}"#,
            r#"{"verb":"delete","objectRef":{"resource":"pods","apiVersion":"v1","namespace":"default","name":"nginx"},"stageTimestamp":"2024-01-01T00:01:00Z"}"#,
        ]
        .join("\n"),
    )
    .unwrap();

    let logs = read_audit_log(&path).unwrap();
    assert_eq!(logs.len(), 2);
    assert!(logs[0].require_audit().unwrap().operation.verb.is_creative());
    assert!(logs[1].require_audit().unwrap().operation.verb.is_deletive());
}

#[test]
fn read_audit_log_rejects_invalid_json_line() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audit.log");
    std::fs::write(&path, "not json\n").unwrap();
    assert!(read_audit_log(&path).is_err());
}
