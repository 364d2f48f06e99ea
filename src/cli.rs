//! CLI argument parsing and NDJSON audit-log ingestion (spec §1 CLI surface).
//!
//! `main.rs` wires this module's [`Args`] and [`read_audit_log`] into a
//! single `run_inspection` call. Parsing the wire format lives here rather
//! than in `pipeline::tasks` because the engine operates on an
//! already-built [`LogList`] — the `[]Log` provider is a pure function of an
//! in-memory slice, not an I/O task.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use serde_json::Value;

use crate::log::{AuditFields, CommonFields, Log, LogList, Severity};
use crate::node::StructuredNode;
use crate::resource::{KubernetesObjectOperation, Verb};

#[derive(Parser, Debug)]
#[command(
    name = "kubehist",
    about = "Offline Kubernetes audit-log history inspector",
    version
)]
pub struct Args {
    /// Path to a newline-delimited-JSON Kubernetes audit log file.
    pub audit_log: PathBuf,

    /// Optional path to a TOML inspection config file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Resolve the task graph and run the pipeline without reading or
    /// writing any resource history; prints an empty summary.
    #[arg(long)]
    pub dry_run: bool,
}

/// Read every line of `path` as one Kubernetes audit event and parse it into
/// a [`Log`]. Blank lines are skipped; a malformed line aborts the whole read
/// (spec §7 treats a missing required field set as fatal at read time, and a
/// line that isn't valid JSON is the same kind of failure one level earlier).
pub fn read_audit_log(path: &Path) -> Result<LogList> {
    let file = File::open(path).with_context(|| format!("opening audit log {}", path.display()))?;
    let reader = BufReader::new(file);

    let mut logs = LogList::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("reading line {} of {}", index + 1, path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let log = parse_audit_event(index as u64, &line)
            .with_context(|| format!("parsing line {} of {}", index + 1, path.display()))?;
        logs.push(Arc::new(log));
    }

    Ok(logs)
}

fn parse_audit_event(sequence: u64, line: &str) -> Result<Log> {
    let value: Value = serde_json::from_str(line).context("invalid JSON")?;
    let body = StructuredNode::from_json_value(&value);

    let timestamp = event_timestamp(&value).context("missing stageTimestamp/requestReceivedTimestamp")?;
    let common = CommonFields {
        timestamp,
        severity: Severity::Info,
    };
    let mut log = Log::new(sequence, body, common);

    if let Some(object_ref) = value.get("objectRef") {
        log = log.with_audit(audit_fields(&value, object_ref)?);
    }

    Ok(log)
}

fn event_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    let raw = value
        .get("stageTimestamp")
        .or_else(|| value.get("requestReceivedTimestamp"))
        .and_then(Value::as_str)?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn audit_fields(value: &Value, object_ref: &Value) -> Result<AuditFields> {
    let verb = value.get("verb").and_then(Value::as_str).unwrap_or("other");
    let api_group = object_ref.get("apiGroup").and_then(Value::as_str).unwrap_or("");
    let api_version_suffix = object_ref.get("apiVersion").and_then(Value::as_str).unwrap_or("v1");
    let api_version = if api_group.is_empty() {
        api_version_suffix.to_string()
    } else {
        format!("{api_group}/{api_version_suffix}")
    };

    let plural_kind = object_ref
        .get("resource")
        .and_then(Value::as_str)
        .context("objectRef missing resource")?
        .to_string();
    let namespace = object_ref.get("namespace").and_then(Value::as_str).unwrap_or("").to_string();
    let name = object_ref.get("name").and_then(Value::as_str).unwrap_or("").to_string();
    let subresource_name = object_ref.get("subresource").and_then(Value::as_str).map(String::from);

    let operation = KubernetesObjectOperation {
        verb: Verb::from_raw(verb),
        api_version,
        plural_kind,
        namespace,
        name,
        subresource_name,
    };

    let principal = value
        .pointer("/user/username")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();
    let request_uri = value.get("requestURI").and_then(Value::as_str).unwrap_or_default().to_string();
    let status_code = value
        .pointer("/responseStatus/code")
        .and_then(Value::as_u64)
        .map(|n| n as u32);
    let status_message = value
        .pointer("/responseStatus/message")
        .and_then(Value::as_str)
        .map(String::from);
    let is_error = status_code.is_some_and(|code| code >= 400);
    let request_body = value.get("requestObject").map(StructuredNode::from_json_value);
    let response_body = value.get("responseObject").map(StructuredNode::from_json_value);

    Ok(AuditFields {
        operation,
        principal,
        request_uri,
        status_code,
        status_message,
        is_error,
        request_body,
        response_body,
    })
}
