//! Observability: tracing init and the append-only JSONL audit log.
//!
//! The step history is a run's primary audit trail; the JSONL log is the
//! process-level complement (validation rejections, execution lifecycle).
//! Uses `config::ObservabilityConfig` for OPSAGENT_QUIET, LOG_LEVEL,
//! LOG_JSON, and AUDIT_LOG.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use serde_json::json;
use tracing_subscriber::{prelude::*, EnvFilter};

static AUDIT_PATH: Mutex<Option<String>> = Mutex::new(None);

/// Initialize tracing. Call once at process startup.
/// When OPSAGENT_QUIET=1, only WARN and above are logged.
pub fn init_tracing() {
    let cfg = crate::config::ObservabilityConfig::from_env();
    let level: String = if cfg.quiet {
        "opsagent=warn".to_string()
    } else {
        cfg.log_level.clone()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

    let _ = if cfg.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .try_init()
    };
}

fn get_audit_path() -> Option<String> {
    {
        let guard = AUDIT_PATH.lock().ok()?;
        if let Some(ref p) = *guard {
            return Some(p.clone());
        }
    }
    let path = crate::config::ObservabilityConfig::from_env().audit_log.clone()?;
    if path.is_empty() {
        return None;
    }
    if let Some(parent) = Path::new(&path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    {
        let mut guard = AUDIT_PATH.lock().ok()?;
        *guard = Some(path.clone());
    }
    Some(path)
}

fn append_jsonl(path: &str, record: &serde_json::Value) {
    if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(path) {
        if let Ok(line) = serde_json::to_string(record) {
            let _ = writeln!(f, "{}", line);
        }
    }
}

/// Audit: a code block was rejected by static validation.
pub fn audit_validation_rejected(run_id: &str, rule_id: &str, line: usize, construct: &str) {
    tracing::warn!(
        run_id = %run_id,
        rule_id = %rule_id,
        line = %line,
        construct = %construct,
        "Validation rejected code block"
    );
    if let Some(path) = get_audit_path() {
        let record = json!({
            "ts": Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            "event": "validation_rejected",
            "run_id": run_id,
            "rule_id": rule_id,
            "line": line,
            "construct": construct,
        });
        append_jsonl(&path, &record);
    }
}

/// Audit: guarded execution is about to spawn the interpreter.
pub fn audit_execution_started(run_id: &str, code_len: usize, tool_count: usize) {
    if let Some(path) = get_audit_path() {
        let record = json!({
            "ts": Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            "event": "execution_started",
            "run_id": run_id,
            "code_len": code_len,
            "tool_count": tool_count,
        });
        append_jsonl(&path, &record);
    }
}

/// Audit: guarded execution finished (success or failure).
pub fn audit_execution_completed(run_id: &str, success: bool, duration_ms: u64, stdout_len: usize) {
    if let Some(path) = get_audit_path() {
        let record = json!({
            "ts": Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            "event": "execution_completed",
            "run_id": run_id,
            "success": success,
            "duration_ms": duration_ms,
            "stdout_len": stdout_len,
        });
        append_jsonl(&path, &record);
    }
}

/// Audit: an agent run terminated.
pub fn audit_run_completed(run_id: &str, steps: usize, terminal: &str, duration_ms: u64) {
    if let Some(path) = get_audit_path() {
        let record = json!({
            "ts": Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            "event": "run_completed",
            "run_id": run_id,
            "steps": steps,
            "terminal": terminal,
            "duration_ms": duration_ms,
        });
        append_jsonl(&path, &record);
    }
}
