//! Guarded code execution with construction-time preview/execute modes.
//!
//! Validation always runs first, in both modes. Preview mode stops
//! there: allowed code is returned as a [`ExecutionOutcome::Skipped`]
//! without side effects. Execute mode spawns an isolated interpreter
//! (`python -I`) on the generated harness, services tool-bridge requests
//! over stdio, and converts every runtime failure — exception, timeout,
//! output overflow, interpreter crash — into a structured outcome that
//! never escapes as a panic or an unhandled error.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use uuid::Uuid;

use opsagent_core::config::env_keys::{limits as limit_keys, sandbox as sandbox_keys};
use opsagent_core::observability;

use crate::code::CodeBlock;
use crate::harness;
use crate::rules::RuleSet;
use crate::validator::{CodeValidator, Verdict, Violation};

/// Default wall-clock cap for one execution.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Default cap on captured stdout.
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 1024 * 1024;
/// Ceiling for the env-tunable timeout.
const MAX_TIMEOUT_SECS: u64 = 3600;
/// Ceiling for the env-tunable output cap.
const MAX_OUTPUT_CEILING_BYTES: u64 = 512 * 1024 * 1024;

/// Execution mode, fixed at executor construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecMode {
    /// Validate only; never run anything.
    Preview,
    /// Validate, then run allowed code.
    Execute,
}

/// Watchdog limits around the execution stage.
#[derive(Debug, Clone, Copy)]
pub struct ResourceLimits {
    pub timeout_secs: u64,
    pub max_output_bytes: usize,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self::from_env()
    }
}

impl ResourceLimits {
    /// Load limits from the environment. Unparseable or out-of-range
    /// values fall back to the defaults with a warning.
    pub fn from_env() -> Self {
        Self {
            timeout_secs: limit_keys::TIMEOUT_SECS
                .bounded(DEFAULT_TIMEOUT_SECS, 1..=MAX_TIMEOUT_SECS),
            max_output_bytes: limit_keys::MAX_OUTPUT_BYTES
                .bounded(DEFAULT_MAX_OUTPUT_BYTES as u64, 4096..=MAX_OUTPUT_CEILING_BYTES)
                as usize,
        }
    }
}

/// Outcome of one executor invocation on allowed code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    /// Preview mode: validation passed, nothing ran. Carries the code
    /// as-is so callers can display would-run output.
    Skipped { code: String },
    /// Execute mode: the code ran to completion.
    Success {
        stdout: String,
        /// Repr summary of the script's `result` variable, when set.
        value: Option<String>,
    },
    /// Execute mode: a runtime failure (exception, timeout, overflow,
    /// interpreter crash).
    Failure { error: String },
}

impl ExecutionOutcome {
    /// Render for step history and model observations.
    pub fn display(&self) -> String {
        match self {
            ExecutionOutcome::Skipped { code } => {
                format!("[preview] validation passed; code not executed:\n{}", code)
            }
            ExecutionOutcome::Success { stdout, value } => {
                let mut out = stdout.clone();
                if let Some(value) = value {
                    if !out.is_empty() && !out.ends_with('\n') {
                        out.push('\n');
                    }
                    out.push_str(&format!("result = {}", value));
                }
                if out.is_empty() {
                    out.push_str("(no output)");
                }
                out
            }
            ExecutionOutcome::Failure { error } => format!("execution failed: {}", error),
        }
    }
}

/// Errors from the executor that are not runtime outcomes.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    /// Static validation rejected the code; execution never started.
    #[error("{}", Verdict::Rejected(violations.clone()).rejection_summary())]
    Rejected { violations: Vec<Violation> },

    /// The interpreter could not be resolved or spawned.
    #[error("interpreter unavailable: {0}")]
    Interpreter(String),

    #[error("execution I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Host-side seam the executor uses to service tool calls from inside
/// the sandbox. The agent layer implements this over its dispatcher.
#[async_trait]
pub trait ToolBridge: Send + Sync {
    /// Registry names to expose as callables in the execution namespace.
    fn tool_names(&self) -> Vec<String>;
    /// Invoke a tool; errors are surfaced inside the sandbox as raised
    /// exceptions the code can handle.
    async fn call(&self, name: &str, arguments: Value) -> Result<Value, String>;
}

/// Bridge with no tools registered.
pub struct NoTools;

#[async_trait]
impl ToolBridge for NoTools {
    fn tool_names(&self) -> Vec<String> {
        Vec::new()
    }

    async fn call(&self, name: &str, _arguments: Value) -> Result<Value, String> {
        Err(format!("no tool named '{}' is registered", name))
    }
}

/// The sandboxed code executor.
///
/// Holds no mutable state between invocations: the mode, validator, and
/// limits are fixed at construction, and each execution gets a fresh
/// scratch directory and namespace.
pub struct CodeExecutor {
    mode: ExecMode,
    validator: CodeValidator,
    allowed_modules: Vec<String>,
    limits: ResourceLimits,
    /// Resolved interpreter path; present only in execute mode.
    python: Option<PathBuf>,
}

impl CodeExecutor {
    /// Build a preview-only executor. Never runs anything; needs no
    /// interpreter on the host.
    pub fn preview(rule_set: &RuleSet) -> Self {
        Self {
            mode: ExecMode::Preview,
            validator: CodeValidator::new(rule_set),
            allowed_modules: rule_set.effective_allowed_modules(),
            limits: ResourceLimits::default(),
            python: None,
        }
    }

    /// Build an execute-enabled executor, resolving the interpreter
    /// (`OPSAGENT_PYTHON` override, then `python3` on PATH).
    pub fn execute_enabled(rule_set: &RuleSet) -> Result<Self, ExecError> {
        let python = match sandbox_keys::PYTHON.lookup() {
            Some(p) => PathBuf::from(p),
            None => which::which("python3")
                .map_err(|e| ExecError::Interpreter(format!("python3 not found: {}", e)))?,
        };
        Ok(Self {
            mode: ExecMode::Execute,
            validator: CodeValidator::new(rule_set),
            allowed_modules: rule_set.effective_allowed_modules(),
            limits: ResourceLimits::default(),
            python: Some(python),
        })
    }

    pub fn with_limits(mut self, limits: ResourceLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn mode(&self) -> ExecMode {
        self.mode
    }

    /// Validate without executing. Same check both modes rely on.
    pub fn validate(&self, code: &CodeBlock) -> Verdict {
        self.validator.validate(code)
    }

    /// Validate, then (in execute mode) run the code.
    ///
    /// Rejected code returns `Err(ExecError::Rejected)` and never
    /// reaches the execution stage, regardless of mode. In preview mode
    /// allowed code yields [`ExecutionOutcome::Skipped`].
    pub async fn run(
        &self,
        run_id: &str,
        code: &CodeBlock,
        bridge: &dyn ToolBridge,
    ) -> Result<ExecutionOutcome, ExecError> {
        match self.validator.validate(code) {
            Verdict::Allowed => {}
            Verdict::Rejected(violations) => {
                for v in &violations {
                    observability::audit_validation_rejected(
                        run_id,
                        &v.rule_id,
                        v.line,
                        &v.construct.to_string(),
                    );
                }
                return Err(ExecError::Rejected { violations });
            }
        }

        if self.mode == ExecMode::Preview {
            tracing::debug!(run_id = %run_id, "Preview mode: skipping execution");
            return Ok(ExecutionOutcome::Skipped {
                code: code.source.clone(),
            });
        }

        self.spawn_and_drive(run_id, code, bridge).await
    }

    async fn spawn_and_drive(
        &self,
        run_id: &str,
        code: &CodeBlock,
        bridge: &dyn ToolBridge,
    ) -> Result<ExecutionOutcome, ExecError> {
        let python = self
            .python
            .as_ref()
            .ok_or_else(|| ExecError::Interpreter("no interpreter resolved".to_string()))?;

        // Fresh scratch dir and namespace per invocation; removed on drop.
        let scratch = tempfile::tempdir()?;
        let code_path = scratch.path().join("code.py");
        let harness_path = scratch.path().join("harness.py");
        let marker = format!("\u{1f}{}:", Uuid::new_v4().simple());

        std::fs::write(&code_path, &code.source)?;
        std::fs::write(
            &harness_path,
            harness::generate_harness(&bridge.tool_names(), &self.allowed_modules, &marker),
        )?;

        observability::audit_execution_started(
            run_id,
            code.source.len(),
            bridge.tool_names().len(),
        );
        let started = Instant::now();

        let mut child = Command::new(python)
            .arg("-I")
            .arg(&harness_path)
            .arg(&code_path)
            .current_dir(scratch.path())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ExecError::Interpreter(format!("failed to spawn interpreter: {}", e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| ExecError::Interpreter("child stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ExecError::Interpreter("child stdout unavailable".to_string()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| ExecError::Interpreter("child stderr unavailable".to_string()))?;

        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            let _ = stderr.read_to_string(&mut buf).await;
            buf
        });

        let deadline = started + std::time::Duration::from_secs(self.limits.timeout_secs);
        let mut lines = BufReader::new(stdout).lines();
        let mut captured = String::new();
        let mut exit_record: Option<Value> = None;
        let mut aborted: Option<String> = None;

        loop {
            let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                aborted = Some(format!(
                    "timed out after {}s",
                    self.limits.timeout_secs
                ));
                break;
            };
            let line = match tokio::time::timeout(remaining, lines.next_line()).await {
                Err(_) => {
                    aborted = Some(format!(
                        "timed out after {}s",
                        self.limits.timeout_secs
                    ));
                    break;
                }
                Ok(Err(e)) => return Err(ExecError::Io(e)),
                Ok(Ok(None)) => break,
                Ok(Ok(Some(line))) => line,
            };

            if let Some(rest) = line.strip_prefix(&marker) {
                let record: Value = match serde_json::from_str(rest) {
                    Ok(v) => v,
                    Err(e) => {
                        tracing::warn!("Malformed protocol record from sandbox: {}", e);
                        continue;
                    }
                };
                match record.get("op").and_then(|v| v.as_str()) {
                    Some("tool_call") => {
                        let name = record
                            .get("name")
                            .and_then(|v| v.as_str())
                            .unwrap_or("")
                            .to_string();
                        let arguments =
                            record.get("arguments").cloned().unwrap_or_else(|| json!({}));
                        tracing::debug!(run_id = %run_id, tool = %name, "Sandbox tool call");
                        let response = match bridge.call(&name, arguments).await {
                            Ok(result) => json!({ "ok": true, "result": result }),
                            Err(error) => json!({ "ok": false, "error": error }),
                        };
                        let mut payload = response.to_string();
                        payload.push('\n');
                        stdin.write_all(payload.as_bytes()).await?;
                        stdin.flush().await?;
                    }
                    Some("exit") => {
                        exit_record = Some(record);
                    }
                    other => {
                        tracing::warn!("Unknown sandbox protocol op: {:?}", other);
                    }
                }
            } else {
                captured.push_str(&line);
                captured.push('\n');
                if captured.len() > self.limits.max_output_bytes {
                    aborted = Some(format!(
                        "output exceeded {} bytes",
                        self.limits.max_output_bytes
                    ));
                    break;
                }
            }
        }

        let outcome = if let Some(reason) = aborted {
            let _ = child.kill().await;
            ExecutionOutcome::Failure { error: reason }
        } else {
            // Child closed stdout; give it a moment to exit cleanly.
            let status = tokio::time::timeout(
                std::time::Duration::from_secs(5),
                child.wait(),
            )
            .await;
            match exit_record {
                Some(record) if record.get("ok").and_then(|v| v.as_bool()) == Some(true) => {
                    ExecutionOutcome::Success {
                        stdout: captured,
                        value: record
                            .get("value")
                            .and_then(|v| v.as_str())
                            .map(String::from),
                    }
                }
                Some(record) => ExecutionOutcome::Failure {
                    error: record
                        .get("error")
                        .and_then(|v| v.as_str())
                        .unwrap_or("unknown execution failure")
                        .to_string(),
                },
                None => {
                    let stderr_text = stderr_task.await.unwrap_or_default();
                    let tail: String = stderr_text
                        .lines()
                        .rev()
                        .take(5)
                        .collect::<Vec<_>>()
                        .into_iter()
                        .rev()
                        .collect::<Vec<_>>()
                        .join("\n");
                    let code_desc = match status {
                        Ok(Ok(s)) => format!("{}", s),
                        _ => "unknown status".to_string(),
                    };
                    ExecutionOutcome::Failure {
                        error: format!("interpreter exited ({}) without result: {}", code_desc, tail),
                    }
                }
            }
        };

        observability::audit_execution_completed(
            run_id,
            matches!(outcome, ExecutionOutcome::Success { .. }),
            started.elapsed().as_millis() as u64,
            match &outcome {
                ExecutionOutcome::Success { stdout, .. } => stdout.len(),
                _ => 0,
            },
        );

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn python_available() -> bool {
        which::which("python3").is_ok()
    }

    // ---- Mode and validation behavior (no interpreter needed) ----

    #[tokio::test]
    async fn test_preview_allowed_code_is_skipped() {
        let exec = CodeExecutor::preview(&RuleSet::default());
        let code = CodeBlock::python("print('hello')");
        let outcome = exec.run("run-1", &code, &NoTools).await.unwrap();
        assert_eq!(
            outcome,
            ExecutionOutcome::Skipped {
                code: "print('hello')".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_preview_rejects_denylisted_code() {
        let exec = CodeExecutor::preview(&RuleSet::default());
        let code = CodeBlock::python("import os; os.system('rm -rf /')");
        let err = exec.run("run-1", &code, &NoTools).await.unwrap_err();
        match err {
            ExecError::Rejected { violations } => {
                assert!(violations.iter().any(|v| v.rule_id == "py-os-system"));
            }
            other => panic!("expected Rejected, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_execute_mode_also_rejects_before_running() {
        if !python_available() {
            return;
        }
        let exec = CodeExecutor::execute_enabled(&RuleSet::default()).unwrap();
        let code = CodeBlock::python("eval('1')");
        assert!(matches!(
            exec.run("run-1", &code, &NoTools).await,
            Err(ExecError::Rejected { .. })
        ));
    }

    #[test]
    fn test_mode_is_fixed_at_construction() {
        let exec = CodeExecutor::preview(&RuleSet::default());
        assert_eq!(exec.mode(), ExecMode::Preview);
    }

    // ---- Execution stage (requires python3 on the host) ----

    #[tokio::test]
    async fn test_execute_captures_stdout_and_result() {
        if !python_available() {
            return;
        }
        let exec = CodeExecutor::execute_enabled(&RuleSet::default()).unwrap();
        let code = CodeBlock::python("print('hello')\nresult = 40 + 2");
        match exec.run("run-1", &code, &NoTools).await.unwrap() {
            ExecutionOutcome::Success { stdout, value } => {
                assert_eq!(stdout, "hello\n");
                assert_eq!(value.as_deref(), Some("42"));
            }
            other => panic!("expected Success, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_execute_converts_exception_to_failure() {
        if !python_available() {
            return;
        }
        let exec = CodeExecutor::execute_enabled(&RuleSet::default()).unwrap();
        let code = CodeBlock::python("raise ValueError('boom')");
        match exec.run("run-1", &code, &NoTools).await.unwrap() {
            ExecutionOutcome::Failure { error } => {
                assert!(error.contains("ValueError: boom"), "error: {}", error);
            }
            other => panic!("expected Failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_execute_allows_allowlisted_import() {
        if !python_available() {
            return;
        }
        let exec = CodeExecutor::execute_enabled(&RuleSet::default()).unwrap();
        let code = CodeBlock::python("import math\nprint(math.floor(1.5))");
        match exec.run("run-1", &code, &NoTools).await.unwrap() {
            ExecutionOutcome::Success { stdout, .. } => assert_eq!(stdout, "1\n"),
            other => panic!("expected Success, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_runtime_import_hook_is_a_second_fence() {
        if !python_available() {
            return;
        }
        // Drive the execution stage directly, bypassing static
        // validation, to prove the in-namespace import hook denies
        // non-allowlisted modules on its own.
        let exec = CodeExecutor::execute_enabled(&RuleSet::default()).unwrap();
        let code = CodeBlock::python("import os\nprint(os.getcwd())");
        match exec.spawn_and_drive("run-1", &code, &NoTools).await.unwrap() {
            ExecutionOutcome::Failure { error } => {
                assert!(error.contains("ImportError"), "error: {}", error);
            }
            other => panic!("expected Failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_execute_timeout_kills_child() {
        if !python_available() {
            return;
        }
        let exec = CodeExecutor::execute_enabled(&RuleSet::default())
            .unwrap()
            .with_limits(ResourceLimits {
                timeout_secs: 1,
                max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            });
        let code = CodeBlock::python("import time\ntime.sleep(30)");
        match exec.run("run-1", &code, &NoTools).await.unwrap() {
            ExecutionOutcome::Failure { error } => {
                assert!(error.contains("timed out"), "error: {}", error);
            }
            other => panic!("expected Failure, got {:?}", other),
        }
    }

    struct EchoBridge;

    #[async_trait]
    impl ToolBridge for EchoBridge {
        fn tool_names(&self) -> Vec<String> {
            vec!["echo".to_string()]
        }

        async fn call(&self, name: &str, arguments: Value) -> Result<Value, String> {
            assert_eq!(name, "echo");
            Ok(arguments.get("text").cloned().unwrap_or(Value::Null))
        }
    }

    #[tokio::test]
    async fn test_tools_are_callable_from_sandboxed_code() {
        if !python_available() {
            return;
        }
        let exec = CodeExecutor::execute_enabled(&RuleSet::default()).unwrap();
        let code = CodeBlock::python("x = echo(text='hi from sandbox')\nprint(x)");
        match exec.run("run-1", &code, &EchoBridge).await.unwrap() {
            ExecutionOutcome::Success { stdout, .. } => {
                assert_eq!(stdout, "hi from sandbox\n");
            }
            other => panic!("expected Success, got {:?}", other),
        }
    }
}
