//! Core agent loop: Planning → Acting → Observing until Done or Failed.
//!
//! One loop implementation serves both controller variants; they differ
//! only in what "Acting" means:
//!   - [`CodeAgent`]: every action is a code block, run through the
//!     sandboxed executor; tools are reachable only from inside the code.
//!   - [`ToolCallingAgent`]: actions are structured tool calls or plain
//!     text; the executor is never invoked.
//!
//! [`TriageAgent`] classifies the task with a single model call (no
//! tools) and routes to one of the two before running the normal loop.
//!
//! Termination is deterministic: a plain-text final answer, a fatal
//! model error, or the step budget. Recoverable failures (validation
//! rejections, tool errors, runtime exceptions) become observation
//! steps the model reacts to on its next planning call; nothing is
//! swallowed without a step.

use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Instant;

use regex::Regex;
use uuid::Uuid;

use opsagent_core::observability;
use opsagent_sandbox::{CodeBlock, CodeExecutor, ExecError, Language};

use crate::dispatch::ToolDispatcher;
use crate::events::EventSink;
use crate::model::{Action, Model, ModelError};
use crate::prompt;
use crate::step::{AgentResult, Step, StepKind};
use crate::tool::{ToolRegistry, ToolSpec};

/// Loop configuration shared by all agent variants.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Maximum recorded non-terminal steps before the run fails with a
    /// step-limit error.
    pub max_steps: usize,
    /// System prompt override; each variant has a default.
    pub system_prompt: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: 10,
            system_prompt: None,
        }
    }
}

/// Append-only step log. The only writer during a run: indices are
/// gapless by construction, and every step reaches the sink exactly
/// once, in order, at the moment it is recorded.
struct StepLog {
    steps: Vec<Step>,
}

impl StepLog {
    fn new() -> Self {
        Self { steps: Vec::new() }
    }

    fn record(&mut self, kind: StepKind, sink: &mut dyn EventSink) {
        let step = Step::new(self.steps.len(), kind);
        tracing::debug!(index = step.index, kind = step.kind.label(), "Step recorded");
        sink.on_step(&step);
        self.steps.push(step);
    }

    fn len(&self) -> usize {
        self.steps.len()
    }

    fn steps(&self) -> &[Step] {
        &self.steps
    }
}

#[derive(Clone, Copy, PartialEq)]
enum LoopKind {
    Code,
    ToolCalling,
}

/// Extract the first fenced code block in a recognized language.
/// Returns the preceding prose (if any) and the block.
fn extract_code_block(text: &str) -> Option<(Option<String>, CodeBlock)> {
    static FENCE_RE: OnceLock<Regex> = OnceLock::new();
    let re = FENCE_RE
        .get_or_init(|| Regex::new(r"(?s)```([A-Za-z0-9_+-]*)[ \t]*\r?\n(.*?)```").expect("static regex"));

    for caps in re.captures_iter(text) {
        let Some(language) = Language::from_fence(&caps[1]) else {
            continue;
        };
        let source = caps[2].trim_end().to_string();
        let prefix = text[..caps.get(0).expect("match").start()].trim();
        let thought = if prefix.is_empty() {
            None
        } else {
            Some(prefix.to_string())
        };
        return Some((
            thought,
            CodeBlock {
                language,
                source,
            },
        ));
    }
    None
}

/// Render a tool payload for the step history: bare strings stay bare,
/// everything else is compact JSON.
fn payload_to_content(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    }
}

/// The shared state machine. `executor` is present only for code runs.
async fn run_loop(
    kind: LoopKind,
    model: &dyn Model,
    dispatcher: &ToolDispatcher,
    executor: Option<&CodeExecutor>,
    config: &AgentConfig,
    task: &str,
    sink: &mut dyn EventSink,
) -> AgentResult {
    let run_id = Uuid::new_v4().to_string();
    let started = Instant::now();
    let mut log = StepLog::new();
    let mut answer = String::new();

    let specs = dispatcher.registry().specs();
    let system_prompt = config.system_prompt.clone().unwrap_or_else(|| match kind {
        LoopKind::Code => prompt::code_agent_system(&specs),
        LoopKind::ToolCalling => prompt::tool_agent_system(&specs),
    });
    // Code agents reach tools through the execution namespace, not the
    // function-calling interface.
    let advertised: &[ToolSpec] = match kind {
        LoopKind::Code => &[],
        LoopKind::ToolCalling => &specs,
    };

    tracing::info!(run_id = %run_id, task = %task, "Agent run started");

    loop {
        // Planning is the only budget checkpoint: a started step always
        // reaches its observation before the budget is re-checked.
        if log.len() >= config.max_steps {
            tracing::warn!(run_id = %run_id, "Step limit reached ({})", config.max_steps);
            log.record(
                StepKind::Error {
                    message: format!(
                        "step limit exceeded: {} steps recorded without a final answer",
                        config.max_steps
                    ),
                },
                sink,
            );
            break;
        }

        let action = match model
            .next_action(&system_prompt, task, log.steps(), advertised, sink)
            .await
        {
            Ok(action) => action,
            Err(e) => {
                // Provider failures are fatal for the run; no retry here.
                tracing::error!(run_id = %run_id, "Model error: {}", e);
                log.record(
                    StepKind::Error {
                        message: format!("model error: {}", e),
                    },
                    sink,
                );
                break;
            }
        };

        match kind {
            LoopKind::Code => {
                let (thought, code) = match action {
                    Action::Code { thought, code } => (thought, code),
                    Action::PlainText(text) => match extract_code_block(&text) {
                        Some((thought, code)) => (thought, code),
                        None => {
                            answer = text.clone();
                            log.record(StepKind::FinalAnswer { text }, sink);
                            break;
                        }
                    },
                    Action::ToolCall { name, .. } => {
                        log.record(
                            StepKind::Error {
                                message: format!(
                                    "structured tool calls are not available here; \
                                     call {}() from inside a python code block instead",
                                    name
                                ),
                            },
                            sink,
                        );
                        continue;
                    }
                };

                if let Some(text) = thought.filter(|t| !t.is_empty()) {
                    log.record(StepKind::Thought { text }, sink);
                }
                log.record(StepKind::CodeBlock { code: code.clone() }, sink);

                let executor = executor.expect("code agent constructed with an executor");
                match executor.run(&run_id, &code, dispatcher).await {
                    Ok(outcome) => {
                        log.record(StepKind::CodeOutput { outcome }, sink);
                    }
                    Err(e @ ExecError::Rejected { .. }) => {
                        // Validation rejection: an observation, not a
                        // terminator. The rejection text names the rule
                        // and line so the model can rewrite the code.
                        log.record(
                            StepKind::Error {
                                message: e.to_string(),
                            },
                            sink,
                        );
                    }
                    Err(e) => {
                        // Interpreter/IO failures are environmental and
                        // will not improve within this run.
                        log.record(
                            StepKind::Error {
                                message: format!("executor unavailable: {}", e),
                            },
                            sink,
                        );
                        break;
                    }
                }
            }
            LoopKind::ToolCalling => match action {
                Action::PlainText(text) => {
                    answer = text.clone();
                    log.record(StepKind::FinalAnswer { text }, sink);
                    break;
                }
                Action::ToolCall {
                    call_id,
                    name,
                    arguments,
                } => {
                    let call_id = if call_id.is_empty() {
                        format!("call_{}", log.len())
                    } else {
                        call_id
                    };
                    log.record(
                        StepKind::ToolCall {
                            call_id: call_id.clone(),
                            name: name.clone(),
                            arguments: arguments.clone(),
                        },
                        sink,
                    );
                    let (content, is_error) = match dispatcher.dispatch(&name, &arguments).await {
                        Ok(payload) => (payload_to_content(payload), false),
                        Err(e) => (e.to_string(), true),
                    };
                    log.record(
                        StepKind::ToolResult {
                            call_id,
                            name,
                            content,
                            is_error,
                        },
                        sink,
                    );
                }
                Action::Code { .. } => {
                    log.record(
                        StepKind::Error {
                            message: "code execution is not available to this agent".to_string(),
                        },
                        sink,
                    );
                }
            },
        }
    }

    let result = AgentResult {
        answer,
        duration: started.elapsed(),
        steps: log.steps,
    };
    observability::audit_run_completed(
        &run_id,
        result.steps.len(),
        result.terminal_label(),
        result.duration.as_millis() as u64,
    );
    tracing::info!(
        run_id = %run_id,
        steps = result.steps.len(),
        terminal = result.terminal_label(),
        "Agent run finished"
    );
    result
}

/// Agent whose model acts by writing code; tools are exposed into the
/// execution namespace.
pub struct CodeAgent {
    model: Arc<dyn Model>,
    dispatcher: ToolDispatcher,
    executor: Arc<CodeExecutor>,
    config: AgentConfig,
}

impl CodeAgent {
    pub fn new(
        model: Arc<dyn Model>,
        registry: Arc<ToolRegistry>,
        executor: Arc<CodeExecutor>,
        config: AgentConfig,
    ) -> Self {
        Self {
            model,
            dispatcher: ToolDispatcher::new(registry),
            executor,
            config,
        }
    }

    pub async fn run(&self, task: &str, sink: &mut dyn EventSink) -> AgentResult {
        run_loop(
            LoopKind::Code,
            self.model.as_ref(),
            &self.dispatcher,
            Some(self.executor.as_ref()),
            &self.config,
            task,
            sink,
        )
        .await
    }
}

/// Agent whose model acts through structured tool calls; no arbitrary
/// code execution occurs.
pub struct ToolCallingAgent {
    model: Arc<dyn Model>,
    dispatcher: ToolDispatcher,
    config: AgentConfig,
}

impl ToolCallingAgent {
    pub fn new(model: Arc<dyn Model>, registry: Arc<ToolRegistry>, config: AgentConfig) -> Self {
        Self {
            model,
            dispatcher: ToolDispatcher::new(registry),
            config,
        }
    }

    pub async fn run(&self, task: &str, sink: &mut dyn EventSink) -> AgentResult {
        run_loop(
            LoopKind::ToolCalling,
            self.model.as_ref(),
            &self.dispatcher,
            None,
            &self.config,
            task,
            sink,
        )
        .await
    }
}

/// Where triage routed a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Code,
    Tools,
}

fn parse_route(text: &str, has_tools: bool) -> Route {
    let lower = text.to_lowercase();
    if lower.contains("tool") && has_tools {
        Route::Tools
    } else if lower.contains("code") {
        Route::Code
    } else if has_tools {
        Route::Tools
    } else {
        Route::Code
    }
}

/// Classifies the task with one model call, then runs the routed agent.
pub struct TriageAgent {
    model: Arc<dyn Model>,
    registry: Arc<ToolRegistry>,
    executor: Arc<CodeExecutor>,
    config: AgentConfig,
}

impl TriageAgent {
    pub fn new(
        model: Arc<dyn Model>,
        registry: Arc<ToolRegistry>,
        executor: Arc<CodeExecutor>,
        config: AgentConfig,
    ) -> Self {
        Self {
            model,
            registry,
            executor,
            config,
        }
    }

    /// Single classification call; no tools, no step records.
    async fn classify(&self, task: &str) -> Result<Route, ModelError> {
        let question = prompt::triage_prompt(task, &self.registry.names());
        let action = self
            .model
            .next_action(
                "You route tasks. Answer with exactly one word.",
                &question,
                &[],
                &[],
                &mut crate::events::NullEventSink,
            )
            .await?;
        let text = match action {
            Action::PlainText(text) => text,
            _ => String::new(),
        };
        Ok(parse_route(&text, !self.registry.is_empty()))
    }

    pub async fn run(&self, task: &str, sink: &mut dyn EventSink) -> AgentResult {
        let route = match self.classify(task).await {
            Ok(route) => route,
            Err(e) => {
                // The run never started; report the fatal model error
                // through the same result shape.
                let step = Step::new(
                    0,
                    StepKind::Error {
                        message: format!("model error during triage: {}", e),
                    },
                );
                sink.on_step(&step);
                return AgentResult {
                    answer: String::new(),
                    duration: std::time::Duration::ZERO,
                    steps: vec![step],
                };
            }
        };
        tracing::info!(route = ?route, "Triage routed task");

        match route {
            Route::Tools => {
                ToolCallingAgent::new(
                    self.model.clone(),
                    self.registry.clone(),
                    self.config.clone(),
                )
                .run(task, sink)
                .await
            }
            Route::Code => {
                CodeAgent::new(
                    self.model.clone(),
                    self.registry.clone(),
                    self.executor.clone(),
                    self.config.clone(),
                )
                .run(task, sink)
                .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NullEventSink;
    use crate::tool::{ParamKind, Tool, ToolError};
    use async_trait::async_trait;
    use opsagent_sandbox::{ExecutionOutcome, RuleSet};
    use serde_json::{json, Map, Value};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    // ---- Test doubles ----

    struct ScriptedModel {
        actions: Mutex<VecDeque<Result<Action, ModelError>>>,
    }

    impl ScriptedModel {
        fn new(actions: Vec<Result<Action, ModelError>>) -> Arc<Self> {
            Arc::new(Self {
                actions: Mutex::new(actions.into()),
            })
        }
    }

    #[async_trait]
    impl Model for ScriptedModel {
        async fn next_action(
            &self,
            _system_prompt: &str,
            _task: &str,
            _history: &[Step],
            _tools: &[ToolSpec],
            _sink: &mut dyn EventSink,
        ) -> Result<Action, ModelError> {
            self.actions
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(Action::PlainText("out of scripted actions".to_string())))
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        steps: Vec<Step>,
        chunks: Vec<String>,
    }

    impl EventSink for RecordingSink {
        fn on_text_chunk(&mut self, chunk: &str) {
            self.chunks.push(chunk.to_string());
        }

        fn on_step(&mut self, step: &Step) {
            self.steps.push(step.clone());
        }
    }

    struct Upper {
        spec: ToolSpec,
    }

    #[async_trait]
    impl Tool for Upper {
        fn spec(&self) -> &ToolSpec {
            &self.spec
        }

        async fn execute(&self, arguments: &Map<String, Value>) -> Result<Value, ToolError> {
            let text = arguments
                .get("text")
                .and_then(|v| v.as_str())
                .unwrap_or_default();
            Ok(json!(text.to_uppercase()))
        }
    }

    struct FailingParseLogs {
        spec: ToolSpec,
    }

    #[async_trait]
    impl Tool for FailingParseLogs {
        fn spec(&self) -> &ToolSpec {
            &self.spec
        }

        async fn execute(&self, _arguments: &Map<String, Value>) -> Result<Value, ToolError> {
            Err(ToolError::new("log file not found: missing.log"))
        }
    }

    fn registry() -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Upper {
            spec: ToolSpec::new("upper", "Uppercase text").with_param(
                "text",
                ParamKind::String,
                true,
                "Input",
            ),
        }));
        registry.register(Arc::new(FailingParseLogs {
            spec: ToolSpec::new("parse_logs", "Analyze a log file").with_param(
                "path",
                ParamKind::String,
                true,
                "Path",
            ),
        }));
        Arc::new(registry)
    }

    fn preview_executor() -> Arc<CodeExecutor> {
        Arc::new(CodeExecutor::preview(&RuleSet::default()))
    }

    fn tool_call(name: &str, arguments: Value) -> Action {
        Action::ToolCall {
            call_id: format!("call_{}", name),
            name: name.to_string(),
            arguments,
        }
    }

    fn assert_gapless(steps: &[Step]) {
        for (i, step) in steps.iter().enumerate() {
            assert_eq!(step.index, i, "step indices must be gapless");
        }
    }

    // ---- Tool-calling agent ----

    #[tokio::test]
    async fn test_plain_text_terminates_in_one_step() {
        let model = ScriptedModel::new(vec![Ok(Action::PlainText("hello".to_string()))]);
        let agent = ToolCallingAgent::new(model, registry(), AgentConfig::default());
        let result = agent.run("say hello", &mut NullEventSink).await;

        assert_eq!(result.answer, "hello");
        assert_eq!(result.steps.len(), 1);
        assert!(matches!(
            result.steps[0].kind,
            StepKind::FinalAnswer { ref text } if text == "hello"
        ));
    }

    #[tokio::test]
    async fn test_tool_call_then_final_answer() {
        let model = ScriptedModel::new(vec![
            Ok(tool_call("upper", json!({"text": "hi"}))),
            Ok(Action::PlainText("done: HI".to_string())),
        ]);
        let agent = ToolCallingAgent::new(model, registry(), AgentConfig::default());
        let result = agent.run("uppercase hi", &mut NullEventSink).await;

        assert_eq!(result.steps.len(), 3);
        assert!(matches!(result.steps[0].kind, StepKind::ToolCall { .. }));
        match &result.steps[1].kind {
            StepKind::ToolResult {
                content, is_error, ..
            } => {
                assert_eq!(content, "HI");
                assert!(!is_error);
            }
            other => panic!("expected ToolResult, got {:?}", other),
        }
        assert!(matches!(result.steps[2].kind, StepKind::FinalAnswer { .. }));
        assert_gapless(&result.steps);
    }

    #[tokio::test]
    async fn test_tool_error_is_observation_not_terminator() {
        let model = ScriptedModel::new(vec![
            Ok(tool_call("parse_logs", json!({"path": "missing.log"}))),
            Ok(Action::PlainText("the log file is missing".to_string())),
        ]);
        let agent = ToolCallingAgent::new(model, registry(), AgentConfig::default());
        let result = agent.run("analyze missing.log", &mut NullEventSink).await;

        match &result.steps[1].kind {
            StepKind::ToolResult {
                content, is_error, ..
            } => {
                assert!(is_error);
                assert!(content.contains("missing.log"), "content: {}", content);
            }
            other => panic!("expected ToolResult, got {:?}", other),
        }
        // The loop continued to another planning call.
        assert_eq!(result.answer, "the log file is missing");
    }

    #[tokio::test]
    async fn test_unknown_tool_and_bad_arguments_are_observations() {
        let model = ScriptedModel::new(vec![
            Ok(tool_call("nope", json!({}))),
            Ok(tool_call("upper", json!({"text": 7}))),
            Ok(Action::PlainText("giving up".to_string())),
        ]);
        let agent = ToolCallingAgent::new(model, registry(), AgentConfig::default());
        let result = agent.run("x", &mut NullEventSink).await;

        match &result.steps[1].kind {
            StepKind::ToolResult {
                content, is_error, ..
            } => {
                assert!(is_error);
                assert!(content.contains("not found"), "content: {}", content);
            }
            other => panic!("expected ToolResult, got {:?}", other),
        }
        match &result.steps[3].kind {
            StepKind::ToolResult {
                content, is_error, ..
            } => {
                assert!(is_error);
                assert!(content.contains("expects string"), "content: {}", content);
            }
            other => panic!("expected ToolResult, got {:?}", other),
        }
        assert_eq!(result.answer, "giving up");
    }

    #[tokio::test]
    async fn test_step_limit_exceeded_reports_partial_progress() {
        let model = ScriptedModel::new(vec![
            Ok(tool_call("upper", json!({"text": "a"}))),
            Ok(tool_call("upper", json!({"text": "b"}))),
            Ok(tool_call("upper", json!({"text": "c"}))),
        ]);
        let agent = ToolCallingAgent::new(
            model,
            registry(),
            AgentConfig {
                max_steps: 2,
                system_prompt: None,
            },
        );
        let result = agent.run("never ends", &mut NullEventSink).await;

        // Exactly max_steps recorded steps plus the terminal error.
        assert_eq!(result.steps.len(), 3);
        match &result.steps[2].kind {
            StepKind::Error { message } => {
                assert!(message.contains("step limit"), "message: {}", message);
            }
            other => panic!("expected terminal Error, got {:?}", other),
        }
        assert!(result.answer.is_empty());
        assert_gapless(&result.steps);
    }

    #[tokio::test]
    async fn test_model_error_is_fatal() {
        let model = ScriptedModel::new(vec![Err(ModelError::Transport(
            "connection refused".to_string(),
        ))]);
        let agent = ToolCallingAgent::new(model, registry(), AgentConfig::default());
        let result = agent.run("x", &mut NullEventSink).await;

        assert_eq!(result.steps.len(), 1);
        assert!(matches!(result.steps[0].kind, StepKind::Error { .. }));
    }

    #[tokio::test]
    async fn test_streamed_steps_arrive_in_order_exactly_once() {
        let model = ScriptedModel::new(vec![
            Ok(tool_call("upper", json!({"text": "hi"}))),
            Ok(Action::PlainText("done".to_string())),
        ]);
        let agent = ToolCallingAgent::new(model, registry(), AgentConfig::default());
        let mut sink = RecordingSink::default();
        let result = agent.run("x", &mut sink).await;

        assert_eq!(sink.steps.len(), result.steps.len());
        for (streamed, recorded) in sink.steps.iter().zip(result.steps.iter()) {
            assert_eq!(streamed, recorded);
        }
        assert_gapless(&sink.steps);
    }

    // ---- Code agent ----

    #[tokio::test]
    async fn test_code_agent_preview_records_skipped_outcome() {
        let model = ScriptedModel::new(vec![
            Ok(Action::PlainText(
                "Counting first.\n```python\nprint(1 + 1)\n```".to_string(),
            )),
            Ok(Action::PlainText("the answer is 2".to_string())),
        ]);
        let agent = CodeAgent::new(model, registry(), preview_executor(), AgentConfig::default());
        let result = agent.run("count", &mut NullEventSink).await;

        assert!(matches!(
            result.steps[0].kind,
            StepKind::Thought { ref text } if text == "Counting first."
        ));
        assert!(matches!(result.steps[1].kind, StepKind::CodeBlock { .. }));
        match &result.steps[2].kind {
            StepKind::CodeOutput { outcome } => {
                assert!(matches!(outcome, ExecutionOutcome::Skipped { .. }));
            }
            other => panic!("expected CodeOutput, got {:?}", other),
        }
        assert!(matches!(result.steps[3].kind, StepKind::FinalAnswer { .. }));
        assert_gapless(&result.steps);
    }

    #[tokio::test]
    async fn test_code_agent_rejects_denylisted_code_without_outcome() {
        let model = ScriptedModel::new(vec![
            Ok(Action::Code {
                thought: None,
                code: CodeBlock::python("import os; os.system('rm -rf /')"),
            }),
            Ok(Action::PlainText("that was unsafe, sorry".to_string())),
        ]);
        let agent = CodeAgent::new(model, registry(), preview_executor(), AgentConfig::default());
        let result = agent.run("wipe", &mut NullEventSink).await;

        assert!(matches!(result.steps[0].kind, StepKind::CodeBlock { .. }));
        match &result.steps[1].kind {
            StepKind::Error { message } => {
                assert!(message.contains("py-os-system"), "message: {}", message);
            }
            other => panic!("expected Error observation, got {:?}", other),
        }
        // No CodeOutput step: execution never occurred.
        assert!(result
            .steps
            .iter()
            .all(|s| !matches!(s.kind, StepKind::CodeOutput { .. })));
        // The run continued and finished normally.
        assert!(matches!(
            result.steps.last().unwrap().kind,
            StepKind::FinalAnswer { .. }
        ));
    }

    #[tokio::test]
    async fn test_code_agent_plain_text_without_fence_is_final() {
        let model = ScriptedModel::new(vec![Ok(Action::PlainText("just an answer".to_string()))]);
        let agent = CodeAgent::new(model, registry(), preview_executor(), AgentConfig::default());
        let result = agent.run("x", &mut NullEventSink).await;

        assert_eq!(result.steps.len(), 1);
        assert_eq!(result.answer, "just an answer");
    }

    // ---- Triage ----

    #[tokio::test]
    async fn test_triage_routes_to_tool_agent_without_extra_steps() {
        let model = ScriptedModel::new(vec![
            Ok(Action::PlainText("tools".to_string())),
            Ok(tool_call("upper", json!({"text": "hi"}))),
            Ok(Action::PlainText("HI".to_string())),
        ]);
        let agent = TriageAgent::new(
            model,
            registry(),
            preview_executor(),
            AgentConfig::default(),
        );
        let result = agent.run("uppercase hi", &mut NullEventSink).await;

        // The classification call recorded nothing.
        assert_eq!(result.steps.len(), 3);
        assert!(matches!(result.steps[0].kind, StepKind::ToolCall { .. }));
        assert_eq!(result.answer, "HI");
    }

    #[tokio::test]
    async fn test_triage_routes_to_code_agent() {
        let model = ScriptedModel::new(vec![
            Ok(Action::PlainText("code".to_string())),
            Ok(Action::PlainText("```python\nresult = 2 + 2\n```".to_string())),
            Ok(Action::PlainText("4".to_string())),
        ]);
        let agent = TriageAgent::new(
            model,
            registry(),
            preview_executor(),
            AgentConfig::default(),
        );
        let result = agent.run("add", &mut NullEventSink).await;

        assert!(matches!(result.steps[0].kind, StepKind::CodeBlock { .. }));
        assert_eq!(result.answer, "4");
    }

    // ---- Helpers ----

    #[test]
    fn test_extract_code_block_variants() {
        let (thought, code) =
            extract_code_block("Look:\n```python\nx = 1\n```").expect("should extract");
        assert_eq!(thought.as_deref(), Some("Look:"));
        assert_eq!(code.source, "x = 1");

        let (thought, code) = extract_code_block("```\ny = 2\n```").expect("bare fence");
        assert!(thought.is_none());
        assert_eq!(code.source, "y = 2");

        assert!(extract_code_block("no code here").is_none());
        assert!(extract_code_block("```rust\nfn main() {}\n```").is_none());
    }

    #[test]
    fn test_parse_route() {
        assert_eq!(parse_route("tools", true), Route::Tools);
        assert_eq!(parse_route("Code, definitely.", true), Route::Code);
        assert_eq!(parse_route("unclear", true), Route::Tools);
        assert_eq!(parse_route("unclear", false), Route::Code);
        assert_eq!(parse_route("tools", false), Route::Code);
    }
}
