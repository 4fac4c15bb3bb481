//! Event sinks for streamed runs.
//!
//! The controller is a single-threaded cooperative producer: it pushes
//! each completed [`Step`] into the sink in index order, exactly once,
//! plus incremental model text before an action is known. Different
//! targets (CLI, RPC, tests) implement the trait.

use opsagent_core::protocol::StepEvent;
use opsagent_sandbox::ExecutionOutcome;

use crate::step::{Step, StepKind};

/// Output target for a streamed run.
pub trait EventSink: Send {
    /// Incremental model text, emitted before the full action is known.
    fn on_text_chunk(&mut self, _chunk: &str) {}

    /// A completed step. Called in step-index order, exactly once per
    /// step, for every step of the run.
    fn on_step(&mut self, _step: &Step) {}
}

/// Sink that discards everything (non-streaming runs, triage calls).
pub struct NullEventSink;

impl EventSink for NullEventSink {}

/// Convert a recorded step into its wire event.
pub fn step_to_event(step: &Step) -> StepEvent {
    match &step.kind {
        StepKind::Thought { text } => StepEvent::Thought {
            content: text.clone(),
        },
        StepKind::ToolCall {
            name, arguments, ..
        } => StepEvent::ToolCall {
            name: name.clone(),
            arguments: arguments.clone(),
        },
        StepKind::ToolResult {
            name,
            content,
            is_error,
            ..
        } => StepEvent::ToolResult {
            name: name.clone(),
            result: content.clone(),
            is_error: *is_error,
        },
        StepKind::CodeBlock { code } => StepEvent::Code {
            language: code.language.as_str().to_string(),
            content: code.source.clone(),
        },
        StepKind::CodeOutput { outcome } => StepEvent::CodeOutput {
            content: outcome.display(),
            skipped: matches!(outcome, ExecutionOutcome::Skipped { .. }),
        },
        StepKind::FinalAnswer { text } => StepEvent::FinalAnswer {
            content: text.clone(),
        },
        StepKind::Error { message } => StepEvent::Error {
            content: message.clone(),
        },
    }
}
