//! Step records and the aggregated run result.
//!
//! A [`Step`] is one recorded unit of agent progress and the atomic unit
//! of the audit trail. Steps are append-only: once created they are
//! never mutated, and their indices are gapless and strictly increasing
//! within a run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use opsagent_sandbox::{CodeBlock, ExecutionOutcome};

/// Payload-carrying kind of one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepKind {
    /// Model prose that accompanied a non-text action.
    Thought { text: String },
    /// The model requested a tool invocation.
    ToolCall {
        call_id: String,
        name: String,
        arguments: Value,
    },
    /// Outcome of a tool invocation, error or not. Errors here are
    /// observations the model can react to, not run terminators.
    ToolResult {
        call_id: String,
        name: String,
        content: String,
        is_error: bool,
    },
    /// The model produced a code block.
    CodeBlock { code: CodeBlock },
    /// Outcome of validating/running a code block.
    CodeOutput { outcome: ExecutionOutcome },
    /// Terminal: the model's final answer.
    FinalAnswer { text: String },
    /// An error. Validation rejections and similar recoverable errors
    /// appear mid-history; a run that fails ends with one of these as
    /// its last step.
    Error { message: String },
}

impl StepKind {
    /// Short label for logs and audit records.
    pub fn label(&self) -> &'static str {
        match self {
            StepKind::Thought { .. } => "thought",
            StepKind::ToolCall { .. } => "tool_call",
            StepKind::ToolResult { .. } => "tool_result",
            StepKind::CodeBlock { .. } => "code_block",
            StepKind::CodeOutput { .. } => "code_output",
            StepKind::FinalAnswer { .. } => "final_answer",
            StepKind::Error { .. } => "error",
        }
    }
}

/// One recorded unit of agent progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Monotonic sequence index, starting at 0, gapless within a run.
    pub index: usize,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: StepKind,
}

impl Step {
    pub fn new(index: usize, kind: StepKind) -> Self {
        Self {
            index,
            timestamp: Utc::now(),
            kind,
        }
    }
}

/// Final output of a run. Always carries the full step history, so a
/// failed run is explainable from its output alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResult {
    /// The answer text; empty when the run failed before producing one.
    pub answer: String,
    /// Total wall-clock duration of the run.
    pub duration: std::time::Duration,
    /// The ordered step history.
    pub steps: Vec<Step>,
}

impl AgentResult {
    /// Kind label of the terminal step, for audit records.
    pub fn terminal_label(&self) -> &'static str {
        self.steps.last().map(|s| s.kind.label()).unwrap_or("empty")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_serializes_with_flat_kind_tag() {
        let step = Step::new(
            0,
            StepKind::FinalAnswer {
                text: "done".to_string(),
            },
        );
        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["index"], 0);
        assert_eq!(json["kind"], "final_answer");
        assert_eq!(json["text"], "done");
    }

    #[test]
    fn test_code_output_step_roundtrip() {
        let step = Step::new(
            3,
            StepKind::CodeOutput {
                outcome: ExecutionOutcome::Skipped {
                    code: "print(1)".to_string(),
                },
            },
        );
        let json = serde_json::to_string(&step).unwrap();
        let back: Step = serde_json::from_str(&json).unwrap();
        assert_eq!(back, step);
    }
}
