//! Model capability interface.
//!
//! The model proposes the next action given the task and the step
//! history so far. Concrete backends adapt their wire format behind
//! this trait; the controller never depends on a backend type.

use async_trait::async_trait;
use serde_json::Value;

use opsagent_sandbox::CodeBlock;

use crate::events::EventSink;
use crate::step::Step;
use crate::tool::ToolSpec;

/// The next action the model wants the agent to take.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Plain text; the controller treats this as the final answer
    /// (code agents first look for a fenced code block in it).
    PlainText(String),
    /// A structured tool-call request.
    ToolCall {
        call_id: String,
        name: String,
        arguments: Value,
    },
    /// A code block, optionally preceded by prose.
    Code {
        thought: Option<String>,
        code: CodeBlock,
    },
}

/// Provider-side failure. Fatal for the current run: the controller
/// records it as the terminal error step and does not retry.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("model transport error: {0}")]
    Transport(String),

    #[error("model API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("invalid model response: {0}")]
    InvalidResponse(String),
}

/// The model capability.
#[async_trait]
pub trait Model: Send + Sync {
    /// Produce the next action given the full step history.
    ///
    /// `tools` is the registry schema to advertise (empty for code
    /// agents, which reach tools through the execution namespace
    /// instead). Implementations that stream emit partial text through
    /// `sink.on_text_chunk` before returning the final action.
    async fn next_action(
        &self,
        system_prompt: &str,
        task: &str,
        history: &[Step],
        tools: &[ToolSpec],
        sink: &mut dyn EventSink,
    ) -> Result<Action, ModelError>;
}
