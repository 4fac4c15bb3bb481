//! Agent execution engine.
//!
//! Drives a bounded Planning → Acting → Observing loop that turns a
//! natural-language task into an [`AgentResult`] with a full, append-only
//! step history. Actions come from a pluggable [`Model`]; they are
//! performed either through the [`ToolDispatcher`] (tool-calling agent)
//! or the sandboxed code executor (code agent). A triage agent
//! classifies the task first and routes to one of the two.

pub mod agent_loop;
pub mod dispatch;
pub mod events;
pub mod llm;
pub mod model;
pub mod prompt;
pub mod step;
pub mod tool;

pub use agent_loop::{AgentConfig, CodeAgent, ToolCallingAgent, TriageAgent};
pub use dispatch::{DispatchError, ToolDispatcher};
pub use events::{step_to_event, EventSink, NullEventSink};
pub use llm::OpenAiCompatModel;
pub use model::{Action, Model, ModelError};
pub use step::{AgentResult, Step, StepKind};
pub use tool::{ParamKind, ParamSpec, Tool, ToolError, ToolRegistry, ToolSpec};
