//! Streaming step-event wire types.
//!
//! These are the shared "currency" between the agent loop and every
//! consumer of a streamed run (CLI sink, SDK callers, future RPC
//! surfaces). They intentionally carry only what a consumer needs to
//! render progress, not full agent internals.
//!
//! The union is forward-compatible: a consumer built against this
//! version deserializes kinds it does not know into
//! [`StepEvent::Unknown`] instead of failing the stream.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One streamed event, tagged by `type`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepEvent {
    /// Incremental model text, emitted before the full action is known.
    Stream { content: String },
    /// Model prose that accompanied a non-text action.
    Thought { content: String },
    ToolCall { name: String, arguments: Value },
    ToolResult {
        name: String,
        result: String,
        is_error: bool,
    },
    Code { language: String, content: String },
    CodeOutput { content: String, skipped: bool },
    FinalAnswer { content: String },
    Error { content: String },
    /// Catch-all for event kinds introduced after this build.
    #[serde(other)]
    Unknown,
}

impl StepEvent {
    /// Stable kind discriminator, matching the serialized `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            StepEvent::Stream { .. } => "stream",
            StepEvent::Thought { .. } => "thought",
            StepEvent::ToolCall { .. } => "tool_call",
            StepEvent::ToolResult { .. } => "tool_result",
            StepEvent::Code { .. } => "code",
            StepEvent::CodeOutput { .. } => "code_output",
            StepEvent::FinalAnswer { .. } => "final_answer",
            StepEvent::Error { .. } => "error",
            StepEvent::Unknown => "unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_roundtrip() {
        let ev = StepEvent::ToolResult {
            name: "parse_logs".to_string(),
            result: "{}".to_string(),
            is_error: false,
        };
        let json = serde_json::to_string(&ev).unwrap();
        assert!(json.contains("\"type\":\"tool_result\""));
        let back: StepEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ev);
    }

    #[test]
    fn test_unknown_kind_is_forward_compatible() {
        let json = r#"{"type":"telemetry_v2","content":"x"}"#;
        let ev: StepEvent = serde_json::from_str(json).unwrap();
        assert_eq!(ev, StepEvent::Unknown);
    }

    #[test]
    fn test_kind_matches_tag() {
        let ev = StepEvent::FinalAnswer {
            content: "done".to_string(),
        };
        let json = serde_json::to_string(&ev).unwrap();
        assert!(json.contains(&format!("\"type\":\"{}\"", ev.kind())));
    }
}
