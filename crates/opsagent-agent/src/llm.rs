//! OpenAI-compatible model adapter.
//!
//! Speaks `/chat/completions` with function-calling tool definitions and
//! SSE streaming. Covers any backend exposing that wire format (OpenAI,
//! DeepSeek, Ollama, LiteLLM proxies); other providers plug in behind
//! the [`Model`](crate::model::Model) trait.

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use opsagent_core::config::LlmConfig;

use crate::events::EventSink;
use crate::model::{Action, Model, ModelError};
use crate::step::{Step, StepKind};
use crate::tool::ToolSpec;

/// Default completion token cap, matching common API limits.
const DEFAULT_MAX_TOKENS: usize = 4096;

// ─── OpenAI-compatible chat wire types ──────────────────────────────────────

/// A chat message in OpenAI format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallPayload>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(content: &str) -> Self {
        Self {
            role: "system".to_string(),
            content: Some(content.to_string()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn user(content: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: Some(content.to_string()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn assistant(content: &str) -> Self {
        Self {
            role: "assistant".to_string(),
            content: Some(content.to_string()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn assistant_with_tool_calls(tool_calls: Vec<ToolCallPayload>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: None,
            tool_calls: Some(tool_calls),
            tool_call_id: None,
        }
    }

    pub fn tool_result(tool_call_id: &str, content: &str) -> Self {
        Self {
            role: "tool".to_string(),
            content: Some(content.to_string()),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.to_string()),
        }
    }
}

/// A tool call as carried on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallPayload {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded argument object, as the APIs ship it.
    pub arguments: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    pub choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
pub struct ChoiceMessage {
    pub content: Option<String>,
    pub tool_calls: Option<Vec<ToolCallPayload>>,
}

// ─── Adapter ────────────────────────────────────────────────────────────────

/// OpenAI-compatible chat-completions backend.
pub struct OpenAiCompatModel {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
    temperature: Option<f64>,
    stream: bool,
    max_tokens: usize,
}

impl OpenAiCompatModel {
    pub fn new(api_base: &str, api_key: &str, model: &str) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .build()
            .expect("failed to build HTTP client");
        Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            temperature: None,
            stream: false,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    /// Build from `OPSAGENT_*` / `OPENAI_*` environment configuration.
    pub fn from_env() -> Self {
        let cfg = LlmConfig::from_env();
        Self::new(&cfg.api_base, &cfg.api_key, &cfg.model)
    }

    pub fn with_streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Render the task and step history into OpenAI chat messages.
    ///
    /// Tool calls and results keep their call-id correlation; code
    /// outputs and recoverable errors become user-role observations,
    /// which is how the model sees them on the next planning call.
    pub fn render_history(system_prompt: &str, task: &str, history: &[Step]) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(system_prompt));
        messages.push(ChatMessage::user(task));

        for step in history {
            match &step.kind {
                StepKind::Thought { text } => messages.push(ChatMessage::assistant(text)),
                StepKind::CodeBlock { code } => messages.push(ChatMessage::assistant(&format!(
                    "```{}\n{}\n```",
                    code.language.as_str(),
                    code.source
                ))),
                StepKind::CodeOutput { outcome } => messages.push(ChatMessage::user(&format!(
                    "Observation:\n{}",
                    outcome.display()
                ))),
                StepKind::ToolCall {
                    call_id,
                    name,
                    arguments,
                } => messages.push(ChatMessage::assistant_with_tool_calls(vec![
                    ToolCallPayload {
                        id: call_id.clone(),
                        call_type: "function".to_string(),
                        function: FunctionCall {
                            name: name.clone(),
                            arguments: arguments.to_string(),
                        },
                    },
                ])),
                StepKind::ToolResult {
                    call_id, content, ..
                } => messages.push(ChatMessage::tool_result(call_id, content)),
                StepKind::Error { message } => {
                    messages.push(ChatMessage::user(&format!("Error:\n{}", message)))
                }
                StepKind::FinalAnswer { text } => messages.push(ChatMessage::assistant(text)),
            }
        }
        messages
    }

    fn request_body(&self, messages: &[ChatMessage], tools: &[ToolSpec], stream: bool) -> Value {
        let mut body = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "messages": messages,
        });
        if stream {
            body["stream"] = json!(true);
        }
        if let Some(temp) = self.temperature {
            body["temperature"] = json!(temp);
        }
        if !tools.is_empty() {
            let defs: Vec<Value> = tools.iter().map(|t| t.to_openai_schema()).collect();
            body["tools"] = json!(defs);
        }
        body
    }

    async fn send(&self, body: &Value) -> Result<reqwest::Response, ModelError> {
        let url = format!("{}/chat/completions", self.api_base);
        let resp = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| ModelError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(ModelError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(resp)
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
    ) -> Result<ChoiceMessage, ModelError> {
        let resp = self.send(&self.request_body(messages, tools, false)).await?;
        let parsed: ChatCompletionResponse = resp
            .json()
            .await
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| ModelError::InvalidResponse("no choices in response".to_string()))
    }

    async fn complete_stream(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
        sink: &mut dyn EventSink,
    ) -> Result<ChoiceMessage, ModelError> {
        let resp = self.send(&self.request_body(messages, tools, true)).await?;

        let mut acc = StreamAccumulator::default();
        let mut buffer = String::new();
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| ModelError::Transport(e.to_string()))?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));
            while let Some(newline_pos) = buffer.find('\n') {
                let line = buffer[..newline_pos].trim().to_string();
                buffer = buffer[newline_pos + 1..].to_string();
                acc.feed_line(&line, sink);
            }
        }
        Ok(acc.finish(sink))
    }
}

/// Accumulates an OpenAI SSE stream into a complete assistant message.
/// Text deltas go to the sink immediately; tool-call deltas are merged
/// silently by index.
#[derive(Default)]
struct StreamAccumulator {
    content: String,
    tool_calls: Vec<ToolCallPayload>,
    done: bool,
}

impl StreamAccumulator {
    fn feed_line(&mut self, line: &str, sink: &mut dyn EventSink) {
        if self.done || line.is_empty() || line.starts_with(':') {
            return;
        }
        let Some(data) = line.strip_prefix("data: ") else {
            return;
        };
        if data == "[DONE]" {
            self.done = true;
            return;
        }
        let chunk: Value = match serde_json::from_str(data) {
            Ok(v) => v,
            Err(_) => return,
        };
        let Some(choices) = chunk.get("choices").and_then(|c| c.as_array()) else {
            return;
        };
        for choice in choices {
            let Some(delta) = choice.get("delta") else {
                continue;
            };
            if let Some(text) = delta.get("content").and_then(|v| v.as_str()) {
                self.content.push_str(text);
                sink.on_text_chunk(text);
            }
            if let Some(tc_deltas) = delta.get("tool_calls").and_then(|v| v.as_array()) {
                for tc_delta in tc_deltas {
                    let idx =
                        tc_delta.get("index").and_then(|v| v.as_u64()).unwrap_or(0) as usize;
                    while self.tool_calls.len() <= idx {
                        self.tool_calls.push(ToolCallPayload {
                            id: String::new(),
                            call_type: "function".to_string(),
                            function: FunctionCall {
                                name: String::new(),
                                arguments: String::new(),
                            },
                        });
                    }
                    if let Some(id) = tc_delta.get("id").and_then(|v| v.as_str()) {
                        self.tool_calls[idx].id = id.to_string();
                    }
                    if let Some(func) = tc_delta.get("function") {
                        if let Some(name) = func.get("name").and_then(|v| v.as_str()) {
                            self.tool_calls[idx].function.name.push_str(name);
                        }
                        if let Some(args) = func.get("arguments").and_then(|v| v.as_str()) {
                            self.tool_calls[idx].function.arguments.push_str(args);
                        }
                    }
                }
            }
        }
    }

    fn finish(self, sink: &mut dyn EventSink) -> ChoiceMessage {
        // Trailing newline after streamed text so output does not collide.
        if !self.content.is_empty() {
            sink.on_text_chunk("\n");
        }
        ChoiceMessage {
            content: if self.content.is_empty() {
                None
            } else {
                Some(self.content)
            },
            tool_calls: if self.tool_calls.is_empty() {
                None
            } else {
                Some(self.tool_calls)
            },
        }
    }
}

/// Turn an assistant message into the controller-facing action.
///
/// Malformed tool-call argument JSON is passed through as-is so the
/// dispatcher can reject it as an observation the model gets to fix.
fn action_from_message(message: ChoiceMessage) -> Action {
    if let Some(mut tool_calls) = message.tool_calls.filter(|tc| !tc.is_empty()) {
        if tool_calls.len() > 1 {
            tracing::warn!(
                "Model returned {} tool calls; dispatching the first only",
                tool_calls.len()
            );
        }
        let tc = tool_calls.remove(0);
        let arguments = serde_json::from_str(&tc.function.arguments)
            .unwrap_or(Value::String(tc.function.arguments));
        return Action::ToolCall {
            call_id: tc.id,
            name: tc.function.name,
            arguments,
        };
    }
    Action::PlainText(message.content.unwrap_or_default())
}

#[async_trait]
impl Model for OpenAiCompatModel {
    async fn next_action(
        &self,
        system_prompt: &str,
        task: &str,
        history: &[Step],
        tools: &[ToolSpec],
        sink: &mut dyn EventSink,
    ) -> Result<Action, ModelError> {
        let messages = Self::render_history(system_prompt, task, history);
        let message = if self.stream {
            self.complete_stream(&messages, tools, sink).await?
        } else {
            self.complete(&messages, tools).await?
        };
        Ok(action_from_message(message))
    }
}
