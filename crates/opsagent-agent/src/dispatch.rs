//! Tool dispatch: resolve a `(name, arguments)` pair to a registered
//! tool, validate the arguments against its schema, invoke it, and
//! normalize the outcome.
//!
//! The dispatcher itself is side-effect-free and never retries; retry
//! policy, if any, belongs to the tool implementation. Argument
//! validation happens strictly before `execute`, so a bad call has no
//! partial side effects.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use opsagent_sandbox::ToolBridge;

use crate::tool::ToolRegistry;

/// Dispatch-time failures, all surfaced to the model as observations.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("tool '{0}' not found in registry")]
    ToolNotFound(String),

    #[error("invalid arguments for tool '{tool_name}': {message}")]
    InvalidArguments { tool_name: String, message: String },

    #[error("tool '{tool_name}' failed: {message}")]
    Tool { tool_name: String, message: String },
}

/// Resolves tool calls against a shared, read-only registry.
#[derive(Clone)]
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
}

impl ToolDispatcher {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Dispatch one tool call. The tool's result payload is returned
    /// unchanged; the dispatcher performs no interpretation of it.
    pub async fn dispatch(&self, name: &str, arguments: &Value) -> Result<Value, DispatchError> {
        let tool = self
            .registry
            .get(name)
            .ok_or_else(|| DispatchError::ToolNotFound(name.to_string()))?;

        let args = Self::as_object(name, arguments)?;
        let spec = tool.spec();

        for param in &spec.params {
            match args.get(&param.name) {
                None | Some(Value::Null) => {
                    if param.required {
                        return Err(DispatchError::InvalidArguments {
                            tool_name: name.to_string(),
                            message: format!("missing required parameter '{}'", param.name),
                        });
                    }
                }
                Some(value) => {
                    if !param.kind.matches(value) {
                        return Err(DispatchError::InvalidArguments {
                            tool_name: name.to_string(),
                            message: format!(
                                "parameter '{}' expects {}, got {}",
                                param.name,
                                param.kind.json_type(),
                                json_type_name(value)
                            ),
                        });
                    }
                }
            }
        }
        for key in args.keys() {
            if !spec.params.iter().any(|p| &p.name == key) {
                tracing::debug!("Tool '{}' ignoring unknown argument '{}'", name, key);
            }
        }

        tracing::debug!(tool = %name, "Dispatching tool call");
        tool.execute(&args)
            .await
            .map_err(|e| DispatchError::Tool {
                tool_name: name.to_string(),
                message: e.message,
            })
    }

    fn as_object(name: &str, arguments: &Value) -> Result<Map<String, Value>, DispatchError> {
        match arguments {
            Value::Object(map) => Ok(map.clone()),
            Value::Null => Ok(Map::new()),
            other => Err(DispatchError::InvalidArguments {
                tool_name: name.to_string(),
                message: format!("arguments must be a JSON object, got {}", json_type_name(other)),
            }),
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// The dispatcher doubles as the executor's tool bridge, so sandboxed
/// code calls tools through exactly the same validation path.
#[async_trait]
impl ToolBridge for ToolDispatcher {
    fn tool_names(&self) -> Vec<String> {
        self.registry.names()
    }

    async fn call(&self, name: &str, arguments: Value) -> Result<Value, String> {
        self.dispatch(name, &arguments)
            .await
            .map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::{ParamKind, Tool, ToolError, ToolSpec};
    use serde_json::json;

    struct Upper {
        spec: ToolSpec,
    }

    impl Upper {
        fn new() -> Self {
            Self {
                spec: ToolSpec::new("upper", "Uppercase text").with_param(
                    "text",
                    ParamKind::String,
                    true,
                    "Input text",
                ),
            }
        }
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

    struct AlwaysFails {
        spec: ToolSpec,
    }

    #[async_trait]
    impl Tool for AlwaysFails {
        fn spec(&self) -> &ToolSpec {
            &self.spec
        }

        async fn execute(&self, _arguments: &Map<String, Value>) -> Result<Value, ToolError> {
            Err(ToolError::new("file not found: missing.log"))
        }
    }

    fn dispatcher() -> ToolDispatcher {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Upper::new()));
        registry.register(Arc::new(AlwaysFails {
            spec: ToolSpec::new("parse_logs", "x").with_param(
                "path",
                ParamKind::String,
                true,
                "p",
            ),
        }));
        ToolDispatcher::new(Arc::new(registry))
    }

    #[tokio::test]
    async fn test_dispatch_success_returns_payload_unchanged() {
        let d = dispatcher();
        let out = d.dispatch("upper", &json!({"text": "hi"})).await.unwrap();
        assert_eq!(out, json!("HI"));
    }

    #[tokio::test]
    async fn test_unknown_tool_is_not_found() {
        let d = dispatcher();
        let err = d.dispatch("nope", &json!({})).await.unwrap_err();
        assert!(matches!(err, DispatchError::ToolNotFound(_)));
    }

    #[tokio::test]
    async fn test_missing_required_argument() {
        let d = dispatcher();
        let err = d.dispatch("upper", &json!({})).await.unwrap_err();
        match err {
            DispatchError::InvalidArguments { message, .. } => {
                assert!(message.contains("text"), "message: {}", message);
            }
            other => panic!("expected InvalidArguments, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_wrong_argument_type() {
        let d = dispatcher();
        let err = d.dispatch("upper", &json!({"text": 42})).await.unwrap_err();
        assert!(matches!(err, DispatchError::InvalidArguments { .. }));
    }

    #[tokio::test]
    async fn test_non_object_arguments() {
        let d = dispatcher();
        let err = d.dispatch("upper", &json!([1, 2])).await.unwrap_err();
        assert!(matches!(err, DispatchError::InvalidArguments { .. }));
    }

    #[tokio::test]
    async fn test_tool_failure_is_normalized() {
        let d = dispatcher();
        let err = d
            .dispatch("parse_logs", &json!({"path": "missing.log"}))
            .await
            .unwrap_err();
        match err {
            DispatchError::Tool { tool_name, message } => {
                assert_eq!(tool_name, "parse_logs");
                assert!(message.contains("missing.log"));
            }
            other => panic!("expected Tool error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_bridge_exposes_registry_names() {
        let d = dispatcher();
        let names = ToolBridge::tool_names(&d);
        assert_eq!(names, vec!["parse_logs".to_string(), "upper".to_string()]);
    }
}
