//! Configuration structs grouped by domain, loaded from the environment.

use super::env_keys::{llm, observability as obv_keys};

/// LLM API configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_base: String,
    pub api_key: String,
    pub model: String,
}

impl LlmConfig {
    /// Load from the environment (reads `.env` first), with defaults for
    /// unset values.
    pub fn from_env() -> Self {
        super::loader::load_dotenv();
        let api_base = llm::API_BASE
            .lookup()
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string());
        let model = llm::MODEL
            .lookup()
            .unwrap_or_else(|| Self::default_model_for_base(&api_base).to_string());
        Self {
            api_key: llm::API_KEY.lookup().unwrap_or_default(),
            api_base,
            model,
        }
    }

    /// Default model when none is set explicitly, inferred from the API base.
    pub fn default_model_for_base(api_base: &str) -> &'static str {
        if api_base.contains("localhost:11434") || api_base.contains("127.0.0.1:11434") {
            "qwen2.5:7b"
        } else if api_base.contains("api.deepseek.com") {
            "deepseek-chat"
        } else {
            "gpt-4o-mini"
        }
    }
}

/// Observability configuration: quiet, log level/format, audit log path.
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub quiet: bool,
    pub log_level: String,
    pub log_json: bool,
    pub audit_log: Option<String>,
}

impl ObservabilityConfig {
    pub fn from_env() -> &'static Self {
        use std::sync::OnceLock;
        static CACHE: OnceLock<ObservabilityConfig> = OnceLock::new();
        CACHE.get_or_init(|| {
            super::loader::load_dotenv();
            Self {
                quiet: obv_keys::QUIET.flag(false),
                log_level: obv_keys::LOG_LEVEL
                    .lookup()
                    .unwrap_or_else(|| "opsagent=info".to_string()),
                log_json: obv_keys::LOG_JSON.flag(false),
                audit_log: obv_keys::AUDIT_LOG.lookup(),
            }
        })
    }
}
