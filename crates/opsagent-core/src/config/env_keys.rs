//! Declarations of every environment variable the workspace reads.
//!
//! Each key carries its own alias chain (`OPSAGENT_*` first, vendor
//! names as fallback), so callers never spell fallback logic themselves.

use super::loader::EnvKey;

pub mod llm {
    use super::EnvKey;

    pub const API_BASE: EnvKey =
        EnvKey::with_aliases("OPSAGENT_API_BASE", &["OPENAI_API_BASE", "OPENAI_BASE_URL"]);
    pub const API_KEY: EnvKey = EnvKey::with_aliases("OPSAGENT_API_KEY", &["OPENAI_API_KEY"]);
    pub const MODEL: EnvKey = EnvKey::with_aliases("OPSAGENT_MODEL", &["OPENAI_MODEL"]);
}

pub mod observability {
    use super::EnvKey;

    pub const QUIET: EnvKey = EnvKey::new("OPSAGENT_QUIET");
    pub const LOG_LEVEL: EnvKey = EnvKey::new("OPSAGENT_LOG_LEVEL");
    pub const LOG_JSON: EnvKey = EnvKey::new("OPSAGENT_LOG_JSON");
    pub const AUDIT_LOG: EnvKey = EnvKey::new("OPSAGENT_AUDIT_LOG");
}

pub mod limits {
    use super::EnvKey;

    pub const TIMEOUT_SECS: EnvKey = EnvKey::new("OPSAGENT_TIMEOUT_SECS");
    pub const MAX_OUTPUT_BYTES: EnvKey = EnvKey::new("OPSAGENT_MAX_OUTPUT_BYTES");
}

pub mod sandbox {
    use super::EnvKey;

    pub const RULES_FILE: EnvKey = EnvKey::new("OPSAGENT_RULES_FILE");
    pub const PYTHON: EnvKey = EnvKey::new("OPSAGENT_PYTHON");
}
