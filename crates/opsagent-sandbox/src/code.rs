//! Code block model: source text plus its declared language.

use serde::{Deserialize, Serialize};

/// Language of an agent-generated code block.
///
/// Only Python is executable today; the enum exists so the validator can
/// reject blocks in languages it has no rules for instead of guessing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
        }
    }

    /// Parse a fenced-block info string (e.g. "python", "py", "python3").
    pub fn from_fence(info: &str) -> Option<Self> {
        match info.trim().to_lowercase().as_str() {
            "" | "python" | "py" | "python3" => Some(Language::Python),
            _ => None,
        }
    }
}

/// A block of model-produced source code, consumed once by the executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeBlock {
    pub language: Language,
    pub source: String,
}

impl CodeBlock {
    pub fn python(source: impl Into<String>) -> Self {
        Self {
            language: Language::Python,
            source: source.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fence_info_parsing() {
        assert_eq!(Language::from_fence("python"), Some(Language::Python));
        assert_eq!(Language::from_fence("py"), Some(Language::Python));
        assert_eq!(Language::from_fence(""), Some(Language::Python));
        assert_eq!(Language::from_fence("rust"), None);
    }
}
