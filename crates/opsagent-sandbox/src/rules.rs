//! Validation rule definitions and configuration.
//!
//! The denylist is explicit, versioned configuration data: a list of
//! [`Rule`]s plus a module allowlist, bundled in a [`RuleSet`]. Custom
//! rule sets load from a YAML file; the defaults live in
//! [`default_rules`](crate::rules::default_rules).

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Construct categories a rule can reject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Construct {
    DynamicEvaluation,
    ProcessSpawn,
    FilesystemDestruction,
    NetworkAccess,
    IntrospectionEscape,
    ForbiddenImport,
}

impl std::fmt::Display for Construct {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Construct::DynamicEvaluation => write!(f, "dynamic evaluation"),
            Construct::ProcessSpawn => write!(f, "process spawn"),
            Construct::FilesystemDestruction => write!(f, "filesystem destruction"),
            Construct::NetworkAccess => write!(f, "network access"),
            Construct::IntrospectionEscape => write!(f, "introspection escape"),
            Construct::ForbiddenImport => write!(f, "forbidden import"),
        }
    }
}

/// A single denylist rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    /// Unique identifier, e.g. `py-eval`.
    pub id: String,
    /// Regular expression matched against each non-comment line.
    pub pattern: String,
    /// Construct category this rule rejects.
    pub construct: Construct,
    /// Human-readable description, surfaced in rejection messages.
    pub description: String,
    /// Whether this rule is active.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl Rule {
    pub fn new(id: &str, pattern: &str, construct: Construct, description: &str) -> Self {
        Self {
            id: id.to_string(),
            pattern: pattern.to_string(),
            construct,
            description: description.to_string(),
            enabled: true,
        }
    }

    /// Compile the regex pattern.
    pub fn compile(&self) -> Result<Regex> {
        Regex::new(&self.pattern).with_context(|| {
            format!(
                "Failed to compile regex for rule '{}': {}",
                self.id, self.pattern
            )
        })
    }
}

/// A versioned set of validation rules plus the import allowlist.
///
/// # Example YAML configuration
///
/// ```yaml
/// # .opsagent-rules.yaml
/// version: 1
/// use_default_rules: true
/// allowed_modules:
///   - math
///   - json
/// disabled_rules:
///   - py-scope-access
/// rules:
///   - id: custom-dangerous-func
///     pattern: "dangerous_function\\s*\\("
///     construct: dynamic_evaluation
///     description: "Custom dangerous function detected"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSet {
    /// Rule-set format version.
    #[serde(default = "default_version")]
    pub version: u32,
    /// Custom rules to add.
    #[serde(default)]
    pub rules: Vec<Rule>,
    /// Rule IDs to disable from the default set.
    #[serde(default)]
    pub disabled_rules: Vec<String>,
    /// Whether to include the built-in default rules (default: true).
    #[serde(default = "default_use_defaults")]
    pub use_default_rules: bool,
    /// Module roots importable from validated code. When empty, the
    /// built-in allowlist applies.
    #[serde(default)]
    pub allowed_modules: Vec<String>,
}

fn default_version() -> u32 {
    1
}

fn default_use_defaults() -> bool {
    true
}

impl Default for RuleSet {
    fn default() -> Self {
        Self {
            version: default_version(),
            rules: Vec::new(),
            disabled_rules: Vec::new(),
            use_default_rules: true,
            allowed_modules: Vec::new(),
        }
    }
}

/// Recognized rule-set file name in the working directory.
pub const RULES_FILE_NAME: &str = ".opsagent-rules.yaml";

impl RuleSet {
    /// Load a rule set from a YAML file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read rules file: {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse rules file: {}", path.display()))
    }

    /// Load from `OPSAGENT_RULES_FILE`, then `.opsagent-rules.yaml` in the
    /// current directory, falling back to the defaults.
    pub fn load_or_default() -> Self {
        if let Some(path) = opsagent_core::config::env_keys::sandbox::RULES_FILE.lookup() {
            match Self::load_from_file(Path::new(&path)) {
                Ok(rules) => return rules,
                Err(e) => {
                    tracing::warn!("Ignoring unreadable rules file {}: {:#}", path, e);
                }
            }
        }
        let local = Path::new(RULES_FILE_NAME);
        if local.exists() {
            if let Ok(rules) = Self::load_from_file(local) {
                return rules;
            }
        }
        Self::default()
    }

    /// Effective module allowlist: the configured list, or the built-in
    /// default when none is configured.
    pub fn effective_allowed_modules(&self) -> Vec<String> {
        if self.allowed_modules.is_empty() {
            crate::rules::default_rules::DEFAULT_ALLOWED_MODULES
                .iter()
                .map(|s| s.to_string())
                .collect()
        } else {
            self.allowed_modules.clone()
        }
    }

    /// Effective rule list: defaults (when enabled) plus custom rules,
    /// minus disabled ids.
    pub fn effective_rules(&self) -> Vec<Rule> {
        let mut rules = if self.use_default_rules {
            crate::rules::default_rules::get_default_rules()
        } else {
            Vec::new()
        };
        rules.extend(self.rules.clone());
        rules.retain(|r| r.enabled && !self.disabled_rules.contains(&r.id));
        rules
    }
}

pub mod default_rules;
