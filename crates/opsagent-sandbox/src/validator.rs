//! Static safety validation of code blocks.
//!
//! Validation is a pure function of (code, rule set): no execution, no
//! side effects, and the same code always receives the same verdict. It
//! runs in both preview and execute mode, always before any execution
//! attempt.

use regex::Regex;

use crate::code::CodeBlock;
use crate::rules::{Construct, Rule, RuleSet};

/// One denied construct found in a code block.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    /// Rule that fired, e.g. `py-eval`, or `py-import-denylist` for
    /// allowlist misses.
    pub rule_id: String,
    pub construct: Construct,
    /// 1-based line number.
    pub line: usize,
    /// The offending line, trimmed.
    pub snippet: String,
    pub description: String,
}

/// Outcome of validating one code block.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Allowed,
    Rejected(Vec<Violation>),
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allowed)
    }

    /// Render a rejection for error messages and model observations.
    /// Allowed verdicts render as an empty string.
    pub fn rejection_summary(&self) -> String {
        match self {
            Verdict::Allowed => String::new(),
            Verdict::Rejected(violations) => {
                let mut out = format!(
                    "Code rejected by safety validation ({} finding(s)):\n",
                    violations.len()
                );
                for v in violations {
                    out.push_str(&format!(
                        "  - [{}] line {}: {} ({}) — {}\n",
                        v.rule_id, v.line, v.description, v.construct, v.snippet
                    ));
                }
                out
            }
        }
    }
}

/// Compiled validator for one rule set.
///
/// Holds no mutable state; a single instance can validate any number of
/// code blocks and may be shared across runs.
pub struct CodeValidator {
    rules: Vec<(Rule, Regex)>,
    allowed_modules: Vec<String>,
    import_re: Regex,
    from_import_re: Regex,
}

impl Default for CodeValidator {
    fn default() -> Self {
        Self::new(&RuleSet::default())
    }
}

impl CodeValidator {
    pub fn new(rule_set: &RuleSet) -> Self {
        let rules = rule_set
            .effective_rules()
            .into_iter()
            .filter_map(|rule| match rule.compile() {
                Ok(regex) => Some((rule, regex)),
                Err(e) => {
                    tracing::warn!("Skipping uncompilable rule: {:#}", e);
                    None
                }
            })
            .collect();
        Self {
            rules,
            allowed_modules: rule_set.effective_allowed_modules(),
            import_re: Regex::new(r"^\s*import\s+(.+)$").expect("static regex"),
            from_import_re: Regex::new(r"^\s*from\s+([\w\.]+)\s+import\b").expect("static regex"),
        }
    }

    /// Validate a code block. Total and deterministic: exactly one
    /// verdict for any input, independent of prior calls.
    pub fn validate(&self, code: &CodeBlock) -> Verdict {
        let mut violations = Vec::new();

        for (idx, line) in code.source.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let line_no = idx + 1;

            self.check_imports(trimmed, line_no, &mut violations);

            for (rule, regex) in &self.rules {
                if regex.is_match(line) {
                    violations.push(Violation {
                        rule_id: rule.id.clone(),
                        construct: rule.construct,
                        line: line_no,
                        snippet: trimmed.to_string(),
                        description: rule.description.clone(),
                    });
                }
            }
        }

        if violations.is_empty() {
            Verdict::Allowed
        } else {
            Verdict::Rejected(violations)
        }
    }

    /// Check `import a, b` / `from a.b import c` statements against the
    /// module allowlist. Only the root module counts: `import os.path`
    /// is an `os` import.
    fn check_imports(&self, trimmed: &str, line_no: usize, violations: &mut Vec<Violation>) {
        let mut roots: Vec<String> = Vec::new();

        if let Some(caps) = self.from_import_re.captures(trimmed) {
            let module = caps.get(1).map(|m| m.as_str()).unwrap_or("");
            roots.push(module.split('.').next().unwrap_or(module).to_string());
        } else if let Some(caps) = self.import_re.captures(trimmed) {
            // `import a.b as x, c` — split on commas, strip aliases.
            let list = caps.get(1).map(|m| m.as_str()).unwrap_or("");
            for item in list.split(',') {
                let name = item.trim().split_whitespace().next().unwrap_or("");
                // Trim to the identifier: `os.path` → `os`, `os;` → `os`.
                let root: String = name
                    .chars()
                    .take_while(|c| c.is_alphanumeric() || *c == '_')
                    .collect();
                if !root.is_empty() {
                    roots.push(root);
                }
            }
        }

        for root in roots {
            if !self.allowed_modules.iter().any(|m| m == &root) {
                violations.push(Violation {
                    rule_id: "py-import-denylist".to_string(),
                    construct: Construct::ForbiddenImport,
                    line: line_no,
                    snippet: trimmed.to_string(),
                    description: format!("import of module '{}' outside the allowlist", root),
                });
            }
        }
    }
}
