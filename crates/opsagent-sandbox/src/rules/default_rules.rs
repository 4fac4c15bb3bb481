//! Built-in denylist rules for agent-generated Python.
//!
//! Word-boundary guards (`(?:^|[^.\w])`) keep method calls like
//! `parser.compile()` from matching the bare-builtin patterns.

use super::{Construct, Rule};

/// Module roots importable from validated code when no custom allowlist
/// is configured. Pure-computation stdlib only.
pub const DEFAULT_ALLOWED_MODULES: &[&str] = &[
    "math",
    "json",
    "re",
    "datetime",
    "time",
    "itertools",
    "functools",
    "collections",
    "string",
    "textwrap",
    "statistics",
    "random",
];

/// Get the built-in denylist rules.
pub fn get_default_rules() -> Vec<Rule> {
    vec![
        // ====================================================================
        // Dynamic evaluation
        // ====================================================================
        Rule::new(
            "py-eval",
            r"(?:^|[^.\w])eval\s*\(",
            Construct::DynamicEvaluation,
            "eval() - arbitrary code execution",
        ),
        Rule::new(
            "py-exec",
            r"(?:^|[^.\w])exec\s*\(",
            Construct::DynamicEvaluation,
            "exec() - arbitrary code execution",
        ),
        Rule::new(
            "py-compile",
            r"(?:^|[^.\w])compile\s*\(",
            Construct::DynamicEvaluation,
            "compile() - code compilation",
        ),
        Rule::new(
            "py-dynamic-import",
            r"__import__\s*\(|importlib\.import_module\s*\(",
            Construct::DynamicEvaluation,
            "Dynamic import (bypasses static analysis)",
        ),
        Rule::new(
            "py-unsafe-deserialize",
            r"(?:pickle|marshal)\.loads?\s*\(|yaml\.(?:load|unsafe_load)\s*\(",
            Construct::DynamicEvaluation,
            "Unsafe deserialization (potential code execution)",
        ),
        // ====================================================================
        // Process spawning
        // ====================================================================
        Rule::new(
            "py-subprocess",
            r"subprocess\.(?:call|run|Popen|check_output|check_call)\s*\(",
            Construct::ProcessSpawn,
            "Subprocess execution",
        ),
        Rule::new(
            "py-os-system",
            r"os\.(?:system|popen|spawn[lv]?[pe]?|exec[lv]p?e?|fork)\s*\(",
            Construct::ProcessSpawn,
            "OS command execution",
        ),
        // ====================================================================
        // Filesystem destruction
        // ====================================================================
        Rule::new(
            "py-file-delete",
            r"os\.(?:remove|unlink|rmdir|removedirs|rename|replace)\s*\(|shutil\.(?:rmtree|move)\s*\(",
            Construct::FilesystemDestruction,
            "File deletion or relocation",
        ),
        Rule::new(
            "py-path-unlink",
            r"\.(?:unlink|rmdir|write_text|write_bytes)\s*\(",
            Construct::FilesystemDestruction,
            "Path mutation method",
        ),
        // ====================================================================
        // Network sockets
        // ====================================================================
        Rule::new(
            "py-socket",
            r"socket\.(?:socket|create_connection|getaddrinfo)\s*\(",
            Construct::NetworkAccess,
            "Raw socket primitive",
        ),
        Rule::new(
            "py-net-request",
            r"(?:urllib|requests|http\.client)\.|(?:^|[^.\w])urlopen\s*\(",
            Construct::NetworkAccess,
            "Network request library usage",
        ),
        // ====================================================================
        // Introspection escape hatches
        // ====================================================================
        Rule::new(
            "py-builtins",
            r"__builtins__",
            Construct::IntrospectionEscape,
            "Built-in scope access",
        ),
        Rule::new(
            "py-scope-access",
            r"(?:^|[^.\w])(?:globals|locals|vars)\s*\(\s*\)",
            Construct::IntrospectionEscape,
            "Global/local scope access",
        ),
        Rule::new(
            "py-attr-indirection",
            r"(?:^|[^.\w])(?:getattr|setattr|delattr)\s*\(",
            Construct::IntrospectionEscape,
            "Attribute indirection (can reach denied primitives)",
        ),
        Rule::new(
            "py-dunder-escape",
            r"__(?:globals|subclasses|bases|mro|getattribute|reduce)__",
            Construct::IntrospectionEscape,
            "Dunder access that can escape the restricted namespace",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_ids_are_unique() {
        let rules = get_default_rules();
        let mut ids: Vec<_> = rules.iter().map(|r| r.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), rules.len(), "duplicate rule id in defaults");
    }

    #[test]
    fn test_method_call_does_not_match_bare_builtin() {
        let rule = get_default_rules()
            .into_iter()
            .find(|r| r.id == "py-compile")
            .unwrap();
        let re = rule.compile().unwrap();
        assert!(!re.is_match("pattern = parser.compile()"));
        assert!(re.is_match("compile(src, '<s>', 'exec')"));
    }
}
