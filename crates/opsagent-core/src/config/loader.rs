//! Environment lookup for declared configuration keys.
//!
//! Every variable the workspace reads is declared as an [`EnvKey`] in
//! [`env_keys`](super::env_keys); lookups, boolean flags, and
//! range-checked integers all go through that declaration, so a key's
//! alias chain and its validation live in one place.

use std::env;
use std::ops::RangeInclusive;
use std::sync::Once;

/// A configuration variable: the canonical name plus the legacy or
/// vendor aliases it falls back to, in order.
#[derive(Debug, Clone, Copy)]
pub struct EnvKey {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
}

impl EnvKey {
    pub const fn new(name: &'static str) -> Self {
        Self { name, aliases: &[] }
    }

    pub const fn with_aliases(name: &'static str, aliases: &'static [&'static str]) -> Self {
        Self { name, aliases }
    }

    /// First non-empty value along the alias chain.
    pub fn lookup(&self) -> Option<String> {
        std::iter::once(self.name)
            .chain(self.aliases.iter().copied())
            .find_map(|key| {
                let value = env::var(key).ok()?.trim().to_string();
                (!value.is_empty()).then_some(value)
            })
    }

    /// Boolean flag: 1/true/yes/on enable it, anything else (or unset)
    /// leaves the default.
    pub fn flag(&self, default: bool) -> bool {
        match self.lookup() {
            Some(value) => matches!(
                value.to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            ),
            None => default,
        }
    }

    /// Integer setting constrained to `bounds`. A value that does not
    /// parse, or falls outside the bounds, is reported and replaced by
    /// the default rather than silently applied.
    pub fn bounded(&self, default: u64, bounds: RangeInclusive<u64>) -> u64 {
        let Some(raw) = self.lookup() else {
            return default;
        };
        match raw.parse::<u64>() {
            Ok(value) if bounds.contains(&value) => value,
            Ok(value) => {
                tracing::warn!(
                    "{}={} is outside {}..={}; using {}",
                    self.name,
                    value,
                    bounds.start(),
                    bounds.end(),
                    default
                );
                default
            }
            Err(_) => {
                tracing::warn!(
                    "{}='{}' is not an integer; using {}",
                    self.name,
                    raw,
                    default
                );
                default
            }
        }
    }
}

/// Apply `KEY=value` lines from `./.env` to the process environment.
/// Variables that are already set win; malformed lines are skipped.
/// Runs at most once per process.
pub fn load_dotenv() {
    static APPLIED: Once = Once::new();
    APPLIED.call_once(|| {
        let Ok(raw) = std::fs::read_to_string(".env") else {
            return;
        };
        for raw_line in raw.lines() {
            if let Some((key, value)) = parse_env_line(raw_line) {
                if env::var_os(key).is_none() {
                    #[allow(unsafe_code)]
                    unsafe {
                        env::set_var(key, value);
                    }
                }
            }
        }
    });
}

/// One dotenv line → `(key, value)`. Blank lines, comments, and keys
/// with characters outside `[A-Za-z0-9_]` yield `None`.
fn parse_env_line(raw: &str) -> Option<(&str, &str)> {
    let line = raw.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let (key, rest) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return None;
    }
    let rest = rest.trim();
    // A quoted value runs to its closing quote and may contain '#'.
    for quote in ['"', '\''] {
        if let Some(inner) = rest.strip_prefix(quote) {
            return inner.find(quote).map(|end| (key, &inner[..end]));
        }
    }
    // An unquoted value ends at the first comment marker.
    let value = rest.split('#').next().unwrap_or(rest).trim_end();
    Some((key, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_assignment() {
        assert_eq!(parse_env_line("OPSAGENT_MODEL=gpt-4o-mini"), Some(("OPSAGENT_MODEL", "gpt-4o-mini")));
        assert_eq!(parse_env_line("  PAD = spaced  "), Some(("PAD", "spaced")));
    }

    #[test]
    fn test_parse_skips_comments_and_blanks() {
        assert_eq!(parse_env_line(""), None);
        assert_eq!(parse_env_line("# comment"), None);
        assert_eq!(parse_env_line("no equals sign"), None);
    }

    #[test]
    fn test_parse_rejects_invalid_key() {
        assert_eq!(parse_env_line("BAD KEY=1"), None);
        assert_eq!(parse_env_line("=orphan"), None);
    }

    #[test]
    fn test_quoted_value_keeps_hash() {
        assert_eq!(
            parse_env_line(r##"NOTE="keep # this""##),
            Some(("NOTE", "keep # this"))
        );
        assert_eq!(parse_env_line("NAME='single'"), Some(("NAME", "single")));
    }

    #[test]
    fn test_unquoted_value_drops_trailing_comment() {
        assert_eq!(
            parse_env_line("LEVEL=debug # verbose"),
            Some(("LEVEL", "debug"))
        );
    }

    #[test]
    fn test_bounded_rejects_out_of_range() {
        // Key that is certainly unset: falls back to the default.
        let key = EnvKey::new("OPSAGENT_TEST_UNSET_BOUNDED");
        assert_eq!(key.bounded(30, 1..=3600), 30);
    }
}
