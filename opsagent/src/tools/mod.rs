//! Reference tools shipped with the CLI.
//!
//! The agent core knows nothing about these; they register through the
//! normal [`ToolRegistry`] like any external capability would.

mod parse_logs;
mod system_info;

use std::sync::Arc;

use anyhow::{bail, Result};

use opsagent_agent::ToolRegistry;

pub use parse_logs::ParseLogsTool;
pub use system_info::SystemInfoTool;

/// Names accepted by `--tools`.
pub const AVAILABLE_TOOLS: &[&str] = &["parse_logs", "system_info"];

/// Build a registry holding the requested tools.
pub fn build_registry(names: &[String]) -> Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    for name in names {
        match name.as_str() {
            "parse_logs" => registry.register(Arc::new(ParseLogsTool::new())),
            "system_info" => registry.register(Arc::new(SystemInfoTool::new())),
            other => bail!(
                "unknown tool '{}' (available: {})",
                other,
                AVAILABLE_TOOLS.join(", ")
            ),
        }
    }
    Ok(registry)
}
