//! Basic host telemetry tool.

use std::fs;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use opsagent_agent::{Tool, ToolError, ToolSpec};

pub struct SystemInfoTool {
    spec: ToolSpec,
}

impl Default for SystemInfoTool {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemInfoTool {
    pub fn new() -> Self {
        Self {
            spec: ToolSpec::new(
                "system_info",
                "Basic host telemetry: hostname, platform, CPU count, load average, memory",
            ),
        }
    }
}

fn hostname() -> String {
    fs::read_to_string("/proc/sys/kernel/hostname")
        .map(|s| s.trim().to_string())
        .ok()
        .or_else(|| std::env::var("HOSTNAME").ok())
        .unwrap_or_else(|| "unknown".to_string())
}

/// `/proc/loadavg` → the three load figures, where available.
fn load_average() -> Option<Value> {
    let content = fs::read_to_string("/proc/loadavg").ok()?;
    let mut parts = content.split_whitespace();
    let one: f64 = parts.next()?.parse().ok()?;
    let five: f64 = parts.next()?.parse().ok()?;
    let fifteen: f64 = parts.next()?.parse().ok()?;
    Some(json!({ "1m": one, "5m": five, "15m": fifteen }))
}

/// `/proc/meminfo` → total/available MiB and used percentage, where
/// available.
fn memory() -> Option<Value> {
    let content = fs::read_to_string("/proc/meminfo").ok()?;
    let field = |name: &str| -> Option<u64> {
        content
            .lines()
            .find(|l| l.starts_with(name))?
            .split_whitespace()
            .nth(1)?
            .parse()
            .ok()
    };
    let total_kb = field("MemTotal:")?;
    let available_kb = field("MemAvailable:")?;
    let used_percent = if total_kb > 0 {
        ((total_kb - available_kb.min(total_kb)) as f64 / total_kb as f64 * 10000.0).round()
            / 100.0
    } else {
        0.0
    };
    Some(json!({
        "total_mb": total_kb / 1024,
        "available_mb": available_kb / 1024,
        "used_percent": used_percent,
    }))
}

#[async_trait]
impl Tool for SystemInfoTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, _arguments: &Map<String, Value>) -> Result<Value, ToolError> {
        let cpu_count = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Ok(json!({
            "hostname": hostname(),
            "platform": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
            "cpu_count": cpu_count,
            "load_average": load_average(),
            "memory": memory(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reports_platform_and_cpus() {
        let tool = SystemInfoTool::new();
        let out = tool.execute(&Map::new()).await.unwrap();
        assert_eq!(out["platform"], std::env::consts::OS);
        assert!(out["cpu_count"].as_u64().unwrap() >= 1);
        assert!(!out["hostname"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_takes_no_required_arguments() {
        let tool = SystemInfoTool::new();
        assert!(tool.spec().params.is_empty());
        assert!(tool.execute(&Map::new()).await.is_ok());
    }
}
