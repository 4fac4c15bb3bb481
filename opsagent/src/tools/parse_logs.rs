//! Offline log analysis tool.
//!
//! Classifies nginx-access and syslog lines, then reports error rates,
//! security-relevant events, and request-rate figures as one JSON
//! document. Everything here is computed locally from the file; any
//! interpretation or recommendation is the model's job.

use std::collections::BTreeMap;
use std::fs;

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Map, Value};

use opsagent_agent::{ParamKind, Tool, ToolError, ToolSpec};

/// Default analysis window when the caller does not pass one.
const DEFAULT_WINDOW_MINUTES: u64 = 10;

/// Security-relevant line patterns, reported by name.
const SECURITY_PATTERNS: &[(&str, &str)] = &[
    ("failed_password", r"(?i)failed password"),
    ("auth_failure", r"(?i)authentication failure"),
    ("invalid_user", r"(?i)invalid user"),
    (
        "scanner_user_agent",
        r"(?i)nikto|sqlmap|nmap|masscan|dirbuster|gobuster",
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineType {
    Nginx,
    Syslog,
    Unknown,
}

impl LineType {
    fn label(&self) -> &'static str {
        match self {
            LineType::Nginx => "nginx",
            LineType::Syslog => "syslog",
            LineType::Unknown => "unknown",
        }
    }
}

pub struct ParseLogsTool {
    spec: ToolSpec,
    nginx_re: Regex,
    syslog_re: Regex,
    security_res: Vec<(&'static str, Regex)>,
}

impl Default for ParseLogsTool {
    fn default() -> Self {
        Self::new()
    }
}

impl ParseLogsTool {
    pub fn new() -> Self {
        let spec = ToolSpec::new(
            "parse_logs",
            "Analyze a log file (nginx access or syslog): error rates, \
             security events, request-rate figures",
        )
        .with_param("path", ParamKind::String, true, "Path to the log file")
        .with_param(
            "window_minutes",
            ParamKind::Integer,
            false,
            "Analysis window in minutes (default 10)",
        )
        .with_param(
            "log_type",
            ParamKind::String,
            false,
            "Force the log format: nginx, syslog, or auto (default)",
        );
        Self {
            spec,
            nginx_re: Regex::new(
                r#"^(\S+) \S+ \S+ \[([^\]]+)\] "([A-Z]+) [^"]* HTTP/[^"]*" (\d{3}) (?:\d+|-)"#,
            )
            .expect("static regex"),
            syslog_re: Regex::new(r"^[A-Z][a-z]{2}\s+\d{1,2}\s+(\d{2}:\d{2}):\d{2}\s+\S+\s+\S+")
                .expect("static regex"),
            security_res: SECURITY_PATTERNS
                .iter()
                .map(|(name, pattern)| (*name, Regex::new(pattern).expect("static regex")))
                .collect(),
        }
    }

    fn classify(&self, line: &str, forced: Option<LineType>) -> LineType {
        match forced {
            Some(LineType::Nginx) => {
                if self.nginx_re.is_match(line) {
                    LineType::Nginx
                } else {
                    LineType::Unknown
                }
            }
            Some(LineType::Syslog) => {
                if self.syslog_re.is_match(line) {
                    LineType::Syslog
                } else {
                    LineType::Unknown
                }
            }
            _ => {
                if self.nginx_re.is_match(line) {
                    LineType::Nginx
                } else if self.syslog_re.is_match(line) {
                    LineType::Syslog
                } else {
                    LineType::Unknown
                }
            }
        }
    }

    /// Minute-resolution bucket key for a line, used for the per-minute
    /// request figures. `02/Aug/2026:12:34:56 +0000` → `02/Aug/2026:12:34`;
    /// `Aug  4 13:00:12 host …` → `Aug  4 13:00`.
    fn minute_key(&self, line: &str, line_type: LineType) -> Option<String> {
        match line_type {
            LineType::Nginx => {
                let ts = self.nginx_re.captures(line)?.get(2)?.as_str();
                let minute = ts.rsplit_once(':').map(|(head, _)| head)?;
                Some(minute.to_string())
            }
            LineType::Syslog => {
                let caps = self.syslog_re.captures(line)?;
                let hh_mm = caps.get(1)?.as_str();
                let prefix: String = line
                    .split_whitespace()
                    .take(2)
                    .collect::<Vec<_>>()
                    .join(" ");
                Some(format!("{} {}", prefix, hh_mm))
            }
            LineType::Unknown => None,
        }
    }

    fn analyze(&self, content: &str, window_minutes: u64, forced: Option<LineType>) -> Value {
        let mut total_entries: u64 = 0;
        let mut log_types: BTreeMap<&'static str, u64> = BTreeMap::new();
        let mut nginx_total: u64 = 0;
        let mut error_4xx: u64 = 0;
        let mut error_5xx: u64 = 0;
        let mut security_counts: BTreeMap<&'static str, u64> = BTreeMap::new();
        let mut minute_buckets: BTreeMap<String, u64> = BTreeMap::new();

        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }
            total_entries += 1;
            let line_type = self.classify(line, forced);
            *log_types.entry(line_type.label()).or_default() += 1;

            if line_type == LineType::Nginx {
                nginx_total += 1;
                if let Some(caps) = self.nginx_re.captures(line) {
                    match &caps[4][..1] {
                        "4" => error_4xx += 1,
                        "5" => error_5xx += 1,
                        _ => {}
                    }
                }
            }

            for (name, regex) in &self.security_res {
                if regex.is_match(line) {
                    *security_counts.entry(name).or_default() += 1;
                }
            }

            if let Some(key) = self.minute_key(line, line_type) {
                *minute_buckets.entry(key).or_default() += 1;
            }
        }

        let error_analysis = if nginx_total > 0 {
            json!({
                "error_4xx": error_4xx,
                "error_5xx": error_5xx,
                "error_4xx_rate": round2(error_4xx as f64 / nginx_total as f64 * 100.0),
                "error_5xx_rate": round2(error_5xx as f64 / nginx_total as f64 * 100.0),
            })
        } else {
            json!({ "message": "no nginx access entries; error rates unavailable" })
        };

        let total_security: u64 = security_counts.values().sum();
        let threat_level = match total_security {
            0 => "none",
            1..=5 => "low",
            6..=20 => "medium",
            _ => "high",
        };
        let security_events: Vec<Value> = security_counts
            .iter()
            .map(|(pattern, count)| json!({ "pattern": pattern, "count": count }))
            .collect();

        let counts: Vec<u64> = minute_buckets.values().copied().collect();
        let peak = counts.iter().max().copied().unwrap_or(0);
        let average = if counts.is_empty() {
            0.0
        } else {
            counts.iter().sum::<u64>() as f64 / counts.len() as f64
        };
        let performance_analysis = json!({
            "request_trend": trend(&counts),
            "peak_requests_per_minute": peak,
            "average_requests_per_minute": round2(average),
        });

        json!({
            "summary": {
                "total_entries": total_entries,
                "log_types": log_types,
                "entries_per_minute": round2(total_entries as f64 / window_minutes as f64),
            },
            "analysis_window": { "duration_minutes": window_minutes },
            "error_analysis": error_analysis,
            "security_analysis": {
                "threat_level": threat_level,
                "total_security_events": total_security,
                "security_events": security_events,
            },
            "performance_analysis": performance_analysis,
        })
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Compare the first and second half of the per-minute series; a swing
/// of more than 10% either way counts as a trend.
fn trend(counts: &[u64]) -> &'static str {
    if counts.len() < 2 {
        return "stable";
    }
    let mid = counts.len() / 2;
    let first: u64 = counts[..mid].iter().sum();
    let second: u64 = counts[mid..].iter().sum();
    let first = first.max(1) as f64;
    let second = second as f64;
    if second > first * 1.1 {
        "increasing"
    } else if second < first * 0.9 {
        "decreasing"
    } else {
        "stable"
    }
}

#[async_trait]
impl Tool for ParseLogsTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, arguments: &Map<String, Value>) -> Result<Value, ToolError> {
        let path = arguments
            .get("path")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        let window_minutes = arguments
            .get("window_minutes")
            .and_then(|v| v.as_u64())
            .filter(|&m| m > 0)
            .unwrap_or(DEFAULT_WINDOW_MINUTES);
        let forced = match arguments.get("log_type").and_then(|v| v.as_str()) {
            Some("nginx") => Some(LineType::Nginx),
            Some("syslog") => Some(LineType::Syslog),
            Some("auto") | None => None,
            Some(other) => {
                return Err(ToolError::new(format!(
                    "unknown log_type '{}' (expected nginx, syslog, or auto)",
                    other
                )))
            }
        };

        let content = fs::read_to_string(path)
            .map_err(|e| ToolError::new(format!("log file not found: {} ({})", path, e)))?;
        tracing::debug!(path = %path, "Analyzing log file");
        Ok(self.analyze(&content, window_minutes, forced))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const NGINX_SAMPLE: &str = concat!(
        "10.0.0.1 - - [02/Aug/2026:12:00:01 +0000] \"GET / HTTP/1.1\" 200 512\n",
        "10.0.0.2 - - [02/Aug/2026:12:00:05 +0000] \"GET /admin HTTP/1.1\" 403 128\n",
        "10.0.0.2 - - [02/Aug/2026:12:01:11 +0000] \"GET /api HTTP/1.1\" 500 64\n",
        "10.0.0.3 - - [02/Aug/2026:12:01:40 +0000] \"POST /login HTTP/1.1\" 200 256\n",
    );

    const SYSLOG_SAMPLE: &str = concat!(
        "Aug  2 12:00:01 web1 sshd[4242]: Failed password for root from 203.0.113.9\n",
        "Aug  2 12:00:02 web1 sshd[4242]: Failed password for invalid user admin\n",
        "Aug  2 12:00:10 web1 cron[17]: (root) CMD (run-parts /etc/cron.hourly)\n",
    );

    fn write_log(content: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    async fn run(tool: &ParseLogsTool, args: Value) -> Result<Value, ToolError> {
        tool.execute(args.as_object().unwrap()).await
    }

    #[tokio::test]
    async fn test_nginx_error_rates() {
        let f = write_log(NGINX_SAMPLE);
        let tool = ParseLogsTool::new();
        let out = run(&tool, json!({"path": f.path(), "window_minutes": 10}))
            .await
            .unwrap();

        assert_eq!(out["summary"]["total_entries"], 4);
        assert_eq!(out["summary"]["log_types"]["nginx"], 4);
        assert_eq!(out["error_analysis"]["error_4xx"], 1);
        assert_eq!(out["error_analysis"]["error_5xx"], 1);
        assert_eq!(out["error_analysis"]["error_4xx_rate"], 25.0);
        assert_eq!(out["analysis_window"]["duration_minutes"], 10);
    }

    #[tokio::test]
    async fn test_syslog_security_events() {
        let f = write_log(SYSLOG_SAMPLE);
        let tool = ParseLogsTool::new();
        let out = run(&tool, json!({"path": f.path()})).await.unwrap();

        assert_eq!(out["summary"]["log_types"]["syslog"], 3);
        let security = &out["security_analysis"];
        assert_eq!(security["threat_level"], "low");
        assert_eq!(security["total_security_events"], 3);
        let events = security["security_events"].as_array().unwrap();
        assert!(events
            .iter()
            .any(|e| e["pattern"] == "failed_password" && e["count"] == 2));
        assert!(events
            .iter()
            .any(|e| e["pattern"] == "invalid_user" && e["count"] == 1));
    }

    #[tokio::test]
    async fn test_per_minute_figures() {
        let f = write_log(NGINX_SAMPLE);
        let tool = ParseLogsTool::new();
        let out = run(&tool, json!({"path": f.path()})).await.unwrap();

        let perf = &out["performance_analysis"];
        assert_eq!(perf["peak_requests_per_minute"], 2);
        assert_eq!(perf["average_requests_per_minute"], 2.0);
        assert_eq!(perf["request_trend"], "stable");
    }

    #[tokio::test]
    async fn test_missing_file_is_tool_error() {
        let tool = ParseLogsTool::new();
        let err = run(&tool, json!({"path": "missing.log"})).await.unwrap_err();
        assert!(err.message.contains("missing.log"), "got: {}", err.message);
    }

    #[tokio::test]
    async fn test_forced_log_type_rejects_mismatched_lines() {
        let f = write_log(SYSLOG_SAMPLE);
        let tool = ParseLogsTool::new();
        let out = run(&tool, json!({"path": f.path(), "log_type": "nginx"}))
            .await
            .unwrap();
        assert_eq!(out["summary"]["log_types"]["unknown"], 3);
        assert_eq!(
            out["error_analysis"]["message"],
            "no nginx access entries; error rates unavailable"
        );
    }

    #[tokio::test]
    async fn test_unknown_log_type_argument() {
        let tool = ParseLogsTool::new();
        let err = run(&tool, json!({"path": "x.log", "log_type": "journald"}))
            .await
            .unwrap_err();
        assert!(err.message.contains("journald"));
    }
}
