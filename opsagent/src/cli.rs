//! Command-line interface definition.

use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AgentType {
    /// Solve the task by writing sandboxed Python.
    Code,
    /// Solve the task through structured tool calls.
    Tool,
    /// Classify the task first, then route to code or tool.
    Triage,
}

/// DevOps AI agent with sandboxed code execution and offline log analysis.
#[derive(Debug, Parser)]
#[command(
    name = "opsagent",
    version,
    about,
    after_help = "\
Examples:
  # Troubleshoot with the tool-calling agent
  opsagent \"Analyze nginx errors from the last 10 minutes\" --tools parse_logs --log-file /var/log/nginx/access.log

  # Let triage pick the agent variant
  opsagent \"Summarize system health\" --agent-type triage --tools system_info

  # Allow generated code to actually run (default is safe preview)
  opsagent \"Compute the p95 of these latencies: 12 91 43 ...\" --execute

Environment:
  OPSAGENT_API_KEY / OPENAI_API_KEY    API key for the model backend
  OPSAGENT_API_BASE / OPENAI_API_BASE  OpenAI-compatible endpoint
  OPSAGENT_MODEL                       Model id (default inferred from endpoint)
  OPSAGENT_RULES_FILE                  Custom validation rule set (YAML)

Safety:
  By default opsagent runs in SAFE MODE: generated code is validated and
  previewed but never executed. Pass --execute only when you trust the
  task and understand the risks."
)]
pub struct Cli {
    /// Task to perform.
    pub task: String,

    /// Agent variant (tool is auto-selected when --tools is given).
    #[arg(long, value_enum, default_value = "code")]
    pub agent_type: AgentType,

    /// Tools to register (available: parse_logs, system_info).
    #[arg(long, num_args = 1..)]
    pub tools: Vec<String>,

    /// Log file for the parse_logs tool.
    #[arg(long)]
    pub log_file: Option<String>,

    /// Maximum recorded steps before the run is stopped.
    #[arg(long, default_value_t = 10)]
    pub max_steps: usize,

    /// Stream model output and steps in real time.
    #[arg(long)]
    pub stream: bool,

    /// Execute validated code locally (default: preview only).
    #[arg(long)]
    pub execute: bool,

    /// Model id override.
    #[arg(long, env = "OPSAGENT_MODEL")]
    pub model_id: Option<String>,

    /// API base override.
    #[arg(long)]
    pub api_base: Option<String>,

    /// Verbose step output.
    #[arg(long)]
    pub verbose: bool,
}
