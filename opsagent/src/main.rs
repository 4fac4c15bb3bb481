mod cli;
mod format;
mod sink;
mod tools;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use opsagent_agent::{
    AgentConfig, AgentResult, CodeAgent, OpenAiCompatModel, StepKind, ToolCallingAgent,
    TriageAgent,
};
use opsagent_core::config::LlmConfig;
use opsagent_core::observability;
use opsagent_sandbox::{CodeExecutor, RuleSet};

use cli::{AgentType, Cli};
use format::format_final_answer;
use sink::TerminalEventSink;

fn main() -> Result<()> {
    observability::init_tracing();
    let cli = Cli::parse();

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    let result = runtime.block_on(run(&cli))?;
    report(&result);

    if result.answer.is_empty() {
        if let Some(step) = result.steps.last() {
            if let StepKind::Error { message } = &step.kind {
                eprintln!("Run failed: {}", message);
            }
        }
        std::process::exit(1);
    }
    Ok(())
}

async fn run(cli: &Cli) -> Result<AgentResult> {
    let registry = Arc::new(tools::build_registry(&cli.tools)?);

    // A log file makes the task self-contained for parse_logs, matching
    // how the tool expects to be driven.
    let task = match (&cli.log_file, cli.tools.iter().any(|t| t == "parse_logs")) {
        (Some(path), true) => format!(
            "Use the parse_logs tool to analyze the log file: {}. {}",
            path, cli.task
        ),
        _ => cli.task.clone(),
    };

    // Tools imply the tool-calling agent unless the user chose triage.
    let agent_type = match cli.agent_type {
        AgentType::Code if !registry.is_empty() => {
            tracing::info!("Auto-selected tool-calling agent (tools registered)");
            AgentType::Tool
        }
        other => other,
    };

    let rule_set = RuleSet::load_or_default();
    let executor = if cli.execute {
        eprintln!("EXECUTION MODE: validated code will be executed locally");
        CodeExecutor::execute_enabled(&rule_set).context("cannot enable code execution")?
    } else {
        eprintln!("SAFE MODE: code will be previewed only (use --execute to run code)");
        CodeExecutor::preview(&rule_set)
    };
    let executor = Arc::new(executor);

    let mut llm = LlmConfig::from_env();
    if let Some(model) = &cli.model_id {
        llm.model = model.clone();
    }
    if let Some(base) = &cli.api_base {
        llm.api_base = base.trim_end_matches('/').to_string();
    }
    if llm.api_key.is_empty() {
        tracing::warn!("No API key configured (OPSAGENT_API_KEY / OPENAI_API_KEY)");
    }
    let model = Arc::new(
        OpenAiCompatModel::new(&llm.api_base, &llm.api_key, &llm.model)
            .with_streaming(cli.stream),
    );
    tracing::info!(model = %llm.model, api_base = %llm.api_base, "Model configured");

    let config = AgentConfig {
        max_steps: cli.max_steps,
        system_prompt: None,
    };
    let mut sink = TerminalEventSink::new(cli.verbose);

    eprintln!("opsagent is thinking...\n");
    let result = match agent_type {
        AgentType::Code => {
            CodeAgent::new(model, registry, executor, config)
                .run(&task, &mut sink)
                .await
        }
        AgentType::Tool => {
            ToolCallingAgent::new(model, registry, config)
                .run(&task, &mut sink)
                .await
        }
        AgentType::Triage => {
            TriageAgent::new(model, registry, executor, config)
                .run(&task, &mut sink)
                .await
        }
    };
    Ok(result)
}

fn report(result: &AgentResult) {
    if !result.answer.is_empty() {
        println!("\nFinal Answer:");
        println!("{}", "=".repeat(60));
        println!("{}", format_final_answer(&result.answer));
        println!("{}", "=".repeat(60));
    }
    println!("Duration: {:.2}s", result.duration.as_secs_f64());
    println!("Steps: {}", result.steps.len());
}
