//! Terminal event sink for CLI runs.

use std::io::Write;

use opsagent_agent::{EventSink, Step, StepKind};
use opsagent_sandbox::ExecutionOutcome;

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_chars).collect();
        format!("{}…", cut)
    }
}

/// Prints streamed text to stdout and step progress to stderr, so the
/// answer stays pipeable.
pub struct TerminalEventSink {
    verbose: bool,
}

impl TerminalEventSink {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    fn msg(&self, s: &str) {
        eprintln!("{}", s);
    }
}

impl EventSink for TerminalEventSink {
    fn on_text_chunk(&mut self, chunk: &str) {
        print!("{}", chunk);
        let _ = std::io::stdout().flush();
    }

    fn on_step(&mut self, step: &Step) {
        match &step.kind {
            StepKind::Thought { text } => {
                if self.verbose {
                    self.msg(&format!("💭 {}", truncate(text, 200)));
                }
            }
            StepKind::ToolCall {
                name, arguments, ..
            } => {
                if self.verbose {
                    self.msg(&format!("🔧 {}  args={}", name, truncate(&arguments.to_string(), 200)));
                } else {
                    self.msg(&format!("🔧 {}", name));
                }
            }
            StepKind::ToolResult {
                name,
                content,
                is_error,
                ..
            } => {
                let icon = if *is_error { "❌" } else { "✅" };
                let first = content.lines().next().unwrap_or("(ok)");
                self.msg(&format!("  {} {} {}", icon, name, truncate(first, 80)));
            }
            StepKind::CodeBlock { code } => {
                self.msg(&format!("📝 code ({} lines)", code.source.lines().count()));
                if self.verbose {
                    for line in code.source.lines() {
                        self.msg(&format!("  │ {}", line));
                    }
                }
            }
            StepKind::CodeOutput { outcome } => match outcome {
                ExecutionOutcome::Skipped { .. } => {
                    self.msg("  ⏭  preview mode: validated, not executed");
                }
                ExecutionOutcome::Success { stdout, .. } => {
                    let first = stdout.lines().next().unwrap_or("(no output)");
                    self.msg(&format!("  ✅ {}", truncate(first, 80)));
                }
                ExecutionOutcome::Failure { error } => {
                    self.msg(&format!("  ❌ {}", truncate(error, 120)));
                }
            },
            StepKind::FinalAnswer { .. } => {
                // Printed by main once the run result is back.
            }
            StepKind::Error { message } => {
                self.msg(&format!("  ⚠️  {}", truncate(message, 200)));
            }
        }
    }
}
