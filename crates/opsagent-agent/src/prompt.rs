//! System prompts for the three agent variants.

use crate::tool::ToolSpec;

/// System prompt for the code agent: the model answers with Python in
/// fenced blocks, and reaches tools as functions in the execution
/// namespace.
pub fn code_agent_system(tools: &[ToolSpec]) -> String {
    let mut prompt = String::from(
        "You are a DevOps assistant that solves tasks by writing Python code.\n\
         \n\
         Rules:\n\
         - To take a step, reply with a single Python code block fenced as ```python.\n\
         - The code runs in a restricted sandbox: only a small set of builtins and the\n\
           allowlisted stdlib modules (math, json, re, datetime, time, itertools,\n\
           functools, collections, string, textwrap, statistics, random) are available.\n\
         - No file, network, process, or interpreter-introspection access.\n\
         - Assign your step's outcome to a variable named `result` and/or print() it;\n\
           you will receive the output as the next observation.\n\
         - When you have the final answer, reply with plain text only - no code block.\n",
    );
    if !tools.is_empty() {
        prompt.push_str("\nThese tool functions are available inside your code:\n");
        for spec in tools {
            prompt.push_str(&format!("- {} — {}\n", spec.signature(), spec.description));
        }
        prompt.push_str("Call them with keyword arguments, e.g. parse_logs(path=\"a.log\").\n");
    }
    prompt
}

/// System prompt for the tool-calling agent: structured tool calls or a
/// plain-text final answer. No code execution.
pub fn tool_agent_system(tools: &[ToolSpec]) -> String {
    let mut prompt = String::from(
        "You are a DevOps assistant. Use the provided tools to gather the information\n\
         the task needs, then answer.\n\
         \n\
         Rules:\n\
         - Call tools through the function-calling interface, one call per step.\n\
         - Tool errors are observations: adjust the arguments or approach and retry,\n\
           or explain the failure.\n\
         - When you have everything you need, reply with the final answer as plain text.\n",
    );
    if !tools.is_empty() {
        prompt.push_str("\nAvailable tools:\n");
        for spec in tools {
            prompt.push_str(&format!("- {} — {}\n", spec.name, spec.description));
        }
    }
    prompt
}

/// One-shot triage prompt: classify a task before routing it.
pub fn triage_prompt(task: &str, tool_names: &[String]) -> String {
    format!(
        "Classify the following task for routing. Answer with exactly one word:\n\
         - `tools` if it is best solved by calling the available tools ({}).\n\
         - `code` if it needs computation, parsing, or data transformation in code.\n\
         \n\
         Task: {}",
        if tool_names.is_empty() {
            "none registered".to_string()
        } else {
            tool_names.join(", ")
        },
        task
    )
}
