// src/strategy/multi_step.rs
// Multi-Step Execution Engine (§4.4), shared by every strategy that needs
// to chain several tool calls together.
//
// Grounded on backend/src/operations/engine/orchestration.rs's
// run-then-translate-errors shape, generalized from Mira's ambient
// context object to the spec's placeholder-driven data flow (§9
// "Placeholder-driven data flow... the engine is a simple reducer").

use std::collections::HashMap;

use regex::Regex;

use crate::discovery::MatchedStep;
use crate::llm::LlmProvider;
use crate::observer::Observer;
use crate::supervisor::{Supervisor, ToolExecutionResult};

pub const MAX_STEPS_PER_CHAIN: usize = 3;

#[derive(Debug, Clone)]
pub enum MultiStepError {
    /// A placeholder references a step at or after its own position
    /// (§8 boundary behavior: cycle must be detected before any tool call).
    Cycle { step: usize, referenced: u32 },
    StepFailed { step: usize, tool: String, message: String },
}

impl std::fmt::Display for MultiStepError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MultiStepError::Cycle { step, referenced } => {
                write!(f, "step {step} references RESULT_{referenced}, which is not a prior step")
            }
            MultiStepError::StepFailed { step, tool, message } => {
                write!(f, "step {step} ({tool}) failed: {message}")
            }
        }
    }
}

pub(crate) fn placeholder_regex() -> Regex {
    Regex::new(r"\{\{RESULT_(\d+)\}\}").expect("static pattern")
}

/// Maximum `N` referenced by any `{{RESULT_<N>}}` placeholder in any
/// string-valued argument, 0 if none (§4.4 "Dependency ordering").
fn max_referenced(value: &serde_json::Value, re: &Regex) -> u32 {
    match value {
        serde_json::Value::String(s) => re
            .captures_iter(s)
            .filter_map(|c| c[1].parse::<u32>().ok())
            .max()
            .unwrap_or(0),
        serde_json::Value::Array(items) => items.iter().map(|v| max_referenced(v, re)).max().unwrap_or(0),
        serde_json::Value::Object(map) => map.values().map(|v| max_referenced(v, re)).max().unwrap_or(0),
        _ => 0,
    }
}

pub(crate) fn substitute_placeholders(value: &serde_json::Value, results: &HashMap<u32, String>, re: &Regex) -> serde_json::Value {
    match value {
        serde_json::Value::String(s) => {
            let replaced = re.replace_all(s, |caps: &regex::Captures| {
                let n: u32 = caps[1].parse().unwrap_or(0);
                results.get(&n).cloned().unwrap_or_default()
            });
            serde_json::Value::String(replaced.into_owned())
        }
        serde_json::Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(|v| substitute_placeholders(v, results, re)).collect())
        }
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.iter().map(|(k, v)| (k.clone(), substitute_placeholders(v, results, re))).collect(),
        ),
        other => other.clone(),
    }
}

/// Execute an ordered plan so downstream steps can consume upstream
/// results, then consolidate the per-step outputs into one answer.
pub async fn execute_plan(
    supervisor: &Supervisor,
    llm: &dyn LlmProvider,
    observer: &Observer,
    steps: Vec<MatchedStep>,
) -> Result<String, MultiStepError> {
    let re = placeholder_regex();
    let steps: Vec<MatchedStep> = steps.into_iter().take(MAX_STEPS_PER_CHAIN).collect();

    let levels: Vec<u32> = steps
        .iter()
        .enumerate()
        .map(|(i, step)| {
            let original_index = (i + 1) as u32;
            let referenced = max_referenced(&step.arguments, &re);
            (original_index, referenced)
        })
        .map(|(original_index, referenced)| {
            if referenced >= original_index {
                return Err(MultiStepError::Cycle { step: original_index as usize, referenced });
            }
            Ok(referenced)
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut execution_order: Vec<usize> = (0..steps.len()).collect();
    execution_order.sort_by_key(|&i| levels[i]);

    let mut results: HashMap<u32, String> = HashMap::new();
    let mut summary_lines = Vec::new();

    for &i in &execution_order {
        let step = &steps[i];
        let original_index = (i + 1) as u32;
        let resolved_args = substitute_placeholders(&step.arguments, &results, &re);

        observer.tool_selection(&step.tool.name, &resolved_args);
        let outcome = supervisor.call_tool(&step.tool.server_id, &step.tool.name, resolved_args).await;
        observer.tool_execution(&step.tool.name, &outcome);

        match outcome {
            ToolExecutionResult::Success { content, message, .. } => {
                results.insert(original_index, content);
                summary_lines.push(format!("Step {original_index} ({}): {message}", step.tool.name));
            }
            ToolExecutionResult::Error { message, .. } => {
                return Err(MultiStepError::StepFailed {
                    step: original_index as usize,
                    tool: step.tool.name.clone(),
                    message,
                });
            }
        }
    }

    let consolidation_prompt =
        format!("Consolidate these results into one user-facing answer:\n{}", summary_lines.join("\n"));
    let response = llm.generate(&consolidation_prompt).await;

    Ok(if response.ok { response.content } else { summary_lines.join("\n") })
}
