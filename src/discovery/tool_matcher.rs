// src/discovery/tool_matcher.rs
// Tool Matcher (§4.2.2): given a query and a domain-filtered tool list,
// ask the LLM to pick tool(s) and produce matching arguments.

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;

use crate::discovery::rule_engine::{apply_rules, Rule};
use crate::discovery::{MatchedStep, Tool};
use crate::llm::LlmProvider;
use crate::supervisor::validation::normalize_args;

fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|s| s.strip_suffix("```").unwrap_or(s))
        .unwrap_or(trimmed)
}

fn build_single_prompt(query: &str, tools: &[Tool]) -> String {
    let listing = numbered_listing(tools);
    format!(
        "Query: {query}\n\nAvailable tools:\n{listing}\n\nPick the single most relevant tool and produce an argument object conforming to its schema. Respond as JSON: {{\"tool\": \"<name>\", \"arguments\": {{...}}}}."
    )
}

fn build_multi_prompt(query: &str, tools: &[Tool]) -> String {
    let listing = numbered_listing(tools);
    format!(
        "Query: {query}\n\nAvailable tools:\n{listing}\n\nEmit an ordered list of steps as JSON: [{{\"tool\": \"<name>\", \"arguments\": {{...}}}}, ...]. Argument values may reference earlier step outputs with the placeholder {{{{RESULT_<N>}}}} (1-based)."
    )
}

fn numbered_listing(tools: &[Tool]) -> String {
    tools
        .iter()
        .enumerate()
        .map(|(i, t)| format!("{}. {} ({}) — {}", i + 1, t.name, t.server_id, t.description))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Apply any matching rule for this tool's parent server before sending
/// the matcher prompt (§4.2.2 "Rule hook").
fn apply_rule_hook(prompt: &str, tool: &Tool, rules: &HashMap<String, Rule>, query: &str) -> String {
    match rules.get(&tool.server_id) {
        Some(rule) => {
            let param_names: Vec<String> = tool.schema.properties.keys().cloned().collect();
            apply_rules(prompt, rule, &param_names, query)
        }
        None => prompt.to_string(),
    }
}

/// Single-tool match for `SINGLE_TOOL` queries.
pub async fn match_single_tool(
    llm: &dyn LlmProvider,
    query: &str,
    tools: &[Tool],
    rules: &HashMap<String, Rule>,
) -> Option<MatchedStep> {
    if tools.is_empty() {
        return None;
    }

    let base_prompt = build_single_prompt(query, tools);
    // Rule hooks apply per-candidate; since most deployments have at most
    // a handful of candidate tools this is a prompt rewrite, not a fan-out.
    let prompt = tools
        .iter()
        .fold(base_prompt, |acc, tool| apply_rule_hook(&acc, tool, rules, query));

    let response = llm.generate(&prompt).await;
    if !response.ok {
        return None;
    }

    let cleaned = strip_code_fences(&response.content);
    let value: Value = serde_json::from_str(cleaned.trim()).ok()?;
    let name = value.get("tool")?.as_str()?;
    let tool = tools.iter().find(|t| t.name == name).cloned();

    match tool {
        Some(tool) => {
            let raw_args = value.get("arguments").cloned().unwrap_or(Value::Object(Default::default()));
            let arguments = normalize_args(&tool.schema, &raw_args);
            Some(MatchedStep { tool, arguments })
        }
        None => {
            debug!("[discovery] LLM picked unknown tool '{name}', dropping");
            None
        }
    }
}

/// Ordered multi-step plan for `MULTI_TOOL` queries (§4.2.2, §4.4).
pub async fn match_multi_step(
    llm: &dyn LlmProvider,
    query: &str,
    tools: &[Tool],
    rules: &HashMap<String, Rule>,
) -> Vec<MatchedStep> {
    if tools.is_empty() {
        return Vec::new();
    }

    let base_prompt = build_multi_prompt(query, tools);
    let prompt = tools
        .iter()
        .fold(base_prompt, |acc, tool| apply_rule_hook(&acc, tool, rules, query));

    let response = llm.generate(&prompt).await;
    if !response.ok {
        return Vec::new();
    }

    let cleaned = strip_code_fences(&response.content);
    let parsed: Option<Vec<Value>> = serde_json::from_str(cleaned.trim()).ok();

    let Some(steps) = parsed else {
        return Vec::new();
    };

    steps
        .into_iter()
        .filter_map(|entry| {
            let name = entry.get("tool")?.as_str()?;
            let tool = match tools.iter().find(|t| t.name == name) {
                Some(t) => t.clone(),
                None => {
                    debug!("[discovery] multi-step plan referenced unknown tool '{name}', dropping");
                    return None;
                }
            };
            let raw_args = entry.get("arguments").cloned().unwrap_or(Value::Object(Default::default()));
            Some(MatchedStep { tool, arguments: raw_args })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::ScriptedProvider;
    use crate::llm::GenerateResponse;
    use crate::supervisor::validation::ToolSchema;

    fn tool(name: &str) -> Tool {
        Tool {
            name: name.to_string(),
            description: "d".to_string(),
            server_id: "time".to_string(),
            domain: Some("time".to_string()),
            schema: ToolSchema::from_wire(&serde_json::json!({
                "properties": {"timezone": {"type": "string"}},
                "required": ["timezone"],
            })),
        }
    }

    #[tokio::test]
    async fn match_single_tool_parses_llm_response() {
        let provider = ScriptedProvider::new(vec![GenerateResponse::ok(
            r#"{"tool": "get_current_time", "arguments": {"timezone": "UTC"}}"#,
        )]);
        let step = match_single_tool(&provider, "what time is it", &[tool("get_current_time")], &HashMap::new())
            .await
            .unwrap();
        assert_eq!(step.tool.name, "get_current_time");
        assert_eq!(step.arguments["timezone"], serde_json::json!("UTC"));
    }

    #[tokio::test]
    async fn match_single_tool_drops_unknown_tool_name() {
        let provider = ScriptedProvider::new(vec![GenerateResponse::ok(
            r#"{"tool": "nonexistent", "arguments": {}}"#,
        )]);
        let step = match_single_tool(&provider, "q", &[tool("get_current_time")], &HashMap::new()).await;
        assert!(step.is_none());
    }

    #[tokio::test]
    async fn match_multi_step_parses_ordered_plan_with_placeholders() {
        let provider = ScriptedProvider::new(vec![GenerateResponse::ok(
            r#"[{"tool": "get_current_time", "arguments": {"timezone": "{{RESULT_1}}"}}]"#,
        )]);
        let steps = match_multi_step(&provider, "q", &[tool("get_current_time")], &HashMap::new()).await;
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].arguments["timezone"], serde_json::json!("{{RESULT_1}}"));
    }

    #[tokio::test]
    async fn match_multi_step_returns_empty_on_llm_failure() {
        let provider = ScriptedProvider::new(vec![GenerateResponse::failed("down")]);
        let steps = match_multi_step(&provider, "q", &[tool("get_current_time")], &HashMap::new()).await;
        assert!(steps.is_empty());
    }
}
