// src/discovery/auto_discovery.rs
// Domain Auto-Discovery (§4.2.3): name a domain for tools with no known
// domain hint, via the LLM with a deterministic fallback.

use std::collections::HashSet;

use regex::Regex;

use crate::llm::LlmProvider;
use crate::supervisor::Tool;

/// Ask the LLM for a single lowercase word naming the domain these tools
/// belong to. Falls back to `first_token_of_tool_name`, disambiguated
/// with `_1`, `_2`, ... against `existing_names` on conflict or an empty
/// response (§4.2.3).
pub async fn discover_domain_name(
    llm: &dyn LlmProvider,
    orphan_tools: &[Tool],
    existing_names: &HashSet<String>,
) -> String {
    let listing = orphan_tools
        .iter()
        .map(|t| format!("{} — {}", t.name, t.description))
        .collect::<Vec<_>>()
        .join("\n");
    let prompt = format!(
        "Tools:\n{listing}\n\nRespond with a single lowercase word naming the domain these tools belong to."
    );

    let response = llm.generate(&prompt).await;
    let sanitized = response.ok.then(|| sanitize(&response.content)).flatten();

    let base = sanitized.unwrap_or_else(|| fallback_name(orphan_tools));
    disambiguate(&base, existing_names)
}

fn sanitize(raw: &str) -> Option<String> {
    let word_re = Regex::new(r"[a-z0-9_]+").ok()?;
    word_re.find(raw.trim().to_lowercase().as_str()).map(|m| m.as_str().to_string())
}

fn fallback_name(orphan_tools: &[Tool]) -> String {
    orphan_tools
        .first()
        .and_then(|t| t.name.split('_').next())
        .unwrap_or("misc")
        .to_string()
}

fn disambiguate(base: &str, existing_names: &HashSet<String>) -> String {
    if !existing_names.contains(base) {
        return base.to_string();
    }
    let mut i = 1;
    loop {
        let candidate = format!("{base}_{i}");
        if !existing_names.contains(&candidate) {
            return candidate;
        }
        i += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::ScriptedProvider;
    use crate::llm::GenerateResponse;
    use crate::supervisor::validation::ToolSchema;

    fn tool(name: &str) -> Tool {
        Tool { name: name.to_string(), description: "d".to_string(), server_id: "s".to_string(), domain: None, schema: ToolSchema::default() }
    }

    #[tokio::test]
    async fn uses_llm_suggested_word_when_available() {
        let provider = ScriptedProvider::new(vec![GenerateResponse::ok("Finance")]);
        let name = discover_domain_name(&provider, &[tool("get_quote")], &HashSet::new()).await;
        assert_eq!(name, "finance");
    }

    #[tokio::test]
    async fn falls_back_to_first_token_on_llm_failure() {
        let provider = ScriptedProvider::new(vec![GenerateResponse::failed("down")]);
        let name = discover_domain_name(&provider, &[tool("get_quote")], &HashSet::new()).await;
        assert_eq!(name, "get");
    }

    #[tokio::test]
    async fn disambiguates_on_conflict() {
        let mut existing = HashSet::new();
        existing.insert("finance".to_string());
        let provider = ScriptedProvider::new(vec![GenerateResponse::ok("finance")]);
        let name = discover_domain_name(&provider, &[tool("get_quote")], &existing).await;
        assert_eq!(name, "finance_1");
    }
}
