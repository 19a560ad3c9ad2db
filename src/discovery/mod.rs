// src/discovery/mod.rs
// Discovery & Matching Pipeline (§4.2): converts free-text queries into
// concrete (Tool, arguments) pairs, entirely mediated by an injected LLM
// with deterministic fallbacks.
//
// Grounded on backend/src/operations/engine/tool_router/mod.rs's routing
// shape and backend/src/llm/router.rs's prompt-then-parse pattern,
// generalized from Mira's fixed tool catalog to the spec's domain-first
// two-stage match.

pub mod auto_discovery;
pub mod cache;
pub mod domain_filter;
pub mod rule_engine;
pub mod tool_matcher;

use serde::{Deserialize, Serialize};

pub use crate::supervisor::{Tool, ToolExecutionResult};

/// A logical grouping of tools by purpose (§3 `Domain`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Domain {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(default)]
    pub semantic_keywords: Vec<String>,
}

impl From<crate::config::DomainConfigEntry> for Domain {
    fn from(entry: crate::config::DomainConfigEntry) -> Self {
        Self {
            name: entry.name,
            description: entry.description,
            patterns: entry.patterns,
            semantic_keywords: entry.semantic_keywords,
        }
    }
}

/// Query classification produced once per query at the start of a
/// strategy (§3 `QueryAnalysis`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryIntent {
    DirectAnswer,
    SingleTool,
    MultiTool,
}

#[derive(Debug, Clone)]
pub struct QueryAnalysis {
    pub intent: QueryIntent,
    pub reasoning: String,
}

impl QueryAnalysis {
    /// Deterministic fallback used when the LLM call to classify fails
    /// (§7: discovery degrades to pattern matching on LLM errors).
    pub fn fallback(query: &str) -> Self {
        let lowered = query.to_lowercase();
        let looks_multi = [" and ", " then "].iter().any(|sep| lowered.contains(sep));
        Self {
            intent: if looks_multi { QueryIntent::MultiTool } else { QueryIntent::DirectAnswer },
            reasoning: "fallback classification: LLM unavailable".to_string(),
        }
    }
}

/// A single resolved step: a tool plus the argument template the matcher
/// produced for it (may still contain `{{RESULT_<N>}}` placeholders).
#[derive(Debug, Clone)]
pub struct MatchedStep {
    pub tool: Tool,
    pub arguments: serde_json::Value,
}
