// src/discovery/cache.rs
// Tool-selection cache (§4.2.2 "Caching"): key is `(query, options-hash)`,
// value is the parsed `(Tool, args)` map. Invalidated on LLM-provider
// change.

use serde::Serialize;

use crate::discovery::MatchedStep;
use crate::llm::cache::{structural_key, StructuralCache};

#[derive(Serialize)]
struct ToolSelectionKey<'a> {
    query: &'a str,
    options_hash: &'a str,
}

#[derive(Clone)]
struct CachedStep {
    tool_name: String,
    server_id: String,
    arguments: serde_json::Value,
}

pub struct ToolSelectionCache {
    inner: StructuralCache<Vec<CachedStep>>,
}

impl ToolSelectionCache {
    pub fn new() -> Self {
        Self { inner: StructuralCache::new() }
    }

    fn key(query: &str, options_hash: &str) -> String {
        structural_key(&ToolSelectionKey { query, options_hash })
    }

    pub async fn get(&self, query: &str, options_hash: &str, tools: &[crate::discovery::Tool]) -> Option<Vec<MatchedStep>> {
        let cached = self.inner.get(&Self::key(query, options_hash)).await?;
        let resolved: Option<Vec<MatchedStep>> = cached
            .into_iter()
            .map(|entry| {
                tools
                    .iter()
                    .find(|t| t.name == entry.tool_name && t.server_id == entry.server_id)
                    .cloned()
                    .map(|tool| MatchedStep { tool, arguments: entry.arguments })
            })
            .collect();
        resolved
    }

    pub async fn put(&self, query: &str, options_hash: &str, steps: &[MatchedStep]) {
        let cached = steps
            .iter()
            .map(|step| CachedStep {
                tool_name: step.tool.name.clone(),
                server_id: step.tool.server_id.clone(),
                arguments: step.arguments.clone(),
            })
            .collect();
        self.inner.put(Self::key(query, options_hash), cached).await;
    }

    /// Invalidated on LLM-provider change (§4.2.2).
    pub async fn invalidate_all(&self) {
        self.inner.clear().await;
    }
}

impl Default for ToolSelectionCache {
    fn default() -> Self {
        Self::new()
    }
}
