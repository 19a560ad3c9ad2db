// src/discovery/domain_filter.rs
// Domain Filter (§4.2.1): score each registered domain against a query,
// via the LLM with a deterministic substring-overlap fallback.

use std::collections::HashMap;

use serde_json::Value;

use crate::discovery::Domain;
use crate::llm::LlmProvider;

pub const MATCH_THRESHOLD: f64 = 0.3;
pub const MULTI_STEP_INCLUDE_THRESHOLD: f64 = 0.6;
const KEYWORD_WEIGHT: f64 = 0.8;

/// Ask the LLM to score every domain against `query` in `[0.0, 1.0]`.
/// Falls back to substring-overlap scoring on any LLM failure (§4.2.1).
pub async fn score_domains(
    llm: &dyn LlmProvider,
    query: &str,
    domains: &[Domain],
    multi_step: bool,
) -> HashMap<String, f64> {
    let prompt = build_prompt(query, domains, multi_step);
    let response = llm.generate(&prompt).await;

    if response.ok {
        if let Some(scores) = parse_scores(&response.content, domains) {
            return scores;
        }
    }

    fallback_score_domains(query, domains)
}

fn build_prompt(query: &str, domains: &[Domain], multi_step: bool) -> String {
    let listing = domains
        .iter()
        .map(|d| format!("{} — {}", d.name, d.description))
        .collect::<Vec<_>>()
        .join("\n");

    let ask = if multi_step {
        "Identify ALL relevant domains."
    } else {
        "Pick the single best matching domain."
    };

    format!(
        "Query: {query}\n\nDomains:\n{listing}\n\n{ask} Return a JSON object mapping each domain name to a score in [0.0, 1.0]."
    )
}

/// Strip code fences, parse the JSON object, clamp scores to `[0.0, 1.0]`.
fn parse_scores(raw: &str, domains: &[Domain]) -> Option<HashMap<String, f64>> {
    let cleaned = strip_code_fences(raw);
    let value: Value = serde_json::from_str(cleaned.trim()).ok()?;
    let obj = value.as_object()?;

    let known: std::collections::HashSet<&str> = domains.iter().map(|d| d.name.as_str()).collect();
    let scores = obj
        .iter()
        .filter(|(name, _)| known.contains(name.as_str()))
        .map(|(name, score)| (name.clone(), score.as_f64().unwrap_or(0.0).clamp(0.0, 1.0)))
        .collect();

    Some(scores)
}

fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|s| s.strip_suffix("```").unwrap_or(s))
        .unwrap_or(trimmed)
}

/// Normalized substring overlap scoring used when the LLM is unavailable.
pub fn fallback_score_domains(query: &str, domains: &[Domain]) -> HashMap<String, f64> {
    let lowered = query.to_lowercase();
    domains
        .iter()
        .map(|domain| {
            let pattern_score = domain
                .patterns
                .iter()
                .filter(|p| lowered.contains(p.to_lowercase().as_str()))
                .map(|p| p.len() as f64 / lowered.len().max(1) as f64)
                .fold(0.0_f64, f64::max);

            let keyword_score = domain
                .semantic_keywords
                .iter()
                .filter(|k| lowered.contains(k.to_lowercase().as_str()))
                .map(|k| (k.len() as f64 / lowered.len().max(1) as f64) * KEYWORD_WEIGHT)
                .fold(0.0_f64, f64::max);

            (domain.name.clone(), pattern_score.max(keyword_score))
        })
        .collect()
}

/// The best-scoring domain above the match threshold (§4.2.1 "best").
pub fn best_domain<'a>(scores: &HashMap<String, f64>, domains: &'a [Domain]) -> Option<&'a Domain> {
    scores
        .iter()
        .filter(|(_, score)| **score > MATCH_THRESHOLD)
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
        .and_then(|(name, _)| domains.iter().find(|d| &d.name == name))
}

/// All domains eligible for a multi-step plan (§4.2.1).
pub fn multi_step_domains<'a>(scores: &HashMap<String, f64>, domains: &'a [Domain]) -> Vec<&'a Domain> {
    domains
        .iter()
        .filter(|d| scores.get(&d.name).is_some_and(|s| *s >= MULTI_STEP_INCLUDE_THRESHOLD))
        .collect()
}

/// Narrow `tools` to the domain(s) that match `query`, so the Tool
/// Matcher works from a domain-filtered list (§4.2.2). With no registered
/// domains, or no domain clearing the threshold, filtering has nothing to
/// add and the full tool list passes through unchanged.
pub async fn select_tools(
    llm: &dyn LlmProvider,
    query: &str,
    domains: &[Domain],
    tools: &[crate::supervisor::Tool],
    multi_step: bool,
) -> Vec<crate::supervisor::Tool> {
    if domains.is_empty() {
        return tools.to_vec();
    }

    let scores = score_domains(llm, query, domains, multi_step).await;
    let allowed: std::collections::HashSet<&str> = if multi_step {
        multi_step_domains(&scores, domains).into_iter().map(|d| d.name.as_str()).collect()
    } else {
        best_domain(&scores, domains).into_iter().map(|d| d.name.as_str()).collect()
    };

    if allowed.is_empty() {
        return tools.to_vec();
    }

    tools.iter().filter(|t| t.domain.as_deref().is_some_and(|d| allowed.contains(d))).cloned().collect()
}
