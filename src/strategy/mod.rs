// src/strategy/mod.rs
// Inference Strategies (§4.3): three policies sharing one contract,
// `processQuery(query, context) -> answer_text`. All three start by
// classifying the query via `analyzeQuery`.

pub mod direct;
pub mod multi_step;
pub mod react;
pub mod reflection;

use async_trait::async_trait;

use crate::discovery::{QueryAnalysis, QueryIntent};
use crate::llm::LlmProvider;

pub use direct::DirectStrategy;
pub use react::ReactStrategy;
pub use reflection::ReflectionStrategy;

/// Bounded recent-message history, produced externally (§4.3).
pub type Context = Vec<String>;

#[async_trait]
pub trait Strategy: Send + Sync {
    async fn process_query(&self, query: &str, context: &Context) -> String;
}

/// Ask the LLM to classify the query (§4.3: "analyzeQuery, which asks the
/// LLM to classify into {DIRECT_ANSWER, SINGLE_TOOL, MULTI_TOOL} with
/// one-sentence reasoning").
pub async fn analyze_query(llm: &dyn LlmProvider, query: &str) -> QueryAnalysis {
    let prompt = format!(
        "Classify this query as DIRECT_ANSWER, SINGLE_TOOL, or MULTI_TOOL, with one sentence of reasoning.\nQuery: {query}\nRespond as JSON: {{\"intent\": \"...\", \"reasoning\": \"...\"}}"
    );

    let response = llm.generate(&prompt).await;
    if !response.ok {
        return QueryAnalysis::fallback(query);
    }

    parse_analysis(&response.content).unwrap_or_else(|| QueryAnalysis::fallback(query))
}

fn parse_analysis(raw: &str) -> Option<QueryAnalysis> {
    let cleaned = raw.trim().trim_start_matches("```json").trim_start_matches("```").trim_end_matches("```");
    let value: serde_json::Value = serde_json::from_str(cleaned.trim()).ok()?;
    let intent_str = value.get("intent")?.as_str()?;
    let intent = match intent_str {
        "DIRECT_ANSWER" => QueryIntent::DirectAnswer,
        "SINGLE_TOOL" => QueryIntent::SingleTool,
        "MULTI_TOOL" => QueryIntent::MultiTool,
        _ => return None,
    };
    let reasoning = value.get("reasoning").and_then(|r| r.as_str()).unwrap_or_default().to_string();
    Some(QueryAnalysis { intent, reasoning })
}

/// User-visible error framing (§7: "a short message prefixed with 'Error
/// processing query:' plus the root cause, never an uncaught exception").
pub fn error_answer(cause: impl std::fmt::Display) -> String {
    format!("Error processing query: {cause}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::{FailingProvider, ScriptedProvider};
    use crate::llm::GenerateResponse;

    #[tokio::test]
    async fn analyze_query_parses_classifier_response() {
        let provider = ScriptedProvider::new(vec![GenerateResponse::ok(
            r#"{"intent": "SINGLE_TOOL", "reasoning": "needs the time tool"}"#,
        )]);
        let analysis = analyze_query(&provider, "what time is it").await;
        assert_eq!(analysis.intent, QueryIntent::SingleTool);
    }

    #[tokio::test]
    async fn analyze_query_falls_back_on_llm_failure() {
        let provider = FailingProvider { message: "down".to_string() };
        let analysis = analyze_query(&provider, "hello").await;
        assert_eq!(analysis.intent, QueryIntent::DirectAnswer);
    }

    #[test]
    fn error_answer_is_prefixed() {
        assert_eq!(error_answer("boom"), "Error processing query: boom");
    }
}
