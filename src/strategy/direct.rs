// src/strategy/direct.rs
// Direct Strategy (§4.3.1): stateless, a single pass through the pipeline.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::discovery::cache::ToolSelectionCache;
use crate::discovery::rule_engine::Rule;
use crate::discovery::{domain_filter, tool_matcher, Domain, MatchedStep, QueryIntent};
use crate::llm::LlmProvider;
use crate::observer::Observer;
use crate::strategy::{analyze_query, error_answer, multi_step, Context, Strategy};
use crate::supervisor::{Supervisor, ToolExecutionResult};

pub struct DirectStrategy {
    pub supervisor: Arc<Supervisor>,
    pub llm: Arc<dyn LlmProvider>,
    pub rules: HashMap<String, Rule>,
    pub domains: Vec<Domain>,
    pub cache: Arc<ToolSelectionCache>,
    pub cache_options_hash: String,
    pub observer: Observer,
}

#[async_trait]
impl Strategy for DirectStrategy {
    async fn process_query(&self, query: &str, _context: &Context) -> String {
        self.observer.inference_start(query, "direct");
        let analysis = analyze_query(self.llm.as_ref(), query).await;
        self.observer.thought(&analysis.reasoning);

        let answer = match analysis.intent {
            QueryIntent::DirectAnswer => {
                let response = self.llm.generate(query).await;
                if response.ok {
                    response.content
                } else {
                    error_answer(response.error.unwrap_or_else(|| "LLM unavailable".to_string()))
                }
            }
            QueryIntent::SingleTool => self.run_single_tool(query).await,
            QueryIntent::MultiTool => self.run_multi_tool(query).await,
        };

        self.observer.inference_complete(&answer);
        answer
    }
}

impl DirectStrategy {
    async fn run_single_tool(&self, query: &str) -> String {
        let tools = self.supervisor.get_all_available_tools().await;
        let tools = domain_filter::select_tools(self.llm.as_ref(), query, &self.domains, &tools, false).await;
        self.observer.tool_discovery(&tools.iter().map(|t| t.name.clone()).collect::<Vec<_>>());

        let step = match self.cache.get(query, &self.cache_options_hash, &tools).await {
            Some(mut cached) if cached.len() == 1 => cached.pop(),
            _ => tool_matcher::match_single_tool(self.llm.as_ref(), query, &tools, &self.rules).await,
        };
        let Some(step) = step else {
            return error_answer("no matching tool found");
        };
        self.cache
            .put(query, &self.cache_options_hash, std::slice::from_ref(&step))
            .await;

        self.observer.tool_selection(&step.tool.name, &step.arguments);
        let outcome = self.supervisor.call_tool(&step.tool.server_id, &step.tool.name, step.arguments).await;
        self.observer.tool_execution(&step.tool.name, &outcome);

        let content = match outcome {
            ToolExecutionResult::Success { content, .. } => content,
            ToolExecutionResult::Error { message, .. } => return error_answer(message),
        };

        let present_prompt = format!(
            "Present this tool output to the user in their own language.\nQuery: {query}\nTool output: {content}"
        );
        let response = self.llm.generate(&present_prompt).await;
        if response.ok {
            response.content
        } else {
            content
        }
    }

    async fn run_multi_tool(&self, query: &str) -> String {
        let tools = self.supervisor.get_all_available_tools().await;
        let tools = domain_filter::select_tools(self.llm.as_ref(), query, &self.domains, &tools, true).await;
        let steps: Vec<MatchedStep> = match self.cache.get(query, &self.cache_options_hash, &tools).await {
            Some(cached) if !cached.is_empty() => cached,
            _ => tool_matcher::match_multi_step(self.llm.as_ref(), query, &tools, &self.rules).await,
        };
        if steps.is_empty() {
            return error_answer("no multi-step plan could be produced");
        }
        self.cache.put(query, &self.cache_options_hash, &steps).await;

        match multi_step::execute_plan(&self.supervisor, self.llm.as_ref(), &self.observer, steps).await {
            Ok(answer) => answer,
            Err(e) => error_answer(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::ScriptedProvider;
    use crate::llm::GenerateResponse;

    #[tokio::test]
    async fn direct_answer_returns_llm_text_verbatim() {
        let strategy = DirectStrategy {
            supervisor: Arc::new(Supervisor::new(1000, 1000)),
            llm: Arc::new(ScriptedProvider::new(vec![
                GenerateResponse::ok(r#"{"intent": "DIRECT_ANSWER", "reasoning": "greeting"}"#),
                GenerateResponse::ok("Hello there!"),
            ])),
            rules: HashMap::new(),
            domains: Vec::new(),
            cache: Arc::new(ToolSelectionCache::new()),
            cache_options_hash: "test".to_string(),
            observer: Observer::new(),
        };

        let answer = strategy.process_query("hello", &Vec::new()).await;
        assert_eq!(answer, "Hello there!");
    }
}
