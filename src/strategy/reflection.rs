// src/strategy/reflection.rs
// Reflection Strategy (§4.3.3): initial response, then a bounded
// critique/refine loop with a confidence-gated early exit.

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

pub const DEFAULT_MAX_ITERATIONS: u32 = 3;
const CONFIDENCE_EARLY_EXIT: f64 = 0.8;

#[derive(Debug, Clone, Default)]
struct Critique {
    issues: String,
    suggestions: String,
    confidence: f64,
    needs_improvement: bool,
}

fn parse_critique(raw: &str) -> Critique {
    let mut critique = Critique::default();
    for line in raw.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("ISSUES:") {
            critique.issues = rest.trim().to_string();
        } else if let Some(rest) = line.strip_prefix("SUGGESTIONS:") {
            critique.suggestions = rest.trim().to_string();
        } else if let Some(rest) = line.strip_prefix("CONFIDENCE:") {
            critique.confidence = rest.trim().parse().unwrap_or(0.0);
        } else if let Some(rest) = line.strip_prefix("NEEDS_IMPROVEMENT:") {
            critique.needs_improvement = rest.trim().eq_ignore_ascii_case("true");
        }
    }
    critique
}

#[derive(Debug, Clone, Copy, Default)]
pub struct QualityAssessment {
    pub completeness: f64,
    pub accuracy: f64,
    pub relevance: f64,
    pub clarity: f64,
}

impl QualityAssessment {
    pub fn overall(&self) -> f64 {
        (self.completeness + self.accuracy + self.relevance + self.clarity) / 4.0
    }
}

fn parse_quality(raw: &str) -> QualityAssessment {
    let value: serde_json::Value = serde_json::from_str(raw.trim()).unwrap_or_default();
    let get = |key: &str| value.get(key).and_then(|v| v.as_f64()).unwrap_or(0.0);
    QualityAssessment {
        completeness: get("completeness"),
        accuracy: get("accuracy"),
        relevance: get("relevance"),
        clarity: get("clarity"),
    }
}

pub struct ReflectionStrategy {
    pub supervisor: Arc<Supervisor>,
    pub llm: Arc<dyn LlmProvider>,
    pub rules: HashMap<String, Rule>,
    pub domains: Vec<Domain>,
    pub cache: Arc<ToolSelectionCache>,
    pub cache_options_hash: String,
    pub observer: Observer,
    pub max_iterations: u32,
}

impl ReflectionStrategy {
    pub fn new(supervisor: Arc<Supervisor>, llm: Arc<dyn LlmProvider>, rules: HashMap<String, Rule>, observer: Observer) -> Self {
        Self {
            supervisor,
            llm,
            rules,
            domains: Vec::new(),
            cache: Arc::new(ToolSelectionCache::new()),
            cache_options_hash: "default".to_string(),
            observer,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_cache(mut self, cache: Arc<ToolSelectionCache>, options_hash: String) -> Self {
        self.cache = cache;
        self.cache_options_hash = options_hash;
        self
    }

    pub fn with_domains(mut self, domains: Vec<Domain>) -> Self {
        self.domains = domains;
        self
    }

    async fn initial_response(&self, query: &str, analysis_intent: QueryIntent) -> String {
        match analysis_intent {
            QueryIntent::DirectAnswer => {
                let response = self.llm.generate(query).await;
                if response.ok {
                    response.content
                } else {
                    error_answer("LLM unavailable")
                }
            }
            QueryIntent::SingleTool => {
                let tools = self.supervisor.get_all_available_tools().await;
                let tools = domain_filter::select_tools(self.llm.as_ref(), query, &self.domains, &tools, false).await;
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
                let outcome = self.supervisor.call_tool(&step.tool.server_id, &step.tool.name, step.arguments).await;
                match outcome {
                    ToolExecutionResult::Success { content, .. } => content,
                    ToolExecutionResult::Error { message, .. } => error_answer(message),
                }
            }
            QueryIntent::MultiTool => {
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
    }
}

#[async_trait]
impl Strategy for ReflectionStrategy {
    async fn process_query(&self, query: &str, _context: &Context) -> String {
        self.observer.inference_start(query, "reflection");
        let analysis = analyze_query(self.llm.as_ref(), query).await;
        self.observer.thought(&analysis.reasoning);

        let mut response = self.initial_response(query, analysis.intent).await;

        for _ in 1..=self.max_iterations {
            let critique_prompt = format!(
                "Critique this response to the query, and report NEEDS_IMPROVEMENT and CONFIDENCE.\nQuery: {query}\nResponse: {response}\n\nRespond with lines: ISSUES:, SUGGESTIONS:, CONFIDENCE: <0..1>, NEEDS_IMPROVEMENT: <bool>."
            );
            let critique_response = self.llm.generate(&critique_prompt).await;
            if !critique_response.ok {
                break;
            }
            let critique = parse_critique(&critique_response.content);

            if !critique.needs_improvement || critique.confidence > CONFIDENCE_EARLY_EXIT {
                break;
            }

            let refine_prompt = format!(
                "Refine this response given the issues and suggestions.\nQuery: {query}\nResponse: {response}\nIssues: {}\nSuggestions: {}",
                critique.issues, critique.suggestions
            );
            let refined = self.llm.generate(&refine_prompt).await;
            if refined.ok {
                response = refined.content;
            } else {
                break;
            }
        }

        let quality_prompt = format!(
            "Score this response on completeness, accuracy, relevance, clarity in [0,1].\nQuery: {query}\nResponse: {response}\nRespond as JSON: {{\"completeness\":0,\"accuracy\":0,\"relevance\":0,\"clarity\":0}}"
        );
        let quality_response = self.llm.generate(&quality_prompt).await;
        if quality_response.ok {
            let assessment = parse_quality(&quality_response.content);
            self.observer.thought(&format!("quality_assessment overall={:.2}", assessment.overall()));
        }

        self.observer.inference_complete(&response);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::ScriptedProvider;
    use crate::llm::GenerateResponse;

    #[tokio::test]
    async fn confidence_gate_stops_after_one_iteration() {
        let strategy = ReflectionStrategy::new(
            Arc::new(Supervisor::new(1000, 1000)),
            Arc::new(ScriptedProvider::new(vec![
                GenerateResponse::ok(r#"{"intent": "DIRECT_ANSWER", "reasoning": "r"}"#),
                GenerateResponse::ok("initial answer"),
                GenerateResponse::ok("ISSUES: minor\nSUGGESTIONS: none\nCONFIDENCE: 0.9\nNEEDS_IMPROVEMENT: true"),
                GenerateResponse::ok(r#"{"completeness":0.9,"accuracy":0.9,"relevance":0.9,"clarity":0.9}"#),
            ])),
            HashMap::new(),
            Observer::new(),
        );

        let answer = strategy.process_query("q", &Vec::new()).await;
        assert_eq!(answer, "initial answer");
    }

    #[test]
    fn parse_critique_reads_all_tags() {
        let critique = parse_critique("ISSUES: a\nSUGGESTIONS: b\nCONFIDENCE: 0.5\nNEEDS_IMPROVEMENT: true");
        assert_eq!(critique.issues, "a");
        assert_eq!(critique.suggestions, "b");
        assert_eq!(critique.confidence, 0.5);
        assert!(critique.needs_improvement);
    }

    #[test]
    fn quality_overall_is_mean_of_four_scores() {
        let assessment = QualityAssessment { completeness: 1.0, accuracy: 1.0, relevance: 0.0, clarity: 0.0 };
        assert_eq!(assessment.overall(), 0.5);
    }
}
