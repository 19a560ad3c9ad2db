// src/strategy/react.rs
// ReAct Strategy (§4.3.2): Thought -> Action -> Observation loop, bounded
// by maxIterations (default 5, hard cap 7).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::discovery::rule_engine::Rule;
use crate::discovery::{domain_filter, Domain, Tool};
use crate::llm::LlmProvider;
use crate::observer::Observer;
use crate::strategy::multi_step::{placeholder_regex, substitute_placeholders};
use crate::strategy::{analyze_query, error_answer, Context, Strategy};
use crate::supervisor::{Supervisor, ToolExecutionResult};

pub const DEFAULT_MAX_ITERATIONS: u32 = 5;
pub const HARD_ITERATION_CAP: u32 = 7;
const MAX_USEFUL_OBSERVATIONS: u32 = 2;
const MAX_USES_PER_TOOL: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ObservationClass {
    UsefulData,
    GenericSuccess,
    Error,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action")]
enum AgentAction {
    #[serde(rename = "USE_TOOL")]
    UseTool { tool_name: String, #[serde(default)] parameters: serde_json::Value },
    #[serde(rename = "FINAL_ANSWER")]
    FinalAnswer { final_answer: String },
}

pub struct ReactStrategy {
    pub supervisor: Arc<Supervisor>,
    pub llm: Arc<dyn LlmProvider>,
    pub rules: HashMap<String, Rule>,
    pub domains: Vec<Domain>,
    pub observer: Observer,
    pub max_iterations: u32,
}

impl ReactStrategy {
    pub fn new(supervisor: Arc<Supervisor>, llm: Arc<dyn LlmProvider>, rules: HashMap<String, Rule>, observer: Observer) -> Self {
        Self { supervisor, llm, rules, domains: Vec::new(), observer, max_iterations: DEFAULT_MAX_ITERATIONS }
    }

    pub fn with_domains(mut self, domains: Vec<Domain>) -> Self {
        self.domains = domains;
        self
    }

    fn bounded_iterations(&self) -> u32 {
        self.max_iterations.min(HARD_ITERATION_CAP)
    }

    fn build_prompt(&self, query: &str, tools: &[Tool], transcript: &[String]) -> String {
        let tool_listing = tools.iter().map(|t| format!("- {} ({})", t.name, t.description)).collect::<Vec<_>>().join("\n");
        let history = transcript.join("\n");
        format!(
            "Query: {query}\n\nAvailable tools:\n{tool_listing}\n\nTranscript so far:\n{history}\n\nRespond as JSON: either {{\"action\": \"USE_TOOL\", \"tool_name\": \"...\", \"parameters\": {{...}}}} or {{\"action\": \"FINAL_ANSWER\", \"final_answer\": \"...\"}}."
        )
    }

    fn classify_observation(outcome: &ToolExecutionResult) -> ObservationClass {
        match outcome {
            ToolExecutionResult::Error { .. } => ObservationClass::Error,
            ToolExecutionResult::Success { content, .. } => {
                if content.trim().is_empty() || content == "No message found" {
                    ObservationClass::GenericSuccess
                } else {
                    ObservationClass::UsefulData
                }
            }
        }
    }
}

#[async_trait]
impl Strategy for ReactStrategy {
    async fn process_query(&self, query: &str, _context: &Context) -> String {
        self.observer.inference_start(query, "react");
        let analysis = analyze_query(self.llm.as_ref(), query).await;
        self.observer.thought(&analysis.reasoning);

        let tools = self.supervisor.get_all_available_tools().await;
        let tools = domain_filter::select_tools(self.llm.as_ref(), query, &self.domains, &tools, true).await;
        self.observer.tool_discovery(&tools.iter().map(|t| t.name.clone()).collect::<Vec<_>>());

        if self.bounded_iterations() == 0 {
            let response = self.llm.generate(query).await;
            let answer = if response.ok { response.content } else { error_answer("LLM unavailable") };
            self.observer.inference_complete(&answer);
            return answer;
        }

        let re = placeholder_regex();
        let mut transcript: Vec<String> = Vec::new();
        let mut step_results: HashMap<u32, String> = HashMap::new();
        let mut step_counter: u32 = 0;
        let mut useful_observations: u32 = 0;
        let mut tool_use_counts: HashMap<String, u32> = HashMap::new();
        let mut final_answer: Option<String> = None;

        for iteration in 1..=self.bounded_iterations() {
            let prompt = self.build_prompt(query, &tools, &transcript);
            let response = self.llm.generate(&prompt).await;
            if !response.ok {
                break;
            }

            let cleaned = response.content.trim().trim_start_matches("```json").trim_start_matches("```").trim_end_matches("```");
            let Ok(action) = serde_json::from_str::<AgentAction>(cleaned.trim()) else {
                transcript.push(format!("Thought {iteration}: could not parse action, stopping"));
                break;
            };

            match action {
                AgentAction::FinalAnswer { final_answer: answer } => {
                    final_answer = Some(answer);
                    break;
                }
                AgentAction::UseTool { tool_name, parameters } => {
                    let uses = tool_use_counts.entry(tool_name.clone()).or_insert(0);
                    if *uses >= MAX_USES_PER_TOOL {
                        transcript.push(format!("Thought {iteration}: tool '{tool_name}' already used {MAX_USES_PER_TOOL} times, stopping"));
                        break;
                    }
                    *uses += 1;
                    let uses_now = *uses;

                    let Some(tool) = tools.iter().find(|t| t.name == tool_name) else {
                        transcript.push(format!("Observation {iteration}: unknown tool '{tool_name}'"));
                        continue;
                    };

                    let resolved = substitute_placeholders(&parameters, &step_results, &re);
                    self.observer.tool_selection(&tool.name, &resolved);
                    let outcome = self.supervisor.call_tool(&tool.server_id, &tool.name, resolved).await;
                    self.observer.tool_execution(&tool.name, &outcome);

                    let class = Self::classify_observation(&outcome);
                    let content = outcome.content().map(str::to_string).unwrap_or_default();
                    transcript.push(format!("Action {iteration}: {tool_name}\nObservation {iteration} [{class:?}]: {content}"));

                    step_counter += 1;
                    step_results.insert(step_counter, content);

                    if class == ObservationClass::UsefulData {
                        useful_observations += 1;
                    }

                    if useful_observations >= MAX_USEFUL_OBSERVATIONS && class == ObservationClass::UsefulData {
                        break;
                    }

                    if uses_now >= MAX_USES_PER_TOOL {
                        transcript.push(format!("Thought {iteration}: tool '{tool_name}' reached its use cap, stopping"));
                        break;
                    }
                }
            }
        }

        let answer = match final_answer {
            Some(answer) => answer,
            None => {
                let synthesis_prompt = format!("Transcript:\n{}\n\nSynthesize a final answer for: {query}", transcript.join("\n"));
                let response = self.llm.generate(&synthesis_prompt).await;
                if response.ok { response.content } else { error_answer("unable to synthesize a final answer") }
            }
        };

        self.observer.inference_complete(&answer);
        answer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::ScriptedProvider;
    use crate::llm::GenerateResponse;

    #[tokio::test]
    async fn final_answer_action_stops_the_loop() {
        let strategy = ReactStrategy::new(
            Arc::new(Supervisor::new(1000, 1000)),
            Arc::new(ScriptedProvider::new(vec![
                GenerateResponse::ok(r#"{"intent": "DIRECT_ANSWER", "reasoning": "r"}"#),
                GenerateResponse::ok(r#"{"action": "FINAL_ANSWER", "final_answer": "done"}"#),
            ])),
            HashMap::new(),
            Observer::new(),
        );

        let answer = strategy.process_query("q", &Vec::new()).await;
        assert_eq!(answer, "done");
    }

    #[tokio::test]
    async fn zero_max_iterations_returns_initial_answer() {
        let mut strategy = ReactStrategy::new(
            Arc::new(Supervisor::new(1000, 1000)),
            Arc::new(ScriptedProvider::new(vec![
                GenerateResponse::ok(r#"{"intent": "DIRECT_ANSWER", "reasoning": "r"}"#),
                GenerateResponse::ok("initial answer"),
            ])),
            HashMap::new(),
            Observer::new(),
        );
        strategy.max_iterations = 0;

        let answer = strategy.process_query("q", &Vec::new()).await;
        assert_eq!(answer, "initial answer");
    }
}
