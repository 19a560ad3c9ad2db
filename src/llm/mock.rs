// src/llm/mock.rs
// Test doubles for LlmProvider, in the idiom of the teacher's own
// provider structs (a plain struct implementing the provider trait).

use async_trait::async_trait;
use std::collections::VecDeque;
use tokio::sync::Mutex;

use super::{GenerateResponse, LlmProvider};

/// Echoes the prompt back as the response. Useful for smoke tests that
/// only care whether a call happened, not its content.
pub struct EchoProvider;

#[async_trait]
impl LlmProvider for EchoProvider {
    async fn generate(&self, prompt: &str) -> GenerateResponse {
        GenerateResponse::ok(prompt.to_string())
    }
}

/// Always fails, for exercising LLM-unavailable fallback paths.
pub struct FailingProvider {
    pub message: String,
}

#[async_trait]
impl LlmProvider for FailingProvider {
    async fn generate(&self, _prompt: &str) -> GenerateResponse {
        GenerateResponse::failed(self.message.clone())
    }
}

/// Replays a fixed sequence of responses in order, one per call. Panics if
/// exhausted — tests should provide exactly the number of responses they
/// expect to consume.
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<GenerateResponse>>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<GenerateResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
        }
    }

    pub fn ok_sequence(contents: Vec<&str>) -> Self {
        Self::new(contents.into_iter().map(GenerateResponse::ok).collect())
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn generate(&self, _prompt: &str) -> GenerateResponse {
        let mut queue = self.responses.lock().await;
        queue
            .pop_front()
            .unwrap_or_else(|| GenerateResponse::failed("ScriptedProvider exhausted"))
    }
}
