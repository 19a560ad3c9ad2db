// src/llm/mod.rs
// The injected LLM capability (spec §9: "LLM as an injected capability").
//
// The core never depends on a concrete provider — callers supply anything
// implementing `LlmProvider` and the discovery pipeline / strategies drive
// it through the single `generate` contract.

pub mod cache;
pub mod mock;

use async_trait::async_trait;

/// Outcome of one `generate` call.
#[derive(Debug, Clone)]
pub struct GenerateResponse {
    pub content: String,
    pub ok: bool,
    pub error: Option<String>,
}

impl GenerateResponse {
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ok: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            content: String::new(),
            ok: false,
            error: Some(error.into()),
        }
    }
}

/// Abstract LLM backend. Providers (cloud chat APIs, local models, test
/// doubles) implement this; the core consumes only this trait.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn generate(&self, prompt: &str) -> GenerateResponse;
}
