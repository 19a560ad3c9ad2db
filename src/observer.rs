// src/observer.rs
// Optional callback bundle the host may supply (§6.4). Struct of boxed
// closures rather than a trait object, matching the "struct of function
// pointers" shape the design notes call for — no inheritance, every
// callback defaults to a no-op when the host doesn't care.

use std::sync::Arc;

use crate::discovery::ToolExecutionResult;

type InferenceStartFn = dyn Fn(&str, &str) + Send + Sync;
type ThoughtFn = dyn Fn(&str) + Send + Sync;
type ToolDiscoveryFn = dyn Fn(&[String]) + Send + Sync;
type ToolSelectionFn = dyn Fn(&str, &serde_json::Value) + Send + Sync;
type ToolExecutionFn = dyn Fn(&str, &ToolExecutionResult) + Send + Sync;
type PartialResponseFn = dyn Fn(&str) + Send + Sync;
type InferenceCompleteFn = dyn Fn(&str) + Send + Sync;
type ErrorFn = dyn Fn(&str, Option<&str>) + Send + Sync;

/// Passive callback bundle. Every field is optional; a missing callback
/// is simply never invoked (§6.4: "Missing observer ⇒ no-op").
#[derive(Clone, Default)]
pub struct Observer {
    pub on_inference_start: Option<Arc<InferenceStartFn>>,
    pub on_thought: Option<Arc<ThoughtFn>>,
    pub on_tool_discovery: Option<Arc<ToolDiscoveryFn>>,
    pub on_tool_selection: Option<Arc<ToolSelectionFn>>,
    pub on_tool_execution: Option<Arc<ToolExecutionFn>>,
    pub on_partial_response: Option<Arc<PartialResponseFn>>,
    pub on_inference_complete: Option<Arc<InferenceCompleteFn>>,
    pub on_error: Option<Arc<ErrorFn>>,
}

impl Observer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inference_start(&self, query: &str, strategy: &str) {
        if let Some(cb) = &self.on_inference_start {
            cb(query, strategy);
        }
    }

    pub fn thought(&self, text: &str) {
        if let Some(cb) = &self.on_thought {
            cb(text);
        }
    }

    pub fn tool_discovery(&self, names: &[String]) {
        if let Some(cb) = &self.on_tool_discovery {
            cb(names);
        }
    }

    pub fn tool_selection(&self, name: &str, args: &serde_json::Value) {
        if let Some(cb) = &self.on_tool_selection {
            cb(name, args);
        }
    }

    pub fn tool_execution(&self, name: &str, result: &ToolExecutionResult) {
        if let Some(cb) = &self.on_tool_execution {
            cb(name, result);
        }
    }

    pub fn partial_response(&self, text: &str) {
        if let Some(cb) = &self.on_partial_response {
            cb(text);
        }
    }

    pub fn inference_complete(&self, text: &str) {
        if let Some(cb) = &self.on_inference_complete {
            cb(text);
        }
    }

    pub fn error(&self, message: &str, cause: Option<&str>) {
        if let Some(cb) = &self.on_error {
            cb(message, cause);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn missing_callbacks_are_silent_no_ops() {
        let observer = Observer::new();
        observer.inference_start("q", "direct");
        observer.thought("thinking");
        observer.error("boom", None);
    }

    #[test]
    fn registered_callback_is_invoked() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let observer = Observer {
            on_thought: Some(Arc::new(move |_text| {
                counter.fetch_add(1, Ordering::SeqCst);
            })),
            ..Observer::new()
        };

        observer.thought("first");
        observer.thought("second");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
