// src/config/rules_file.rs
// On-disk format for config/rules/<serverName>.json (§6.2)

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{OrchestratorError, OrchestratorResult};

/// A single pattern-replacement pair for the `parameter_replace` action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterReplaceConfig {
    pub pattern: String,
    pub replacement: String,
}

/// The only two recognized rule actions (§3 `Rule`).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RuleActionsConfig {
    #[serde(default)]
    pub context_add: Option<String>,
    #[serde(default)]
    pub parameter_replace: std::collections::HashMap<String, ParameterReplaceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleItemConfig {
    pub name: String,
    #[serde(default)]
    pub triggers: Vec<String>,
    #[serde(default, rename = "contentKeywords")]
    pub content_keywords: Vec<String>,
    #[serde(default)]
    pub rules: RuleActionsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleFile {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub items: Vec<RuleItemConfig>,
}

impl RuleFile {
    /// Load a single server's rule file. Returns `Ok(None)` (not an error)
    /// when the file simply doesn't exist — most servers have no rules.
    pub async fn load_optional(path: &Path) -> OrchestratorResult<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| OrchestratorError::config(format!("reading {path:?}: {e}")))?;

        let parsed = serde_json::from_str(&content)
            .map_err(|e| OrchestratorError::config(format!("parsing {path:?}: {e}")))?;

        Ok(Some(parsed))
    }
}
