// src/config/domains_file.rs
// On-disk format for mcp/domains.json (§6.2)

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{OrchestratorError, OrchestratorResult};

/// One entry in `mcp/domains.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainConfigEntry {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(default, rename = "semanticKeywords")]
    pub semantic_keywords: Vec<String>,
}

/// Whole `mcp/domains.json` document: `{"<name>": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DomainsFile {
    #[serde(flatten)]
    pub domains: HashMap<String, DomainConfigEntry>,
}

impl DomainsFile {
    pub async fn load_or_default(path: &Path) -> OrchestratorResult<Self> {
        if !path.exists() {
            info!("[config] no domains config at {:?}, using defaults", path);
            return Ok(Self::defaults());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| OrchestratorError::config(format!("reading {path:?}: {e}")))?;

        serde_json::from_str(&content)
            .map_err(|e| OrchestratorError::config(format!("parsing {path:?}: {e}")))
    }

    pub fn defaults() -> Self {
        let mut map = HashMap::new();
        map.insert(
            "time".to_string(),
            DomainConfigEntry {
                name: "time".to_string(),
                description: "Current time, timezones, clocks".to_string(),
                patterns: vec!["time".into(), "timezone".into(), "clock".into(), "utc".into()],
                semantic_keywords: vec!["hour".into(), "when".into(), "schedule".into()],
            },
        );
        map.insert(
            "weather".to_string(),
            DomainConfigEntry {
                name: "weather".to_string(),
                description: "Weather forecasts and current conditions".to_string(),
                patterns: vec!["weather".into(), "forecast".into(), "temperature".into(), "rain".into()],
                semantic_keywords: vec!["hot".into(), "cold".into(), "storm".into(), "climate".into()],
            },
        );
        map.insert(
            "filesystem".to_string(),
            DomainConfigEntry {
                name: "filesystem".to_string(),
                description: "Reading, writing, and listing local files".to_string(),
                patterns: vec!["file".into(), "folder".into(), "directory".into(), "save".into()],
                semantic_keywords: vec!["write".into(), "read".into(), "path".into(), "disk".into()],
            },
        );
        Self { domains: map }
    }

    pub fn into_inner(self) -> HashMap<String, DomainConfigEntry> {
        self.domains
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_contain_canonical_domains() {
        let domains = DomainsFile::defaults();
        assert!(domains.domains.contains_key("time"));
        assert!(domains.domains.contains_key("weather"));
        assert!(domains.domains.contains_key("filesystem"));
    }

    #[test]
    fn parses_documented_shape() {
        let json = r#"{"custom": {"name": "custom", "description": "d",
            "patterns": ["p1"], "semanticKeywords": ["k1", "k2"]}}"#;
        let parsed: DomainsFile = serde_json::from_str(json).unwrap();
        let entry = &parsed.domains["custom"];
        assert_eq!(entry.patterns, vec!["p1".to_string()]);
        assert_eq!(entry.semantic_keywords.len(), 2);
    }
}
