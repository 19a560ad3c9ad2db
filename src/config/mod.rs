// src/config/mod.rs
// Runtime configuration: §6.3 knobs plus the on-disk §6.2 file formats.

pub mod domains_file;
pub mod helpers;
pub mod rules_file;
pub mod servers_file;

use std::path::{Path, PathBuf};

pub use domains_file::{DomainConfigEntry, DomainsFile};
pub use rules_file::{ParameterReplaceConfig, RuleActionsConfig, RuleFile, RuleItemConfig};
pub use servers_file::{ServerConfigEntry, ServersFile};

/// Recognized runtime knobs (§6.3). `llm.provider` itself is consumed by
/// the host's adapter selection, not by the core, so only its name is kept
/// here for observability.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub llm_provider: String,
    pub refresh_interval_ms: u64,
    pub connection_timeout_ms: u64,
    pub call_timeout_ms: u64,
    pub rules_enabled: bool,
    pub debug: bool,
    pub config_root: PathBuf,
}

impl RuntimeConfig {
    /// Minimum allowed reconciliation period (§6.3: "≥ 1000").
    pub const MIN_REFRESH_INTERVAL_MS: u64 = 1000;

    pub fn from_env(config_root: impl Into<PathBuf>) -> Self {
        let refresh_interval_ms =
            helpers::env_u64("MCP_REFRESH_INTERVAL_MS", 5 * 60 * 1000).max(Self::MIN_REFRESH_INTERVAL_MS);

        Self {
            llm_provider: helpers::env_or("LLM_PROVIDER", "default"),
            refresh_interval_ms,
            connection_timeout_ms: helpers::env_u64("MCP_CONNECTION_TIMEOUT_MS", 15_000),
            call_timeout_ms: helpers::env_u64("MCP_CALL_TIMEOUT_MS", 15_000),
            rules_enabled: helpers::env_bool("MCP_RULES_ENABLED", true),
            debug: helpers::env_bool("DEBUG", false),
            config_root: config_root.into(),
        }
    }

    pub fn mcp_config_path(&self) -> PathBuf {
        self.config_root.join("mcp").join("mcp.json")
    }

    pub fn domains_config_path(&self) -> PathBuf {
        self.config_root.join("mcp").join("domains.json")
    }

    pub fn rules_dir(&self) -> PathBuf {
        self.config_root.join("config").join("rules")
    }

    pub fn rule_path(&self, server_name: &str) -> PathBuf {
        self.rules_dir().join(format!("{server_name}.json"))
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::from_env(default_config_root())
    }
}

fn default_config_root() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".orchestrator"))
        .unwrap_or_else(|| Path::new(".orchestrator").to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_interval_floor_is_enforced() {
        std::env::set_var("MCP_REFRESH_INTERVAL_MS", "10");
        let cfg = RuntimeConfig::from_env(".");
        assert_eq!(cfg.refresh_interval_ms, RuntimeConfig::MIN_REFRESH_INTERVAL_MS);
        std::env::remove_var("MCP_REFRESH_INTERVAL_MS");
    }

    #[test]
    fn defaults_are_sane() {
        let cfg = RuntimeConfig::from_env("/tmp/example-root");
        assert_eq!(cfg.connection_timeout_ms, 15_000);
        assert_eq!(cfg.call_timeout_ms, 15_000);
        assert!(cfg.rules_enabled);
        assert_eq!(cfg.mcp_config_path(), Path::new("/tmp/example-root/mcp/mcp.json"));
    }
}
