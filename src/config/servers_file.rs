// src/config/servers_file.rs
// On-disk format for mcp/mcp.json (§6.2)

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{OrchestratorError, OrchestratorResult};

/// One entry under `mcpServers` in `mcp/mcp.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfigEntry {
    #[serde(default)]
    pub description: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub domain: Option<String>,
}

fn default_enabled() -> bool {
    true
}

/// Whole `mcp/mcp.json` document: `{"mcpServers": {"<id>": {...}}}`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServersFile {
    #[serde(default, rename = "mcpServers")]
    pub mcp_servers: HashMap<String, ServerConfigEntry>,
}

impl ServersFile {
    /// Load from disk, materializing the three canonical default servers
    /// (`time`, `weather`, `filesystem`) if the file is missing (§6.2).
    pub async fn load_or_default(path: &Path) -> OrchestratorResult<Self> {
        if !path.exists() {
            info!("[config] no server config at {:?}, using defaults", path);
            return Ok(Self::defaults());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| OrchestratorError::config(format!("reading {path:?}: {e}")))?;

        serde_json::from_str(&content)
            .map_err(|e| OrchestratorError::config(format!("parsing {path:?}: {e}")))
    }

    /// Best-effort variant used during reconciliation: a parse failure is
    /// logged and the prior in-memory config is kept rather than aborting.
    pub async fn reload_or_warn(path: &Path, previous: &Self) -> Self {
        match Self::load_or_default(path).await {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!("[config] failed to reload {:?}: {}", path, e);
                previous.clone()
            }
        }
    }

    pub fn defaults() -> Self {
        let mut mcp_servers = HashMap::new();
        mcp_servers.insert(
            "time".to_string(),
            ServerConfigEntry {
                description: "Current time and timezone conversions".to_string(),
                command: "mcp-server-time".to_string(),
                args: vec![],
                env: HashMap::new(),
                priority: 0,
                enabled: true,
                domain: Some("time".to_string()),
            },
        );
        mcp_servers.insert(
            "weather".to_string(),
            ServerConfigEntry {
                description: "Weather forecasts and conditions".to_string(),
                command: "mcp-server-weather".to_string(),
                args: vec![],
                env: HashMap::new(),
                priority: 0,
                enabled: true,
                domain: Some("weather".to_string()),
            },
        );
        mcp_servers.insert(
            "filesystem".to_string(),
            ServerConfigEntry {
                description: "Local filesystem read/write access".to_string(),
                command: "mcp-server-filesystem".to_string(),
                args: vec![],
                env: HashMap::new(),
                priority: 0,
                enabled: true,
                domain: Some("filesystem".to_string()),
            },
        );
        Self { mcp_servers }
    }
}
