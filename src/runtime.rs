// src/runtime.rs
// Top-level facade wiring config, the Tool-Server Supervisor, the
// discovery pipeline's rule/domain state, and the inference strategies
// into one entry point (§2 system overview).

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config::{RuleFile, RuntimeConfig, ServersFile};
use crate::discovery::cache::ToolSelectionCache;
use crate::discovery::rule_engine::Rule;
use crate::discovery::{auto_discovery, Domain};
use crate::error::OrchestratorResult;
use crate::llm::LlmProvider;
use crate::observer::Observer;
use crate::strategy::{Context, DirectStrategy, ReactStrategy, ReflectionStrategy, Strategy};
use crate::supervisor::Supervisor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    Direct,
    React,
    Reflection,
}

pub struct Runtime {
    config: RuntimeConfig,
    supervisor: Arc<Supervisor>,
    domains: RwLock<Vec<Domain>>,
    rules: RwLock<HashMap<String, Rule>>,
    servers_file: RwLock<ServersFile>,
    llm: Arc<dyn LlmProvider>,
    observer: Observer,
    tool_cache: Arc<ToolSelectionCache>,
}

impl Runtime {
    /// Load persisted configuration (§6.2), connect the fleet, and
    /// return a ready-to-use runtime. A server that fails to connect
    /// never aborts bootstrap (§4.1 "failure model is local").
    pub async fn bootstrap(
        config: RuntimeConfig,
        llm: Arc<dyn LlmProvider>,
        observer: Observer,
    ) -> OrchestratorResult<Self> {
        let servers_file = ServersFile::load_or_default(&config.mcp_config_path()).await?;
        let domains_file = crate::config::DomainsFile::load_or_default(&config.domains_config_path()).await?;
        let domains: Vec<Domain> = domains_file.into_inner().into_values().map(Domain::from).collect();

        let supervisor = Arc::new(Supervisor::new(config.connection_timeout_ms, config.call_timeout_ms));

        let mut rules = HashMap::new();
        if config.rules_enabled {
            for id in servers_file.mcp_servers.keys() {
                let rule_path = config.rule_path(id);
                if let Some(rule_file) = RuleFile::load_optional(&rule_path).await? {
                    rules.insert(id.clone(), Rule::from((id.clone(), rule_file)));
                }
            }
        }

        for (id, cfg) in servers_file.mcp_servers.clone() {
            if !cfg.enabled {
                continue;
            }
            let connected = supervisor.connect_server(&id, cfg).await;
            if !connected {
                warn!("[runtime] server '{id}' did not connect during bootstrap");
            }
        }

        info!("[runtime] bootstrap complete: {} servers configured", supervisor.server_count().await);

        let runtime = Self {
            config,
            supervisor,
            domains: RwLock::new(domains),
            rules: RwLock::new(rules),
            servers_file: RwLock::new(servers_file),
            llm,
            observer,
            tool_cache: Arc::new(ToolSelectionCache::new()),
        };
        runtime.discover_orphan_domains().await;
        Ok(runtime)
    }

    /// Name a domain for every connected server whose tools carry no
    /// domain hint, and register it so the Domain Filter can route to it
    /// (§4.2.3). Idempotent: a server already labeled is skipped.
    async fn discover_orphan_domains(&self) {
        let tools = self.supervisor.get_all_available_tools().await;
        let mut orphans_by_server: HashMap<String, Vec<crate::supervisor::Tool>> = HashMap::new();
        for tool in tools.into_iter().filter(|t| t.domain.is_none()) {
            orphans_by_server.entry(tool.server_id.clone()).or_default().push(tool);
        }
        if orphans_by_server.is_empty() {
            return;
        }

        let mut domains = self.domains.write().await;
        let mut existing_names: std::collections::HashSet<String> = domains.iter().map(|d| d.name.clone()).collect();

        for (server_id, orphan_tools) in orphans_by_server {
            let name = auto_discovery::discover_domain_name(self.llm.as_ref(), &orphan_tools, &existing_names).await;
            self.supervisor.assign_domain(&server_id, &name).await;
            info!("[runtime] auto-discovered domain '{name}' for server '{server_id}'");

            domains.push(Domain {
                name: name.clone(),
                description: format!("auto-discovered domain for server '{server_id}'"),
                patterns: orphan_tools.iter().map(|t| t.name.clone()).collect(),
                semantic_keywords: Vec::new(),
            });
            existing_names.insert(name);
        }
    }

    pub fn supervisor(&self) -> &Arc<Supervisor> {
        &self.supervisor
    }

    pub async fn domains(&self) -> Vec<Domain> {
        self.domains.read().await.clone()
    }

    /// Reconciliation tick (§4.1, §5): reload server config best-effort,
    /// then connect/reconnect per the supervisor's own cadence and caps.
    pub async fn refresh(&self) {
        let previous = self.servers_file.read().await.clone();
        let reloaded = ServersFile::reload_or_warn(&self.config.mcp_config_path(), &previous).await;
        self.supervisor.refresh_connections(&reloaded.mcp_servers).await;
        *self.servers_file.write().await = reloaded;
        self.discover_orphan_domains().await;
    }

    /// Run the reconciliation worker on `refresh.interval` until `token`
    /// is cancelled (§5 "a reconciliation worker firing on a fixed interval").
    pub async fn run_reconciliation_loop(self: &Arc<Self>, token: tokio_util::sync::CancellationToken) {
        let mut interval = tokio::time::interval(std::time::Duration::from_millis(self.config.refresh_interval_ms));
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = interval.tick() => self.refresh().await,
            }
        }
    }

    pub async fn process_query(&self, strategy: StrategyKind, query: &str, context: &Context) -> String {
        let rules = self.rules.read().await.clone();
        let domains = self.domains.read().await.clone();
        match strategy {
            StrategyKind::Direct => {
                let strategy = DirectStrategy {
                    supervisor: self.supervisor.clone(),
                    llm: self.llm.clone(),
                    rules,
                    domains,
                    cache: self.tool_cache.clone(),
                    cache_options_hash: self.config.llm_provider.clone(),
                    observer: self.observer.clone(),
                };
                strategy.process_query(query, context).await
            }
            StrategyKind::React => {
                let strategy = ReactStrategy::new(self.supervisor.clone(), self.llm.clone(), rules, self.observer.clone())
                    .with_domains(domains);
                strategy.process_query(query, context).await
            }
            StrategyKind::Reflection => {
                let strategy = ReflectionStrategy::new(self.supervisor.clone(), self.llm.clone(), rules, self.observer.clone())
                    .with_domains(domains)
                    .with_cache(self.tool_cache.clone(), self.config.llm_provider.clone());
                strategy.process_query(query, context).await
            }
        }
    }

    /// Release every child process, then stop (§5 "Supervisor shutdown").
    pub async fn close(&self) {
        self.supervisor.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::EchoProvider;

    #[tokio::test]
    async fn bootstrap_with_missing_config_uses_defaults() {
        let config = RuntimeConfig::from_env(std::env::temp_dir().join("orchestrator-test-missing"));
        let runtime = Runtime::bootstrap(config, Arc::new(EchoProvider), Observer::new()).await.unwrap();
        assert_eq!(runtime.domains().await.len(), 3);
    }

    #[tokio::test]
    async fn direct_strategy_handles_a_plain_query() {
        let config = RuntimeConfig::from_env(std::env::temp_dir().join("orchestrator-test-direct"));
        let runtime = Runtime::bootstrap(config, Arc::new(EchoProvider), Observer::new()).await.unwrap();
        let answer = runtime.process_query(StrategyKind::Direct, "hello", &Vec::new()).await;
        assert!(!answer.is_empty());
    }
}
