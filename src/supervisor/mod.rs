// src/supervisor/mod.rs
// Tool-Server Supervisor (§4.1): owns every subprocess, maintains the
// canonical server/tool registry, executes tool calls with retry
// semantics, and periodically heals the fleet.
//
// Grounded on backend/src/mcp/mod.rs's McpManager/McpServer: the
// connect/listTools/callTool flow and the reconciliation loop shape are
// carried over; the sqlx-backed persistence and HTTP transport are
// dropped (§6.1 is stdio-only, and the registry here is purely in-memory).

pub mod health;
pub mod protocol;
pub mod transport;
pub mod validation;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::ServerConfigEntry;
use crate::error::OrchestratorResult;
use health::ServerHealth;
use protocol::{extract_text_content, CallToolResult, JsonRpcRequest, JsonRpcResponse, ListToolsResult};
use transport::{probe_command, StdioTransport, ToolServerTransport};
use validation::{normalize_args, validate_args, ToolSchema};

pub const MAX_CALL_ATTEMPTS: u32 = 2;
pub const MAX_RECONNECTS_PER_CYCLE: u32 = 2;

/// Liveness state for one tool server (§4.1 state machine).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Disconnected,
    Connecting,
    Connected,
    Unhealthy,
}

/// A callable unit exposed by one tool server (§3 `Tool`).
#[derive(Debug, Clone)]
pub struct Tool {
    pub name: String,
    pub description: String,
    pub server_id: String,
    pub domain: Option<String>,
    pub schema: ToolSchema,
}

/// Outcome of one `callTool` invocation (§3 `ToolExecutionResult`).
#[derive(Debug, Clone)]
pub enum ToolExecutionResult {
    Success { tool: Tool, content: String, message: String },
    Error { message: String, cause: Option<String> },
}

impl ToolExecutionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ToolExecutionResult::Success { .. })
    }

    pub fn content(&self) -> Option<&str> {
        match self {
            ToolExecutionResult::Success { content, .. } => Some(content),
            ToolExecutionResult::Error { .. } => None,
        }
    }
}

struct ServerRecord {
    id: String,
    config: ServerConfigEntry,
    state: ServerState,
    transport: Option<Arc<dyn ToolServerTransport>>,
    tools: Vec<Tool>,
    health: ServerHealth,
}

/// Owns the fleet of tool-server subprocesses and the in-memory registry
/// of their tools.
pub struct Supervisor {
    servers: RwLock<HashMap<String, ServerRecord>>,
    connection_timeout: Duration,
    call_timeout: Duration,
    request_id: AtomicU64,
}

impl Supervisor {
    pub fn new(connection_timeout_ms: u64, call_timeout_ms: u64) -> Self {
        Self {
            servers: RwLock::new(HashMap::new()),
            connection_timeout: Duration::from_millis(connection_timeout_ms),
            call_timeout: Duration::from_millis(call_timeout_ms),
            request_id: AtomicU64::new(1),
        }
    }

    fn next_request_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Connect one server per the §4.1 connection protocol. A failed
    /// connection is local: it never aborts fleet initialization.
    pub async fn connect_server(&self, id: &str, cfg: ServerConfigEntry) -> bool {
        if !probe_command(first_word(&cfg.command)).await {
            info!("[supervisor] command not found for server '{id}', skipping");
            self.servers.write().await.insert(
                id.to_string(),
                ServerRecord {
                    id: id.to_string(),
                    config: cfg,
                    state: ServerState::Disconnected,
                    transport: None,
                    tools: Vec::new(),
                    health: ServerHealth::default(),
                },
            );
            return false;
        }

        self.set_or_insert_state(id, &cfg, ServerState::Connecting).await;

        let connect_attempt = async {
            let transport = StdioTransport::spawn(&cfg.command, &cfg.args, &cfg.env).await?;
            let init_id = self.next_request_id();
            transport.send(&serde_json::to_string(&JsonRpcRequest::initialize(init_id))?).await?;

            let list_id = self.next_request_id();
            let raw = transport.send(&serde_json::to_string(&JsonRpcRequest::list_tools(list_id))?).await?;
            let envelope: JsonRpcResponse = serde_json::from_str(&raw)
                .map_err(crate::error::OrchestratorError::from)?;
            if let Some(err) = envelope.error {
                return Err(crate::error::OrchestratorError::protocol(err.message));
            }
            let result = envelope
                .result
                .ok_or_else(|| crate::error::OrchestratorError::protocol("listTools response missing result"))?;
            let parsed: ListToolsResult =
                serde_json::from_value(result).map_err(crate::error::OrchestratorError::from)?;

            OrchestratorResult::Ok((transport, parsed))
        };

        match tokio::time::timeout(self.connection_timeout, connect_attempt).await {
            Ok(Ok((transport, listed))) => {
                let tools = listed
                    .tools
                    .into_iter()
                    .map(|wire| Tool {
                        name: wire.name,
                        description: wire.description,
                        server_id: id.to_string(),
                        domain: cfg.domain.clone(),
                        schema: ToolSchema::from_wire(&wire.input_schema),
                    })
                    .collect::<Vec<_>>();

                let mut servers = self.servers.write().await;
                let mut health = ServerHealth::default();
                health.record_heartbeat();
                servers.insert(
                    id.to_string(),
                    ServerRecord {
                        id: id.to_string(),
                        config: cfg,
                        state: ServerState::Connected,
                        transport: Some(Arc::new(transport)),
                        tools,
                        health,
                    },
                );
                info!("[supervisor] connected server '{id}'");
                true
            }
            Ok(Err(e)) => {
                warn!("[supervisor] handshake failed for '{id}': {e}");
                self.set_or_insert_state(id, &cfg, ServerState::Disconnected).await;
                false
            }
            Err(_) => {
                warn!("[supervisor] handshake timed out for '{id}'");
                self.set_or_insert_state(id, &cfg, ServerState::Disconnected).await;
                false
            }
        }
    }

    async fn set_or_insert_state(&self, id: &str, cfg: &ServerConfigEntry, state: ServerState) {
        let mut servers = self.servers.write().await;
        servers
            .entry(id.to_string())
            .and_modify(|record| record.state = state)
            .or_insert_with(|| ServerRecord {
                id: id.to_string(),
                config: cfg.clone(),
                state,
                transport: None,
                tools: Vec::new(),
                health: ServerHealth::default(),
            });
    }

    /// Tolerates an unknown id (§4.1 contract).
    pub async fn disconnect_server(&self, id: &str) {
        let mut servers = self.servers.write().await;
        if let Some(record) = servers.get_mut(id) {
            record.transport = None;
            record.tools.clear();
            record.state = ServerState::Disconnected;
        }
    }

    pub async fn call_tool(&self, server_id: &str, tool_name: &str, args: Value) -> ToolExecutionResult {
        let (transport, tool) = {
            let servers = self.servers.read().await;
            let record = match servers.get(server_id) {
                Some(r) => r,
                None => {
                    return ToolExecutionResult::Error {
                        message: format!("unknown server '{server_id}'"),
                        cause: None,
                    }
                }
            };

            if record.state != ServerState::Connected {
                return ToolExecutionResult::Error {
                    message: format!("server '{server_id}' is not connected"),
                    cause: None,
                };
            }

            let tool = match record.tools.iter().find(|t| t.name == tool_name) {
                Some(t) => t.clone(),
                None => {
                    return ToolExecutionResult::Error {
                        message: format!("unknown tool '{tool_name}' on server '{server_id}'"),
                        cause: None,
                    }
                }
            };

            let transport = match &record.transport {
                Some(t) => t.clone(),
                None => {
                    return ToolExecutionResult::Error {
                        message: format!("server '{server_id}' has no live transport"),
                        cause: None,
                    }
                }
            };

            (transport, tool)
        };

        let problems = validate_args(&tool.schema, &args);
        if !problems.is_empty() {
            return ToolExecutionResult::Error { message: problems.join("; "), cause: None };
        }
        let args = normalize_args(&tool.schema, &args);

        let mut last_error = String::new();
        for attempt in 1..=MAX_CALL_ATTEMPTS {
            if attempt > 1 {
                tokio::time::sleep(Duration::from_secs((attempt - 1) as u64)).await;
            }

            match self.attempt_call(transport.as_ref(), &tool, &args).await {
                Ok(result) => {
                    self.record_call_outcome(server_id, true).await;
                    return result;
                }
                Err(e) => {
                    last_error = e;
                }
            }
        }

        self.record_call_outcome(server_id, false).await;
        ToolExecutionResult::Error {
            message: format!("tool '{tool_name}' on server '{server_id}' failed after {MAX_CALL_ATTEMPTS} attempts: {last_error}"),
            cause: Some(last_error),
        }
    }

    async fn attempt_call(
        &self,
        transport: &dyn ToolServerTransport,
        tool: &Tool,
        args: &Value,
    ) -> Result<ToolExecutionResult, String> {
        let id = self.next_request_id();
        let request = serde_json::to_string(&JsonRpcRequest::call_tool(id, &tool.name, args.clone()))
            .map_err(|e| e.to_string())?;

        let raw = tokio::time::timeout(self.call_timeout, transport.send(&request))
            .await
            .map_err(|_| "request timed out".to_string())?
            .map_err(|e| e.to_string())?;

        let envelope: JsonRpcResponse = serde_json::from_str(&raw).map_err(|e| e.to_string())?;
        if let Some(err) = envelope.error {
            return Err(err.message);
        }
        let result = envelope.result.ok_or_else(|| "callTool response missing result".to_string())?;
        let parsed: CallToolResult = serde_json::from_value(result).map_err(|e| e.to_string())?;

        if parsed.is_error {
            let message = extract_text_content(&parsed);
            return Err(message);
        }

        let content = extract_text_content(&parsed);
        Ok(ToolExecutionResult::Success {
            tool: tool.clone(),
            message: content.clone(),
            content,
        })
    }

    async fn record_call_outcome(&self, server_id: &str, success: bool) {
        let mut servers = self.servers.write().await;
        if let Some(record) = servers.get_mut(server_id) {
            if success {
                record.health.record_success();
                record.state = ServerState::Connected;
            } else {
                record.health.record_failure();
                // A call only reaches here after exhausting MAX_CALL_ATTEMPTS,
                // so one recorded failure already means the retry budget for
                // this request is spent — mark the server unhealthy now
                // rather than waiting for further consecutive failures.
                record.state = ServerState::Unhealthy;
            }
        }
    }

    /// Every tool belonging to a currently connected server (§8 invariant 1).
    pub async fn get_all_available_tools(&self) -> Vec<Tool> {
        self.servers
            .read()
            .await
            .values()
            .filter(|record| record.state == ServerState::Connected)
            .flat_map(|record| record.tools.clone())
            .collect()
    }

    /// Label every tool of `server_id` with `domain_name` (§4.2.3: a
    /// server whose tools carry no domain hint gets one assigned after
    /// auto-discovery names it).
    pub async fn assign_domain(&self, server_id: &str, domain_name: &str) {
        if let Some(record) = self.servers.write().await.get_mut(server_id) {
            for tool in &mut record.tools {
                tool.domain = Some(domain_name.to_string());
            }
        }
    }

    pub async fn server_count(&self) -> usize {
        self.servers.read().await.len()
    }

    pub async fn last_heartbeat(&self, server_id: &str) -> Option<DateTime<Utc>> {
        self.servers.read().await.get(server_id).and_then(|r| r.health.last_heartbeat)
    }

    /// Reconciliation loop body (§4.1): connect newly configured servers,
    /// reconnect stale ones, capped to `MAX_RECONNECTS_PER_CYCLE` (§8
    /// invariant 5).
    pub async fn refresh_connections(&self, desired: &HashMap<String, ServerConfigEntry>) {
        let mut reconnect_budget = MAX_RECONNECTS_PER_CYCLE;

        let to_connect: Vec<(String, ServerConfigEntry)> = {
            let servers = self.servers.read().await;
            desired
                .iter()
                .filter(|(id, _)| !servers.contains_key(id.as_str()))
                .map(|(id, cfg)| (id.clone(), cfg.clone()))
                .collect()
        };

        for (id, cfg) in to_connect {
            if !cfg.enabled {
                continue;
            }
            self.connect_server(&id, cfg).await;
        }

        let stale: Vec<(String, ServerConfigEntry)> = {
            let servers = self.servers.read().await;
            servers
                .values()
                .filter(|record| {
                    (record.state == ServerState::Connected || record.state == ServerState::Unhealthy)
                        && record.health.is_stale()
                })
                .map(|record| (record.id.clone(), record.config.clone()))
                .collect()
        };

        for (id, cfg) in stale {
            if reconnect_budget == 0 {
                debug!("[supervisor] reconnect budget exhausted this cycle");
                break;
            }
            reconnect_budget -= 1;
            self.disconnect_server(&id).await;
            self.connect_server(&id, cfg).await;
        }
    }

    /// Releases every child process, regardless of exit path (§5 resource discipline).
    pub async fn close(&self) {
        let mut servers = self.servers.write().await;
        for record in servers.values_mut() {
            record.transport = None;
            record.state = ServerState::Disconnected;
        }
    }
}

fn first_word(command: &str) -> &str {
    command.split_whitespace().next().unwrap_or(command)
}
