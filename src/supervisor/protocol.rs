// src/supervisor/protocol.rs
// Wire format for the tool-server transport (§6.1): newline-delimited
// JSON-RPC-shaped requests/responses over a subprocess's stdio.
//
// Grounded on backend/src/mcp/protocol.rs's JsonRpcRequest/JsonRpcResponse
// and McpTool shapes, trimmed to the methods §6.1 actually consumes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    pub id: u64,
    pub method: String,
    pub params: Value,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Value) -> Self {
        Self {
            id,
            method: method.into(),
            params,
        }
    }

    pub fn initialize(id: u64) -> Self {
        Self::new(id, "initialize", serde_json::json!({}))
    }

    pub fn list_tools(id: u64) -> Self {
        Self::new(id, "listTools", serde_json::json!({}))
    }

    pub fn call_tool(id: u64, name: &str, arguments: Value) -> Self {
        Self::new(id, "callTool", serde_json::json!({ "name": name, "arguments": arguments }))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcError {
    pub message: String,
    #[serde(default)]
    pub code: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    pub id: u64,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

/// A single tool descriptor as returned by `listTools`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireTool {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "inputSchema")]
    pub input_schema: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListToolsResult {
    #[serde(default)]
    pub tools: Vec<WireTool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolContentBlock {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallToolResult {
    #[serde(default)]
    pub content: Vec<ToolContentBlock>,
    #[serde(default, rename = "isError")]
    pub is_error: bool,
}

/// Return the `text` field of the first non-empty text block, or the
/// documented sentinel when there is none (§6.1 "Content extraction").
pub fn extract_text_content(result: &CallToolResult) -> String {
    result
        .content
        .iter()
        .filter(|block| block.kind == "text")
        .find_map(|block| block.text.clone())
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| "No message found".to_string())
}
