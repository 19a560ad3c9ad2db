// src/supervisor/transport.rs
// Stdio transport for spawned tool-server processes (§6.1 framing).
//
// Grounded on backend/src/mcp/transport.rs's StdioTransport: same
// kill-on-drop child process, Mutex-guarded stdin/stdout halves, and a
// background task draining stderr for diagnostics only. The HTTP
// transport variant from the teacher is dropped — §6.1 is stdio-only.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{OrchestratorError, OrchestratorResult};

#[async_trait]
pub trait ToolServerTransport: Send + Sync {
    async fn send(&self, message: &str) -> OrchestratorResult<String>;
    async fn is_connected(&self) -> bool;
}

/// Probe a command's availability the way a POSIX shell would resolve it,
/// bounded to 3 seconds (§4.1 connection protocol step 1). A missing
/// command is not an error — callers treat `false` as "skip, not fatal".
pub async fn probe_command(command: &str) -> bool {
    let probe = Command::new("sh").arg("-c").arg(format!("command -v {command}")).output();

    matches!(
        tokio::time::timeout(Duration::from_secs(3), probe).await,
        Ok(Ok(output)) if output.status.success()
    )
}

pub struct StdioTransport {
    child: Mutex<Child>,
    stdin: Mutex<tokio::process::ChildStdin>,
    stdout: Mutex<BufReader<tokio::process::ChildStdout>>,
}

impl StdioTransport {
    pub async fn spawn(
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
    ) -> OrchestratorResult<Self> {
        let mut parts = command.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| OrchestratorError::config("empty command".to_string()))?;

        let mut cmd = Command::new(program);
        cmd.args(parts)
            .args(args)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);

        for (key, value) in env {
            cmd.env(key, value);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| OrchestratorError::transport(format!("spawn {command}: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| OrchestratorError::transport("missing child stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| OrchestratorError::transport("missing child stdout"))?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut reader = BufReader::new(stderr);
                let mut line = String::new();
                while let Ok(n) = reader.read_line(&mut line).await {
                    if n == 0 {
                        break;
                    }
                    debug!("[tool-server:stderr] {}", line.trim());
                    line.clear();
                }
            });
        }

        Ok(Self {
            child: Mutex::new(child),
            stdin: Mutex::new(stdin),
            stdout: Mutex::new(BufReader::new(stdout)),
        })
    }
}

#[async_trait]
impl ToolServerTransport for StdioTransport {
    async fn send(&self, message: &str) -> OrchestratorResult<String> {
        let mut stdin = self.stdin.lock().await;
        let mut stdout = self.stdout.lock().await;

        stdin
            .write_all(message.as_bytes())
            .await
            .map_err(|e| OrchestratorError::transport(format!("write: {e}")))?;
        stdin
            .write_all(b"\n")
            .await
            .map_err(|e| OrchestratorError::transport(format!("write newline: {e}")))?;
        stdin
            .flush()
            .await
            .map_err(|e| OrchestratorError::transport(format!("flush: {e}")))?;

        let mut response = String::new();
        let n = stdout
            .read_line(&mut response)
            .await
            .map_err(|e| OrchestratorError::transport(format!("read: {e}")))?;

        if n == 0 {
            return Err(OrchestratorError::transport("server closed connection"));
        }

        Ok(response.trim().to_string())
    }

    async fn is_connected(&self) -> bool {
        matches!(self.child.lock().await.try_wait(), Ok(None))
    }
}

impl Drop for StdioTransport {
    fn drop(&mut self) {
        debug!("[tool-server] dropping stdio transport, killing child process");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn probe_command_finds_a_real_binary() {
        assert!(probe_command("sh").await);
    }

    #[tokio::test]
    async fn probe_command_rejects_a_bogus_binary() {
        assert!(!probe_command("definitely-not-a-real-command-xyz").await);
    }

    #[tokio::test]
    async fn spawn_and_round_trip_echo_like_server() {
        let transport = StdioTransport::spawn("cat", &[], &HashMap::new()).await.unwrap();
        assert!(transport.is_connected().await);
        let reply = transport.send(r#"{"id":1,"method":"ping","params":{}}"#).await.unwrap();
        assert_eq!(reply, r#"{"id":1,"method":"ping","params":{}}"#);
    }
}
