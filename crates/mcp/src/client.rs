//! Stdio JSON-RPC 2.0 client for one MCP server.
//!
//! Messages are line-delimited JSON over the child's stdin/stdout. The
//! handshake is `initialize` → `notifications/initialized` → `tools/list`.

use kaio_core::error::McpError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, warn};

const PROTOCOL_VERSION: &str = "2024-11-05";

/// A tool advertised by an MCP server.
#[derive(Debug, Clone)]
pub struct McpToolInfo {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest {
    jsonrpc: &'static str,
    id: u64,
    method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

struct Transport {
    _child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

/// One connected MCP server.
pub struct McpClient {
    server_name: String,
    transport: Mutex<Transport>,
    request_id: AtomicU64,
}

impl std::fmt::Debug for McpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpClient")
            .field("server_name", &self.server_name)
            .finish_non_exhaustive()
    }
}

impl McpClient {
    /// Spawn the server process and run the initialization handshake.
    pub async fn connect(
        server_name: &str,
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
    ) -> Result<Self, McpError> {
        let spawn_err = |reason: String| McpError::Spawn {
            server: server_name.to_string(),
            reason,
        };

        let mut cmd = Command::new(command);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        for (key, value) in env {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn().map_err(|e| spawn_err(e.to_string()))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| spawn_err("failed to capture stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| spawn_err("failed to capture stdout".into()))?;

        let client = Self {
            server_name: server_name.to_string(),
            transport: Mutex::new(Transport {
                _child: child,
                stdin,
                stdout: BufReader::new(stdout),
            }),
            request_id: AtomicU64::new(1),
        };

        client.initialize().await?;
        Ok(client)
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    async fn initialize(&self) -> Result<(), McpError> {
        let result = self
            .request(
                "initialize",
                Some(serde_json::json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {
                        "name": "kaio",
                        "version": env!("CARGO_PKG_VERSION")
                    }
                })),
            )
            .await?;

        debug!(
            server = %self.server_name,
            protocol = result["protocolVersion"].as_str().unwrap_or("unknown"),
            "MCP server initialized"
        );

        // Notification: no id, no response.
        let notification = serde_json::json!({
            "jsonrpc": "2.0",
            "method": "notifications/initialized",
            "params": {}
        });
        let mut transport = self.transport.lock().await;
        Self::write_line(&mut transport.stdin, &notification, &self.server_name).await
    }

    /// List the tools the server advertises.
    pub async fn list_tools(&self) -> Result<Vec<McpToolInfo>, McpError> {
        let result = self.request("tools/list", None).await?;

        let tools = result["tools"]
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|t| {
                        let name = t["name"].as_str()?;
                        Some(McpToolInfo {
                            name: name.to_string(),
                            description: t["description"].as_str().unwrap_or("").to_string(),
                            input_schema: t
                                .get("inputSchema")
                                .cloned()
                                .unwrap_or_else(|| serde_json::json!({"type": "object"})),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(tools)
    }

    /// Invoke a tool and flatten its content blocks into one string.
    ///
    /// Non-text blocks are rendered as `[Image: mime]` / `[Resource: uri]`
    /// placeholders so the model still sees that something came back.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<String, McpError> {
        let result = self
            .request(
                "tools/call",
                Some(serde_json::json!({
                    "name": name,
                    "arguments": arguments,
                })),
            )
            .await?;

        let mut parts: Vec<String> = Vec::new();
        if let Some(blocks) = result["content"].as_array() {
            for block in blocks {
                match block["type"].as_str() {
                    Some("text") => {
                        if let Some(text) = block["text"].as_str() {
                            parts.push(text.to_string());
                        }
                    }
                    Some("image") => parts.push(format!(
                        "[Image: {}]",
                        block["mimeType"].as_str().unwrap_or("unknown")
                    )),
                    Some("resource") => parts.push(format!(
                        "[Resource: {}]",
                        block["resource"]["uri"].as_str().unwrap_or("unknown")
                    )),
                    _ => {}
                }
            }
        }

        if result["isError"].as_bool().unwrap_or(false) {
            warn!(server = %self.server_name, tool = name, "MCP tool reported an error");
        }

        Ok(parts.join("\n"))
    }

    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, McpError> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method: method.to_string(),
            params,
        };

        let mut transport = self.transport.lock().await;
        let payload = serde_json::to_value(&request).map_err(|e| McpError::Protocol {
            server: self.server_name.clone(),
            reason: e.to_string(),
        })?;
        Self::write_line(&mut transport.stdin, &payload, &self.server_name).await?;

        let response = Self::read_line(&mut transport.stdout, &self.server_name).await?;

        if let Some(err) = response.error {
            return Err(McpError::Rpc {
                server: self.server_name.clone(),
                message: format!("code={}, message={}", err.code, err.message),
            });
        }

        response.result.ok_or_else(|| McpError::Protocol {
            server: self.server_name.clone(),
            reason: format!("no result in response to '{method}'"),
        })
    }

    async fn write_line(
        stdin: &mut ChildStdin,
        payload: &Value,
        server: &str,
    ) -> Result<(), McpError> {
        let io_err = |e: std::io::Error| McpError::Protocol {
            server: server.to_string(),
            reason: e.to_string(),
        };
        let line = payload.to_string();
        stdin.write_all(line.as_bytes()).await.map_err(io_err)?;
        stdin.write_all(b"\n").await.map_err(io_err)?;
        stdin.flush().await.map_err(io_err)
    }

    async fn read_line(
        stdout: &mut BufReader<ChildStdout>,
        server: &str,
    ) -> Result<JsonRpcResponse, McpError> {
        let mut line = String::new();
        loop {
            line.clear();
            let n = stdout.read_line(&mut line).await.map_err(|e| {
                McpError::Protocol {
                    server: server.to_string(),
                    reason: e.to_string(),
                }
            })?;
            if n == 0 {
                return Err(McpError::NotConnected {
                    server: server.to_string(),
                });
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            // Servers may interleave log lines or notifications on stdout;
            // skip anything that isn't a response.
            match serde_json::from_str::<JsonRpcResponse>(trimmed) {
                Ok(resp) if resp.result.is_some() || resp.error.is_some() => return Ok(resp),
                _ => continue,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_command_is_a_spawn_error() {
        let err = McpClient::connect(
            "ghost",
            "/nonexistent/mcp-server-binary",
            &[],
            &HashMap::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, McpError::Spawn { .. }));
    }

    #[tokio::test]
    async fn handshake_against_scripted_server() {
        // A shell stand-in that answers initialize and tools/list with
        // canned JSON-RPC lines.
        let script = r#"
read _init
echo '{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"2024-11-05","capabilities":{},"serverInfo":{"name":"fake"}}}'
read _notif
read _list
echo '{"jsonrpc":"2.0","id":2,"result":{"tools":[{"name":"ping","description":"Ping back","inputSchema":{"type":"object"}}]}}'
"#;
        let client = McpClient::connect(
            "fake",
            "sh",
            &["-c".to_string(), script.to_string()],
            &HashMap::new(),
        )
        .await
        .unwrap();

        let tools = client.list_tools().await.unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "ping");
        assert_eq!(tools[0].description, "Ping back");
    }

    #[tokio::test]
    async fn rpc_error_surfaces_as_mcp_error() {
        let script = r#"
read _init
echo '{"jsonrpc":"2.0","id":1,"error":{"code":-32600,"message":"bad request"}}'
"#;
        let err = McpClient::connect(
            "fake",
            "sh",
            &["-c".to_string(), script.to_string()],
            &HashMap::new(),
        )
        .await
        .unwrap_err();
        match err {
            McpError::Rpc { message, .. } => assert!(message.contains("bad request")),
            other => panic!("expected Rpc error, got {other:?}"),
        }
    }
}
