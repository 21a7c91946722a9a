//! Registry of connected MCP servers.
//!
//! Discovered tools are namespaced `<server>__<tool>` so they can share a
//! flat tool table with local tools without collisions.

use kaio_config::McpServerConfig;
use kaio_core::provider::ToolDefinition;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{info, warn};

use crate::client::{McpClient, McpToolInfo};

/// Separator between server name and tool name in namespaced identifiers.
pub const NAMESPACE_SEPARATOR: &str = "__";

/// All connected MCP servers and their discovered tools.
#[derive(Default)]
pub struct McpRegistry {
    clients: HashMap<String, McpClient>,
    tools: Vec<(String, McpToolInfo)>,
}

impl McpRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect every configured server, discover its tools, and register
    /// them. A server that fails to connect is logged and skipped; startup
    /// never fails because of one bad MCP entry.
    pub async fn connect_all(configs: &[McpServerConfig]) -> Self {
        let mut registry = Self::new();
        for config in configs {
            registry.connect(config).await;
        }
        registry
    }

    async fn connect(&mut self, config: &McpServerConfig) {
        let client =
            match McpClient::connect(&config.name, &config.command, &config.args, &config.env)
                .await
            {
                Ok(c) => c,
                Err(e) => {
                    warn!(server = %config.name, error = %e, "Skipping MCP server");
                    return;
                }
            };

        match client.list_tools().await {
            Ok(tools) => {
                info!(server = %config.name, count = tools.len(), "MCP server connected");
                for tool in tools {
                    self.tools.push((config.name.clone(), tool));
                }
                self.clients.insert(config.name.clone(), client);
            }
            Err(e) => {
                warn!(server = %config.name, error = %e, "Failed to list MCP tools, skipping server");
            }
        }
    }

    pub fn server_names(&self) -> Vec<&str> {
        self.clients.keys().map(String::as_str).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Namespaced definitions for every discovered tool, ready to merge
    /// with the local table.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .tools
            .iter()
            .map(|(server, tool)| ToolDefinition {
                name: format!("{server}{NAMESPACE_SEPARATOR}{}", tool.name),
                description: tool.description.clone(),
                parameters: tool.input_schema.clone(),
            })
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Split a namespaced name into (server, tool), if it is one.
    pub fn split_name(name: &str) -> Option<(&str, &str)> {
        name.split_once(NAMESPACE_SEPARATOR)
    }

    /// Call a namespaced tool. Always returns a string: routing and RPC
    /// failures are folded into error text for the model.
    pub async fn call(&self, namespaced: &str, arguments: Value) -> String {
        let Some((server, tool)) = Self::split_name(namespaced) else {
            return format!("Tool {namespaced} not found.");
        };
        let Some(client) = self.clients.get(server) else {
            return format!("MCP server '{server}' is not connected.");
        };
        match client.call_tool(tool, arguments).await {
            Ok(output) => output,
            Err(e) => format!("MCP tool '{namespaced}' failed: {e}"),
        }
    }
}
