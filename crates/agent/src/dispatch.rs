//! Tool dispatch: the single boundary between the turn loop and every
//! tool, local or MCP.
//!
//! Dispatch never fails. Unknown tools, policy denials, and execution
//! errors all come back as strings for the model to read and react to.

use kaio_core::error::ToolError;
use kaio_core::provider::ToolDefinition;
use kaio_core::tool::ToolRegistry;
use kaio_core::ToolInvocation;
use kaio_mcp::{McpRegistry, NAMESPACE_SEPARATOR};
use kaio_tools::{AllowAll, ToolPolicy};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct ToolDispatcher {
    local: ToolRegistry,
    mcp: Arc<McpRegistry>,
    policy: Box<dyn ToolPolicy>,
}

impl ToolDispatcher {
    pub fn new(local: ToolRegistry, mcp: Arc<McpRegistry>) -> Self {
        Self {
            local,
            mcp,
            policy: Box::new(AllowAll),
        }
    }

    pub fn with_policy(mut self, policy: Box<dyn ToolPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// All tool schemas to offer the model: local table plus namespaced
    /// MCP tools.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs = self.local.definitions();
        defs.extend(self.mcp.definitions());
        defs
    }

    pub fn has_tools(&self) -> bool {
        !self.local.is_empty() || !self.mcp.is_empty()
    }

    /// Execute one invocation and return the result text.
    pub async fn dispatch(&self, call: &ToolInvocation) -> String {
        let arguments = call.arguments_value();

        if let Err(reason) = self.policy.allow(&call.name, &arguments) {
            warn!(tool = %call.name, %reason, "Tool invocation denied by policy");
            return ToolError::PermissionDenied {
                tool_name: call.name.clone(),
                reason,
            }
            .to_string();
        }

        debug!(tool = %call.name, "Dispatching tool call");

        // Namespaced names belong to MCP servers.
        if call.name.contains(NAMESPACE_SEPARATOR) {
            return self.mcp.call(&call.name, arguments).await;
        }

        match self.local.get(&call.name) {
            Some(tool) => match tool.execute(arguments).await {
                Ok(output) => output,
                Err(e) => e.to_string(),
            },
            None => ToolError::NotFound(call.name.clone()).to_string(),
        }
    }
}
