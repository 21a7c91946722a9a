//! Error taxonomy for the workspace.
//!
//! Each bounded context gets its own enum; the top-level [`Error`] wraps
//! them so binaries can hold a single error type at the seams.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error for the agent.
#[derive(Debug, Error)]
pub enum Error {
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("mcp error: {0}")]
    Mcp(#[from] McpError),

    #[error("config error: {message}")]
    Config { message: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Internal(String),
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

/// Errors surfaced by provider backends.
///
/// `Clone` so the CLI can show the failure and still keep it around for
/// the retry prompt.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("authentication failed for provider '{provider}'")]
    AuthenticationFailed { provider: String },

    #[error("provider '{provider}' is not configured: {hint}")]
    NotConfigured { provider: String, hint: String },

    #[error("request timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("network error: {0}")]
    Network(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

/// Errors from local tool execution.
///
/// The dispatcher converts every variant into a plain result string; these
/// never cross the dispatch boundary as `Err`.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool {0} not found.")]
    NotFound(String),

    #[error("tool '{tool_name}' failed: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("invalid arguments for '{tool_name}': {reason}")]
    InvalidArguments { tool_name: String, reason: String },

    #[error("Tool {tool_name} denied: {reason}")]
    PermissionDenied { tool_name: String, reason: String },
}

impl ToolError {
    pub fn execution(tool_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ExecutionFailed {
            tool_name: tool_name.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_args(tool_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArguments {
            tool_name: tool_name.into(),
            reason: reason.into(),
        }
    }
}

/// Errors from the MCP stdio transport.
#[derive(Debug, Error)]
pub enum McpError {
    #[error("failed to spawn MCP server '{server}': {reason}")]
    Spawn { server: String, reason: String },

    #[error("MCP protocol error from '{server}': {reason}")]
    Protocol { server: String, reason: String },

    #[error("MCP server '{server}' returned an error: {message}")]
    Rpc { server: String, message: String },

    #[error("MCP server '{server}' is not connected")]
    NotConnected { server: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_not_found_display() {
        let err = ToolError::NotFound("fly_to_moon".to_string());
        assert_eq!(err.to_string(), "Tool fly_to_moon not found.");
    }

    #[test]
    fn tool_denied_display() {
        let err = ToolError::PermissionDenied {
            tool_name: "run_command".to_string(),
            reason: "matches denied command 'rm -rf /'".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Tool run_command denied: matches denied command 'rm -rf /'"
        );
    }

    #[test]
    fn provider_error_converts_to_top_level() {
        let err: Error = ProviderError::AuthenticationFailed {
            provider: "huggingface".to_string(),
        }
        .into();
        assert!(err.to_string().contains("authentication failed"));
    }

    #[test]
    fn provider_error_is_cloneable() {
        let err = ProviderError::RateLimited {
            retry_after_secs: 30,
        };
        let cloned = err.clone();
        assert_eq!(err.to_string(), cloned.to_string());
    }
}
