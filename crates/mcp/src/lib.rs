//! MCP (Model Context Protocol) integration over stdio.

pub mod client;
pub mod registry;

pub use client::{McpClient, McpToolInfo};
pub use registry::{McpRegistry, NAMESPACE_SEPARATOR};
