//! Kaio core — domain types shared by every crate in the workspace.
//!
//! The flow: the CLI or gateway receives a user prompt → the turn
//! controller sends the conversation to a [`Provider`] → the response is
//! normalized (and repaired if needed) into a canonical [`Message`] →
//! requested tools are dispatched → the loop repeats until the model stops
//! calling tools.

pub mod error;
pub mod message;
pub mod provider;
pub mod tool;

pub use error::{Error, McpError, ProviderError, Result, ToolError};
pub use message::{
    Conversation, ConversationId, Message, Role, ToolInvocation, EMPTY_RESPONSE_PLACEHOLDER,
};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition};
pub use tool::{Tool, ToolRegistry};
