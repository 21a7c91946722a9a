//! The provider abstraction: one trait every model backend implements.
//!
//! Backends receive the canonical request and do all wire-format reshaping
//! internally, so the turn controller never sees provider JSON.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::message::Message;

/// A tool schema offered to the model, in the canonical shape.
/// Providers reshape this into their own wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema for the arguments object.
    pub parameters: serde_json::Value,
}

/// A normalized completion request.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Tool schemas to offer. Empty means no tools are offered and the
    /// provider must not emit a tool-choice directive.
    pub tools: Vec<ToolDefinition>,
}

impl ProviderRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: None,
            max_tokens: None,
            tools: Vec::new(),
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// A normalized completion response.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    /// The assistant message, already normalized into the canonical shape.
    pub message: Message,
    /// Model that actually served the request (may differ from the one
    /// asked for when a router picked a backend).
    pub model: String,
}

/// An LLM backend.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Short identifier, e.g. "huggingface" or "llama-cpp".
    fn name(&self) -> &str;

    /// Run one completion. No retries here; the caller decides what a
    /// failure means.
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError>;
}

impl std::fmt::Debug for dyn Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider").field("name", &self.name()).finish()
    }
}
