//! Model provider backends.
//!
//! Three families cover every configured backend: the OpenAI-compatible
//! dialect (Hugging Face router, OpenAI, Ollama, vLLM), the native
//! Anthropic Messages API, and an offline llama.cpp subprocess. The
//! registry maps provider names to the right construction.

pub mod anthropic;
pub mod llama_cpp;
pub mod openai_compat;
pub mod registry;

pub use anthropic::AnthropicProvider;
pub use llama_cpp::LlamaCppProvider;
pub use openai_compat::{AuthStyle, OpenAiCompatProvider};
pub use registry::{
    build_active_provider, build_provider, known_providers, model_for, provider_info,
    ProviderInfo, OFFLINE_PROVIDER,
};
