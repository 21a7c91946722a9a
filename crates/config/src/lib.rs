//! Configuration loading and persistence for Kaio.
//!
//! Loads configuration from `~/.kaio/config.json` with environment variable
//! overrides. Mutations go through the persisting `set_*` methods so the
//! file always reflects the running state.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.kaio/config.json`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Active provider name ("huggingface", "openai", "anthropic",
    /// "ollama", "offline")
    #[serde(default = "default_provider")]
    pub active_provider: String,

    /// Per-provider API tokens
    #[serde(default)]
    pub tokens: HashMap<String, String>,

    /// Per-provider model overrides
    #[serde(default)]
    pub models: HashMap<String, String>,

    /// Per-provider endpoint overrides
    #[serde(default)]
    pub endpoints: HashMap<String, String>,

    /// System prompt prepended to every conversation
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// How many recent messages of permanent history each request carries
    #[serde(default = "default_session_memory_max")]
    pub session_memory_max: usize,

    /// Tool-step budget per turn
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,

    /// Offline (llama.cpp) settings
    #[serde(default)]
    pub offline: OfflineConfig,

    /// MCP servers to spawn at startup
    #[serde(default)]
    pub mcp_servers: Vec<McpServerConfig>,

    /// Gateway settings
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Tool policy settings
    #[serde(default)]
    pub policy: PolicyConfig,
}

fn default_provider() -> String {
    "huggingface".into()
}
fn default_system_prompt() -> String {
    "You are a helpful assistant with access to tools. Use them when they \
     help answer the user's request, and reply in plain text otherwise."
        .into()
}
fn default_session_memory_max() -> usize {
    10
}
fn default_max_steps() -> usize {
    10
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tokens: Vec<&str> = self.tokens.keys().map(String::as_str).collect();
        f.debug_struct("AppConfig")
            .field("active_provider", &self.active_provider)
            .field("tokens", &format_args!("[REDACTED for {tokens:?}]"))
            .field("models", &self.models)
            .field("endpoints", &self.endpoints)
            .field("session_memory_max", &self.session_memory_max)
            .field("max_steps", &self.max_steps)
            .field("offline", &self.offline)
            .field("mcp_servers", &self.mcp_servers)
            .field("gateway", &self.gateway)
            .field("policy", &self.policy)
            .finish()
    }
}

/// Settings for the offline llama.cpp path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfflineConfig {
    /// Path to the llama.cpp CLI binary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binary_path: Option<PathBuf>,

    /// Path to the GGUF model file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_path: Option<PathBuf>,

    /// Maximum tokens to predict per completion
    #[serde(default = "default_max_predict")]
    pub max_predict: u32,
}

fn default_max_predict() -> u32 {
    512
}

impl Default for OfflineConfig {
    fn default() -> Self {
        Self {
            binary_path: None,
            model_path: None,
            max_predict: default_max_predict(),
        }
    }
}

/// One MCP server to spawn over stdio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerConfig {
    /// Registry name; discovered tools become `<name>__<tool>`
    pub name: String,

    /// Executable to spawn
    pub command: String,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub env: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8770
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Tool policy settings applied at the dispatch boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Substrings that make a `run_command` invocation denied
    #[serde(default = "default_denied_commands")]
    pub denied_commands: Vec<String>,
}

fn default_denied_commands() -> Vec<String> {
    vec![
        "rm -rf /".into(),
        "mkfs".into(),
        "dd if=".into(),
        ":(){".into(),
    ]
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            denied_commands: default_denied_commands(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.kaio/config.json).
    ///
    /// Environment variables take priority over the file:
    /// - `HF_TOKEN` fills the huggingface token when absent
    /// - `KAIO_PROVIDER` overrides the active provider
    /// - `KAIO_MODEL` overrides the active provider's model
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.json");
        let mut config = Self::load_from(&config_path)?;

        if let Ok(token) = std::env::var("HF_TOKEN") {
            config
                .tokens
                .entry("huggingface".to_string())
                .or_insert(token);
        }

        if let Ok(provider) = std::env::var("KAIO_PROVIDER") {
            config.active_provider = provider;
        }

        if let Ok(model) = std::env::var("KAIO_MODEL") {
            let provider = config.active_provider.clone();
            config.models.insert(provider, model);
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self =
            serde_json::from_str(&content).map_err(|e| ConfigError::ParseError {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".kaio")
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.session_memory_max == 0 {
            return Err(ConfigError::ValidationError(
                "session_memory_max must be at least 1".into(),
            ));
        }
        if self.max_steps == 0 {
            return Err(ConfigError::ValidationError(
                "max_steps must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Write the configuration to a specific path, creating parent
    /// directories as needed.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        }
        let content =
            serde_json::to_string_pretty(self).map_err(|e| ConfigError::WriteError {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        std::fs::write(path, content).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Write the configuration to the default path.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_dir().join("config.json"))
    }

    /// Token for a provider, if any.
    pub fn token_for(&self, provider: &str) -> Option<&str> {
        self.tokens.get(provider).map(String::as_str)
    }

    /// Model override for a provider, if any.
    pub fn model_for(&self, provider: &str) -> Option<&str> {
        self.models.get(provider).map(String::as_str)
    }

    /// Endpoint override for a provider, if any.
    pub fn endpoint_for(&self, provider: &str) -> Option<&str> {
        self.endpoints.get(provider).map(String::as_str)
    }

    /// Switch the active provider and persist.
    pub fn set_active_provider(&mut self, provider: impl Into<String>) -> Result<(), ConfigError> {
        self.active_provider = provider.into();
        self.save()
    }

    /// Store a provider token and persist.
    pub fn set_token(
        &mut self,
        provider: impl Into<String>,
        token: impl Into<String>,
    ) -> Result<(), ConfigError> {
        self.tokens.insert(provider.into(), token.into());
        self.save()
    }

    /// Override the model for a provider and persist.
    pub fn set_model(
        &mut self,
        provider: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<(), ConfigError> {
        self.models.insert(provider.into(), model.into());
        self.save()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            active_provider: default_provider(),
            tokens: HashMap::new(),
            models: HashMap::new(),
            endpoints: HashMap::new(),
            system_prompt: default_system_prompt(),
            session_memory_max: default_session_memory_max(),
            max_steps: default_max_steps(),
            offline: OfflineConfig::default(),
            mcp_servers: vec![],
            gateway: GatewayConfig::default(),
            policy: PolicyConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Failed to write config file at {path}: {reason}")]
    WriteError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.active_provider, "huggingface");
        assert_eq!(config.session_memory_max, 10);
        assert_eq!(config.max_steps, 10);
        assert_eq!(config.gateway.port, 8770);
    }

    #[test]
    fn config_roundtrip_json() {
        let config = AppConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.active_provider, config.active_provider);
        assert_eq!(parsed.gateway.port, config.gateway.port);
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.json"));
        assert!(result.is_ok());
        assert_eq!(result.unwrap().active_provider, "huggingface");
    }

    #[test]
    fn zero_session_memory_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"session_memory_max": 0}"#).unwrap();
        assert!(AppConfig::load_from(&path).is_err());
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"active_provider": "anthropic"}"#).unwrap();
        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.active_provider, "anthropic");
        assert_eq!(config.max_steps, 10);
    }

    #[test]
    fn save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let mut config = AppConfig::default();
        config
            .tokens
            .insert("huggingface".into(), "hf_secret".into());
        config.save_to(&path).unwrap();
        let reloaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(reloaded.token_for("huggingface"), Some("hf_secret"));
    }

    #[test]
    fn debug_redacts_tokens() {
        let mut config = AppConfig::default();
        config
            .tokens
            .insert("huggingface".into(), "hf_secret".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("hf_secret"));
        assert!(debug.contains("REDACTED"));
    }
}
