//! Known-provider table and the factory that builds a [`Provider`] from
//! configuration.

use kaio_config::AppConfig;
use kaio_core::error::ProviderError;
use kaio_core::provider::Provider;
use std::sync::Arc;

use crate::anthropic::AnthropicProvider;
use crate::llama_cpp::LlamaCppProvider;
use crate::openai_compat::{AuthStyle, OpenAiCompatProvider};

/// Name used by the offline path in config and slash commands.
pub const OFFLINE_PROVIDER: &str = "offline";

/// Static facts about a known online provider.
#[derive(Debug, Clone)]
pub struct ProviderInfo {
    pub name: &'static str,
    pub default_endpoint: &'static str,
    pub default_model: &'static str,
    pub requires_token: bool,
}

/// Every provider the factory knows how to build, offline last.
pub fn known_providers() -> &'static [ProviderInfo] {
    &[
        ProviderInfo {
            name: "huggingface",
            default_endpoint: "https://router.huggingface.co/v1",
            default_model: "meta-llama/Llama-3.3-70B-Instruct",
            requires_token: true,
        },
        ProviderInfo {
            name: "openai",
            default_endpoint: "https://api.openai.com/v1",
            default_model: "gpt-4o-mini",
            requires_token: true,
        },
        ProviderInfo {
            name: "anthropic",
            default_endpoint: "https://api.anthropic.com",
            default_model: "claude-sonnet-4-20250514",
            requires_token: true,
        },
        ProviderInfo {
            // Azure deployments are resource-specific; the endpoint must
            // come from config (`endpoints.azure`), so no default here.
            name: "azure",
            default_endpoint: "",
            default_model: "gpt-4o-mini",
            requires_token: true,
        },
        ProviderInfo {
            name: "ollama",
            default_endpoint: "http://localhost:11434/v1",
            default_model: "llama3.2",
            requires_token: false,
        },
        ProviderInfo {
            name: OFFLINE_PROVIDER,
            default_endpoint: "",
            default_model: "local-gguf",
            requires_token: false,
        },
    ]
}

/// Look up a known provider by name.
pub fn provider_info(name: &str) -> Option<&'static ProviderInfo> {
    known_providers().iter().find(|p| p.name == name)
}

/// The model that requests to `name` will use under `config`.
pub fn model_for(config: &AppConfig, name: &str) -> String {
    config
        .model_for(name)
        .map(str::to_string)
        .or_else(|| provider_info(name).map(|p| p.default_model.to_string()))
        .unwrap_or_else(|| "default".to_string())
}

/// Build the provider named `name` from configuration.
///
/// Token, model, and endpoint overrides come from the config; everything
/// else from the known-provider table.
pub fn build_provider(
    config: &AppConfig,
    name: &str,
) -> std::result::Result<Arc<dyn Provider>, ProviderError> {
    let info = provider_info(name).ok_or_else(|| ProviderError::NotConfigured {
        provider: name.to_string(),
        hint: format!(
            "unknown provider; known: {}",
            known_providers()
                .iter()
                .map(|p| p.name)
                .collect::<Vec<_>>()
                .join(", ")
        ),
    })?;

    if name == OFFLINE_PROVIDER {
        return Ok(Arc::new(LlamaCppProvider::new(
            config.offline.binary_path.clone(),
            config.offline.model_path.clone(),
            config.offline.max_predict,
        )));
    }

    let token = match config.token_for(name) {
        Some(t) => t.to_string(),
        None if info.requires_token => {
            return Err(ProviderError::NotConfigured {
                provider: name.to_string(),
                hint: format!("no token; set one with /token {name} <key>"),
            })
        }
        None => String::new(),
    };

    let endpoint = config
        .endpoint_for(name)
        .unwrap_or(info.default_endpoint)
        .to_string();

    let provider: Arc<dyn Provider> = match name {
        "anthropic" => Arc::new(AnthropicProvider::new(token).with_base_url(endpoint)),
        // Azure's OpenAI-compatible endpoint authenticates with an
        // `api-key` header instead of a Bearer token.
        "azure" => {
            if endpoint.is_empty() {
                return Err(ProviderError::NotConfigured {
                    provider: name.to_string(),
                    hint: "no endpoint; set endpoints.azure to your deployment's \
                           OpenAI-compatible URL"
                        .to_string(),
                });
            }
            Arc::new(
                OpenAiCompatProvider::new(name, endpoint, token)
                    .with_auth_style(AuthStyle::ApiKeyHeader("api-key")),
            )
        }
        "ollama" => Arc::new(OpenAiCompatProvider::ollama(Some(&endpoint))),
        _ => Arc::new(OpenAiCompatProvider::new(name, endpoint, token)),
    };

    Ok(provider)
}

/// Build whatever provider the config marks active.
pub fn build_active_provider(
    config: &AppConfig,
) -> std::result::Result<Arc<dyn Provider>, ProviderError> {
    build_provider(config, &config.active_provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_token(provider: &str) -> AppConfig {
        let mut config = AppConfig::default();
        config.tokens.insert(provider.into(), "key".into());
        config
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let config = AppConfig::default();
        let err = build_provider(&config, "grok9000").unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured { .. }));
    }

    #[test]
    fn missing_token_is_rejected_for_token_providers() {
        let config = AppConfig::default();
        let err = build_provider(&config, "huggingface").unwrap_err();
        match err {
            ProviderError::NotConfigured { hint, .. } => assert!(hint.contains("/token")),
            other => panic!("expected NotConfigured, got {other:?}"),
        }
    }

    #[test]
    fn ollama_needs_no_token() {
        let config = AppConfig::default();
        let provider = build_provider(&config, "ollama").unwrap();
        assert_eq!(provider.name(), "ollama");
    }

    #[test]
    fn offline_builds_even_without_paths() {
        // Construction succeeds; the missing paths surface on complete().
        let config = AppConfig::default();
        let provider = build_provider(&config, OFFLINE_PROVIDER).unwrap();
        assert_eq!(provider.name(), "llama-cpp");
    }

    #[test]
    fn model_override_wins_over_default() {
        let mut config = config_with_token("huggingface");
        config
            .models
            .insert("huggingface".into(), "Qwen/Qwen2.5-72B".into());
        assert_eq!(model_for(&config, "huggingface"), "Qwen/Qwen2.5-72B");
        assert_eq!(model_for(&config, "openai"), "gpt-4o-mini");
    }

    #[test]
    fn azure_requires_an_endpoint_override() {
        let config = config_with_token("azure");
        let err = build_provider(&config, "azure").unwrap_err();
        match err {
            ProviderError::NotConfigured { hint, .. } => {
                assert!(hint.contains("endpoints.azure"))
            }
            other => panic!("expected NotConfigured, got {other:?}"),
        }
    }

    #[test]
    fn azure_builds_with_endpoint_and_token() {
        let mut config = config_with_token("azure");
        config.endpoints.insert(
            "azure".into(),
            "https://res.openai.azure.com/openai/v1".into(),
        );
        let provider = build_provider(&config, "azure").unwrap();
        assert_eq!(provider.name(), "azure");
    }

    #[test]
    fn anthropic_builds_with_token() {
        let config = config_with_token("anthropic");
        let provider = build_provider(&config, "anthropic").unwrap();
        assert_eq!(provider.name(), "anthropic");
    }
}
