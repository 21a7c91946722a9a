//! Offline provider backed by a local llama.cpp binary.
//!
//! Runs one subprocess per completion: the conversation is collapsed into
//! a single ChatML prompt, fed to the binary, and stdout comes back as the
//! assistant text. Tools are never offered on this path.

use async_trait::async_trait;
use kaio_core::error::ProviderError;
use kaio_core::message::Message;
use kaio_core::provider::{Provider, ProviderRequest, ProviderResponse};
use kaio_core::Role;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::{debug, warn};

const SETUP_HINT: &str =
    "set offline.binary_path and offline.model_path in ~/.kaio/config.json";

/// Local llama.cpp subprocess provider.
pub struct LlamaCppProvider {
    binary_path: Option<PathBuf>,
    model_path: Option<PathBuf>,
    max_predict: u32,
}

impl LlamaCppProvider {
    pub fn new(
        binary_path: Option<PathBuf>,
        model_path: Option<PathBuf>,
        max_predict: u32,
    ) -> Self {
        Self {
            binary_path,
            model_path,
            max_predict,
        }
    }

    /// Collapse the message list into one ChatML prompt, ending with an
    /// open assistant turn for the model to complete.
    fn build_prompt(messages: &[Message]) -> String {
        let mut prompt = String::new();
        for msg in messages {
            let role = match msg.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
                // Tool results shouldn't reach this path; render them as
                // user context if they do.
                Role::Tool => "user",
            };
            prompt.push_str(&format!(
                "<|im_start|>{role}\n{}<|im_end|>\n",
                msg.content
            ));
        }
        prompt.push_str("<|im_start|>assistant\n");
        prompt
    }

    fn paths(&self) -> std::result::Result<(&PathBuf, &PathBuf), ProviderError> {
        let not_configured = |hint: &str| ProviderError::NotConfigured {
            provider: "llama-cpp".into(),
            hint: hint.into(),
        };

        let binary = self
            .binary_path
            .as_ref()
            .ok_or_else(|| not_configured(SETUP_HINT))?;
        let model = self
            .model_path
            .as_ref()
            .ok_or_else(|| not_configured(SETUP_HINT))?;

        if !binary.exists() {
            return Err(not_configured(&format!(
                "binary not found at {}; {SETUP_HINT}",
                binary.display()
            )));
        }
        if !model.exists() {
            return Err(not_configured(&format!(
                "model not found at {}; {SETUP_HINT}",
                model.display()
            )));
        }

        Ok((binary, model))
    }
}

#[async_trait]
impl Provider for LlamaCppProvider {
    fn name(&self) -> &str {
        "llama-cpp"
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let (binary, model) = self.paths()?;
        let prompt = Self::build_prompt(&request.messages);

        debug!(binary = %binary.display(), "Running offline completion");

        let output = Command::new(binary)
            .arg("-m")
            .arg(model)
            .arg("-p")
            .arg(&prompt)
            .arg("-n")
            .arg(self.max_predict.to_string())
            .arg("--no-display-prompt")
            .output()
            .await
            .map_err(|e| ProviderError::Network(format!("failed to run llama.cpp: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(status = ?output.status.code(), "llama.cpp exited with error");
            return Err(ProviderError::ApiError {
                status_code: 0,
                message: format!("llama.cpp failed: {}", stderr.trim()),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let text = stdout
            .trim()
            .trim_end_matches("<|im_end|>")
            .trim()
            .to_string();

        Ok(ProviderResponse {
            message: Message::assistant_with_calls(text, vec![]),
            model: request.model,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_collapses_to_chatml() {
        let messages = vec![
            Message::system("be brief"),
            Message::user("hello"),
            Message::assistant("hi"),
            Message::user("bye"),
        ];
        let prompt = LlamaCppProvider::build_prompt(&messages);
        assert!(prompt.starts_with("<|im_start|>system\nbe brief<|im_end|>\n"));
        assert!(prompt.contains("<|im_start|>user\nhello<|im_end|>\n"));
        assert!(prompt.contains("<|im_start|>assistant\nhi<|im_end|>\n"));
        assert!(prompt.ends_with("<|im_start|>assistant\n"));
    }

    #[tokio::test]
    async fn unconfigured_provider_errors_with_hint() {
        let provider = LlamaCppProvider::new(None, None, 512);
        let request = ProviderRequest::new("local", vec![Message::user("hi")]);
        let err = provider.complete(request).await.unwrap_err();
        match err {
            ProviderError::NotConfigured { hint, .. } => {
                assert!(hint.contains("config.json"));
            }
            other => panic!("expected NotConfigured, got {other:?}"),
        }
    }
}
