//! Shell command execution tool.

use async_trait::async_trait;
use kaio_core::error::ToolError;
use kaio_core::tool::Tool;
use tokio::process::Command;
use tracing::debug;

/// Output characters kept from each stream before truncation.
const MAX_OUTPUT_CHARS: usize = 4000;

pub struct RunCommandTool;

fn truncate(s: &str) -> String {
    if s.chars().count() > MAX_OUTPUT_CHARS {
        let kept: String = s.chars().take(MAX_OUTPUT_CHARS).collect();
        format!("{kept}\n[TRUNCATED]")
    } else {
        s.to_string()
    }
}

#[async_trait]
impl Tool for RunCommandTool {
    fn name(&self) -> &str {
        "run_command"
    }

    fn description(&self) -> &str {
        "Run a shell command and return its output."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to run"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let command = arguments["command"]
            .as_str()
            .ok_or_else(|| ToolError::invalid_args("run_command", "missing 'command'"))?;

        debug!(command, "Running shell command");

        let output = Command::new("sh")
            .arg("-c")
            .arg(command)
            .output()
            .await
            .map_err(|e| ToolError::execution("run_command", e.to_string()))?;

        let stdout = truncate(&String::from_utf8_lossy(&output.stdout));
        let stderr = truncate(&String::from_utf8_lossy(&output.stderr));

        let mut result = String::new();
        if !stdout.is_empty() {
            result.push_str(&stdout);
        }
        if !stderr.is_empty() {
            if !result.is_empty() {
                result.push('\n');
            }
            result.push_str("stderr: ");
            result.push_str(&stderr);
        }
        if !output.status.success() {
            if !result.is_empty() {
                result.push('\n');
            }
            result.push_str(&format!(
                "exit code: {}",
                output.status.code().unwrap_or(-1)
            ));
        }
        if result.is_empty() {
            result.push_str("(no output)");
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_stdout() {
        let tool = RunCommandTool;
        let out = tool
            .execute(serde_json::json!({ "command": "echo hello" }))
            .await
            .unwrap();
        assert_eq!(out.trim(), "hello");
    }

    #[tokio::test]
    async fn reports_exit_code_and_stderr() {
        let tool = RunCommandTool;
        let out = tool
            .execute(serde_json::json!({ "command": "echo oops >&2; exit 3" }))
            .await
            .unwrap();
        assert!(out.contains("stderr: oops"));
        assert!(out.contains("exit code: 3"));
    }

    #[tokio::test]
    async fn silent_command_reports_no_output() {
        let tool = RunCommandTool;
        let out = tool
            .execute(serde_json::json!({ "command": "true" }))
            .await
            .unwrap();
        assert_eq!(out, "(no output)");
    }
}
