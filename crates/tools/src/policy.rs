//! Tool policy hook applied at the dispatch boundary.

use kaio_config::PolicyConfig;
use serde_json::Value;

/// Decides whether a tool invocation may run. A denial is returned to the
/// model as the tool result, not raised.
pub trait ToolPolicy: Send + Sync {
    /// `Ok(())` to allow, `Err(reason)` to deny.
    fn allow(&self, tool_name: &str, arguments: &Value) -> Result<(), String>;
}

/// Permits everything.
pub struct AllowAll;

impl ToolPolicy for AllowAll {
    fn allow(&self, _tool_name: &str, _arguments: &Value) -> Result<(), String> {
        Ok(())
    }
}

/// Denies `run_command` invocations whose command contains a configured
/// substring.
pub struct CommandDenylist {
    denied: Vec<String>,
}

impl CommandDenylist {
    pub fn new(denied: Vec<String>) -> Self {
        Self { denied }
    }

    pub fn from_config(config: &PolicyConfig) -> Self {
        Self::new(config.denied_commands.clone())
    }
}

impl ToolPolicy for CommandDenylist {
    fn allow(&self, tool_name: &str, arguments: &Value) -> Result<(), String> {
        if tool_name != "run_command" {
            return Ok(());
        }
        let command = arguments["command"].as_str().unwrap_or("");
        for pattern in &self.denied {
            if command.contains(pattern.as_str()) {
                return Err(format!("command matches denied pattern '{pattern}'"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_all_allows() {
        assert!(AllowAll
            .allow("run_command", &serde_json::json!({"command": "rm -rf /"}))
            .is_ok());
    }

    #[test]
    fn denylist_blocks_matching_commands() {
        let policy = CommandDenylist::from_config(&PolicyConfig::default());
        let denied = policy.allow(
            "run_command",
            &serde_json::json!({"command": "sudo rm -rf / --no-preserve-root"}),
        );
        assert!(denied.is_err());

        let allowed = policy.allow("run_command", &serde_json::json!({"command": "ls -la"}));
        assert!(allowed.is_ok());
    }

    #[test]
    fn denylist_ignores_other_tools() {
        let policy = CommandDenylist::new(vec!["anything".into()]);
        assert!(policy
            .allow("read_file", &serde_json::json!({"path": "anything"}))
            .is_ok());
    }
}
