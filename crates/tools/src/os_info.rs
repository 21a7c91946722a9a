//! Host OS information tool.

use async_trait::async_trait;
use kaio_core::error::ToolError;
use kaio_core::tool::Tool;

pub struct OsInfoTool;

#[async_trait]
impl Tool for OsInfoTool {
    fn name(&self) -> &str {
        "get_os_info"
    }

    fn description(&self) -> &str {
        "Report the operating system, architecture, and working directory."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<String, ToolError> {
        let cwd = std::env::current_dir()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        Ok(format!(
            "OS: {}\nArchitecture: {}\nFamily: {}\nWorking directory: {cwd}",
            std::env::consts::OS,
            std::env::consts::ARCH,
            std::env::consts::FAMILY,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reports_current_platform() {
        let tool = OsInfoTool;
        let out = tool.execute(serde_json::json!({})).await.unwrap();
        assert!(out.contains(&format!("OS: {}", std::env::consts::OS)));
        assert!(out.contains("Working directory:"));
    }
}
