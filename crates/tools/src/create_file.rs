//! File creation tool.

use async_trait::async_trait;
use kaio_core::error::ToolError;
use kaio_core::tool::Tool;

pub struct CreateFileTool;

#[async_trait]
impl Tool for CreateFileTool {
    fn name(&self) -> &str {
        "create_file"
    }

    fn description(&self) -> &str {
        "Create or overwrite a file with the given content."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The file path to write"
                },
                "content": {
                    "type": "string",
                    "description": "The full file content"
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let path = arguments["path"]
            .as_str()
            .ok_or_else(|| ToolError::invalid_args("create_file", "missing 'path'"))?;
        let content = arguments["content"]
            .as_str()
            .ok_or_else(|| ToolError::invalid_args("create_file", "missing 'content'"))?;

        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    ToolError::execution("create_file", format!("cannot create parent dirs: {e}"))
                })?;
            }
        }

        tokio::fs::write(path, content)
            .await
            .map_err(|e| ToolError::execution("create_file", format!("cannot write '{path}': {e}")))?;

        Ok(format!("Created {path} ({} bytes)", content.len()))
    }
}
