//! Directory listing tool.

use async_trait::async_trait;
use kaio_core::error::ToolError;
use kaio_core::tool::Tool;

pub struct ListFilesTool;

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &str {
        "list_files"
    }

    fn description(&self) -> &str {
        "List the files and directories inside a directory."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "directory": {
                    "type": "string",
                    "description": "The directory to list (defaults to the current directory)"
                }
            },
            "required": []
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<String, ToolError> {
        let directory = arguments["directory"].as_str().unwrap_or(".");

        let mut entries = Vec::new();
        let mut read_dir = tokio::fs::read_dir(directory).await.map_err(|e| {
            ToolError::execution("list_files", format!("cannot read '{directory}': {e}"))
        })?;

        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| ToolError::execution("list_files", e.to_string()))?
        {
            let name = entry.file_name().to_string_lossy().to_string();
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            entries.push(if is_dir { format!("{name}/") } else { name });
        }

        entries.sort();

        let mut output = format!("Contents of {directory}:");
        for entry in entries {
            output.push_str("\n  ");
            output.push_str(&entry);
        }
        Ok(output)
    }
}
